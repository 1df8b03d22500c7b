use std::fs::{self, File};
use std::io::BufWriter;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Arg, ArgMatches, Command};
use linux_embedded_hal::i2cdev::linux::LinuxI2CError;
use linux_embedded_hal::I2cdev;

use ggdump::boot::RetryPolicy;
use ggdump::conn::{SmbusI2c, DEFAULT_ADDRESS};
use ggdump::{dump, gauge};

type DynResult<T> = Result<T, Box<dyn std::error::Error>>;

static CANCELLED: AtomicBool = AtomicBool::new(false);

/// Raise the cancellation flag on Ctrl-C, so a running dump stops at the
/// next row boundary with the boot ROM exit command still issued.
fn install_sigint_hook() {
    #[allow(non_camel_case_types)]
    type c_int = i32;
    const SIGINT: c_int = 2;

    extern "C" fn on_sigint(_signum: c_int) {
        CANCELLED.store(true, Ordering::Relaxed);
    }

    // Define the one libc binding inline (to avoid bringing in the entire
    // libc dep).
    extern "C" {
        fn signal(signum: c_int, handler: extern "C" fn(c_int)) -> usize;
    }

    unsafe {
        let _ = signal(SIGINT, on_sigint);
    }
}

fn cli() -> Command {
    Command::new("ggdump")
        .about("Dumps a battery gas gauge's flash over SMBus via its boot ROM")
        .arg(
            Arg::new("device")
                .help("I2C character device the gauge sits on (e.g. /dev/i2c-0)")
                .required(true),
        )
        .arg(
            Arg::new("address")
                .short('a')
                .long("address")
                .value_name("HEX")
                .help("7-bit device address (default 0x0b)"),
        )
        .arg(
            Arg::new("data-flash")
                .long("data-flash")
                .value_name("FILE")
                .help("Dump the 2 KiB data-flash region to FILE"),
        )
        .arg(
            Arg::new("instruction-flash")
                .long("instruction-flash")
                .value_name("FILE")
                .help("Dump the 72 KiB instruction-flash region to FILE"),
        )
        .arg(
            Arg::new("set-cell-mode")
                .long("set-cell-mode")
                .value_name("MODE")
                .help("Set the series-cell configuration bits (0-3)"),
        )
        .arg(
            Arg::new("set-flash-ok-voltage")
                .long("set-flash-ok-voltage")
                .value_name("MILLIVOLTS")
                .help("Set the minimum voltage for data-flash updates (0 disables the check)"),
        )
}

fn parse_addr(s: &str) -> DynResult<u8> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    Ok(u8::from_str_radix(digits, 16)?)
}

/// Creates `path`, runs `dump` into it, and removes the file again if the
/// dump did not complete. A partial image is worse than no image.
fn dump_to_file<F>(path: &str, dump: F) -> DynResult<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), ggdump::Error<LinuxI2CError>>,
{
    let mut out = BufWriter::new(File::create(path)?);
    match dump(&mut out) {
        Ok(()) => Ok(()),
        Err(e) => {
            drop(out);
            let _ = fs::remove_file(path);
            Err(e.into())
        }
    }
}

fn run(matches: &ArgMatches) -> DynResult<()> {
    install_sigint_hook();

    let device = matches.get_one::<String>("device").unwrap();
    let addr = match matches.get_one::<String>("address") {
        Some(s) => parse_addr(s)?,
        None => DEFAULT_ADDRESS,
    };

    let i2c = I2cdev::new(device)?;
    let mut conn = SmbusI2c::new(i2c, addr);

    println!("Firmware version: {}", gauge::firmware_version(&mut conn)?);

    if let Some(mode) = matches.get_one::<String>("set-cell-mode") {
        gauge::set_cell_mode(&mut conn, mode.parse()?)?;
    }
    if let Some(mv) = matches.get_one::<String>("set-flash-ok-voltage") {
        gauge::set_flash_ok_voltage(&mut conn, mv.parse()?)?;
    }

    if let Some(path) = matches.get_one::<String>("data-flash") {
        dump_to_file(path, |out| dump::dump_data_flash(&mut conn, out, &CANCELLED))?;
        println!("Data flash written to {}", path);
    }
    if let Some(path) = matches.get_one::<String>("instruction-flash") {
        dump_to_file(path, |out| {
            dump::dump_instruction_flash(&mut conn, out, &CANCELLED, RetryPolicy::default())
        })?;
        println!("Instruction flash written to {}", path);
    }

    Ok(())
}

fn main() {
    pretty_env_logger::init();

    let matches = cli().get_matches();
    if let Err(e) = run(&matches) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
