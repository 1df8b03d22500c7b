//! End-to-end tests driving the full dump stack against a scripted
//! in-memory gauge.
//!
//! `FakeGauge` models the device one protocol level below the crate: it
//! tracks which firmware mode it is in, latches addresses, serves flash
//! contents, and injects the same kinds of faults the real hardware shows:
//! transiently corrupted instruction-word reads, bus errors, and a gauge
//! that refuses to enter its boot ROM.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;

use ggdump::boot::{with_boot_rom, RetryPolicy};
use ggdump::conn::Connection;
use ggdump::dump::{dump_data_flash, dump_instruction_flash};
use ggdump::gauge::{self, FirmwareVersion};
use ggdump::protocol;
use ggdump::Error;

const DATA_FLASH_LEN: usize = 2048;
const INSTR_FLASH_LEN: usize = 73728;

#[derive(Clone, Copy)]
enum Latch {
    None,
    Ram(u16),
    Word { row: u16, col: u8 },
}

struct FakeGauge {
    in_boot: bool,
    latched: Latch,
    ctl: u16,
    subclass: u8,
    subclasses: HashMap<u8, Vec<u8>>,
    data_flash: Vec<u8>,
    instr_flash: Vec<u8>,
    /// Corrupt every Nth instruction-word read (0 = reliable device).
    glitch_period: u32,
    /// Return a fresh, never-repeating value on every word read.
    never_settle: bool,
    word_reads: u32,
    fail_df_row: Option<u16>,
    fail_enter: bool,
    fail_exit: bool,
    events: Vec<&'static str>,
}

impl FakeGauge {
    fn new() -> FakeGauge {
        let data_flash = (0..DATA_FLASH_LEN).map(|i| (i % 251) as u8).collect();

        // 24576 words, each derived from its index and masked to 22 bits
        let mut instr_flash = Vec::with_capacity(INSTR_FLASH_LEN);
        for w in 0..(INSTR_FLASH_LEN / protocol::WORD_BYTES) as u32 {
            let value = w.wrapping_mul(2654435761) >> 8 & 0x3f_ffff;
            instr_flash.push(value as u8);
            instr_flash.push((value >> 8) as u8);
            instr_flash.push((value >> 16) as u8);
        }

        FakeGauge {
            in_boot: false,
            latched: Latch::None,
            ctl: 0,
            subclass: 0,
            subclasses: HashMap::new(),
            data_flash,
            instr_flash,
            glitch_period: 0,
            never_settle: false,
            word_reads: 0,
            fail_df_row: None,
            fail_enter: false,
            fail_exit: false,
            events: Vec::new(),
        }
    }

    fn word_bytes(&mut self, row: u16, col: u8) -> [u8; 3] {
        self.word_reads += 1;

        if self.never_settle {
            // unique on every read, so no value can ever repeat
            return [
                self.word_reads as u8,
                (self.word_reads >> 8) as u8,
                (self.word_reads >> 16) as u8,
            ];
        }

        let idx = (row as usize * protocol::WORDS_PER_ROW + col as usize) * protocol::WORD_BYTES;
        let mut bytes = [
            self.instr_flash[idx],
            self.instr_flash[idx + 1],
            self.instr_flash[idx + 2],
        ];
        if self.glitch_period != 0 && self.word_reads % self.glitch_period == 0 {
            // flip some bits, differently depending on when the glitch hits
            bytes[0] ^= (self.word_reads as u8) | 1;
            bytes[2] ^= 0x15;
        }
        bytes
    }
}

impl Connection for FakeGauge {
    type Error = &'static str;

    fn write_word(&mut self, cmd: u8, value: u16) -> Result<(), Self::Error> {
        match (cmd, value) {
            (0x00, 0x0f00) => {
                if self.fail_enter {
                    return Err("enter rejected");
                }
                self.in_boot = true;
                self.events.push("enter");
            }
            (0x00, ctl) => self.ctl = ctl,
            (0x09, addr) => {
                if !self.in_boot {
                    return Err("SetAddr outside boot ROM");
                }
                self.latched = Latch::Ram(addr);
            }
            (0x77, id) => self.subclass = id as u8,
            _ => return Err("unexpected word write"),
        }
        Ok(())
    }

    fn write_byte(&mut self, value: u8) -> Result<(), Self::Error> {
        if value != 0x08 {
            return Err("unexpected byte write");
        }
        if self.fail_exit {
            return Err("exit lost");
        }
        self.in_boot = false;
        self.events.push("exit");
        Ok(())
    }

    fn write_block(&mut self, cmd: u8, data: &[u8]) -> Result<(), Self::Error> {
        match cmd {
            0x00 if self.in_boot => {
                if data.len() != 3 {
                    return Err("malformed word address");
                }
                self.latched = Latch::Word {
                    row: data[1] as u16 | (data[2] as u16) << 8,
                    col: data[0],
                };
            }
            0x78 => {
                self.subclasses.insert(self.subclass, data.to_vec());
            }
            _ => return Err("unexpected block write"),
        }
        Ok(())
    }

    fn read_block(&mut self, cmd: u8, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match cmd {
            0x0c if self.in_boot => match self.latched {
                Latch::Ram(addr) => {
                    let row = (addr - protocol::DATA_FLASH_BASE) / 0x20;
                    if self.fail_df_row == Some(row) {
                        return Err("bus error");
                    }
                    let offset = (addr - protocol::DATA_FLASH_BASE) as usize;
                    let len = 32.min(buf.len());
                    buf[..len].copy_from_slice(&self.data_flash[offset..offset + len]);
                    Ok(len)
                }
                Latch::Word { row, col } => {
                    let bytes = self.word_bytes(row, col);
                    let len = bytes.len().min(buf.len());
                    buf[..len].copy_from_slice(&bytes[..len]);
                    Ok(len)
                }
                Latch::None => Err("no address latched"),
            },
            0x78 => {
                let block = self.subclasses.get(&self.subclass).ok_or("no such subclass")?;
                let len = block.len().min(buf.len());
                buf[..len].copy_from_slice(&block[..len]);
                Ok(len)
            }
            _ => Err("unexpected block read"),
        }
    }

    fn read_raw(&mut self, cmd: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        if cmd == 0x00 && self.ctl == 0x0002 && buf.len() == 2 {
            buf[0] = 0x34;
            buf[1] = 0x12;
            return Ok(());
        }
        Err("unexpected raw read")
    }
}

fn idle() -> AtomicBool {
    AtomicBool::new(false)
}

#[test]
fn data_flash_dump_is_bitwise_exact() {
    let mut gg = FakeGauge::new();
    let mut out = Vec::new();

    dump_data_flash(&mut gg, &mut out, &idle()).unwrap();

    assert_eq!(out.len(), DATA_FLASH_LEN);
    assert_eq!(out, gg.data_flash);
    assert_eq!(gg.events, ["enter", "exit"]);
}

#[test]
fn instruction_flash_dump_survives_transient_corruption() {
    let mut gg = FakeGauge::new();
    gg.glitch_period = 4;
    let mut out = Vec::new();

    dump_instruction_flash(&mut gg, &mut out, &idle(), RetryPolicy::default()).unwrap();

    assert_eq!(out.len(), INSTR_FLASH_LEN);
    assert_eq!(out, gg.instr_flash);
    assert_eq!(gg.events, ["enter", "exit"]);
}

#[test]
fn row_failure_aborts_dump_but_exits_boot_rom() {
    let mut gg = FakeGauge::new();
    gg.fail_df_row = Some(5);
    let mut out = Vec::new();

    let err = dump_data_flash(&mut gg, &mut out, &idle()).unwrap_err();

    assert!(matches!(err, Error::Connection("bus error")));
    // output ends on the last complete row
    assert_eq!(out.len(), 5 * protocol::DATA_FLASH_ROW_BYTES);
    assert_eq!(gg.events, ["enter", "exit"]);
}

#[test]
fn cancellation_stops_before_the_next_row_and_exits_boot_rom() {
    let mut gg = FakeGauge::new();
    let cancel = AtomicBool::new(true);
    let mut out = Vec::new();

    let err = dump_data_flash(&mut gg, &mut out, &cancel).unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert!(out.is_empty());
    assert_eq!(gg.events, ["enter", "exit"]);
}

#[test]
fn unsettleable_word_fails_the_dump_after_the_full_budget() {
    let mut gg = FakeGauge::new();
    gg.never_settle = true;
    let mut out = Vec::new();

    let err = dump_instruction_flash(&mut gg, &mut out, &idle(), RetryPolicy::default())
        .unwrap_err();

    assert!(matches!(
        err,
        Error::UnstableWord {
            row: 0,
            col: 0,
            samples: 30
        }
    ));
    assert!(out.is_empty());
    assert_eq!(gg.events, ["enter", "exit"]);
}

#[test]
fn enter_failure_runs_neither_body_nor_exit() {
    let mut gg = FakeGauge::new();
    gg.fail_enter = true;

    let err = with_boot_rom(&mut gg, |_rom| Ok(())).unwrap_err();

    assert!(matches!(err, Error::SessionEnter("enter rejected")));
    assert!(gg.events.is_empty());
}

#[test]
fn exit_failure_after_a_clean_body_is_reported() {
    let mut gg = FakeGauge::new();
    gg.fail_exit = true;

    let err = with_boot_rom(&mut gg, |_rom| Ok(())).unwrap_err();

    assert!(matches!(err, Error::SessionExit("exit lost")));
}

#[test]
fn instruction_row_is_96_bytes_in_column_order() {
    let mut gg = FakeGauge::new();

    let mut row_buf = [0; protocol::INSTRUCTION_ROW_BYTES];
    with_boot_rom(&mut gg, |rom| {
        rom.read_instruction_row(7, &mut row_buf, RetryPolicy::default())
    })
    .unwrap();

    let start = 7 * protocol::INSTRUCTION_ROW_BYTES;
    assert_eq!(&row_buf[..], &gg.instr_flash[start..start + protocol::INSTRUCTION_ROW_BYTES]);
}

#[test]
fn firmware_version_query() {
    let mut gg = FakeGauge::new();

    let version = gauge::firmware_version(&mut gg).unwrap();

    assert_eq!(
        version,
        FirmwareVersion {
            major: 0x12,
            minor: 0x34
        }
    );
    assert_eq!(version.to_string(), "12.34");
}

#[test]
fn set_cell_mode_patches_only_the_low_bits() {
    let mut gg = FakeGauge::new();
    gg.subclasses
        .insert(protocol::SUBCLASS_CONFIGURATION, vec![0xab, 0xcd, 0xef]);

    gauge::set_cell_mode(&mut gg, 2).unwrap();

    assert_eq!(
        gg.subclasses[&protocol::SUBCLASS_CONFIGURATION],
        vec![0xaa, 0xcd, 0xef]
    );
}

#[test]
fn set_flash_ok_voltage_patches_the_threshold_big_endian() {
    let mut gg = FakeGauge::new();
    gg.subclasses
        .insert(protocol::SUBCLASS_POWER, vec![0x11, 0x22, 0x33, 0x44]);

    gauge::set_flash_ok_voltage(&mut gg, 0x1234).unwrap();

    assert_eq!(
        gg.subclasses[&protocol::SUBCLASS_POWER],
        vec![0x12, 0x34, 0x33, 0x44]
    );
}
