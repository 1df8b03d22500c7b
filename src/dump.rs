//! Whole-region dump drivers: thin I/O glue around [`BootRom`].
//!
//! Each driver wraps its row loop in [`with_boot_rom`], so the gauge is
//! returned to normal firmware execution on every path out, including
//! row-read failures and cancellation. The output sink receives raw row
//! bytes in address order with no framing; a failed dump leaves the sink
//! truncated at the last complete row, and it is the caller's job to delete
//! or mark the partial output.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, trace};

use crate::boot::{with_boot_rom, RetryPolicy};
use crate::conn::Connection;
use crate::error::Error;
use crate::protocol;

/// Dumps the entire 2048-byte data-flash region to `out`.
///
/// `cancel` is checked between rows; a raised flag aborts with
/// [`Error::Cancelled`] after the session exit command has been issued.
pub fn dump_data_flash<C, W>(
    conn: &mut C,
    out: &mut W,
    cancel: &AtomicBool,
) -> Result<(), Error<C::Error>>
where
    C: Connection,
    W: Write,
{
    info!(
        "dumping data flash ({} rows of {} bytes)",
        protocol::DATA_FLASH_ROWS,
        protocol::DATA_FLASH_ROW_BYTES
    );

    with_boot_rom(conn, |rom| {
        let mut row_buf = [0; protocol::DATA_FLASH_ROW_BYTES];
        for row in 0..protocol::DATA_FLASH_ROWS {
            if cancel.load(Ordering::Relaxed) {
                return Err(Error::Cancelled);
            }
            rom.read_data_flash_row(row, &mut row_buf)?;
            out.write_all(&row_buf)?;
            trace!("data flash row {}/{}", row + 1, protocol::DATA_FLASH_ROWS);
        }
        Ok(())
    })?;

    out.flush()?;
    info!("data flash dump complete");
    Ok(())
}

/// Dumps the entire 73728-byte instruction-flash region to `out`.
///
/// Every word is acquired through the voting filter with the given
/// `policy`; a word that never settles aborts the dump with
/// [`Error::UnstableWord`]. `cancel` is checked between rows, never
/// mid-row, so the output always ends on a row boundary.
pub fn dump_instruction_flash<C, W>(
    conn: &mut C,
    out: &mut W,
    cancel: &AtomicBool,
    policy: RetryPolicy,
) -> Result<(), Error<C::Error>>
where
    C: Connection,
    W: Write,
{
    info!(
        "dumping instruction flash ({} rows of {} words)",
        protocol::INSTRUCTION_FLASH_ROWS,
        protocol::WORDS_PER_ROW
    );

    with_boot_rom(conn, |rom| {
        let mut row_buf = [0; protocol::INSTRUCTION_ROW_BYTES];
        for row in 0..protocol::INSTRUCTION_FLASH_ROWS {
            if cancel.load(Ordering::Relaxed) {
                return Err(Error::Cancelled);
            }
            rom.read_instruction_row(row, &mut row_buf, policy)?;
            out.write_all(&row_buf)?;
            trace!(
                "instruction flash row {}/{}",
                row + 1,
                protocol::INSTRUCTION_FLASH_ROWS
            );
        }
        Ok(())
    })?;

    out.flush()?;
    info!("instruction flash dump complete");
    Ok(())
}
