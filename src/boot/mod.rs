//! Scoped access to the gauge's boot ROM.
//!
//! Entering and leaving the boot ROM are fire-and-forget commands: the ROM
//! never acknowledges the mode switch, so the only observable failure is the
//! bus transaction itself. A gauge parked in its boot ROM is not managing
//! the battery, which is why the only way to get a [`BootRom`] handle is
//! [`with_boot_rom`]: it issues the exit command on every path out.

mod acquire;

pub use acquire::{settle, RetryPolicy, Vote};

use log::{debug, trace};

use crate::conn::Connection;
use crate::error::Error;
use crate::protocol::{self, commands, InstructionWord};

/// A gauge known to be running its boot ROM.
///
/// Obtained via [`with_boot_rom`]; the handle is the proof that the entry
/// command has been sent and that the exit command will be.
pub struct BootRom<'a, C: Connection> {
    conn: &'a mut C,
}

/// Runs `f` against the gauge's boot ROM.
///
/// The entry command is issued first; if its transmission fails, `f` never
/// runs and no exit is attempted. Otherwise the exit command is issued on
/// every way out. An exit transmission failure after a successful `f`
/// surfaces as [`Error::SessionExit`]; when `f` itself failed, its error
/// wins and the exit is best-effort.
pub fn with_boot_rom<C, T, F>(conn: &mut C, f: F) -> Result<T, Error<C::Error>>
where
    C: Connection,
    F: FnOnce(&mut BootRom<'_, C>) -> Result<T, Error<C::Error>>,
{
    conn.write_word(commands::CONTROL, protocol::BOOT_ENTER_KEY)
        .map_err(Error::SessionEnter)?;
    debug!("entered boot ROM");

    let result = {
        let mut rom = BootRom { conn: &mut *conn };
        f(&mut rom)
    };

    let exited = conn.write_byte(commands::BOOT_EXIT);
    debug!("left boot ROM");

    match (result, exited) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(Error::SessionExit(e)),
        (Err(e), _) => Err(e),
    }
}

impl<'a, C: Connection> BootRom<'a, C> {
    /// Reads one 32-byte data-flash row in a single block transfer.
    ///
    /// Data-flash reads are trusted: unlike instruction words, they have not
    /// been observed to return corrupted data, so there is no retry here. A
    /// short block fails the row.
    pub fn read_data_flash_row(
        &mut self,
        row: u16,
        buf: &mut [u8; protocol::DATA_FLASH_ROW_BYTES],
    ) -> Result<(), Error<C::Error>> {
        let addr = protocol::data_flash_row_addr(row);
        self.conn
            .write_word(commands::SET_ADDR, addr)
            .map_err(Error::Connection)?;
        let got = self
            .conn
            .read_block(commands::READ_RAM_BLOCK, buf)
            .map_err(Error::Connection)?;
        if got != buf.len() {
            return Err(Error::ShortRead {
                want: buf.len(),
                got,
            });
        }
        Ok(())
    }

    /// One single-shot read of an instruction word.
    ///
    /// The returned value must not be trusted on its own; the boot ROM
    /// corrupts some reads. Use [`BootRom::acquire_word`] unless you are
    /// feeding samples into [`settle`] yourself.
    pub fn sample_word(
        &mut self,
        row: u16,
        col: u8,
    ) -> Result<InstructionWord, Error<C::Error>> {
        let addr = protocol::instruction_word_addr(row, col);
        self.conn
            .write_block(commands::FLASH_WORD_ADDR, &addr)
            .map_err(Error::Connection)?;

        let mut raw = [0; protocol::WORD_BYTES];
        let got = self
            .conn
            .read_block(commands::READ_RAM_BLOCK, &mut raw)
            .map_err(Error::Connection)?;
        if got != raw.len() {
            return Err(Error::ShortRead {
                want: raw.len(),
                got,
            });
        }
        Ok(InstructionWord::from_le_bytes(raw))
    }

    /// Reads an instruction word, sampling until [`settle`] trusts a value.
    ///
    /// Transport errors on individual samples are consumed as inconclusive;
    /// only exhaustion of the whole budget fails, as
    /// [`Error::UnstableWord`].
    pub fn acquire_word(
        &mut self,
        row: u16,
        col: u8,
        policy: RetryPolicy,
    ) -> Result<InstructionWord, Error<C::Error>> {
        let samples = core::iter::from_fn(|| Some(self.sample_word(row, col)));
        match settle(samples, policy) {
            Vote::Accepted { value, samples } => {
                if samples > policy.confirm {
                    debug!(
                        "word {:#x}.{} settled after {} samples",
                        row, col, samples
                    );
                } else {
                    trace!("word {:#x}.{} settled clean", row, col);
                }
                Ok(value)
            }
            Vote::Exhausted { samples } => Err(Error::UnstableWord { row, col, samples }),
        }
    }

    /// Assembles one 96-byte instruction-flash row, word by word in
    /// ascending column order.
    ///
    /// The boot ROM cannot push a whole instruction row through a single
    /// SMBus block transfer, so each of the 32 words is acquired
    /// individually. Any column failing fails the row; `buf` contents are
    /// unspecified on error.
    pub fn read_instruction_row(
        &mut self,
        row: u16,
        buf: &mut [u8; protocol::INSTRUCTION_ROW_BYTES],
        policy: RetryPolicy,
    ) -> Result<(), Error<C::Error>> {
        for (col, chunk) in buf.chunks_exact_mut(protocol::WORD_BYTES).enumerate() {
            let word = self.acquire_word(row, col as u8, policy)?;
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        Ok(())
    }
}
