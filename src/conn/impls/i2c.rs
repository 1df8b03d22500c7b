use embedded_hal::blocking::i2c::{Read, Write, WriteRead};

use crate::conn::Connection;

/// The gauge's default 7-bit bus address (SMBus write address `0x16`,
/// shifted down).
pub const DEFAULT_ADDRESS: u8 = 0x0b;

// Largest payload an SMBus block transfer can carry.
const BLOCK_MAX: usize = 32;

/// [`Connection`] adapter for any `embedded-hal` blocking I2C bus.
///
/// SMBus transactions are composed out of raw I2C transfers the same way the
/// Linux kernel's i2c-dev emulation composes them: a write is a single
/// transfer of `[cmd, payload...]`, a read is a write of `[cmd]` followed by
/// a repeated-start read.
///
/// Block reads are clocked at the full 32-byte block length and trimmed to
/// the device-reported count afterwards, since `write_read` has no way to
/// stretch a transfer once the count byte has arrived.
pub struct SmbusI2c<I2C> {
    i2c: I2C,
    addr: u8,
}

impl<I2C> SmbusI2c<I2C> {
    /// Wraps an I2C bus handle, targeting the 7-bit device address `addr`.
    pub fn new(i2c: I2C, addr: u8) -> SmbusI2c<I2C> {
        SmbusI2c { i2c, addr }
    }

    /// Wraps an I2C bus handle, targeting [`DEFAULT_ADDRESS`].
    pub fn with_default_address(i2c: I2C) -> SmbusI2c<I2C> {
        SmbusI2c::new(i2c, DEFAULT_ADDRESS)
    }

    /// Releases the underlying bus handle.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<E, I2C> Connection for SmbusI2c<I2C>
where
    I2C: Read<Error = E> + Write<Error = E> + WriteRead<Error = E>,
{
    type Error = E;

    fn write_word(&mut self, cmd: u8, value: u16) -> Result<(), E> {
        self.i2c
            .write(self.addr, &[cmd, value as u8, (value >> 8) as u8])
    }

    fn write_byte(&mut self, value: u8) -> Result<(), E> {
        self.i2c.write(self.addr, &[value])
    }

    fn write_block(&mut self, cmd: u8, data: &[u8]) -> Result<(), E> {
        let len = data.len().min(BLOCK_MAX);
        let mut buf = [0; BLOCK_MAX + 2];
        buf[0] = cmd;
        buf[1] = len as u8;
        buf[2..2 + len].copy_from_slice(&data[..len]);
        self.i2c.write(self.addr, &buf[..2 + len])
    }

    fn read_block(&mut self, cmd: u8, buf: &mut [u8]) -> Result<usize, E> {
        let mut raw = [0; BLOCK_MAX + 1];
        self.i2c.write_read(self.addr, &[cmd], &mut raw)?;
        let len = (raw[0] as usize).min(BLOCK_MAX).min(buf.len());
        buf[..len].copy_from_slice(&raw[1..1 + len]);
        Ok(len)
    }

    fn read_raw(&mut self, cmd: u8, buf: &mut [u8]) -> Result<(), E> {
        self.i2c.write_read(self.addr, &[cmd], buf)
    }
}
