//! Traits to perform addressed SMBus transactions against the gauge.

mod impls;

pub use impls::{SmbusI2c, DEFAULT_ADDRESS};

/// A trait describing the SMBus operations the gauge's command set is built
/// from.
///
/// Every method performs one complete bus transaction, blocking until it
/// finishes or the transport reports a failure. There is never more than one
/// transaction in flight: the gauge has no arbitration, and competing
/// traffic while it sits in its boot ROM can corrupt or brick it, so the
/// connection (and the bus behind it) must be exclusively owned for the
/// duration of a session.
///
/// A [`SmbusI2c`] impl over any [`embedded-hal`] blocking I2C bus is
/// provided; tests implement this trait directly with an in-memory fake.
///
/// [`embedded-hal`]: https://docs.rs/embedded-hal/0.2
pub trait Connection {
    /// Transport-specific error type.
    type Error;

    /// SMBus Write Word: `cmd` followed by a little-endian `u16` payload.
    fn write_word(&mut self, cmd: u8, value: u16) -> Result<(), Self::Error>;

    /// SMBus Send Byte: a single byte with no sub-command.
    fn write_byte(&mut self, value: u8) -> Result<(), Self::Error>;

    /// SMBus Block Write: `cmd`, a length byte, then `data`.
    fn write_block(&mut self, cmd: u8, data: &[u8]) -> Result<(), Self::Error>;

    /// SMBus Block Read: `cmd`, then a device-reported length byte and that
    /// many data bytes.
    ///
    /// Returns the length the device reported, capped at `buf.len()`. The
    /// caller decides whether a short block is acceptable.
    fn read_block(&mut self, cmd: u8, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Fixed-length I2C block read: `cmd`, then exactly `buf.len()` data
    /// bytes with no length prefix.
    fn read_raw(&mut self, cmd: u8, buf: &mut [u8]) -> Result<(), Self::Error>;
}

impl<C: Connection> Connection for &mut C {
    type Error = C::Error;

    fn write_word(&mut self, cmd: u8, value: u16) -> Result<(), Self::Error> {
        (**self).write_word(cmd, value)
    }

    fn write_byte(&mut self, value: u8) -> Result<(), Self::Error> {
        (**self).write_byte(value)
    }

    fn write_block(&mut self, cmd: u8, data: &[u8]) -> Result<(), Self::Error> {
        (**self).write_block(cmd, data)
    }

    fn read_block(&mut self, cmd: u8, buf: &mut [u8]) -> Result<usize, Self::Error> {
        (**self).read_block(cmd, buf)
    }

    fn read_raw(&mut self, cmd: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read_raw(cmd, buf)
    }
}
