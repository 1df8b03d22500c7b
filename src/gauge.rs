//! Normal-mode (firmware-resident) gauge commands.
//!
//! Everything here talks to the running firmware, not the boot ROM: the
//! manufacturer-access version query, and read/modify/write access to the
//! data-flash subclass blocks that hold pack configuration.

use core::fmt;

use log::debug;

use crate::conn::Connection;
use crate::error::Error;
use crate::protocol::{self, commands};

/// Firmware revision, as reported by the manufacturer-access version query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    /// Major revision, a BCD-style hex byte.
    pub major: u8,
    /// Minor revision, a BCD-style hex byte.
    pub minor: u8,
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the gauge's own labeling is hex on both sides of the dot
        write!(f, "{:02X}.{:02X}", self.major, self.minor)
    }
}

/// Queries the firmware revision.
pub fn firmware_version<C: Connection>(conn: &mut C) -> Result<FirmwareVersion, Error<C::Error>> {
    conn.write_word(commands::CONTROL, protocol::FW_VERSION_KEY)
        .map_err(Error::Connection)?;
    let mut raw = [0; 2];
    conn.read_raw(commands::CONTROL, &mut raw)
        .map_err(Error::Connection)?;
    Ok(FirmwareVersion {
        major: raw[1],
        minor: raw[0],
    })
}

/// Reads a data-flash subclass block into `buf`, returning its length.
///
/// An empty block is reported as [`Error::ShortRead`]; every subclass this
/// crate touches is non-empty on a healthy gauge.
pub fn read_subclass<C: Connection>(
    conn: &mut C,
    id: u8,
    buf: &mut [u8],
) -> Result<usize, Error<C::Error>> {
    conn.write_word(commands::DF_SUBCLASS, id as u16)
        .map_err(Error::Connection)?;
    let got = conn
        .read_block(commands::DF_BLOCK, buf)
        .map_err(Error::Connection)?;
    if got == 0 {
        return Err(Error::ShortRead { want: 1, got: 0 });
    }
    debug!("subclass {}: {} bytes", id, got);
    Ok(got)
}

/// Writes a data-flash subclass block back.
pub fn write_subclass<C: Connection>(
    conn: &mut C,
    id: u8,
    data: &[u8],
) -> Result<(), Error<C::Error>> {
    conn.write_word(commands::DF_SUBCLASS, id as u16)
        .map_err(Error::Connection)?;
    conn.write_block(commands::DF_BLOCK, data)
        .map_err(Error::Connection)
}

/// Sets the pack's series-cell configuration.
///
/// Only the low 2 bits of the Configuration subclass' first byte are
/// touched; the rest of the block is read back and preserved.
pub fn set_cell_mode<C: Connection>(conn: &mut C, mode: u8) -> Result<(), Error<C::Error>> {
    let mut block = [0; 32];
    let len = read_subclass(conn, protocol::SUBCLASS_CONFIGURATION, &mut block)?;
    block[0] = (block[0] & !0x03) | (mode & 0x03);
    write_subclass(conn, protocol::SUBCLASS_CONFIGURATION, &block[..len])
}

/// Sets the minimum pack voltage at which the firmware accepts data-flash
/// updates, in millivolts. `0` disables the check.
///
/// The threshold lives big-endian in the first two bytes of the Power
/// subclass; the rest of the block is read back and preserved.
pub fn set_flash_ok_voltage<C: Connection>(
    conn: &mut C,
    millivolts: u16,
) -> Result<(), Error<C::Error>> {
    let mut block = [0; 32];
    let len = read_subclass(conn, protocol::SUBCLASS_POWER, &mut block)?;
    block[0] = (millivolts >> 8) as u8;
    block[1] = millivolts as u8;
    write_subclass(conn, protocol::SUBCLASS_POWER, &block[..len])
}
