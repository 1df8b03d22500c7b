//! An implementation of a battery gas gauge's boot-ROM flash-read protocol,
//! used to pull the chip's data flash and instruction flash off over
//! SMBus/I2C for offline analysis.
//!
//! The gauge's ROM-resident bootloader exposes raw flash reads that the
//! normal firmware hides, but its instruction-word read is unreliable and
//! randomly corrupts some transfers. The heart of this crate is
//! [`boot::settle`]: a consistency-voting filter that keeps re-sampling a
//! word until the same value has been observed several times in a row,
//! turning the flaky 1-shot read into a primitive worth trusting.
//!
//! All device I/O goes through the [`Connection`] trait, which describes
//! the handful of SMBus operations the command set is built from. A
//! [`conn::SmbusI2c`] adapter is provided for any `embedded-hal` blocking
//! I2C bus.
//!
//! ## Features
//!
//! - `std` (default): enables the [`dump`] drivers (whole-region extraction
//!   into any `std::io::Write` sink).
//! - `cli`: builds the `ggdump` binary for Linux `/dev/i2c-*` devices.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod boot;
pub mod conn;
#[cfg(feature = "std")]
pub mod dump;
mod error;
pub mod gauge;
pub mod protocol;

pub use conn::Connection;
pub use error::Error;
