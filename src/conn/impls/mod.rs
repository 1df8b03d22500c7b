mod i2c;

pub use i2c::{SmbusI2c, DEFAULT_ADDRESS};
