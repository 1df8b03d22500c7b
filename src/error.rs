use core::fmt::{self, Debug, Display};

/// An error which may occur while talking to the gauge.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error<C> {
    /// Connection error while commanding the jump into the boot ROM.
    SessionEnter(C),
    /// Connection error while commanding the return to normal firmware.
    ///
    /// When this is the only failure of a dump, the bytes written so far are
    /// complete and trustworthy, but the gauge may still be sitting in its
    /// boot ROM instead of managing the battery.
    SessionExit(C),
    /// Connection error during a command exchange.
    Connection(C),
    /// A block read returned fewer bytes than the command is defined to
    /// produce.
    ShortRead {
        /// Bytes the command always produces on this device.
        want: usize,
        /// Bytes the device actually reported.
        got: usize,
    },
    /// No instruction-word value repeated often enough to be trusted within
    /// the sample budget.
    UnstableWord {
        /// Row of the word that would not settle.
        row: u16,
        /// Column of the word that would not settle.
        col: u8,
        /// Samples spent before giving up.
        samples: u32,
    },
    /// The cancellation flag was raised between rows.
    Cancelled,
    /// Error writing to the output sink.
    #[cfg(feature = "std")]
    Io(std::io::Error),
}

#[cfg(feature = "std")]
impl<C> From<std::io::Error> for Error<C> {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl<C: Debug> Display for Error<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::Error::*;
        match self {
            SessionEnter(e) => write!(f, "Connection error while entering the boot ROM: {:?}", e),
            SessionExit(e) => write!(
                f,
                "Connection error while leaving the boot ROM (the gauge may still be in boot ROM mode!): {:?}",
                e
            ),
            Connection(e) => write!(f, "Connection error: {:?}", e),
            ShortRead { want, got } => {
                write!(f, "Block read returned {} bytes, expected {}", got, want)
            }
            UnstableWord { row, col, samples } => write!(
                f,
                "No stable instruction word at row {:#x} col {} after {} samples",
                row, col, samples
            ),
            Cancelled => write!(f, "Dump cancelled"),
            #[cfg(feature = "std")]
            Io(e) => write!(f, "Output write failed: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl<C: Debug> std::error::Error for Error<C> {}
