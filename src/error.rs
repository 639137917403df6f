//! Unified error type for the sensor tag firmware.
//!
//! Every public operation (channels, sensors, config) returns this `Error`
//! kind instead of aborting.  Variants are `Copy` so they can be returned
//! from interrupt-adjacent code paths without allocation.
//!
//! Hardware status codes are translated exactly once, at the adapter
//! boundary, via [`Error::from_esp`].  Multi-step sequences (driver init,
//! channel teardown) use [`ErrorAccumulator`]: every step still runs, and
//! the caller sees the first failure.

use core::fmt;

// ---------------------------------------------------------------------------
// Error kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Required data was absent.
    Null,
    /// Operation is not valid in the current lifecycle state, e.g. sending
    /// before `init` or rewriting NFC records while a reader is in the field.
    InvalidState,
    /// Payload or record exceeds a fixed capacity.
    InvalidLength,
    /// Argument outside the accepted range.
    InvalidParam,
    /// Queue is full.
    NoMemory,
    /// Queue or record is empty, or a device did not answer.
    NotFound,
    /// Capability absent for this transport or sensor.
    NotSupported,
    /// Reserved capability with no implementation yet.
    NotImplemented,
    /// Unexpected hardware or driver response.
    Internal,
    /// Hardware did not complete in time.
    Timeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "required data absent"),
            Self::InvalidState => write!(f, "invalid state"),
            Self::InvalidLength => write!(f, "invalid length"),
            Self::InvalidParam => write!(f, "invalid parameter"),
            Self::NoMemory => write!(f, "no memory (queue full)"),
            Self::NotFound => write!(f, "not found"),
            Self::NotSupported => write!(f, "not supported"),
            Self::NotImplemented => write!(f, "not implemented"),
            Self::Internal => write!(f, "internal error"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Platform status translation
// ---------------------------------------------------------------------------

/// `esp_err_t` values (see `esp_err.h`).  Kept here rather than pulled from
/// `esp-idf-sys` so the translation is testable on the host.
mod esp {
    pub const OK: i32 = 0;
    pub const FAIL: i32 = -1;
    pub const NO_MEM: i32 = 0x101;
    pub const INVALID_ARG: i32 = 0x102;
    pub const INVALID_STATE: i32 = 0x103;
    pub const INVALID_SIZE: i32 = 0x104;
    pub const NOT_FOUND: i32 = 0x105;
    pub const NOT_SUPPORTED: i32 = 0x106;
    pub const TIMEOUT: i32 = 0x107;
}

impl Error {
    /// Translate an ESP-IDF status code.  `ESP_OK` maps to `Ok(())`;
    /// unknown codes are logged and reported as [`Error::Internal`].
    pub fn from_esp(code: i32) -> Result<()> {
        match code {
            esp::OK => Ok(()),
            esp::NO_MEM => Err(Self::NoMemory),
            esp::INVALID_ARG => Err(Self::InvalidParam),
            esp::INVALID_STATE => Err(Self::InvalidState),
            esp::INVALID_SIZE => Err(Self::InvalidLength),
            esp::NOT_FOUND => Err(Self::NotFound),
            esp::NOT_SUPPORTED => Err(Self::NotSupported),
            esp::TIMEOUT => Err(Self::Timeout),
            esp::FAIL => Err(Self::Internal),
            other => {
                log::error!("unknown platform status 0x{:X}", other);
                Err(Self::Internal)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Accumulator
// ---------------------------------------------------------------------------

/// Runs a sequence best-effort and remembers the first failure.
///
/// ```
/// use sensortag::error::{Error, ErrorAccumulator};
///
/// let mut acc = ErrorAccumulator::new();
/// acc.record(Ok(()));
/// acc.record(Err(Error::Timeout));
/// acc.record(Err(Error::Internal));
/// assert_eq!(acc.finish(), Err(Error::Timeout));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorAccumulator {
    first: Option<Error>,
}

impl ErrorAccumulator {
    pub const fn new() -> Self {
        Self { first: None }
    }

    /// Record the outcome of a step that produces no value.
    pub fn record(&mut self, result: Result<()>) {
        if let Err(e) = result {
            self.fail(e);
        }
    }

    /// Record the outcome of a step, passing its value through on success.
    pub fn step<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.fail(e);
                None
            }
        }
    }

    /// Record a failure directly.  Only the first one is kept.
    pub fn fail(&mut self, error: Error) {
        if self.first.is_none() {
            self.first = Some(error);
        }
    }

    pub fn is_ok(&self) -> bool {
        self.first.is_none()
    }

    pub fn finish(self) -> Result<()> {
        match self.first {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
