//! Firmware Status Codes
//!
//! The loader/binary boundary and the environment service tables speak the
//! platform's native status scalar, not Rust results. `Status` is the
//! transparent wrapper used on every `extern "C"` signature; conversions to
//! and from [`LoaderError`] are total.

use crate::error::{LoaderError, LoaderResult};
use core::fmt;

const ERROR_BIT: u64 = 1 << 63;

/// Native status scalar returned across the ABI boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Status(pub u64);

impl Status {
    pub const SUCCESS: Status = Status(0);
    pub const LOAD_ERROR: Status = Status(ERROR_BIT | 1);
    pub const INVALID_PARAMETER: Status = Status(ERROR_BIT | 2);
    pub const UNSUPPORTED: Status = Status(ERROR_BIT | 3);
    pub const BUFFER_TOO_SMALL: Status = Status(ERROR_BIT | 5);
    pub const NOT_READY: Status = Status(ERROR_BIT | 6);
    pub const DEVICE_ERROR: Status = Status(ERROR_BIT | 7);
    pub const OUT_OF_RESOURCES: Status = Status(ERROR_BIT | 9);
    pub const NOT_FOUND: Status = Status(ERROR_BIT | 14);
    pub const INCOMPATIBLE_VERSION: Status = Status(ERROR_BIT | 25);

    pub fn is_error(self) -> bool {
        self.0 & ERROR_BIT != 0
    }

    /// Map a status onto the loader taxonomy.
    pub fn to_result(self) -> LoaderResult<()> {
        match self {
            Status::SUCCESS => Ok(()),
            Status::NOT_READY | Status::NOT_FOUND => Err(LoaderError::NotReady),
            Status::LOAD_ERROR => Err(LoaderError::Malformed),
            Status::OUT_OF_RESOURCES => Err(LoaderError::OutOfResources),
            Status::INCOMPATIBLE_VERSION => Err(LoaderError::VersionMismatch),
            _ => Err(LoaderError::Unsupported),
        }
    }
}

impl From<LoaderError> for Status {
    fn from(err: LoaderError) -> Status {
        match err {
            LoaderError::NotReady => Status::NOT_READY,
            LoaderError::Malformed => Status::LOAD_ERROR,
            LoaderError::Unsupported => Status::UNSUPPORTED,
            LoaderError::OutOfResources => Status::OUT_OF_RESOURCES,
            LoaderError::VersionMismatch => Status::INCOMPATIBLE_VERSION,
            LoaderError::NotFound => Status::NOT_FOUND,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Status::SUCCESS => write!(f, "Success"),
            Status::LOAD_ERROR => write!(f, "LoadError"),
            Status::INVALID_PARAMETER => write!(f, "InvalidParameter"),
            Status::UNSUPPORTED => write!(f, "Unsupported"),
            Status::BUFFER_TOO_SMALL => write!(f, "BufferTooSmall"),
            Status::NOT_READY => write!(f, "NotReady"),
            Status::DEVICE_ERROR => write!(f, "DeviceError"),
            Status::OUT_OF_RESOURCES => write!(f, "OutOfResources"),
            Status::NOT_FOUND => write!(f, "NotFound"),
            Status::INCOMPATIBLE_VERSION => write!(f, "IncompatibleVersion"),
            Status(other) => write!(f, "Status(0x{:x})", other),
        }
    }
}
