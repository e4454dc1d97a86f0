//! Constructor Token
//!
//! In the restricted environment the image is mapped and relocated by the
//! platform before any of this code runs, so the bootstrap never parses
//! image bytes. Instead the binary's own startup publishes this small
//! tagged record; a later bootstrap retrieves it and extracts the entry
//! pointer. The signature and version are checked before the pointer is
//! trusted — an unsigned token is treated as hostile, not as a formatting
//! accident.

use crate::console_errorln;
use crate::error::{LoaderError, LoaderResult};
use crate::protocol::CryptoEntryFn;

pub const CONSTRUCTOR_TOKEN_SIGNATURE: u32 = u32::from_le_bytes(*b"SCTK");
pub const CONSTRUCTOR_TOKEN_VERSION: u32 = 1;

/// Published by the binary's startup code under `CONSTRUCTOR_TOKEN_GUID`.
/// Read-only once published.
#[repr(C)]
pub struct ConstructorToken {
    pub signature: u32,
    pub version: u32,
    pub entry: Option<CryptoEntryFn>,
}

impl ConstructorToken {
    pub fn new(entry: CryptoEntryFn) -> Self {
        ConstructorToken {
            signature: CONSTRUCTOR_TOKEN_SIGNATURE,
            version: CONSTRUCTOR_TOKEN_VERSION,
            entry: Some(entry),
        }
    }

    /// Validate the tag and yield the entry pointer.
    pub fn validate(&self) -> LoaderResult<CryptoEntryFn> {
        if self.signature != CONSTRUCTOR_TOKEN_SIGNATURE {
            console_errorln!(
                "[x] Constructor token signature invalid: 0x{:08x}",
                self.signature
            );
            return Err(LoaderError::Malformed);
        }
        if self.version != CONSTRUCTOR_TOKEN_VERSION {
            console_errorln!(
                "[x] Constructor token version {} not understood",
                self.version
            );
            return Err(LoaderError::Unsupported);
        }
        self.entry.ok_or(LoaderError::Unsupported)
    }
}
