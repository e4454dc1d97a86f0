//! Loader/Binary Protocol
//!
//! The data contracts crossing the loader/binary boundary: the capability
//! table injected into the binary, the result table it publishes back, the
//! constructor token used by the restricted environment, and the two-phase
//! handshake that exchanges them.

pub mod capabilities;
pub mod handshake;
pub mod phase;
pub mod table;
pub mod token;

pub use capabilities::{Capabilities, CAPABILITIES_VERSION_MAJOR, CAPABILITIES_VERSION_MINOR};
pub use handshake::construct_table;
pub use phase::BootstrapPhase;
pub use table::{CryptoTable, CRYPTO_TABLE_VERSION_MAJOR, CRYPTO_TABLE_VERSION_MINOR};
pub use token::{ConstructorToken, CONSTRUCTOR_TOKEN_SIGNATURE, CONSTRUCTOR_TOKEN_VERSION};

use crate::status::Status;
use core::ffi::c_void;

/// The one well-known export name resolved in the full environment.
pub const ENTRY_SYMBOL: &str = "CryptoEntry";

/// Entry point exported by the shared binary.
///
/// Phase 1 (size query): `out_table` null; the binary writes the required
/// table size to `out_size` and returns `BUFFER_TOO_SMALL` with no other
/// side effect. Phase 2 (construct): `*out_table` points at a
/// zero-initialized buffer of exactly that size; the binary populates it
/// in place and returns `SUCCESS`.
pub type CryptoEntryFn = extern "C" fn(
    capabilities: *const Capabilities,
    out_table: *mut *mut c_void,
    out_size: *mut u32,
) -> Status;
