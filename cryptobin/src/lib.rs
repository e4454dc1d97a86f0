#![cfg_attr(not(test), no_std)]

//! Shared Crypto Binary
//!
//! The code of the crypto-service binary itself: the exported entry-point
//! variants, the process-wide host-interface handle, result-table
//! construction, and the per-environment driver entries that publish the
//! constructor token. The binary never calls platform services directly —
//! everything it needs arrives through the injected capability table.

pub mod driver;
pub mod entry;
pub mod ops;
pub mod support;

#[cfg(test)]
mod testutil;

pub use entry::{crypto_entry, crypto_entry_no_setup};
