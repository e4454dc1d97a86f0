//! Capability Table
//!
//! Host services injected into the shared binary. The layout is bit-exact
//! across builds: growth is append-only under the same major version, and
//! a major bump is a deliberate compatibility break.

use crate::services::{AllocatePoolFn, DebugPrintFn, FreePoolFn, GetRandom64Fn, GetTimeFn};

pub const CAPABILITIES_VERSION_MAJOR: u16 = 1;
pub const CAPABILITIES_VERSION_MINOR: u16 = 0;

/// Services the binary receives from its host environment. Constructed and
/// exclusively owned by the bootstrap; the binary keeps only a borrowed
/// process-wide reference, so the record must outlive the result table it
/// helped construct.
#[repr(C)]
pub struct Capabilities {
    pub major: u16,
    pub minor: u16,
    pub reserved: u32,
    pub allocate_pool: AllocatePoolFn,
    pub free_pool: FreePoolFn,
    /// Absent in restricted environments.
    pub get_time: Option<GetTimeFn>,
    pub debug_print: DebugPrintFn,
    pub get_random_64: GetRandom64Fn,
}

impl Capabilities {
    pub fn new(
        allocate_pool: AllocatePoolFn,
        free_pool: FreePoolFn,
        get_time: Option<GetTimeFn>,
        debug_print: DebugPrintFn,
        get_random_64: GetRandom64Fn,
    ) -> Self {
        Capabilities {
            major: CAPABILITIES_VERSION_MAJOR,
            minor: CAPABILITIES_VERSION_MINOR,
            reserved: 0,
            allocate_pool,
            free_pool,
            get_time,
            debug_print,
            get_random_64,
        }
    }
}
