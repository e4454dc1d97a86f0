#![no_std]

//! Boot-Phase Crypto Loader
//!
//! Full-environment bootstrap: discover the shared crypto binary in the
//! firmware store, load it (natively or with the common mapper), resolve
//! the exported entry point, run the handshake and publish the result
//! table. A missing binary is a legitimate configuration, not a failure
//! worth aborting boot for.

pub mod bootstrap;
pub mod rng;

use sharedcrypto_common::console;
use sharedcrypto_common::services::BootEnvironment;
use sharedcrypto_common::Status;

/// Driver entry handed the environment's service table. The table is owned
/// by the platform and stays valid for the remainder of the boot phase.
#[no_mangle]
pub extern "C" fn boot_crypto_loader_entry(env: *const BootEnvironment) -> Status {
    if env.is_null() {
        return Status::INVALID_PARAMETER;
    }
    let env: &'static BootEnvironment = unsafe { &*env };

    console::init_console(env.debug_print);
    rng::bind_environment(env);

    match bootstrap::run(env) {
        Ok(_) => Status::SUCCESS,
        Err(err) => err.into(),
    }
}
