//! Lazy Randomness Capability
//!
//! Querying for a randomness provider too early in boot can itself fail or
//! hang, so the capability handed to the binary locates the provider on
//! first use and caches the outcome — including "unavailable", which is
//! never retried within a boot.

use core::ffi::c_void;
use core::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use sharedcrypto_common::console_warnln;
use sharedcrypto_common::guid::RANDOM_PROTOCOL_GUID;
use sharedcrypto_common::services::{BootEnvironment, RandomProtocol};

static ENVIRONMENT: AtomicPtr<BootEnvironment> = AtomicPtr::new(core::ptr::null_mut());
static PROBED: AtomicBool = AtomicBool::new(false);
static PROVIDER: AtomicPtr<RandomProtocol> = AtomicPtr::new(core::ptr::null_mut());

/// Bind the environment table the probe will use. A fresh bootstrap
/// re-arms the probe.
pub fn bind_environment(env: &'static BootEnvironment) {
    ENVIRONMENT.store(env as *const BootEnvironment as *mut BootEnvironment, Ordering::Release);
    PROVIDER.store(core::ptr::null_mut(), Ordering::Release);
    PROBED.store(false, Ordering::Release);
}

/// The get-random capability injected into the binary.
pub extern "C" fn lazy_get_random_64(out: *mut u64) -> bool {
    if out.is_null() {
        return false;
    }

    if !PROBED.load(Ordering::Acquire) {
        probe_provider();
    }

    let provider = PROVIDER.load(Ordering::Acquire);
    if provider.is_null() {
        // Cached unavailable
        return false;
    }

    let provider = unsafe { &*provider };
    (provider.get_random_64)(out)
}

fn probe_provider() {
    let env = ENVIRONMENT.load(Ordering::Acquire);
    if env.is_null() {
        PROBED.store(true, Ordering::Release);
        return;
    }
    let env = unsafe { &*env };

    let mut interface: *mut c_void = core::ptr::null_mut();
    let status = (env.locate_protocol)(&RANDOM_PROTOCOL_GUID, &mut interface);
    if status.is_error() || interface.is_null() {
        console_warnln!("[!] Randomness provider not available; random requests will fail");
    } else {
        PROVIDER.store(interface as *mut RandomProtocol, Ordering::Release);
    }
    PROBED.store(true, Ordering::Release);
}
