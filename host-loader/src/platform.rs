//! Emulated Platform
//!
//! A firmware platform in miniature: a pool allocator over a fixed arena,
//! a firmware store, a protocol registry, deterministic time and
//! randomness, and a recording diagnostic sink. The extern shims below are
//! wired into real `BootEnvironment`/`MmEnvironment` tables so the actual
//! bootstrap crates run against it unchanged.

use core::ffi::c_void;
use lazy_static::lazy_static;
use linked_list_allocator::Heap;
use sharedcrypto_common::guid::RANDOM_PROTOCOL_GUID;
use sharedcrypto_common::pe::{apply_relocations, ImageMapper};
use sharedcrypto_common::services::{
    BootEnvironment, MmEnvironment, RandomProtocol, RegionAllocator, Time,
    SECTION_KIND_EXECUTABLE,
};
use sharedcrypto_common::{Guid, LoaderError, LoaderResult, Status};
use spin::Mutex;
use std::alloc::Layout;
use std::collections::HashMap;
use std::ptr::NonNull;

const ARENA_SIZE: usize = 1 << 20;
const RNG_SEED: u64 = 0x853C_49E6_748F_EA9B;

struct Platform {
    arena: Box<[u8]>,
    heap: Heap,
    pool_sizes: HashMap<usize, usize>,
    region_sizes: HashMap<usize, usize>,
    store: HashMap<Guid, Vec<u8>>,
    registry: HashMap<Guid, usize>,
    diagnostics: Vec<(usize, String)>,
    rng_state: u64,
}

impl Platform {
    fn new() -> Self {
        let mut arena = vec![0u8; ARENA_SIZE].into_boxed_slice();
        let mut heap = Heap::empty();
        unsafe { heap.init(arena.as_mut_ptr(), arena.len()) };
        Platform {
            arena,
            heap,
            pool_sizes: HashMap::new(),
            region_sizes: HashMap::new(),
            store: HashMap::new(),
            registry: HashMap::new(),
            diagnostics: Vec::new(),
            rng_state: RNG_SEED,
        }
    }

    fn reset(&mut self) {
        // Return any straggling regions to the host allocator, then start
        // the pool over from an empty arena.
        for (&base, &size) in self.region_sizes.iter() {
            if let Ok(layout) = Layout::from_size_align(size.max(1), 0x1000) {
                unsafe { std::alloc::dealloc(base as *mut u8, layout) };
            }
        }
        self.region_sizes.clear();
        self.pool_sizes.clear();
        self.heap = Heap::empty();
        unsafe { self.heap.init(self.arena.as_mut_ptr(), self.arena.len()) };
        self.store.clear();
        self.registry.clear();
        self.diagnostics.clear();
        self.rng_state = RNG_SEED;
    }

    fn alloc_pool(&mut self, size: usize) -> *mut c_void {
        let layout = match Layout::from_size_align(size.max(1), 16) {
            Ok(layout) => layout,
            Err(_) => return core::ptr::null_mut(),
        };
        match self.heap.allocate_first_fit(layout) {
            Ok(ptr) => {
                self.pool_sizes.insert(ptr.as_ptr() as usize, size.max(1));
                ptr.as_ptr() as *mut c_void
            }
            Err(_) => core::ptr::null_mut(),
        }
    }

    fn free_pool(&mut self, buffer: *mut c_void) {
        let Some(size) = self.pool_sizes.remove(&(buffer as usize)) else {
            return;
        };
        let Ok(layout) = Layout::from_size_align(size, 16) else {
            return;
        };
        let Some(ptr) = NonNull::new(buffer as *mut u8) else {
            return;
        };
        unsafe { self.heap.deallocate(ptr, layout) };
    }

    fn next_random(&mut self) -> u64 {
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng_state = x;
        x
    }
}

lazy_static! {
    static ref PLATFORM: Mutex<Platform> = Mutex::new(Platform::new());
    static ref TEST_GUARD: Mutex<()> = Mutex::new(());
}

/// Serialize platform-backed tests and hand each a fresh platform.
pub fn lock_for_test() -> spin::MutexGuard<'static, ()> {
    let guard = TEST_GUARD.lock();
    PLATFORM.lock().reset();
    guard
}

/// Place a file into the emulated firmware store.
pub fn install_file(file: Guid, bytes: Vec<u8>) {
    PLATFORM.lock().store.insert(file, bytes);
}

/// Register an interface pointer directly, bypassing the install shim.
pub fn install_interface(id: Guid, interface: *mut c_void) {
    PLATFORM.lock().registry.insert(id, interface as usize);
}

/// Register the platform randomness provider.
pub fn install_random_provider() {
    static PROVIDER: RandomProtocol = RandomProtocol {
        get_random_64: host_get_random_64,
    };
    install_interface(RANDOM_PROTOCOL_GUID, &PROVIDER as *const RandomProtocol as *mut c_void);
}

pub fn locate(id: &Guid) -> Option<*mut c_void> {
    PLATFORM
        .lock()
        .registry
        .get(id)
        .map(|&ptr| ptr as *mut c_void)
}

/// Pool allocations still outstanding; zero after a failed bootstrap.
pub fn outstanding_pool() -> usize {
    PLATFORM.lock().pool_sizes.len()
}

/// Image regions still outstanding.
pub fn outstanding_regions() -> usize {
    PLATFORM.lock().region_sizes.len()
}

pub fn diagnostics() -> Vec<String> {
    PLATFORM
        .lock()
        .diagnostics
        .iter()
        .map(|(_, line)| line.clone())
        .collect()
}

// --- extern shims -------------------------------------------------------

pub extern "C" fn host_allocate_pool(size: usize) -> *mut c_void {
    PLATFORM.lock().alloc_pool(size)
}

pub extern "C" fn host_free_pool(buffer: *mut c_void) {
    if buffer.is_null() {
        return;
    }
    PLATFORM.lock().free_pool(buffer);
}

pub extern "C" fn host_allocate_image_region(size: usize) -> *mut c_void {
    let Ok(layout) = Layout::from_size_align(size.max(1), 0x1000) else {
        return core::ptr::null_mut();
    };
    let base = unsafe { std::alloc::alloc(layout) };
    if !base.is_null() {
        PLATFORM
            .lock()
            .region_sizes
            .insert(base as usize, size.max(1));
    }
    base as *mut c_void
}

pub extern "C" fn host_free_image_region(base: *mut c_void, size: usize) {
    if base.is_null() {
        return;
    }
    if PLATFORM.lock().region_sizes.remove(&(base as usize)).is_none() {
        return;
    }
    let Ok(layout) = Layout::from_size_align(size.max(1), 0x1000) else {
        return;
    };
    unsafe { std::alloc::dealloc(base as *mut u8, layout) };
}

pub extern "C" fn host_get_time(time: *mut Time) -> Status {
    if time.is_null() {
        return Status::INVALID_PARAMETER;
    }
    let fixed = Time {
        year: 2025,
        month: 6,
        day: 17,
        hour: 12,
        minute: 0,
        second: 0,
        ..Time::default()
    };
    unsafe { core::ptr::write(time, fixed) };
    Status::SUCCESS
}

pub extern "C" fn host_debug_print(level: usize, msg: *const u8, len: usize) {
    if msg.is_null() {
        return;
    }
    let bytes = unsafe { std::slice::from_raw_parts(msg, len) };
    let line = String::from_utf8_lossy(bytes).into_owned();
    eprintln!("[0x{:08x}] {}", level, line);
    PLATFORM.lock().diagnostics.push((level, line));
}

pub extern "C" fn host_locate_protocol(id: *const Guid, out: *mut *mut c_void) -> Status {
    if id.is_null() || out.is_null() {
        return Status::INVALID_PARAMETER;
    }
    let id = unsafe { *id };
    match PLATFORM.lock().registry.get(&id) {
        Some(&ptr) => {
            unsafe { *out = ptr as *mut c_void };
            Status::SUCCESS
        }
        None => Status::NOT_FOUND,
    }
}

pub extern "C" fn host_install_protocol(id: *const Guid, interface: *mut c_void) -> Status {
    if id.is_null() || interface.is_null() {
        return Status::INVALID_PARAMETER;
    }
    let id = unsafe { *id };
    PLATFORM.lock().registry.insert(id, interface as usize);
    Status::SUCCESS
}

pub extern "C" fn host_find_firmware_section(
    file: *const Guid,
    kind: u32,
    out: *mut *mut c_void,
    out_len: *mut u64,
) -> Status {
    if file.is_null() || out.is_null() || out_len.is_null() {
        return Status::INVALID_PARAMETER;
    }
    if kind != SECTION_KIND_EXECUTABLE {
        return Status::NOT_FOUND;
    }

    let file = unsafe { *file };
    let mut platform = PLATFORM.lock();
    let Some(bytes) = platform.store.get(&file).cloned() else {
        return Status::NOT_FOUND;
    };

    // Like the real store lookup, hand the caller a pool copy it frees.
    let copy = platform.alloc_pool(bytes.len());
    if copy.is_null() {
        return Status::OUT_OF_RESOURCES;
    }
    unsafe {
        core::ptr::copy_nonoverlapping(bytes.as_ptr(), copy as *mut u8, bytes.len());
        *out = copy;
        *out_len = bytes.len() as u64;
    }
    Status::SUCCESS
}

struct ShimRegions;

impl RegionAllocator for ShimRegions {
    fn allocate_region(&mut self, size: usize) -> LoaderResult<NonNull<u8>> {
        NonNull::new(host_allocate_image_region(size) as *mut u8)
            .ok_or(LoaderError::OutOfResources)
    }

    fn free_region(&mut self, base: NonNull<u8>, size: usize) {
        host_free_image_region(base.as_ptr() as *mut c_void, size);
    }
}

/// Native-loader emulation: map with the common mapper and relocate, like
/// the platform's own loader would.
pub extern "C" fn host_load_image(
    data: *const c_void,
    len: usize,
    out_base: *mut *mut c_void,
    out_size: *mut u64,
) -> Status {
    if data.is_null() || len == 0 || out_base.is_null() || out_size.is_null() {
        return Status::INVALID_PARAMETER;
    }
    let bytes = unsafe { std::slice::from_raw_parts(data as *const u8, len) };

    let mut regions = ShimRegions;
    let mapper = ImageMapper::new();
    let layout = match mapper.validate(bytes) {
        Ok(layout) => layout,
        Err(err) => return err.into(),
    };
    let mut image = match mapper.map(bytes, &layout, &mut regions) {
        Ok(image) => image,
        Err(err) => return err.into(),
    };
    if let Err(err) = apply_relocations(&mut image, layout.preferred_base) {
        image.release(&mut regions);
        return err.into();
    }

    unsafe {
        *out_base = image.base_ptr().as_ptr() as *mut c_void;
        *out_size = image.size() as u64;
    }
    // Ownership passes to the caller; the region stays tracked for unload.
    core::mem::forget(image);
    Status::SUCCESS
}

pub extern "C" fn host_unload_image(base: *mut c_void, size: u64) {
    host_free_image_region(base, size as usize);
}

pub extern "C" fn host_get_random_64(out: *mut u64) -> bool {
    if out.is_null() {
        return false;
    }
    unsafe { *out = PLATFORM.lock().next_random() };
    true
}

// --- environment tables -------------------------------------------------

/// Full environment, self-mapping flavor (no native loader).
pub static BOOT_ENV_SELFMAP: BootEnvironment = BootEnvironment {
    allocate_pool: host_allocate_pool,
    free_pool: host_free_pool,
    allocate_image_region: host_allocate_image_region,
    free_image_region: host_free_image_region,
    get_time: Some(host_get_time),
    debug_print: host_debug_print,
    locate_protocol: host_locate_protocol,
    find_firmware_section: host_find_firmware_section,
    load_image: None,
    unload_image: None,
    install_protocol: host_install_protocol,
};

/// Full environment with the native loader present.
pub static BOOT_ENV_NATIVE: BootEnvironment = BootEnvironment {
    allocate_pool: host_allocate_pool,
    free_pool: host_free_pool,
    allocate_image_region: host_allocate_image_region,
    free_image_region: host_free_image_region,
    get_time: Some(host_get_time),
    debug_print: host_debug_print,
    locate_protocol: host_locate_protocol,
    find_firmware_section: host_find_firmware_section,
    load_image: Some(host_load_image),
    unload_image: Some(host_unload_image),
    install_protocol: host_install_protocol,
};

/// Restricted environment.
pub static MM_ENV: MmEnvironment = MmEnvironment {
    allocate_pool: host_allocate_pool,
    free_pool: host_free_pool,
    debug_print: host_debug_print,
    locate_protocol: host_locate_protocol,
    install_protocol: host_install_protocol,
    get_random_64: Some(host_get_random_64),
};
