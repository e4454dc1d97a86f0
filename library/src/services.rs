//! Environment Service Tables
//!
//! Each execution environment hands its loader entry a table of native
//! service function pointers. The binary never sees these tables; it only
//! sees the capability record the bootstrap distills from them.

use crate::error::{LoaderError, LoaderResult};
use crate::guid::Guid;
use crate::status::Status;
use core::ffi::c_void;
use core::ptr::NonNull;

/// Calendar time record returned by the get-time service.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct Time {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub pad1: u8,
    pub nanosecond: u32,
    pub time_zone: i16,
    pub daylight: u8,
    pub pad2: u8,
}

/// Firmware-store section kinds. Only the executable section is consumed
/// by this subsystem.
pub const SECTION_KIND_EXECUTABLE: u32 = 0x10;

pub type AllocatePoolFn = extern "C" fn(size: usize) -> *mut c_void;
pub type FreePoolFn = extern "C" fn(buffer: *mut c_void);
pub type AllocateRegionFn = extern "C" fn(size: usize) -> *mut c_void;
pub type FreeRegionFn = extern "C" fn(base: *mut c_void, size: usize);
pub type GetTimeFn = extern "C" fn(time: *mut Time) -> Status;
pub type DebugPrintFn = extern "C" fn(level: usize, msg: *const u8, len: usize);
pub type GetRandom64Fn = extern "C" fn(out: *mut u64) -> bool;
pub type LocateProtocolFn = extern "C" fn(id: *const Guid, out: *mut *mut c_void) -> Status;
pub type InstallProtocolFn = extern "C" fn(id: *const Guid, interface: *mut c_void) -> Status;
pub type FindFirmwareSectionFn = extern "C" fn(
    file: *const Guid,
    kind: u32,
    out: *mut *mut c_void,
    out_len: *mut u64,
) -> Status;
pub type LoadImageFn =
    extern "C" fn(data: *const c_void, len: usize, out_base: *mut *mut c_void, out_size: *mut u64)
        -> Status;
pub type UnloadImageFn = extern "C" fn(base: *mut c_void, size: u64);

/// Randomness provider interface, located under `RANDOM_PROTOCOL_GUID`.
#[repr(C)]
pub struct RandomProtocol {
    pub get_random_64: GetRandom64Fn,
}

/// Native services of the full (boot-phase) environment.
#[repr(C)]
pub struct BootEnvironment {
    pub allocate_pool: AllocatePoolFn,
    pub free_pool: FreePoolFn,
    pub allocate_image_region: AllocateRegionFn,
    pub free_image_region: FreeRegionFn,
    pub get_time: Option<GetTimeFn>,
    pub debug_print: DebugPrintFn,
    pub locate_protocol: LocateProtocolFn,
    pub find_firmware_section: FindFirmwareSectionFn,
    /// Native image loader. When present the bootstrap defers mapping and
    /// relocation to it; otherwise it maps the image itself.
    pub load_image: Option<LoadImageFn>,
    pub unload_image: Option<UnloadImageFn>,
    pub install_protocol: InstallProtocolFn,
}

/// Native services of the restricted (management-mode) environment. The
/// image is already mapped before this table is handed out; there is no
/// firmware-store or image-loading surface, and no time-of-day service.
#[repr(C)]
pub struct MmEnvironment {
    pub allocate_pool: AllocatePoolFn,
    pub free_pool: FreePoolFn,
    pub debug_print: DebugPrintFn,
    pub locate_protocol: LocateProtocolFn,
    pub install_protocol: InstallProtocolFn,
    pub get_random_64: Option<GetRandom64Fn>,
}

/// Supplier of the single executable region a mapped image lives in.
pub trait RegionAllocator {
    fn allocate_region(&mut self, size: usize) -> LoaderResult<NonNull<u8>>;
    fn free_region(&mut self, base: NonNull<u8>, size: usize);
}

/// Raw section bytes pulled from the firmware store. The buffer is owned
/// transiently by the bootstrap and returned to the pool on drop, so every
/// exit path after discovery releases it.
pub struct SectionData {
    ptr: NonNull<u8>,
    len: usize,
    free: FreePoolFn,
}

impl SectionData {
    /// # Safety
    /// `ptr` must point to `len` readable bytes allocated from the pool
    /// that `free` returns memory to.
    pub unsafe fn from_raw(ptr: NonNull<u8>, len: usize, free: FreePoolFn) -> Self {
        SectionData { ptr, len, free }
    }

    pub fn bytes(&self) -> &[u8] {
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for SectionData {
    fn drop(&mut self) {
        (self.free)(self.ptr.as_ptr() as *mut c_void);
    }
}

/// Fetch the executable section of `file` from the firmware store.
pub fn find_firmware_section(
    lookup: FindFirmwareSectionFn,
    free: FreePoolFn,
    file: &Guid,
) -> LoaderResult<SectionData> {
    let mut data: *mut c_void = core::ptr::null_mut();
    let mut len: u64 = 0;
    let status = lookup(file, SECTION_KIND_EXECUTABLE, &mut data, &mut len);
    if status.is_error() {
        return Err(LoaderError::NotReady);
    }

    let ptr = NonNull::new(data as *mut u8).ok_or(LoaderError::NotReady)?;
    if len == 0 {
        free(data);
        return Err(LoaderError::NotReady);
    }

    Ok(unsafe { SectionData::from_raw(ptr, len as usize, free) })
}
