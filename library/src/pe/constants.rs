//! Image format constants

/// "MZ" signature at offset 0
pub const DOS_SIGNATURE: u16 = 0x5A4D;
/// Offset of the pointer to the second-stage header
pub const DOS_PE_OFFSET_FIELD: usize = 0x3C;
/// Minimum byte count before the pointer field can even exist
pub const MIN_DOS_HEADER_SIZE: usize = 0x40;
/// "PE\0\0" second-stage signature
pub const PE_SIGNATURE: u32 = 0x0000_4550;
/// 64-bit position-independent image kind marker (PE32+)
pub const OPTIONAL_HDR64_MAGIC: u16 = 0x020B;
/// x86-64 machine kind
pub const MACHINE_X64: u16 = 0x8664;
/// Boot-service driver subsystem; the only kind this loader accepts
pub const SUBSYSTEM_BOOT_SERVICE_DRIVER: u16 = 11;

pub const COFF_HEADER_SIZE: usize = 20;
pub const SECTION_HEADER_SIZE: usize = 40;
/// PE32+ optional header bytes before the data directories
pub const OPTIONAL_HEADER_FIXED_SIZE: usize = 112;
pub const DATA_DIRECTORY_SIZE: usize = 8;
/// Standard data directory slot count; declarations beyond it are rejected
pub const MAX_DATA_DIRECTORIES: u32 = 16;
/// Bound on declared sections; the shared binary has a handful
pub const MAX_SECTIONS: usize = 16;

pub const DIRECTORY_ENTRY_EXPORT: usize = 0;
pub const DIRECTORY_ENTRY_BASERELOC: usize = 5;

pub const EXPORT_DIRECTORY_SIZE: usize = 40;
/// Longest export name the resolver will compare against
pub const MAX_EXPORT_NAME: usize = 256;

/// Relocation directive kinds (high nibble of each entry)
pub const REL_BASED_ABSOLUTE: u8 = 0;
pub const REL_BASED_HIGHLOW: u8 = 3;
pub const REL_BASED_DIR64: u8 = 10;
/// Relocation block header: page RVA + block size
pub const RELOCATION_BLOCK_HEADER_SIZE: usize = 8;
