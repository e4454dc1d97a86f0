//! Synthetic Image Builder
//!
//! Assembles minimal well-formed PE32+ images for tests and the host
//! harness, with hooks to corrupt individual fields for malformed-input
//! coverage. Test-only; never compiled into firmware builds.

use std::string::String;
use std::vec;
use std::vec::Vec;

use crate::pe::constants::*;
use crate::services::RegionAllocator;
use crate::{LoaderError, LoaderResult};
use core::ptr::NonNull;

const HEADERS_SIZE: u32 = 0x200;
const FILE_ALIGN: usize = 0x200;

/// Fixed section placement used by the builder.
pub const TEXT_RVA: u32 = 0x1000;
pub const EDATA_RVA: u32 = 0x2000;
pub const RELOC_RVA: u32 = 0x3000;

struct SectionSpec {
    name: [u8; 8],
    rva: u32,
    raw: Vec<u8>,
    virtual_size: u32,
    characteristics: u32,
}

/// Builder for synthetic images.
pub struct ImageBuilder {
    preferred_base: u64,
    machine: u16,
    subsystem: u16,
    optional_magic: u16,
    size_of_image: u32,
    text: Vec<u8>,
    bss: Option<(u32, u32)>,
    exports: Vec<(String, u32)>,
    reloc_blocks: Vec<(u32, Vec<u16>)>,
    corrupt_raw_size: Option<(usize, u32)>,
    corrupt_virtual_size: Option<(usize, u32)>,
}

impl ImageBuilder {
    pub const DEFAULT_BASE: u64 = 0x1_4000_0000;

    pub fn new() -> Self {
        ImageBuilder {
            preferred_base: Self::DEFAULT_BASE,
            machine: MACHINE_X64,
            subsystem: SUBSYSTEM_BOOT_SERVICE_DRIVER,
            optional_magic: OPTIONAL_HDR64_MAGIC,
            size_of_image: 0x4000,
            text: Vec::new(),
            bss: None,
            exports: Vec::new(),
            reloc_blocks: Vec::new(),
            corrupt_raw_size: None,
            corrupt_virtual_size: None,
        }
    }

    pub fn text(mut self, bytes: &[u8]) -> Self {
        assert!(bytes.len() <= 0x1000, "builder .text larger than its slot");
        self.text = bytes.to_vec();
        self
    }

    /// Add an uninitialized-data section (no raw bytes).
    pub fn with_bss(mut self, rva: u32, virtual_size: u32) -> Self {
        self.bss = Some((rva, virtual_size));
        self
    }

    pub fn with_export(mut self, name: &str, rva: u32) -> Self {
        self.exports.push((name.into(), rva));
        self
    }

    /// Add one relocation block; entries are (offset-within-page, kind).
    pub fn with_reloc_block(mut self, page_rva: u32, entries: &[(u16, u8)]) -> Self {
        let encoded = entries
            .iter()
            .map(|&(offset, kind)| ((kind as u16) << 12) | (offset & 0x0FFF))
            .collect();
        self.reloc_blocks.push((page_rva, encoded));
        self
    }

    pub fn preferred_base(mut self, base: u64) -> Self {
        self.preferred_base = base;
        self
    }

    pub fn machine(mut self, machine: u16) -> Self {
        self.machine = machine;
        self
    }

    pub fn subsystem(mut self, subsystem: u16) -> Self {
        self.subsystem = subsystem;
        self
    }

    pub fn optional_magic(mut self, magic: u16) -> Self {
        self.optional_magic = magic;
        self
    }

    pub fn size_of_image(mut self, size: u32) -> Self {
        self.size_of_image = size;
        self
    }

    /// Patch a section's declared raw size after assembly.
    pub fn corrupt_section_raw_size(mut self, index: usize, value: u32) -> Self {
        self.corrupt_raw_size = Some((index, value));
        self
    }

    /// Patch a section's declared virtual size after assembly.
    pub fn corrupt_section_virtual_size(mut self, index: usize, value: u32) -> Self {
        self.corrupt_virtual_size = Some((index, value));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut sections: Vec<SectionSpec> = Vec::new();

        let text_len = self.text.len() as u32;
        sections.push(SectionSpec {
            name: *b".text\0\0\0",
            rva: TEXT_RVA,
            raw: self.text.clone(),
            virtual_size: text_len.max(0x10),
            characteristics: 0x6000_0020, // code, exec, read
        });

        if !self.exports.is_empty() {
            let edata = build_export_section(EDATA_RVA, &self.exports);
            let len = edata.len() as u32;
            sections.push(SectionSpec {
                name: *b".edata\0\0",
                rva: EDATA_RVA,
                raw: edata,
                virtual_size: len,
                characteristics: 0x4000_0040, // initialized data, read
            });
        }

        if !self.reloc_blocks.is_empty() {
            let reloc = build_reloc_section(&self.reloc_blocks);
            let len = reloc.len() as u32;
            sections.push(SectionSpec {
                name: *b".reloc\0\0",
                rva: RELOC_RVA,
                raw: reloc,
                virtual_size: len,
                characteristics: 0x4200_0040, // initialized data, discardable, read
            });
        }

        if let Some((rva, virtual_size)) = self.bss {
            sections.push(SectionSpec {
                name: *b".bss\0\0\0\0",
                rva,
                raw: Vec::new(),
                virtual_size,
                characteristics: 0xC000_0080, // uninitialized data, read, write
            });
        }

        // Assign file offsets
        let mut file_cursor = HEADERS_SIZE as usize;
        let mut placements: Vec<(usize, usize)> = Vec::new();
        for section in &sections {
            if section.raw.is_empty() {
                placements.push((0, 0));
            } else {
                placements.push((file_cursor, section.raw.len()));
                file_cursor += (section.raw.len() + FILE_ALIGN - 1) & !(FILE_ALIGN - 1);
            }
        }

        let mut image = vec![0u8; file_cursor];

        // DOS header
        image[0..2].copy_from_slice(&DOS_SIGNATURE.to_le_bytes());
        let pe_offset: u32 = 0x40;
        image[DOS_PE_OFFSET_FIELD..DOS_PE_OFFSET_FIELD + 4]
            .copy_from_slice(&pe_offset.to_le_bytes());

        // Second-stage signature + file header
        let pe = pe_offset as usize;
        image[pe..pe + 4].copy_from_slice(&PE_SIGNATURE.to_le_bytes());
        let coff = pe + 4;
        let opt_size: u16 =
            (OPTIONAL_HEADER_FIXED_SIZE + MAX_DATA_DIRECTORIES as usize * DATA_DIRECTORY_SIZE)
                as u16;
        image[coff..coff + 2].copy_from_slice(&self.machine.to_le_bytes());
        image[coff + 2..coff + 4].copy_from_slice(&(sections.len() as u16).to_le_bytes());
        image[coff + 16..coff + 18].copy_from_slice(&opt_size.to_le_bytes());
        image[coff + 18..coff + 20].copy_from_slice(&0x2022u16.to_le_bytes());

        // Optional header
        let opt = coff + COFF_HEADER_SIZE;
        image[opt..opt + 2].copy_from_slice(&self.optional_magic.to_le_bytes());
        image[opt + 16..opt + 20].copy_from_slice(&TEXT_RVA.to_le_bytes());
        image[opt + 24..opt + 32].copy_from_slice(&self.preferred_base.to_le_bytes());
        image[opt + 32..opt + 36].copy_from_slice(&0x1000u32.to_le_bytes());
        image[opt + 36..opt + 40].copy_from_slice(&(FILE_ALIGN as u32).to_le_bytes());
        image[opt + 56..opt + 60].copy_from_slice(&self.size_of_image.to_le_bytes());
        image[opt + 60..opt + 64].copy_from_slice(&HEADERS_SIZE.to_le_bytes());
        image[opt + 68..opt + 70].copy_from_slice(&self.subsystem.to_le_bytes());
        image[opt + 70..opt + 72].copy_from_slice(&0x0160u16.to_le_bytes());
        image[opt + 108..opt + 112].copy_from_slice(&MAX_DATA_DIRECTORIES.to_le_bytes());

        // Data directories
        let dirs = opt + OPTIONAL_HEADER_FIXED_SIZE;
        if !self.exports.is_empty() {
            let edata_len = sections
                .iter()
                .find(|s| s.rva == EDATA_RVA)
                .map(|s| s.raw.len() as u32)
                .unwrap_or(0);
            let entry = dirs + DIRECTORY_ENTRY_EXPORT * DATA_DIRECTORY_SIZE;
            image[entry..entry + 4].copy_from_slice(&EDATA_RVA.to_le_bytes());
            image[entry + 4..entry + 8].copy_from_slice(&edata_len.to_le_bytes());
        }
        if !self.reloc_blocks.is_empty() {
            let reloc_len = sections
                .iter()
                .find(|s| s.rva == RELOC_RVA)
                .map(|s| s.raw.len() as u32)
                .unwrap_or(0);
            let entry = dirs + DIRECTORY_ENTRY_BASERELOC * DATA_DIRECTORY_SIZE;
            image[entry..entry + 4].copy_from_slice(&RELOC_RVA.to_le_bytes());
            image[entry + 4..entry + 8].copy_from_slice(&reloc_len.to_le_bytes());
        }

        // Section table
        let table = opt + opt_size as usize;
        for (i, (section, &(file_offset, raw_len))) in
            sections.iter().zip(placements.iter()).enumerate()
        {
            let row = table + i * SECTION_HEADER_SIZE;
            image[row..row + 8].copy_from_slice(&section.name);
            image[row + 8..row + 12].copy_from_slice(&section.virtual_size.to_le_bytes());
            image[row + 12..row + 16].copy_from_slice(&section.rva.to_le_bytes());
            image[row + 16..row + 20].copy_from_slice(&(raw_len as u32).to_le_bytes());
            image[row + 20..row + 24].copy_from_slice(&(file_offset as u32).to_le_bytes());
            image[row + 36..row + 40].copy_from_slice(&section.characteristics.to_le_bytes());
        }

        // Section raw data
        for (section, &(file_offset, _)) in sections.iter().zip(placements.iter()) {
            if !section.raw.is_empty() {
                image[file_offset..file_offset + section.raw.len()].copy_from_slice(&section.raw);
            }
        }

        // Field corruptions requested by negative tests
        if let Some((index, value)) = self.corrupt_raw_size {
            let row = table + index * SECTION_HEADER_SIZE;
            image[row + 16..row + 20].copy_from_slice(&value.to_le_bytes());
        }
        if let Some((index, value)) = self.corrupt_virtual_size {
            let row = table + index * SECTION_HEADER_SIZE;
            image[row + 8..row + 12].copy_from_slice(&value.to_le_bytes());
        }

        image
    }
}

impl Default for ImageBuilder {
    fn default() -> Self {
        ImageBuilder::new()
    }
}

fn build_export_section(edata_rva: u32, exports: &[(String, u32)]) -> Vec<u8> {
    let count = exports.len() as u32;
    let functions_offset = EXPORT_DIRECTORY_SIZE as u32;
    let names_offset = functions_offset + count * 4;
    let ordinals_offset = names_offset + count * 4;
    let strings_offset = ordinals_offset + count * 2;

    let mut strings: Vec<u8> = Vec::new();
    let mut name_rvas: Vec<u32> = Vec::new();
    for (name, _) in exports {
        name_rvas.push(edata_rva + strings_offset + strings.len() as u32);
        strings.extend_from_slice(name.as_bytes());
        strings.push(0);
    }

    let mut out = vec![0u8; strings_offset as usize];
    // Directory header
    out[16..20].copy_from_slice(&1u32.to_le_bytes()); // ordinal base
    out[20..24].copy_from_slice(&count.to_le_bytes());
    out[24..28].copy_from_slice(&count.to_le_bytes());
    out[28..32].copy_from_slice(&(edata_rva + functions_offset).to_le_bytes());
    out[32..36].copy_from_slice(&(edata_rva + names_offset).to_le_bytes());
    out[36..40].copy_from_slice(&(edata_rva + ordinals_offset).to_le_bytes());

    for (i, (_, rva)) in exports.iter().enumerate() {
        let at = functions_offset as usize + i * 4;
        out[at..at + 4].copy_from_slice(&rva.to_le_bytes());
        let at = names_offset as usize + i * 4;
        out[at..at + 4].copy_from_slice(&name_rvas[i].to_le_bytes());
        let at = ordinals_offset as usize + i * 2;
        out[at..at + 2].copy_from_slice(&(i as u16).to_le_bytes());
    }

    out.extend_from_slice(&strings);
    out
}

fn build_reloc_section(blocks: &[(u32, Vec<u16>)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (page_rva, entries) in blocks {
        let block_size = (RELOCATION_BLOCK_HEADER_SIZE + entries.len() * 2) as u32;
        out.extend_from_slice(&page_rva.to_le_bytes());
        out.extend_from_slice(&block_size.to_le_bytes());
        for entry in entries {
            out.extend_from_slice(&entry.to_le_bytes());
        }
    }
    out
}

/// Region allocator over the host heap, for tests of the mapper.
pub struct TestRegions {
    outstanding: usize,
}

impl TestRegions {
    pub fn new() -> Self {
        TestRegions { outstanding: 0 }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }
}

impl Default for TestRegions {
    fn default() -> Self {
        TestRegions::new()
    }
}

impl RegionAllocator for TestRegions {
    fn allocate_region(&mut self, size: usize) -> LoaderResult<NonNull<u8>> {
        let layout = std::alloc::Layout::from_size_align(size.max(1), 0x1000)
            .map_err(|_| LoaderError::OutOfResources)?;
        let ptr = unsafe { std::alloc::alloc(layout) };
        let ptr = NonNull::new(ptr).ok_or(LoaderError::OutOfResources)?;
        self.outstanding += 1;
        Ok(ptr)
    }

    fn free_region(&mut self, base: NonNull<u8>, size: usize) {
        let layout = match std::alloc::Layout::from_size_align(size.max(1), 0x1000) {
            Ok(layout) => layout,
            Err(_) => return,
        };
        unsafe { std::alloc::dealloc(base.as_ptr(), layout) };
        self.outstanding -= 1;
    }
}
