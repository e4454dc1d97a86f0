//! Image Parser
//!
//! Validates the PE32+ header chain and collects the section layout. All
//! rejection paths are pure: nothing is allocated and nothing is written
//! before validation completes.

use crate::console_println;
use crate::error::{LoaderError, LoaderResult};
use crate::pe::constants::*;
use crate::pe::structures::{CoffHeader, DataDirectory, ImageLayout, SectionHeader};
use crate::pe::view::ImageView;

/// Parser for PE32+ executables
pub struct PeParser;

impl PeParser {
    pub fn new() -> Self {
        PeParser
    }

    /// Parse and validate the full header chain, returning the layout
    /// needed to map the image.
    pub fn parse_layout(&self, data: &[u8]) -> LoaderResult<ImageLayout> {
        let view = ImageView::new(data);

        let opt_offset = self.optional_header_offset(&view)?;
        let coff = self.parse_coff(&view)?;

        // Image kind: 64-bit position-independent only
        let magic = view.read_u16(opt_offset)?;
        if magic != OPTIONAL_HDR64_MAGIC {
            return Err(LoaderError::Unsupported);
        }

        let entry_point_rva = view.read_u32(opt_offset + 16)?;
        let preferred_base = view.read_u64(opt_offset + 24)?;
        let size_of_image = view.read_u32(opt_offset + 56)?;
        let size_of_headers = view.read_u32(opt_offset + 60)?;
        let subsystem = view.read_u16(opt_offset + 68)?;

        if subsystem != SUBSYSTEM_BOOT_SERVICE_DRIVER {
            return Err(LoaderError::Unsupported);
        }

        if size_of_image == 0 || size_of_headers == 0 {
            return Err(LoaderError::Malformed);
        }
        if size_of_headers > size_of_image || size_of_headers as usize > data.len() {
            return Err(LoaderError::Malformed);
        }

        // The directory table must fit inside the declared optional header.
        let num_dirs = view.read_u32(opt_offset + OPTIONAL_HEADER_FIXED_SIZE - 4)?;
        if num_dirs > MAX_DATA_DIRECTORIES {
            return Err(LoaderError::Malformed);
        }
        let dirs_bytes = num_dirs as usize * DATA_DIRECTORY_SIZE;
        if OPTIONAL_HEADER_FIXED_SIZE + dirs_bytes > coff.size_of_optional_header as usize {
            return Err(LoaderError::Malformed);
        }

        let sections = self.parse_sections(&view, &coff, opt_offset, size_of_image)?;

        Ok(ImageLayout {
            preferred_base,
            size_of_image,
            size_of_headers,
            entry_point_rva,
            subsystem,
            sections,
        })
    }

    /// Check whether the buffer begins a well-formed image of the kind
    /// this loader accepts.
    pub fn is_supported_image(&self, data: &[u8]) -> bool {
        self.parse_layout(data).is_ok()
    }

    /// Look up one data directory entry, re-deriving the header chain.
    /// Works on the raw file and on a mapped image alike (headers are
    /// identical in both). Absent or empty entries return `None`.
    pub fn data_directory(&self, data: &[u8], index: usize) -> LoaderResult<Option<DataDirectory>> {
        let view = ImageView::new(data);
        let opt_offset = self.optional_header_offset(&view)?;

        let num_dirs = view.read_u32(opt_offset + OPTIONAL_HEADER_FIXED_SIZE - 4)?;
        if num_dirs > MAX_DATA_DIRECTORIES {
            return Err(LoaderError::Malformed);
        }
        if index >= num_dirs as usize {
            return Ok(None);
        }

        let entry_offset = opt_offset + OPTIONAL_HEADER_FIXED_SIZE + index * DATA_DIRECTORY_SIZE;
        let dir = DataDirectory {
            virtual_address: view.read_u32(entry_offset)?,
            size: view.read_u32(entry_offset + 4)?,
        };
        Ok(if dir.is_present() { Some(dir) } else { None })
    }

    /// Display the parsed layout for debugging.
    pub fn log_layout(&self, layout: &ImageLayout) {
        console_println!(
            "[i] Image: size=0x{:x} headers=0x{:x} entry_rva=0x{:x} preferred_base=0x{:x}",
            layout.size_of_image,
            layout.size_of_headers,
            layout.entry_point_rva,
            layout.preferred_base
        );
        for (i, section) in layout.sections.iter().enumerate() {
            console_println!(
                "    [{}] {} va=0x{:x} vsize=0x{:x} raw=0x{:x}+0x{:x}",
                i,
                section.name_str(),
                section.virtual_address,
                section.virtual_size,
                section.pointer_to_raw_data,
                section.size_of_raw_data
            );
        }
    }

    /// Validate the signature chain and return the optional header offset.
    fn optional_header_offset(&self, view: &ImageView) -> LoaderResult<usize> {
        if view.len() < MIN_DOS_HEADER_SIZE {
            return Err(LoaderError::Malformed);
        }
        if view.read_u16(0)? != DOS_SIGNATURE {
            return Err(LoaderError::Malformed);
        }

        let pe_offset = view.read_u32(DOS_PE_OFFSET_FIELD)? as usize;
        if view.read_u32(pe_offset)? != PE_SIGNATURE {
            return Err(LoaderError::Malformed);
        }

        Ok(pe_offset + 4 + COFF_HEADER_SIZE)
    }

    fn parse_coff(&self, view: &ImageView) -> LoaderResult<CoffHeader> {
        let pe_offset = view.read_u32(DOS_PE_OFFSET_FIELD)? as usize;
        let coff_offset = pe_offset + 4;

        let coff = CoffHeader {
            machine: view.read_u16(coff_offset)?,
            number_of_sections: view.read_u16(coff_offset + 2)?,
            size_of_optional_header: view.read_u16(coff_offset + 16)?,
            characteristics: view.read_u16(coff_offset + 18)?,
        };

        if coff.machine != MACHINE_X64 {
            return Err(LoaderError::Unsupported);
        }
        if (coff.size_of_optional_header as usize) < OPTIONAL_HEADER_FIXED_SIZE {
            return Err(LoaderError::Malformed);
        }

        Ok(coff)
    }

    fn parse_sections(
        &self,
        view: &ImageView,
        coff: &CoffHeader,
        opt_offset: usize,
        size_of_image: u32,
    ) -> LoaderResult<heapless::Vec<SectionHeader, MAX_SECTIONS>> {
        if coff.number_of_sections as usize > MAX_SECTIONS {
            return Err(LoaderError::Malformed);
        }

        let table_offset = opt_offset + coff.size_of_optional_header as usize;
        let mut sections = heapless::Vec::new();

        for i in 0..coff.number_of_sections as usize {
            let offset = table_offset + i * SECTION_HEADER_SIZE;
            let raw = view.slice(offset, SECTION_HEADER_SIZE)?;

            let mut name = [0u8; 8];
            name.copy_from_slice(&raw[0..8]);
            let section = SectionHeader {
                name,
                virtual_size: u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]),
                virtual_address: u32::from_le_bytes([raw[12], raw[13], raw[14], raw[15]]),
                size_of_raw_data: u32::from_le_bytes([raw[16], raw[17], raw[18], raw[19]]),
                pointer_to_raw_data: u32::from_le_bytes([raw[20], raw[21], raw[22], raw[23]]),
                characteristics: u32::from_le_bytes([raw[36], raw[37], raw[38], raw[39]]),
            };

            self.check_section_extents(&section, view.len(), size_of_image)?;

            // Capacity equals the declared-section bound checked above.
            sections
                .push(section)
                .map_err(|_| LoaderError::Malformed)?;
        }

        Ok(sections)
    }

    /// A section may neither read past the end of the raw bytes nor land
    /// outside the declared image extent.
    fn check_section_extents(
        &self,
        section: &SectionHeader,
        raw_len: usize,
        size_of_image: u32,
    ) -> LoaderResult<()> {
        let image_size = size_of_image as u64;
        let va = section.virtual_address as u64;

        if section.size_of_raw_data > 0 {
            let raw_end = section.pointer_to_raw_data as u64 + section.size_of_raw_data as u64;
            if raw_end > raw_len as u64 {
                return Err(LoaderError::Malformed);
            }
            if va + section.size_of_raw_data as u64 > image_size {
                return Err(LoaderError::Malformed);
            }
        }
        if va + section.virtual_size as u64 > image_size {
            return Err(LoaderError::Malformed);
        }

        Ok(())
    }
}

impl Default for PeParser {
    fn default() -> Self {
        PeParser::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pe::testsupport::ImageBuilder;

    #[test]
    fn parses_well_formed_image() {
        let image = ImageBuilder::new().text(&[0x90; 32]).build();
        let layout = PeParser::new().parse_layout(&image).unwrap();
        assert_eq!(layout.preferred_base, ImageBuilder::DEFAULT_BASE);
        assert_eq!(layout.sections.len(), 1);
        assert_eq!(layout.sections[0].name_str(), ".text");
        assert_eq!(layout.sections[0].virtual_address, 0x1000);
    }

    #[test]
    fn rejects_short_input() {
        for len in [0usize, 1, 0x3F] {
            let data = vec![0u8; len];
            assert_eq!(
                PeParser::new().parse_layout(&data),
                Err(LoaderError::Malformed)
            );
        }
    }

    #[test]
    fn rejects_bad_first_signature() {
        let mut image = ImageBuilder::new().text(&[0x90; 16]).build();
        image[0] = b'X';
        assert_eq!(
            PeParser::new().parse_layout(&image),
            Err(LoaderError::Malformed)
        );
    }

    #[test]
    fn rejects_bad_second_signature() {
        let mut image = ImageBuilder::new().text(&[0x90; 16]).build();
        let pe_offset =
            u32::from_le_bytes(image[0x3C..0x40].try_into().unwrap()) as usize;
        image[pe_offset] = 0;
        assert_eq!(
            PeParser::new().parse_layout(&image),
            Err(LoaderError::Malformed)
        );
    }

    #[test]
    fn rejects_header_pointer_past_end() {
        let mut image = ImageBuilder::new().text(&[0x90; 16]).build();
        image[0x3C..0x40].copy_from_slice(&u32::MAX.to_le_bytes());
        assert_eq!(
            PeParser::new().parse_layout(&image),
            Err(LoaderError::Malformed)
        );
    }

    #[test]
    fn rejects_wrong_optional_magic() {
        // PE32 (32-bit) magic instead of PE32+
        let image = ImageBuilder::new()
            .text(&[0x90; 16])
            .optional_magic(0x010B)
            .build();
        assert_eq!(
            PeParser::new().parse_layout(&image),
            Err(LoaderError::Unsupported)
        );
    }

    #[test]
    fn rejects_wrong_subsystem() {
        let image = ImageBuilder::new()
            .text(&[0x90; 16])
            .subsystem(10) // application
            .build();
        assert_eq!(
            PeParser::new().parse_layout(&image),
            Err(LoaderError::Unsupported)
        );
    }

    #[test]
    fn rejects_wrong_machine() {
        let image = ImageBuilder::new()
            .text(&[0x90; 16])
            .machine(0xAA64)
            .build();
        assert_eq!(
            PeParser::new().parse_layout(&image),
            Err(LoaderError::Unsupported)
        );
    }

    #[test]
    fn rejects_section_raw_extent_past_input() {
        let image = ImageBuilder::new()
            .text(&[0x90; 16])
            .corrupt_section_raw_size(0, 0x0100_0000)
            .build();
        assert_eq!(
            PeParser::new().parse_layout(&image),
            Err(LoaderError::Malformed)
        );
    }

    #[test]
    fn rejects_section_virtual_extent_past_image() {
        let image = ImageBuilder::new()
            .text(&[0x90; 16])
            .corrupt_section_virtual_size(0, 0xFFFF_0000)
            .build();
        assert_eq!(
            PeParser::new().parse_layout(&image),
            Err(LoaderError::Malformed)
        );
    }

    #[test]
    fn data_directory_lookup() {
        let image = ImageBuilder::new()
            .text(&[0x90; 16])
            .with_export("CryptoEntry", 0x1000)
            .build();
        let parser = PeParser::new();
        let export = parser
            .data_directory(&image, DIRECTORY_ENTRY_EXPORT)
            .unwrap();
        assert!(export.is_some());
        let reloc = parser
            .data_directory(&image, DIRECTORY_ENTRY_BASERELOC)
            .unwrap();
        assert!(reloc.is_none());
    }
}
