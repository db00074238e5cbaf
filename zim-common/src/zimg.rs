//! The `ZImg` boot container format.
//!
//! A `ZImg` image is a byte-packed little-endian header followed by a table
//! of section records. The loader copies each section to its destination
//! physical address and fills in the [`BootRecord`](crate::boot::BootRecord)
//! from the header; the kernel only ever sees the parsed form.
//!
//! Loading (file IO, section placement) is the platform's job; this module
//! covers the wire format and its validation.

use core::fmt;

use zerocopy::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Magic number of a `ZImg` image.
pub const ZIMG_MAGIC: u32 = 0xDEAD_BEEF;

/// Image format version this parser understands.
pub const ZIMG_VERSION: u32 = 1;

/// What a section contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SectionKind {
    /// The root task image.
    Root = 1,
    /// A driver image.
    Driver = 2,
    /// Configuration data.
    Config = 3,
    /// Opaque data.
    Data = 4,
}

impl SectionKind {
    /// Decode a section kind from its wire value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Self::Root),
            2 => Some(Self::Driver),
            3 => Some(Self::Config),
            4 => Some(Self::Data),
            _ => None,
        }
    }
}

/// On-disk image header (40 bytes, packed, little-endian).
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct ZImgHeader {
    /// Must equal [`ZIMG_MAGIC`].
    pub magic: U32,
    /// Format version.
    pub version: U32,
    /// Offset of the section table from the start of the image.
    pub header_size: U32,
    /// Number of section records.
    pub section_count: U32,
    /// Entry-point offset within the ROOT section.
    pub root_entry_off: U64,
    /// Destination physical address of the CONFIG payload.
    pub config_phys: U64,
    /// Physical memory the image needs to run.
    pub memory_required: U64,
}

/// On-disk section record (28 bytes, packed, little-endian).
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct ZImgSection {
    /// Section name, NUL-padded.
    pub name: [u8; 8],
    /// Section kind (see [`SectionKind`]).
    pub kind: U32,
    /// Offset of the section payload within the image file.
    pub file_offset: U32,
    /// Physical address the payload must be copied to.
    pub dest_phys_addr: U64,
    /// Payload size in bytes.
    pub size: U32,
}

impl ZImgSection {
    /// The section name, trimmed at the first NUL. Empty if not UTF-8.
    #[must_use]
    pub fn name(&self) -> &str {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(8);
        core::str::from_utf8(&self.name[..end]).unwrap_or("")
    }

    /// Decoded section kind, `None` for unknown wire values.
    #[must_use]
    pub fn section_kind(&self) -> Option<SectionKind> {
        SectionKind::from_raw(self.kind.get())
    }
}

// The format is defined in bytes; keep the Rust view honest.
const _: () = {
    assert!(core::mem::size_of::<ZImgHeader>() == 40);
    assert!(core::mem::size_of::<ZImgSection>() == 28);
};

/// Errors produced while parsing an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZimgError {
    /// The buffer ends before the header or section table does.
    Truncated,
    /// The magic number does not match.
    BadMagic,
    /// The format version is not supported.
    UnsupportedVersion,
    /// `header_size` is smaller than the header itself.
    MalformedHeader,
}

impl fmt::Display for ZimgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "image truncated"),
            Self::BadMagic => write!(f, "bad image magic"),
            Self::UnsupportedVersion => write!(f, "unsupported image version"),
            Self::MalformedHeader => write!(f, "malformed image header"),
        }
    }
}

/// A parsed view over an image buffer.
#[derive(Debug, Clone, Copy)]
pub struct ZImg<'a> {
    header: &'a ZImgHeader,
    sections: &'a [ZImgSection],
}

impl<'a> ZImg<'a> {
    /// Validate and parse the header and section table of `image`.
    ///
    /// Section payloads are not touched; callers slice them out of the
    /// image via [`ZImgSection::file_offset`] when placing them.
    pub fn parse(image: &'a [u8]) -> Result<Self, ZimgError> {
        let (header, _) =
            ZImgHeader::ref_from_prefix(image).map_err(|_| ZimgError::Truncated)?;

        if header.magic.get() != ZIMG_MAGIC {
            return Err(ZimgError::BadMagic);
        }
        if header.version.get() != ZIMG_VERSION {
            return Err(ZimgError::UnsupportedVersion);
        }

        let table_off = header.header_size.get() as usize;
        if table_off < core::mem::size_of::<ZImgHeader>() {
            return Err(ZimgError::MalformedHeader);
        }

        let count = header.section_count.get() as usize;
        let table = image.get(table_off..).ok_or(ZimgError::Truncated)?;
        let (sections, _) = <[ZImgSection]>::ref_from_prefix_with_elems(table, count)
            .map_err(|_| ZimgError::Truncated)?;

        Ok(Self { header, sections })
    }

    /// The image header.
    #[inline]
    #[must_use]
    pub fn header(&self) -> &ZImgHeader {
        self.header
    }

    /// The section table.
    #[inline]
    #[must_use]
    pub fn sections(&self) -> &'a [ZImgSection] {
        self.sections
    }

    /// Find the first section of the given kind.
    #[must_use]
    pub fn section_of_kind(&self, kind: SectionKind) -> Option<&'a ZImgSection> {
        self.sections
            .iter()
            .find(|s| s.section_kind() == Some(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    fn sample_image() -> Vec<u8> {
        let header = ZImgHeader {
            magic: U32::new(ZIMG_MAGIC),
            version: U32::new(ZIMG_VERSION),
            header_size: U32::new(40),
            section_count: U32::new(2),
            root_entry_off: U64::new(0x40),
            config_phys: U64::new(0x2000),
            memory_required: U64::new(64 * 1024),
        };
        let root = ZImgSection {
            name: *b"root\0\0\0\0",
            kind: U32::new(SectionKind::Root as u32),
            file_offset: U32::new(100),
            dest_phys_addr: U64::new(0x1000),
            size: U32::new(4096),
        };
        let cfg = ZImgSection {
            name: *b"config\0\0",
            kind: U32::new(SectionKind::Config as u32),
            file_offset: U32::new(4196),
            dest_phys_addr: U64::new(0x2000),
            size: U32::new(128),
        };

        let mut image = Vec::new();
        image.extend_from_slice(header.as_bytes());
        image.extend_from_slice(root.as_bytes());
        image.extend_from_slice(cfg.as_bytes());
        image
    }

    #[test]
    fn test_parse_valid_image() {
        let image = sample_image();
        let img = ZImg::parse(&image).unwrap();
        assert_eq!(img.header().section_count.get(), 2);
        assert_eq!(img.sections().len(), 2);
        assert_eq!(img.sections()[0].name(), "root");
        assert_eq!(img.sections()[1].section_kind(), Some(SectionKind::Config));

        let root = img.section_of_kind(SectionKind::Root).unwrap();
        assert_eq!(root.dest_phys_addr.get(), 0x1000);
    }

    #[test]
    fn test_bad_magic() {
        let mut image = sample_image();
        image[0] ^= 0xFF;
        assert_eq!(ZImg::parse(&image).unwrap_err(), ZimgError::BadMagic);
    }

    #[test]
    fn test_truncated_section_table() {
        let mut image = sample_image();
        image.truncate(40 + 28); // second record missing
        assert_eq!(ZImg::parse(&image).unwrap_err(), ZimgError::Truncated);
    }

    #[test]
    fn test_header_too_short() {
        assert_eq!(ZImg::parse(&[0u8; 10]).unwrap_err(), ZimgError::Truncated);
    }
}
