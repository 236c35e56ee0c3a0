//! Resource headers, file types and identifiers.

use crate::errors::Result;
use crate::io::writer::Writer;
use crate::util::cur::Cur;

/// Resource file types, stored in the first byte of a short header.
pub mod file_type {
    pub const DEFAULT: u8 = 1;
    pub const TEXTURE: u8 = 2;
    pub const MODEL: u8 = 6;
    pub const MOTION_PACK: u8 = 8;
    pub const TEXTURE_PACK: u8 = 9;
    pub const FIELD_RESOURCE: u8 = 21;
    pub const MODEL_PACK_END: u8 = 0xff;
}

/// Resource identifiers. Most are four-character stamps read as a
/// little-endian u32.
pub mod ident {
    /// "PIB0"
    pub const MODEL_PACK_INFO: u32 = 0x30424950;
    /// "TXP0"
    pub const TEXTURE_PACK: u32 = 0x30505854;
    /// "TMX0"
    pub const TEXTURE: u32 = 0x30584d54;
    /// "MD00"
    pub const MODEL: u32 = 0x3030444d;
    /// "MT00"
    pub const MOTION_PACK: u32 = 0x3030544d;
    /// "END0"
    pub const MODEL_PACK_END: u32 = 0x30444e45;
    /// "D3P\0"
    pub const PARTICLE: u32 = 0x00503344;
    /// "IPU\0"
    pub const VIDEO: u32 = 0x00555049;
    /// "FLD1"
    pub const FIELD_SCENE: u32 = 0x31444c46;
    /// "FLD2"
    pub const FIELD_RESOURCE2: u32 = 0x32444c46;
}

/// Printable form of an identifier, eg. `MD00`.
pub fn stamp(identifier: u32) -> String {
    identifier.to_le_bytes().iter()
        .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
        .collect()
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub file_type: u8,
    pub identifier: u32,
}

pub const SHORT_HEADER_SIZE: usize = 16;
pub const FIELD_HEADER_SIZE: usize = 20;

/// The 16-byte header in front of most resources.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ResourceHeader {
    pub file_type: u8,
    pub compressed: bool,
    pub user_id: u16,
    /// Size of the resource including this header, excluding padding.
    pub size: u32,
    pub identifier: u32,
    pub memory_size: u32,
}

impl ResourceHeader {
    pub fn read(cur: &mut Cur) -> Result<ResourceHeader> {
        fields!(cur, header {
            file_type: u8,
            compressed: u8,
            user_id: u16,
            size: u32,
            identifier: u32,
            memory_size: u32,
        });
        if compressed != 0 {
            warn!("resource {} is flagged as compressed", stamp(identifier));
        }
        Ok(ResourceHeader {
            file_type,
            compressed: compressed != 0,
            user_id,
            size,
            identifier,
            memory_size,
        })
    }

    pub fn write(&self, w: &mut Writer) {
        w.put(self.file_type);
        w.put(self.compressed as u8);
        w.put(self.user_id);
        w.put(self.size);
        w.put(self.identifier);
        w.put(self.memory_size);
    }

    pub fn descriptor(&self) -> ResourceDescriptor {
        ResourceDescriptor { file_type: self.file_type, identifier: self.identifier }
    }
}

/// The 20-byte header of field resources. The relocation table follows the
/// data.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FieldResourceHeader {
    pub file_type: i32,
    pub identifier: u32,
    /// Size of header and data, ie. the offset of the relocation table.
    pub data_size: u32,
    pub relocation_table_offset: u32,
    pub relocation_table_size: u32,
}

impl FieldResourceHeader {
    pub fn read(cur: &mut Cur) -> Result<FieldResourceHeader> {
        fields!(cur, field_header {
            file_type: i32,
            identifier: u32,
            data_size: u32,
            relocation_table_offset: u32,
            relocation_table_size: u32,
        });
        Ok(FieldResourceHeader {
            file_type,
            identifier,
            data_size,
            relocation_table_offset,
            relocation_table_size,
        })
    }
}

#[test]
fn test_stamps() {
    assert_eq!(stamp(ident::MODEL), "MD00");
    assert_eq!(stamp(ident::MODEL_PACK_INFO), "PIB0");
    assert_eq!(stamp(ident::PARTICLE), "D3P.");
    assert_eq!(stamp(ident::FIELD_SCENE), "FLD1");
}

#[test]
fn test_short_header() {
    let h = ResourceHeader {
        file_type: file_type::MODEL,
        compressed: false,
        user_id: 3,
        size: 0x120,
        identifier: ident::MODEL,
        memory_size: 0,
    };
    let mut w = Writer::new();
    h.write(&mut w);
    let bytes = w.into_bytes();
    assert_eq!(bytes.len(), SHORT_HEADER_SIZE);
    assert_eq!(&bytes[8..12], b"MD00");
    let mut cur = Cur::new(&bytes);
    assert_eq!(ResourceHeader::read(&mut cur).unwrap(), h);
}
