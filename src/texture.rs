//! Textures (TMX0) and texture packs (TXP0).
//!
//! Pixel and palette data are kept in their stored GS layout; only the TMX
//! descriptor is decoded.

use crate::errors::{malformed, unsupported, Result};
use crate::io::header::{file_type, ident, ResourceDescriptor, ResourceHeader, SHORT_HEADER_SIZE};
use crate::io::resource::{read_resource, write_resource, Resource};
use crate::io::writer::Writer;
use crate::util::align_up;
use crate::util::bits::BitField;
use crate::util::cur::Cur;

/// Size of the TMX descriptor following the resource header.
pub const TMX_DESCRIPTOR_SIZE: usize = 48;
pub const COMMENT_SIZE: usize = 28;

/// GS pixel storage formats.
pub mod pixel_format {
    pub const PSMCT32: u8 = 0x00;
    pub const PSMCT24: u8 = 0x01;
    pub const PSMCT16: u8 = 0x02;
    pub const PSMCT16S: u8 = 0x0a;
    pub const PSMT8: u8 = 0x13;
    pub const PSMT4: u8 = 0x14;
    pub const PSMT8H: u8 = 0x1b;
    pub const PSMT4HL: u8 = 0x24;
    pub const PSMT4HH: u8 = 0x2c;
    pub const PSMZ32: u8 = 0x30;
    pub const PSMZ24: u8 = 0x31;
    pub const PSMZ16: u8 = 0x32;
    pub const PSMZ16S: u8 = 0x3a;

    pub fn bits_per_pixel(fmt: u8) -> Option<usize> {
        Some(match fmt {
            PSMCT32 | PSMZ32 => 32,
            PSMCT24 | PSMZ24 => 24,
            PSMCT16 | PSMCT16S | PSMZ16 | PSMZ16S => 16,
            PSMT8 | PSMT8H => 8,
            PSMT4 | PSMT4HL | PSMT4HH => 4,
            _ => return None,
        })
    }

    pub fn is_indexed(fmt: u8) -> bool {
        match fmt {
            PSMT8 | PSMT8H | PSMT4 | PSMT4HL | PSMT4HH => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub user_id: u16,
    pub palette_count: u8,
    pub palette_format: u8,
    pub width: u16,
    pub height: u16,
    pub pixel_format: u8,
    pub mip_count: u8,
    pub mip_kl: u16,
    /// Wrap mode for x in the low nibble, y in the high one.
    pub wrap_modes: u8,
    pub user_texture_id: i32,
    pub user_clut_id: i32,
    /// Stored as is; bytes after the first NUL are often leftovers from the
    /// authoring tool.
    pub comment: [u8; COMMENT_SIZE],
    /// Palettes followed by the pixels of every mip level.
    pub data: Vec<u8>,
}

impl Texture {
    pub fn wrap_mode_x(&self) -> u8 {
        self.wrap_modes.bits(0, 4)
    }

    pub fn wrap_mode_y(&self) -> u8 {
        self.wrap_modes.bits(4, 8)
    }

    pub fn set_wrap_modes(&mut self, x: u8, y: u8) {
        self.wrap_modes = self.wrap_modes.with_bits(0, 4, x).with_bits(4, 8, y);
    }

    /// The comment up to its first NUL, read as Latin-1.
    pub fn comment_text(&self) -> String {
        self.comment.iter()
            .take_while(|&&b| b != 0)
            .map(|&b| b as char)
            .collect()
    }

    /// Replaces the comment with `text` in Latin-1, zero filling the rest.
    pub fn set_comment(&mut self, text: &str) -> Result<()> {
        let mut comment = [0; COMMENT_SIZE];
        let mut len = 0;
        for c in text.chars() {
            if c as u32 > 0xff {
                return Err(unsupported(format!("character {:?} in texture comment", c)));
            }
            if len == COMMENT_SIZE {
                return Err(unsupported(format!(
                    "texture comment {:?} is longer than {} bytes", text, COMMENT_SIZE,
                )));
            }
            comment[len] = c as u8;
            len += 1;
        }
        self.comment = comment;
        Ok(())
    }

    pub fn is_indexed(&self) -> bool {
        pixel_format::is_indexed(self.pixel_format)
    }

    /// Colors per palette: 16 for 4-bit indices, otherwise 256.
    pub fn palette_color_count(&self) -> usize {
        if pixel_format::bits_per_pixel(self.pixel_format) == Some(4) { 16 } else { 256 }
    }

    /// Data size implied by the descriptor, when the formats are known.
    pub fn expected_data_size(&self) -> Option<usize> {
        let mut size = 0;
        if self.is_indexed() {
            let bpp = pixel_format::bits_per_pixel(self.palette_format)?;
            size += self.palette_count as usize * self.palette_color_count() * bpp / 8;
        }
        let bpp = pixel_format::bits_per_pixel(self.pixel_format)?;
        for level in 0..=self.mip_count as u32 {
            let w = (self.width as usize >> level).max(1);
            let h = (self.height as usize >> level).max(1);
            size += w * h * bpp / 8;
        }
        Some(size)
    }
}

impl Resource for Texture {
    const DESCRIPTOR: ResourceDescriptor = ResourceDescriptor {
        file_type: file_type::TEXTURE,
        identifier: ident::TEXTURE,
    };

    fn read_content(cur: &mut Cur, header: &ResourceHeader) -> Result<Texture> {
        fields!(cur, tmx {
            palette_count: u8,
            palette_format: u8,
            width: u16,
            height: u16,
            pixel_format: u8,
            mip_count: u8,
            mip_kl: u16,
        });
        cur.expect(0u8, "tmx.reserved")?;
        fields!(cur, tmx {
            wrap_modes: u8,
            user_texture_id: i32,
            user_clut_id: i32,
            comment_bytes: [u8; COMMENT_SIZE],
        });
        let mut comment = [0; COMMENT_SIZE];
        comment.copy_from_slice(comment_bytes);

        let header_size = SHORT_HEADER_SIZE + TMX_DESCRIPTOR_SIZE;
        if (header.size as usize) < header_size {
            return Err(malformed(format!("texture size {:#x} is smaller than its header", header.size)));
        }
        let data = cur.next_n_u8s(header.size as usize - header_size)?.to_vec();

        let tex = Texture {
            user_id: header.user_id,
            palette_count,
            palette_format,
            width,
            height,
            pixel_format,
            mip_count,
            mip_kl,
            wrap_modes,
            user_texture_id,
            user_clut_id,
            comment,
            data,
        };
        if let Some(expected) = tex.expected_data_size() {
            if expected != tex.data.len() {
                debug!("texture {}x{} has {:#x} bytes of data, expected {:#x}",
                    width, height, tex.data.len(), expected);
            }
        }
        Ok(tex)
    }

    fn write_content<'a>(&'a self, w: &mut Writer<'a>) -> Result<()> {
        w.put(self.palette_count);
        w.put(self.palette_format);
        w.put(self.width);
        w.put(self.height);
        w.put(self.pixel_format);
        w.put(self.mip_count);
        w.put(self.mip_kl);
        w.put(0u8);
        w.put(self.wrap_modes);
        w.put(self.user_texture_id);
        w.put(self.user_clut_id);
        w.put_bytes(&self.comment);
        w.put_bytes(&self.data);
        Ok(())
    }

    fn user_id(&self) -> u16 { self.user_id }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TexturePack {
    pub user_id: u16,
    pub textures: Vec<Texture>,
}

impl TexturePack {
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

impl Resource for TexturePack {
    const DESCRIPTOR: ResourceDescriptor = ResourceDescriptor {
        file_type: file_type::TEXTURE_PACK,
        identifier: ident::TEXTURE_PACK,
    };

    /// Some packs have broken offsets and sizes, so only the first offset is
    /// used; every later texture starts at the 64-aligned end of the one
    /// before it. The cursor is left at the end of the last texture, or for
    /// an empty pack at its padded declared end.
    fn read_content(cur: &mut Cur, header: &ResourceHeader) -> Result<TexturePack> {
        let count = cur.next::<i32>()?;
        if count <= 0 {
            let end = align_up(cur.base() + header.size as usize, 64);
            cur.jump_to(end.min(cur.len()))?;
            return Ok(TexturePack { user_id: header.user_id, textures: vec![] });
        }

        let first_offset = cur.next::<u32>()?;
        let pos = cur.resolve(first_offset)?;
        cur.jump_to(pos)?;
        let mut textures = Vec::with_capacity(count as usize);
        for _ in 0..count {
            textures.push(read_resource::<Texture>(cur, None)?);
            cur.align(64)?;
        }
        Ok(TexturePack { user_id: header.user_id, textures })
    }

    fn write_content<'a>(&'a self, w: &mut Writer<'a>) -> Result<()> {
        w.put(self.textures.len() as i32);
        for texture in &self.textures {
            w.schedule_offset(64, move |w| write_resource(w, texture));
        }
        w.run_scheduled_writes()
    }

    fn user_id(&self) -> u16 { self.user_id }
}

#[cfg(test)]
pub fn sample_texture(user_texture_id: i32) -> Texture {
    Texture {
        user_id: 0,
        palette_count: 1,
        palette_format: pixel_format::PSMCT32,
        width: 8,
        height: 4,
        pixel_format: pixel_format::PSMT4,
        mip_count: 0,
        mip_kl: 0xffec,
        wrap_modes: 0xff,
        user_texture_id,
        user_clut_id: 0,
        comment: *b"tex\0leftover\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0",
        data: (0..16 * 4 + 16).map(|i| i as u8).collect(),
    }
}

#[test]
fn test_texture_round_trip() {
    let tex = sample_texture(3);
    assert_eq!(tex.expected_data_size(), Some(tex.data.len()));
    let mut w = Writer::new();
    write_resource(&mut w, &tex).unwrap();
    let bytes = w.into_bytes();
    assert_eq!(bytes.len(), 128 + 64);
    assert_eq!(&bytes[16 + 20..16 + 23], b"tex");

    let mut cur = Cur::new(&bytes);
    let tex2: Texture = read_resource(&mut cur, None).unwrap();
    assert_eq!(tex2, tex);
    assert_eq!(tex2.wrap_mode_x(), 0xf);
}

#[test]
fn test_comment_keeps_bytes_after_nul() {
    let tex = sample_texture(0);
    let mut w = Writer::new();
    write_resource(&mut w, &tex).unwrap();
    let bytes = w.into_bytes();
    assert_eq!(&bytes[16 + 20..16 + 20 + COMMENT_SIZE], &tex.comment[..]);

    let mut cur = Cur::new(&bytes);
    let tex2: Texture = read_resource(&mut cur, None).unwrap();
    assert_eq!(tex2.comment_text(), "tex");
    assert_eq!(&tex2.comment[4..12], b"leftover");

    let mut tex3 = tex2.clone();
    tex3.set_comment("wall \u{e9}").unwrap();
    assert_eq!(tex3.comment_text(), "wall \u{e9}");
    assert_eq!(&tex3.comment[4..8], &[b' ', 0xe9, 0, 0]);
    assert!(tex3.set_comment("\u{3042}").is_err());
    assert!(tex3.set_comment(&"x".repeat(COMMENT_SIZE + 1)).is_err());
    tex3.set_comment(&"x".repeat(COMMENT_SIZE)).unwrap();
    assert_eq!(tex3.comment, [b'x'; COMMENT_SIZE]);
}

#[test]
fn test_wrap_modes() {
    let mut tex = sample_texture(0);
    tex.set_wrap_modes(1, 2);
    assert_eq!(tex.wrap_modes, 0x21);
    assert_eq!((tex.wrap_mode_x(), tex.wrap_mode_y()), (1, 2));
}

#[test]
fn test_pack_is_read_by_structure() {
    let pack = TexturePack {
        user_id: 0,
        textures: vec![sample_texture(0), sample_texture(1), sample_texture(2)],
    };
    let mut w = Writer::new();
    write_resource(&mut w, &pack).unwrap();
    let mut bytes = w.into_bytes();

    let mut cur = Cur::new(&bytes);
    let pack2: TexturePack = read_resource(&mut cur, None).unwrap();
    assert_eq!(pack2, pack);
    assert_eq!(cur.pos(), bytes.len());

    // garbage in every offset but the first
    for i in 1..3 {
        let at = 16 + 4 + 4 * i;
        bytes[at..at + 4].copy_from_slice(&[0xff; 4]);
    }
    let mut cur = Cur::new(&bytes);
    let pack3: TexturePack = read_resource(&mut cur, None).unwrap();
    assert_eq!(pack3, pack);
}
