//! Unpack packets.
//!
//! An unpack code is laid out as
//!
//! ```text
//! immediate: bits 0-8   VU memory address, in 8-byte units
//!            bit 14     sign flag
//!            bit 15     flag (address is relative to the VU double buffer)
//! count:                number of entries
//! command:   bits 0-1   element format
//!            bits 2-3   element count - 1
//!            bit 4      write mask enabled
//! ```
//!
//! followed by `count` entries of `element count` elements each, padded to
//! a multiple of four bytes.

use cgmath::{Vector2, Vector3, Vector4};
use crate::errors::{malformed, Result};
use crate::io::writer::Writer;
use crate::util::align_up;
use crate::util::bits::BitField;
use crate::util::cur::Cur;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Format {
    Float,
    Short,
    Byte,
    Rgba5a1,
}

impl Format {
    pub fn from_bits(x: u8) -> Format {
        match x & 3 {
            0 => Format::Float,
            1 => Format::Short,
            2 => Format::Byte,
            _ => Format::Rgba5a1,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Format::Float => 0,
            Format::Short => 1,
            Format::Byte => 2,
            Format::Rgba5a1 => 3,
        }
    }

    /// Size of one element in bytes.
    pub fn element_size(self) -> usize {
        match self {
            Format::Float => 4,
            Format::Short | Format::Rgba5a1 => 2,
            Format::Byte => 1,
        }
    }
}

/// Decoded packet payload, flattened (entry-major).
#[derive(Debug, Clone, PartialEq)]
pub enum Elements {
    F32(Vec<f32>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I8(Vec<i8>),
    U8(Vec<u8>),
}

impl Elements {
    pub fn len(&self) -> usize {
        match *self {
            Elements::F32(ref v) => v.len(),
            Elements::I16(ref v) => v.len(),
            Elements::U16(ref v) => v.len(),
            Elements::I8(ref v) => v.len(),
            Elements::U8(ref v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// VU memory address in 8-byte units.
    pub address: u16,
    pub signed: bool,
    pub flag: bool,
    pub masked: bool,
    pub format: Format,
    /// Elements per entry, 1 to 4.
    pub element_count: u8,
    /// Number of entries.
    pub count: u8,
    pub elements: Elements,
}

impl Packet {
    /// VU memory address in bytes.
    pub fn address_bytes(&self) -> usize {
        self.address as usize * 8
    }

    pub fn payload_size(&self) -> usize {
        align_up(self.count as usize * self.element_count as usize * self.format.element_size(), 4)
    }

    /// Reads the packet's payload. The 4-byte code has already been read.
    pub(crate) fn read_rest(cur: &mut Cur, immediate: u16, count: u8, cmd: u8) -> Result<Packet> {
        let address = immediate.bits(0, 9);
        let signed = immediate.bits(14, 15) != 0;
        let flag = immediate.bits(15, 16) != 0;
        let masked = cmd.bits(4, 5) != 0;
        let format = Format::from_bits(cmd.bits(0, 2));
        let element_count = cmd.bits(2, 4) + 1;

        let n = count as usize * element_count as usize;
        let start = cur.pos();
        let elements = match format {
            Format::Float => Elements::F32(cur.next_vec::<f32>(n)?),
            Format::Short | Format::Rgba5a1 => {
                if signed {
                    Elements::I16(cur.next_vec::<i16>(n)?)
                } else {
                    Elements::U16(cur.next_vec::<u16>(n)?)
                }
            }
            Format::Byte => {
                if signed {
                    Elements::I8(cur.next_vec::<i8>(n)?)
                } else {
                    Elements::U8(cur.next_vec::<u8>(n)?)
                }
            }
        };
        let end = start + align_up(cur.pos() - start, 4);
        cur.jump_to(end)?;

        Ok(Packet { address, signed, flag, masked, format, element_count, count, elements })
    }

    pub fn immediate(&self) -> u16 {
        0u16
            .with_bits(0, 9, self.address)
            .with_bits(14, 15, self.signed as u16)
            .with_bits(15, 16, self.flag as u16)
    }

    pub fn command_byte(&self) -> u8 {
        0x60u8
            .with_bits(0, 2, self.format.bits())
            .with_bits(2, 4, self.element_count - 1)
            .with_bits(4, 5, self.masked as u8)
    }

    pub fn write(&self, w: &mut Writer) {
        w.put(self.immediate());
        w.put(self.count);
        w.put(self.command_byte());
        let start = w.pos();
        match self.elements {
            Elements::F32(ref v) => w.put_all(v),
            Elements::I16(ref v) => w.put_all(v),
            Elements::U16(ref v) => w.put_all(v),
            Elements::I8(ref v) => w.put_all(v),
            Elements::U8(ref v) => w.put_all(v),
        }
        let len = w.pos() - start;
        w.skip(align_up(len, 4) - len);
    }

    /// Checks the packet against the expected shape. `None` accepts any
    /// address or count.
    pub fn ensure(
        &self,
        address: Option<u16>,
        signed: bool,
        flag: bool,
        count: Option<usize>,
        format: Format,
        element_count: u8,
    ) -> Result<()> {
        if let Some(address) = address {
            if self.address != address {
                return Err(malformed(format!(
                    "packet address is not {:#x} (found {:#x})", address, self.address,
                )));
            }
        }
        if self.signed != signed {
            return Err(malformed(format!("packet sign flag is not {}", signed)));
        }
        if self.flag != flag {
            return Err(malformed(format!("packet flag is not {}", flag)));
        }
        if let Some(count) = count {
            if self.count as usize != count {
                return Err(malformed(format!(
                    "packet count is not {} (found {})", count, self.count,
                )));
            }
        }
        if self.format != format {
            return Err(malformed(format!(
                "packet element format is not {:?} (found {:?})", format, self.format,
            )));
        }
        if self.element_count != element_count {
            return Err(malformed(format!(
                "packet element count is not {} (found {})", element_count, self.element_count,
            )));
        }
        Ok(())
    }

    pub fn f32s(&self) -> Result<&[f32]> {
        match self.elements {
            Elements::F32(ref v) => Ok(v),
            _ => Err(malformed("expected float elements")),
        }
    }

    pub fn i16s(&self) -> Result<&[i16]> {
        match self.elements {
            Elements::I16(ref v) => Ok(v),
            _ => Err(malformed("expected signed short elements")),
        }
    }

    pub fn i8s(&self) -> Result<&[i8]> {
        match self.elements {
            Elements::I8(ref v) => Ok(v),
            _ => Err(malformed("expected signed byte elements")),
        }
    }

    pub fn vec2s(&self) -> Result<Vec<Vector2<f32>>> {
        check_stream!(self.element_count == 2)?;
        Ok(self.f32s()?.chunks(2).map(|c| Vector2::new(c[0], c[1])).collect())
    }

    pub fn vec3s(&self) -> Result<Vec<Vector3<f32>>> {
        check_stream!(self.element_count == 3)?;
        Ok(self.f32s()?.chunks(3).map(|c| Vector3::new(c[0], c[1], c[2])).collect())
    }

    pub fn vec4s(&self) -> Result<Vec<Vector4<f32>>> {
        check_stream!(self.element_count == 4)?;
        Ok(self.f32s()?.chunks(4).map(|c| Vector4::new(c[0], c[1], c[2], c[3])).collect())
    }
}

#[cfg(test)]
fn parse(bytes: &[u8]) -> Packet {
    let mut cur = Cur::new(bytes);
    let immediate = cur.next::<u16>().unwrap();
    let count = cur.next::<u8>().unwrap();
    let cmd = cur.next::<u8>().unwrap();
    Packet::read_rest(&mut cur, immediate, count, cmd).unwrap()
}

#[test]
fn test_decode_immediate() {
    let mut bytes = vec![0xff, 0x01, 0x01, 0x6c];
    for x in &[1.0f32, 2.0, 3.0, 4.0] {
        bytes.extend_from_slice(&x.to_le_bytes());
    }
    let p = parse(&bytes);
    assert_eq!(p.address, 511);
    assert_eq!(p.address_bytes(), 511 * 8);
    assert!(!p.signed);
    assert!(!p.flag);
    assert_eq!(p.format, Format::Float);
    assert_eq!(p.element_count, 4);
    assert_eq!(p.vec4s().unwrap(), vec![Vector4::new(1.0, 2.0, 3.0, 4.0)]);
}

#[test]
fn test_ensure_element_count() {
    let p = Packet {
        address: 0,
        signed: true,
        flag: true,
        masked: false,
        format: Format::Float,
        element_count: 4,
        count: 2,
        elements: Elements::F32(vec![0.0; 8]),
    };
    assert!(p.ensure(None, true, true, Some(2), Format::Float, 4).is_ok());
    let err = p.ensure(None, true, true, Some(2), Format::Float, 3).unwrap_err();
    assert!(err.to_string().contains("element count"));
    assert!(p.ensure(Some(1), true, true, None, Format::Float, 4).is_err());
    assert!(p.ensure(None, false, true, None, Format::Float, 4).is_err());
    assert!(p.ensure(None, true, true, Some(3), Format::Float, 4).is_err());
}

#[test]
fn test_short_payload_padding() {
    // 3 unsigned shorts, padded to 8 bytes
    let p = Packet {
        address: 2,
        signed: false,
        flag: false,
        masked: false,
        format: Format::Short,
        element_count: 1,
        count: 3,
        elements: Elements::U16(vec![1, 2, 3]),
    };
    let mut w = Writer::new();
    p.write(&mut w);
    let bytes = w.into_bytes();
    assert_eq!(bytes.len(), 4 + 8);
    assert_eq!(&bytes[..4], &[2, 0, 3, 0x61]);
    assert_eq!(parse(&bytes), p);
}
