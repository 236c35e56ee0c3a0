//! Building VIF code streams.
//!
//! The builder emulates the VU memory address the engine's microprograms
//! expect each unpack to target. Packets without an explicit address go to
//! the next slot of a small ring (0xc0 bytes apart); packets with an
//! explicit address move the cursor there.

use cgmath::{Vector2, Vector3, Vector4};
use crate::errors::{unsupported, Result};
use crate::io::writer::Writer;
use crate::vif::code::{Command, VifCode};
use crate::vif::packet::{Elements, Format, Packet};
use crate::vif::parser::VifTag;

const ADDRESS_STEP: usize = 0xc0;
const ADDRESS_WRAP: usize = 0x240;

/// Payload for an unpack packet.
#[derive(Debug, Clone, PartialEq)]
pub struct UnpackData {
    format: Format,
    signed: bool,
    element_count: u8,
    elements: Elements,
}

impl UnpackData {
    pub fn f32s(element_count: u8, v: Vec<f32>) -> UnpackData {
        UnpackData { format: Format::Float, signed: true, element_count, elements: Elements::F32(v) }
    }

    pub fn vec2s(v: &[Vector2<f32>]) -> UnpackData {
        UnpackData::f32s(2, v.iter().flat_map(|v| vec![v.x, v.y]).collect())
    }

    pub fn vec3s(v: &[Vector3<f32>]) -> UnpackData {
        UnpackData::f32s(3, v.iter().flat_map(|v| vec![v.x, v.y, v.z]).collect())
    }

    pub fn vec4s(v: &[Vector4<f32>]) -> UnpackData {
        UnpackData::f32s(4, v.iter().flat_map(|v| vec![v.x, v.y, v.z, v.w]).collect())
    }

    pub fn i16s(element_count: u8, v: Vec<i16>) -> UnpackData {
        UnpackData { format: Format::Short, signed: true, element_count, elements: Elements::I16(v) }
    }

    pub fn u16s(element_count: u8, v: Vec<u16>) -> UnpackData {
        UnpackData { format: Format::Short, signed: false, element_count, elements: Elements::U16(v) }
    }

    pub fn i8s(element_count: u8, v: Vec<i8>) -> UnpackData {
        UnpackData { format: Format::Byte, signed: true, element_count, elements: Elements::I8(v) }
    }

    pub fn u8s(element_count: u8, v: Vec<u8>) -> UnpackData {
        UnpackData { format: Format::Byte, signed: false, element_count, elements: Elements::U8(v) }
    }

    fn into_packet(self, address: usize, flag: bool) -> Result<Packet> {
        if self.element_count == 0 || self.element_count > 4 {
            return Err(unsupported(format!("{} elements per unpack entry", self.element_count)));
        }
        let count = self.elements.len() / self.element_count as usize;
        if count * self.element_count as usize != self.elements.len() {
            return Err(unsupported("unpack payload is not a whole number of entries"));
        }
        if count > 0xff {
            return Err(unsupported(format!("{} entries in one unpack packet", count)));
        }
        if address % 8 != 0 || address / 8 > 0x1ff {
            return Err(unsupported(format!("unpack address {:#x}", address)));
        }
        Ok(Packet {
            address: (address / 8) as u16,
            signed: self.signed,
            flag,
            masked: false,
            format: self.format,
            element_count: self.element_count,
            count: count as u8,
            elements: self.elements,
        })
    }
}

#[derive(Debug, Default)]
pub struct StreamBuilder {
    tags: Vec<VifTag>,
    /// Emulated VU memory address in bytes.
    pub address: usize,
}

impl StreamBuilder {
    pub fn new() -> StreamBuilder {
        StreamBuilder { tags: vec![], address: 0 }
    }

    pub fn tags(&self) -> &[VifTag] {
        &self.tags
    }

    /// Header of a flat batch: four shorts at address 0, the last two
    /// holding a 32-bit value.
    pub fn unpack_header(&mut self, v1: i16, v2: i16, v3: u32) -> Result<()> {
        let data = UnpackData::i16s(4, vec![v1, v2, v3 as u16 as i16, (v3 >> 16) as u16 as i16]);
        self.tags.push(VifTag::Unpack(data.into_packet(0, true)?));
        Ok(())
    }

    /// Header of a skinned batch: two shorts at address 0xff.
    pub fn unpack_header2(&mut self, v1: i16, v2: i16) -> Result<()> {
        let data = UnpackData::i16s(2, vec![v1, v2]);
        self.tags.push(VifTag::Unpack(data.into_packet(0xff * 8, false)?));
        Ok(())
    }

    /// Unpacks to the next address of the ring.
    pub fn unpack(&mut self, data: UnpackData) -> Result<()> {
        let packet = data.into_packet(self.address, false)?;
        self.address += ADDRESS_STEP;
        if self.address > ADDRESS_WRAP {
            self.address = 0;
        }
        self.tags.push(VifTag::Unpack(packet));
        Ok(())
    }

    /// Unpacks to an explicit address (in bytes).
    pub fn unpack_at(&mut self, address: usize, data: UnpackData) -> Result<()> {
        self.address = address;
        let packet = data.into_packet(address, true)?;
        self.tags.push(VifTag::Unpack(packet));
        Ok(())
    }

    pub fn activate_micro(&mut self, id: u16) {
        self.tags.push(VifTag::Code(VifCode::new(id, 0, Command::ActMicro)));
    }

    pub fn continue_micro(&mut self) {
        self.tags.push(VifTag::Code(VifCode::new(0, 0, Command::CntMicro)));
    }

    pub fn flush_end(&mut self) {
        self.tags.push(VifTag::Code(VifCode::new(0, 0, Command::FlushEnd)));
        self.address = 0;
    }

    /// Writes the stream. Each FlushEnd is followed by padding to 16 bytes
    /// and so is the end of the stream.
    pub fn write(&self, w: &mut Writer) {
        for tag in &self.tags {
            tag.write(w);
            if tag.command() == Command::FlushEnd {
                w.align(16);
            }
        }
        w.align(16);
    }
}

#[cfg(test)]
use crate::util::cur::Cur;
#[cfg(test)]
use crate::vif::parser::VifParser;

#[test]
fn test_address_ring() {
    let mut vif = StreamBuilder::new();
    let mut addresses = vec![];
    for _ in 0..5 {
        vif.unpack(UnpackData::f32s(1, vec![0.0])).unwrap();
        match vif.tags().last() {
            Some(VifTag::Unpack(p)) => addresses.push(p.address),
            _ => panic!(),
        }
    }
    // 0, 0xc0, 0x180, 0x240, then past the wrap back to 0
    assert_eq!(addresses, vec![0, 0x18, 0x30, 0x48, 0]);

    vif.unpack_at(0x40, UnpackData::f32s(1, vec![0.0])).unwrap();
    assert_eq!(vif.address, 0x40);
    vif.flush_end();
    assert_eq!(vif.address, 0);
}

#[test]
fn test_stream_alignment() {
    let mut vif = StreamBuilder::new();
    vif.unpack_header2(1, 3).unwrap();
    vif.continue_micro();
    vif.flush_end();
    vif.unpack(UnpackData::vec3s(&[Vector3::new(1.0, 2.0, 3.0)])).unwrap();
    vif.activate_micro(0x16);

    let mut w = Writer::new();
    vif.write(&mut w);
    let bytes = w.into_bytes();
    // header 8 + cnt 4 + flush 4 = 16, then 16 + 4 rounded to 32
    assert_eq!(bytes.len(), 48);
    assert_eq!(&bytes[0..4], &[0xff, 0x40, 1, 0x65]);

    let tags: Vec<VifTag> = VifParser::new(&bytes).collect::<Result<_>>().unwrap();
    assert_eq!(tags.len(), 5 + 3); // three Nops of padding
    assert_eq!(&tags[..5], vif.tags());

    let mut cur = Cur::new(&bytes);
    cur.jump_to(16).unwrap();
    match crate::vif::parser::read_tag(&mut cur).unwrap() {
        VifTag::Unpack(p) => {
            p.ensure(Some(0), true, false, Some(1), Format::Float, 3).unwrap();
        }
        _ => panic!(),
    }
}

#[test]
fn test_unpack_limits() {
    let mut vif = StreamBuilder::new();
    assert!(vif.unpack(UnpackData::u8s(1, vec![0; 256])).is_err());
    assert!(vif.unpack_at(4, UnpackData::u8s(1, vec![0])).is_err());
    assert!(vif.unpack(UnpackData::u8s(3, vec![0; 4])).is_err());
}
