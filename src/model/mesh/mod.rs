//! Meshes.
//!
//! A mesh list stores each mesh as an i32 type tag followed by the mesh
//! body. The layout of the body depends on the tag:
//!
//! | tag | layout |
//! |-----|--------|
//! | 1   | VIF batches, unweighted |
//! | 2   | VIF batches, one node batch per weighting node |
//! | 3   | morphers (recognized, not supported) |
//! | 4   | flat arrays, unweighted |
//! | 5   | flat arrays with morph shapes |
//! | 6   | unknown (recognized, not supported) |
//! | 7   | VIF batches, weighted, one shared stream |
//! | 8   | VIF batches, unweighted, one shared stream |

pub mod type1;
pub mod type2;
pub mod type4;
pub mod type5;
pub mod type7;
pub mod type8;

use crate::errors::{unsupported, ErrorKind, Result};
use crate::io::writer::{Writable, Writer};
use crate::util::cur::Cur;
use crate::util::view::Viewable;
use crate::vif::Command;

pub use self::type1::{MeshType1, MeshType1Batch};
pub use self::type2::{MeshType2, MeshType2Batch, MeshType2NodeBatch};
pub use self::type4::MeshType4;
pub use self::type5::{MeshType5, MeshType5NodeBatch, MorphShape};
pub use self::type7::{MeshType7, MeshType7Batch, MeshType7NodeBatch};
pub use self::type8::{MeshType8, MeshType8Batch};

bitflags! {
    /// Mesh and batch flag word. Most bits have no known meaning but are
    /// named so that every word survives a round trip.
    pub struct MeshFlags: u32 {
        const BIT0 = 1 << 0;
        const BIT1 = 1 << 1;
        const BIT2 = 1 << 2;
        const SMOOTH_SHADING = 1 << 3;
        const TEX_COORD = 1 << 4;
        const BIT5 = 1 << 5;
        const BIT6 = 1 << 6;
        const BIT7 = 1 << 7;
        const BIT8 = 1 << 8;
        const BIT9 = 1 << 9;
        const BIT10 = 1 << 10;
        const COLOR = 1 << 11;
        const TEX_COORD2 = 1 << 12;
        const BIT13 = 1 << 13;
        const BIT14 = 1 << 14;
        const BIT15 = 1 << 15;
        const BIT16 = 1 << 16;
        const BIT17 = 1 << 17;
        const BIT18 = 1 << 18;
        const BIT19 = 1 << 19;
        const BIT20 = 1 << 20;
        const REQUIRED_FOR_FIELD = 1 << 21;
        const BIT22 = 1 << 22;
        const NORMAL = 1 << 23;
        const FIELD_TEXTURE = 1 << 24;
        const BIT25 = 1 << 25;
        const BIT26 = 1 << 26;
        const WEIGHTS = 1 << 27;
        const BIT28 = 1 << 28;
        const BIT29 = 1 << 29;
        const BIT30 = 1 << 30;
        const BIT31 = 1 << 31;
    }
}

impl MeshFlags {
    /// Bits announcing optional vertex arrays.
    pub fn vertex_data() -> MeshFlags {
        MeshFlags::NORMAL | MeshFlags::TEX_COORD | MeshFlags::TEX_COORD2 | MeshFlags::COLOR
    }

    /// Sets or clears `flag` depending on whether the data it announces is
    /// present.
    pub fn with_data(mut self, flag: MeshFlags, present: bool) -> MeshFlags {
        self.set(flag, present);
        self
    }

    pub fn lo(self) -> i16 {
        self.bits() as u16 as i16
    }

    pub fn hi(self) -> i16 {
        (self.bits() >> 16) as u16 as i16
    }

    pub fn from_halves(lo: i16, hi: i16) -> MeshFlags {
        MeshFlags::from_bits_truncate(lo as u16 as u32 | (hi as u16 as u32) << 16)
    }
}

/// Which microprogram draws a type 1 or type 2 batch.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RenderMode {
    /// Microprogram 0x0c.
    Mode1,
    /// Microprogram 0x10.
    Mode2,
}

impl RenderMode {
    pub fn from_program(id: u16) -> RenderMode {
        if id == 0x0c { RenderMode::Mode1 } else { RenderMode::Mode2 }
    }

    pub fn program(self) -> u16 {
        match self {
            RenderMode::Mode1 => 0x0c,
            RenderMode::Mode2 => 0x10,
        }
    }
}

impl Default for RenderMode {
    fn default() -> RenderMode { RenderMode::Mode1 }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Triangle {
    pub a: u16,
    pub b: u16,
    pub c: u16,
}

impl Triangle {
    pub fn new(a: u16, b: u16, c: u16) -> Triangle {
        Triangle { a, b, c }
    }

    pub fn max_index(&self) -> u16 {
        self.a.max(self.b).max(self.c)
    }
}

impl Viewable for Triangle {
    fn size() -> usize { 6 }
    fn view(buf: &[u8]) -> Triangle {
        Triangle {
            a: u16::view(&buf[0..2]),
            b: u16::view(&buf[2..4]),
            c: u16::view(&buf[4..6]),
        }
    }
}

impl Writable for Triangle {
    fn write_le(&self, out: &mut [u8]) {
        self.a.write_le(&mut out[0..2]);
        self.b.write_le(&mut out[2..4]);
        self.c.write_le(&mut out[4..6]);
    }
    fn size() -> usize { 6 }
}

/// Mesh type tags.
pub mod tag {
    pub const TYPE1: i32 = 1;
    pub const TYPE2: i32 = 2;
    pub const TYPE3: i32 = 3;
    pub const TYPE4: i32 = 4;
    pub const TYPE5: i32 = 5;
    pub const TYPE6: i32 = 6;
    pub const TYPE7: i32 = 7;
    pub const TYPE8: i32 = 8;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mesh {
    Type1(MeshType1),
    Type2(MeshType2),
    Type4(MeshType4),
    Type5(MeshType5),
    Type7(MeshType7),
    Type8(MeshType8),
}

impl Mesh {
    pub fn tag(&self) -> i32 {
        match *self {
            Mesh::Type1(_) => tag::TYPE1,
            Mesh::Type2(_) => tag::TYPE2,
            Mesh::Type4(_) => tag::TYPE4,
            Mesh::Type5(_) => tag::TYPE5,
            Mesh::Type7(_) => tag::TYPE7,
            Mesh::Type8(_) => tag::TYPE8,
        }
    }

    pub fn material(&self) -> i16 {
        match *self {
            Mesh::Type1(ref m) => m.material,
            Mesh::Type2(ref m) => m.material,
            Mesh::Type4(ref m) => m.material,
            Mesh::Type5(ref m) => m.material,
            Mesh::Type7(ref m) => m.material,
            Mesh::Type8(ref m) => m.material,
        }
    }

    pub fn has_weights(&self) -> bool {
        has_weights(self.tag())
    }

    pub fn has_morphers(&self) -> bool {
        has_morphers(self.tag())
    }

    pub fn vertex_count(&self) -> usize {
        match *self {
            Mesh::Type1(ref m) => m.batches.iter().map(|b| b.vertex_count()).sum(),
            Mesh::Type2(ref m) => m.batches.iter().map(|b| b.vertex_count()).sum(),
            Mesh::Type4(ref m) => m.positions.len(),
            Mesh::Type5(ref m) => m.vertex_count(),
            Mesh::Type7(ref m) => m.vertex_count(),
            Mesh::Type8(ref m) => m.vertex_count(),
        }
    }

    pub fn triangle_count(&self) -> usize {
        match *self {
            Mesh::Type1(ref m) => m.batches.iter().map(|b| b.triangles.len()).sum(),
            Mesh::Type2(ref m) => m.batches.iter().map(|b| b.triangles.len()).sum(),
            Mesh::Type4(ref m) => m.triangles.len(),
            Mesh::Type5(ref m) => m.triangles.len(),
            Mesh::Type7(ref m) => m.triangles.len(),
            Mesh::Type8(ref m) => m.triangles.len(),
        }
    }

    /// Reads a type tag and the mesh body after it. Types 3 and 6 are
    /// skipped and give `None`.
    pub fn read(cur: &mut Cur) -> Result<Option<Mesh>> {
        let tag = cur.next::<i32>()?;
        trace!("mesh type {} at {:#x}", tag, cur.pos() - 4);
        Ok(Some(match tag {
            tag::TYPE1 => Mesh::Type1(MeshType1::read(cur)?),
            tag::TYPE2 => Mesh::Type2(MeshType2::read(cur)?),
            tag::TYPE4 => Mesh::Type4(MeshType4::read(cur)?),
            tag::TYPE5 => Mesh::Type5(MeshType5::read(cur)?),
            tag::TYPE7 => Mesh::Type7(MeshType7::read(cur)?),
            tag::TYPE8 => Mesh::Type8(MeshType8::read(cur)?),
            tag::TYPE3 | tag::TYPE6 => {
                warn!("skipping unsupported mesh type {} at {:#x}", tag, cur.pos() - 4);
                return Ok(None);
            }
            _ => bail!(ErrorKind::UnknownMeshType(tag)),
        }))
    }

    pub fn write<'a>(&'a self, w: &mut Writer<'a>) -> Result<()> {
        w.put(self.tag());
        match *self {
            Mesh::Type1(ref m) => m.write(w),
            Mesh::Type2(ref m) => m.write(w),
            Mesh::Type4(ref m) => m.write(w),
            Mesh::Type5(ref m) => m.write(w),
            Mesh::Type7(ref m) => m.write(w),
            Mesh::Type8(ref m) => m.write(w),
        }
    }
}

pub fn has_weights(tag: i32) -> bool {
    tag == tag::TYPE2 || tag == tag::TYPE7
}

pub fn has_morphers(tag: i32) -> bool {
    tag == tag::TYPE3 || tag == tag::TYPE5
}

/// Reads the batches of a VIF stream ending at `end`. The zero padding at
/// the end of the stream decodes as a Nop; it is recognized by the stream
/// end being the next 16-byte boundary.
fn read_vif_batches<'a, T, F>(cur: &mut Cur<'a>, end: usize, mut read_batch: F) -> Result<Vec<T>>
where F: FnMut(&mut Cur<'a>) -> Result<T>
{
    let mut batches = vec![];
    while cur.pos() < end {
        let start = cur.pos();
        let code = cur.next::<u32>()?;
        if (code >> 24) as u8 == Command::Nop.to_byte() && crate::util::align_up(cur.pos(), 16) == end {
            debug!("vif stream padding at {:#x}", start);
            break;
        }
        cur.jump_to(start)?;
        batches.push(read_batch(cur)?);
    }
    Ok(batches)
}

/// Triangles of a VIF batch are unpacked as four signed bytes.
fn triangles_from_bytes(bytes: &[i8]) -> Result<Vec<Triangle>> {
    bytes.chunks(4)
        .map(|x| {
            check_stream!(x.len() == 4 && x[3] == 0)?;
            Ok(Triangle::new(x[0] as u8 as u16, x[1] as u8 as u16, x[2] as u8 as u16))
        })
        .collect()
}

fn triangles_to_bytes(triangles: &[Triangle]) -> Result<Vec<i8>> {
    let mut bytes = Vec::with_capacity(triangles.len() * 4);
    for t in triangles {
        if t.max_index() > 0xff {
            return Err(unsupported(format!(
                "vertex index {} does not fit a VIF batch", t.max_index(),
            )));
        }
        bytes.extend_from_slice(&[t.a as u8 as i8, t.b as u8 as i8, t.c as u8 as i8, 0]);
    }
    Ok(bytes)
}

/// Checks that an optional per-vertex array has one entry per vertex.
fn check_len<T>(what: &str, xs: Option<&Vec<T>>, vertex_count: usize) -> Result<()> {
    if let Some(xs) = xs {
        if xs.len() != vertex_count {
            return Err(unsupported(format!(
                "{} has {} entries for {} vertices", what, xs.len(), vertex_count,
            )));
        }
    }
    Ok(())
}

/// Converts a count to the i16 the headers store.
fn count_i16(what: &str, n: usize) -> Result<i16> {
    if n > i16::max_value() as usize {
        return Err(unsupported(format!("{} {} is too large", what, n)));
    }
    Ok(n as i16)
}

#[test]
fn test_flag_halves() {
    let flags = MeshFlags::SMOOTH_SHADING | MeshFlags::NORMAL | MeshFlags::WEIGHTS;
    assert_eq!(MeshFlags::from_halves(flags.lo(), flags.hi()), flags);
    assert_eq!(MeshFlags::from_bits_truncate(0xffff_ffff).bits(), 0xffff_ffff);
}

#[test]
fn test_unknown_mesh_type() {
    let buf = [9, 0, 0, 0];
    let mut cur = Cur::new(&buf);
    match *Mesh::read(&mut cur).unwrap_err().kind() {
        ErrorKind::UnknownMeshType(9) => (),
        ref k => panic!("unexpected error {:?}", k),
    }
}

#[test]
fn test_morpher_type_is_skipped() {
    let buf = [3, 0, 0, 0];
    let mut cur = Cur::new(&buf);
    assert!(Mesh::read(&mut cur).unwrap().is_none());
}

#[test]
fn test_vif_triangles() {
    let tris = vec![Triangle::new(0, 1, 200)];
    let bytes = triangles_to_bytes(&tris).unwrap();
    assert_eq!(triangles_from_bytes(&bytes).unwrap(), tris);
    assert!(triangles_to_bytes(&[Triangle::new(0, 1, 256)]).is_err());
    assert!(triangles_from_bytes(&[0, 1, 2, 3]).is_err());
}
