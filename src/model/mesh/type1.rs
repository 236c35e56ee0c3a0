use cgmath::{Vector2, Vector3, Vector4};
use crate::errors::{unsupported, Result};
use crate::io::writer::Writer;
use crate::model::mesh::{
    check_len, count_i16, read_vif_batches, triangles_from_bytes, triangles_to_bytes,
    MeshFlags, RenderMode, Triangle,
};
use crate::model::Color;
use crate::util::cur::Cur;
use crate::vif::{read_activate_micro, read_packet, Format, StreamBuilder, UnpackData};

/// Unweighted mesh made of self-contained VIF batches.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshType1 {
    pub material: i16,
    pub batches: Vec<MeshType1Batch>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshType1Batch {
    /// Flags other than the ones announcing vertex data, which are derived
    /// from the fields below when written.
    pub flags: MeshFlags,
    pub render_mode: RenderMode,
    pub triangles: Vec<Triangle>,
    pub positions: Vec<Vector3<f32>>,
    pub normals: Option<Vec<Vector3<f32>>>,
    pub tex_coords: Option<Vec<Vector2<f32>>>,
    pub tex_coords2: Option<Vec<Vector2<f32>>>,
    pub colors: Option<Vec<Color>>,
}

impl Default for MeshType1Batch {
    fn default() -> MeshType1Batch {
        MeshType1Batch {
            flags: MeshFlags::SMOOTH_SHADING | MeshFlags::BIT5 | MeshFlags::BIT6 |
                MeshFlags::REQUIRED_FOR_FIELD | MeshFlags::BIT22 | MeshFlags::FIELD_TEXTURE,
            render_mode: RenderMode::Mode1,
            triangles: vec![],
            positions: vec![],
            normals: None,
            tex_coords: None,
            tex_coords2: None,
            colors: None,
        }
    }
}

impl MeshType1 {
    pub fn read(cur: &mut Cur) -> Result<MeshType1> {
        fields!(cur, mesh_type1 {
            vif_size: i16,
            material: i16,
        });
        let batches = cur.read_offset(|cur| {
            let end = cur.pos() + vif_size as u16 as usize * 16;
            read_vif_batches(cur, end, MeshType1Batch::read)
        })?.unwrap_or_default();
        cur.align(16)?;
        Ok(MeshType1 { material, batches })
    }

    pub fn write<'a>(&'a self, w: &mut Writer<'a>) -> Result<()> {
        let start = w.pos();
        w.put(0i16); // stream size, patched below
        w.put(self.material);
        w.schedule_offset(16, move |w| {
            let mut vif = StreamBuilder::new();
            for batch in &self.batches {
                batch.build(&mut vif)?;
            }
            let vif_start = w.pos();
            vif.write(w);
            let size = count_i16("vif stream size", (w.pos() - vif_start) / 16)?;
            w.patch_i16(start, size);
            Ok(())
        });
        w.align(16);
        Ok(())
    }
}

impl MeshType1Batch {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// The flag word as written: `flags` with the data bits derived from
    /// which arrays are present.
    pub fn header_flags(&self) -> MeshFlags {
        self.flags
            .with_data(MeshFlags::NORMAL, self.normals.is_some())
            .with_data(MeshFlags::TEX_COORD, self.tex_coords.is_some())
            .with_data(MeshFlags::TEX_COORD2, self.tex_coords2.is_some())
            .with_data(MeshFlags::COLOR, self.colors.is_some())
    }

    pub fn read(cur: &mut Cur) -> Result<MeshType1Batch> {
        let header = read_packet(cur)?;
        header.ensure(Some(0), true, true, Some(1), Format::Short, 4)?;
        let h = header.i16s()?;
        let (triangle_count, vertex_count) = (h[0] as u16 as usize, h[1] as u16 as usize);
        let flags = MeshFlags::from_halves(h[2], h[3]);

        let packet = read_packet(cur)?;
        packet.ensure(Some(1), true, true, Some(triangle_count), Format::Byte, 4)?;
        let triangles = triangles_from_bytes(packet.i8s()?)?;

        let packet = read_packet(cur)?;
        packet.ensure(None, true, true, Some(vertex_count), Format::Float, 3)?;
        let positions = packet.vec3s()?;

        let normals = if flags.contains(MeshFlags::NORMAL) {
            let packet = read_packet(cur)?;
            packet.ensure(None, true, true, Some(vertex_count), Format::Float, 3)?;
            Some(packet.vec3s()?)
        } else {
            None
        };

        let (tex_coords, tex_coords2) = read_tex_coords(cur, flags, vertex_count)?;

        let colors = if flags.contains(MeshFlags::COLOR) {
            let packet = read_packet(cur)?;
            packet.ensure(None, true, true, Some(vertex_count), Format::Byte, 4)?;
            Some(colors_from_bytes(packet.i8s()?))
        } else {
            None
        };

        let code = read_activate_micro(cur)?;

        Ok(MeshType1Batch {
            flags: flags - MeshFlags::vertex_data(),
            render_mode: RenderMode::from_program(code.immediate),
            triangles,
            positions,
            normals,
            tex_coords,
            tex_coords2,
            colors,
        })
    }

    pub fn build(&self, vif: &mut StreamBuilder) -> Result<()> {
        let vertex_count = self.vertex_count();
        check_len("normals", self.normals.as_ref(), vertex_count)?;
        check_len("texture coordinates", self.tex_coords.as_ref(), vertex_count)?;
        check_len("second texture coordinates", self.tex_coords2.as_ref(), vertex_count)?;
        check_len("colors", self.colors.as_ref(), vertex_count)?;

        vif.unpack_header(
            count_i16("triangle count", self.triangles.len())?,
            count_i16("vertex count", vertex_count)?,
            self.header_flags().bits(),
        )?;

        let mut next = 8;
        vif.unpack_at(next, UnpackData::i8s(4, triangles_to_bytes(&self.triangles)?))?;
        next = crate::util::align_up(next + self.triangles.len() * 8, 8);

        vif.unpack_at(next, UnpackData::vec3s(&self.positions))?;
        next = crate::util::align_up(next + vertex_count * 8, 8);

        if let Some(ref normals) = self.normals {
            vif.unpack_at(next, UnpackData::vec3s(normals))?;
            next = crate::util::align_up(next + vertex_count * 8, 8);
        }

        next = unpack_tex_coords(vif, next, self.tex_coords.as_ref(), self.tex_coords2.as_ref())?;

        if let Some(ref colors) = self.colors {
            vif.unpack_at(next, UnpackData::i8s(4, colors_to_bytes(colors)))?;
        }

        vif.activate_micro(self.render_mode.program());
        Ok(())
    }
}

/// Reads the texture coordinate packet of a flat batch. With a second set
/// both are interleaved as one float x4 packet.
pub(super) fn read_tex_coords(
    cur: &mut Cur,
    flags: MeshFlags,
    vertex_count: usize,
) -> Result<(Option<Vec<Vector2<f32>>>, Option<Vec<Vector2<f32>>>)> {
    if !flags.contains(MeshFlags::TEX_COORD) {
        return Ok((None, None));
    }
    let packet = read_packet(cur)?;
    if !flags.contains(MeshFlags::TEX_COORD2) {
        packet.ensure(None, true, true, Some(vertex_count), Format::Float, 2)?;
        Ok((Some(packet.vec2s()?), None))
    } else {
        packet.ensure(None, true, true, Some(vertex_count), Format::Float, 4)?;
        let v = packet.vec4s()?;
        let uv1 = v.iter().map(|v| Vector2::new(v.x, v.y)).collect();
        let uv2 = v.iter().map(|v| Vector2::new(v.z, v.w)).collect();
        Ok((Some(uv1), Some(uv2)))
    }
}

/// Unpacks texture coordinates at `next` and returns the address after
/// them.
pub(super) fn unpack_tex_coords(
    vif: &mut StreamBuilder,
    next: usize,
    tex_coords: Option<&Vec<Vector2<f32>>>,
    tex_coords2: Option<&Vec<Vector2<f32>>>,
) -> Result<usize> {
    let uv1 = match (tex_coords, tex_coords2) {
        (None, None) => return Ok(next),
        (None, Some(_)) => {
            return Err(unsupported("second texture coordinates without the first set"));
        }
        (Some(uv1), None) => {
            vif.unpack_at(next, UnpackData::vec2s(uv1))?;
            uv1
        }
        (Some(uv1), Some(uv2)) => {
            let merged: Vec<Vector4<f32>> = uv1.iter().zip(uv2)
                .map(|(a, b)| Vector4::new(a.x, a.y, b.x, b.y))
                .collect();
            vif.unpack_at(next, UnpackData::vec4s(&merged))?;
            uv1
        }
    };
    Ok(crate::util::align_up(next + uv1.len() * 8, 8))
}

pub(super) fn colors_from_bytes(bytes: &[i8]) -> Vec<Color> {
    bytes.chunks(4)
        .map(|c| Color::new(c[0] as u8, c[1] as u8, c[2] as u8, c[3] as u8))
        .collect()
}

pub(super) fn colors_to_bytes(colors: &[Color]) -> Vec<i8> {
    colors.iter()
        .flat_map(|c| vec![c.r as i8, c.g as i8, c.b as i8, c.a as i8])
        .collect()
}

#[cfg(test)]
use crate::model::mesh::Mesh;

#[cfg(test)]
fn batch(n: usize) -> MeshType1Batch {
    MeshType1Batch {
        triangles: vec![Triangle::new(0, 1, 2)],
        positions: (0..n).map(|i| Vector3::new(i as f32, 0.0, 1.0)).collect(),
        normals: Some(vec![Vector3::new(0.0, 1.0, 0.0); n]),
        tex_coords: Some(vec![Vector2::new(0.5, 0.25); n]),
        tex_coords2: Some(vec![Vector2::new(1.0, 0.0); n]),
        colors: Some(vec![Color::new(0x80, 0x80, 0x80, 0xff); n]),
        ..Default::default()
    }
}

#[test]
fn test_round_trip() {
    let mesh = Mesh::Type1(MeshType1 {
        material: 2,
        batches: vec![batch(3), MeshType1Batch { render_mode: RenderMode::Mode2, ..batch(5) }],
    });
    let mut w = Writer::new();
    mesh.write(&mut w).unwrap();
    w.run_scheduled_writes().unwrap();
    let bytes = w.into_bytes();
    assert_eq!(bytes.len() % 16, 0);

    let mut cur = Cur::new(&bytes);
    let mesh2 = Mesh::read(&mut cur).unwrap().unwrap();
    assert_eq!(cur.pos(), 16);
    assert_eq!(mesh2, mesh);

    let batches = match mesh2 {
        Mesh::Type1(ref m) => &m.batches,
        _ => panic!(),
    };
    let flags = batches[0].header_flags();
    assert!(flags.contains(MeshFlags::NORMAL | MeshFlags::TEX_COORD2 | MeshFlags::COLOR));
    assert!(!batches[0].flags.contains(MeshFlags::NORMAL));

    let mut w = Writer::new();
    mesh2.write(&mut w).unwrap();
    w.run_scheduled_writes().unwrap();
    assert_eq!(w.into_bytes(), bytes);
}

#[test]
fn test_vertex_data_addresses() {
    let mut vif = StreamBuilder::new();
    batch(3).build(&mut vif).unwrap();
    let addresses: Vec<u16> = vif.tags().iter()
        .filter_map(|t| match *t {
            crate::vif::VifTag::Unpack(ref p) => Some(p.address),
            _ => None,
        })
        .collect();
    // header, triangles at 8, positions at 16, normals at 40, uvs at 64,
    // colors at 88 (all in bytes)
    assert_eq!(addresses, vec![0, 1, 2, 5, 8, 11]);
}

#[test]
fn test_mismatched_lengths() {
    let mut b = batch(3);
    b.normals = Some(vec![]);
    assert!(b.build(&mut StreamBuilder::new()).is_err());
}
