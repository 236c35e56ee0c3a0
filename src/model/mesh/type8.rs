use cgmath::{Vector2, Vector3};
use crate::errors::{malformed, Result};
use crate::io::writer::Writer;
use crate::model::mesh::{check_len, count_i16, MeshFlags, Triangle};
use crate::util::cur::Cur;
use crate::vif::{read_code, read_packet, Command, Format, StreamBuilder, UnpackData};

/// Unweighted mesh split into VIF batches of one shared stream.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshType8 {
    pub material: i16,
    /// Flags other than `TEX_COORD2`, which follows `tex_coords2`.
    pub flags: MeshFlags,
    pub triangles: Vec<Triangle>,
    pub batches: Vec<MeshType8Batch>,
    pub tex_coords2: Option<Vec<Vector2<f32>>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshType8Batch {
    pub positions: Vec<Vector3<f32>>,
    pub normals: Vec<Vector3<f32>>,
    pub tex_coords: Vec<Vector2<f32>>,
}

impl Default for MeshType8 {
    fn default() -> MeshType8 {
        MeshType8 {
            material: 0,
            flags: MeshFlags::SMOOTH_SHADING | MeshFlags::TEX_COORD | MeshFlags::BIT5 |
                MeshFlags::BIT6 | MeshFlags::REQUIRED_FOR_FIELD | MeshFlags::BIT22 |
                MeshFlags::NORMAL | MeshFlags::FIELD_TEXTURE,
            triangles: vec![],
            batches: vec![],
            tex_coords2: None,
        }
    }
}

impl MeshType8 {
    pub fn vertex_count(&self) -> usize {
        self.batches.iter().map(|b| b.vertex_count()).sum()
    }

    pub fn header_flags(&self) -> MeshFlags {
        self.flags.with_data(MeshFlags::TEX_COORD2, self.tex_coords2.is_some())
    }

    pub fn read(cur: &mut Cur) -> Result<MeshType8> {
        cur.expect(0i16, "mesh_type8.field00")?;
        let material = cur.next::<i16>()?;
        cur.expect(0i32, "mesh_type8.field04")?;
        cur.expect(0i32, "mesh_type8.field08")?;
        fields!(cur, mesh_type8 {
            triangle_count: i16,
            vertex_count: i16,
            flags: u32,
        });
        cur.align(16)?;
        let flags = MeshFlags::from_bits_truncate(flags);
        let vertex_count = vertex_count as u16 as usize;

        let triangles = cur.next_vec::<Triangle>(triangle_count as u16 as usize)?;
        cur.align(16)?;

        let mut batches = vec![];
        let mut read_vertices = 0;
        while read_vertices < vertex_count {
            let batch = MeshType8Batch::read(cur)?;
            if batch.vertex_count() == 0 {
                return Err(malformed("empty type 8 batch"));
            }
            read_vertices += batch.vertex_count();
            batches.push(batch);
        }

        let tex_coords2 = if flags.contains(MeshFlags::TEX_COORD2) {
            Some(cur.next_vec::<Vector2<f32>>(vertex_count)?)
        } else {
            None
        };

        Ok(MeshType8 {
            material,
            flags: flags - MeshFlags::TEX_COORD2,
            triangles,
            batches,
            tex_coords2,
        })
    }

    pub fn write(&self, w: &mut Writer) -> Result<()> {
        let vertex_count = self.vertex_count();
        check_len("second texture coordinates", self.tex_coords2.as_ref(), vertex_count)?;

        w.put(0i16);
        w.put(self.material);
        w.put(0i32);
        w.put(0i32);
        w.put(count_i16("triangle count", self.triangles.len())?);
        w.put(count_i16("vertex count", vertex_count)?);
        w.put(self.header_flags().bits());
        w.align(16);

        w.put_all(&self.triangles);
        w.align(16);

        let mut vif = StreamBuilder::new();
        for batch in &self.batches {
            batch.build(&mut vif)?;
        }
        vif.write(w);

        if let Some(ref uv) = self.tex_coords2 {
            w.put_all(uv);
        }
        Ok(())
    }
}

impl MeshType8Batch {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn read(cur: &mut Cur) -> Result<MeshType8Batch> {
        let header = read_packet(cur)?;
        header.ensure(Some(0xff), true, false, Some(1), Format::Short, 2)?;
        let h = header.i16s()?;
        check_stream!(h[1] == 0)?;
        let vertex_count = h[0] as u16 as usize;

        let packet = read_packet(cur)?;
        packet.ensure(Some(0), true, false, Some(vertex_count), Format::Float, 3)?;
        let positions = packet.vec3s()?;

        let packet = read_packet(cur)?;
        packet.ensure(Some(0x18), true, false, Some(vertex_count), Format::Float, 3)?;
        let normals = packet.vec3s()?;

        let packet = read_packet(cur)?;
        packet.ensure(Some(0x30), true, false, Some(vertex_count), Format::Float, 2)?;
        let tex_coords = packet.vec2s()?;

        read_code(cur)?.ensure(0x16, 0, Command::ActMicro)?;
        read_code(cur)?.ensure(0, 0, Command::FlushEnd)?;
        cur.align(16)?;

        Ok(MeshType8Batch { positions, normals, tex_coords })
    }

    pub fn build(&self, vif: &mut StreamBuilder) -> Result<()> {
        let vertex_count = self.vertex_count();
        check_len("normals", Some(&self.normals), vertex_count)?;
        check_len("texture coordinates", Some(&self.tex_coords), vertex_count)?;
        vif.unpack_header2(count_i16("vertex count", vertex_count)?, 0)?;
        vif.unpack(UnpackData::vec3s(&self.positions))?;
        vif.unpack(UnpackData::vec3s(&self.normals))?;
        vif.unpack(UnpackData::vec2s(&self.tex_coords))?;
        vif.activate_micro(0x16);
        vif.flush_end();
        Ok(())
    }
}

#[cfg(test)]
use crate::model::mesh::Mesh;

#[cfg(test)]
fn batch(n: usize, y: f32) -> MeshType8Batch {
    MeshType8Batch {
        positions: vec![Vector3::new(0.0, y, 0.0); n],
        normals: vec![Vector3::new(0.0, 0.0, 1.0); n],
        tex_coords: vec![Vector2::new(0.25, 0.75); n],
    }
}

#[test]
fn test_round_trip() {
    let mesh = Mesh::Type8(MeshType8 {
        material: 2,
        triangles: vec![Triangle::new(0, 1, 2), Triangle::new(3, 4, 5)],
        batches: vec![batch(24, 1.0), batch(5, 2.0)],
        ..Default::default()
    });
    let mut w = Writer::new();
    mesh.write(&mut w).unwrap();
    let bytes = w.into_bytes();
    let mut cur = Cur::new(&bytes);
    let mesh2 = Mesh::read(&mut cur).unwrap().unwrap();
    assert_eq!(mesh2, mesh);
    assert_eq!(cur.pos(), bytes.len());
    assert!(!mesh2.has_weights());
}

#[test]
fn test_second_tex_coords_after_stream() {
    let mesh = MeshType8 {
        batches: vec![batch(3, 0.0)],
        tex_coords2: Some(vec![Vector2::new(1.0, 0.0); 3]),
        ..Default::default()
    };
    assert!(mesh.header_flags().contains(MeshFlags::TEX_COORD2));
    let mut w = Writer::new();
    mesh.write(&mut w).unwrap();
    let bytes = w.into_bytes();
    // the stream ends 16-aligned and the extra coordinates follow it
    assert_eq!(bytes.len() % 16, 8);
    let mut cur = Cur::new(&bytes);
    assert_eq!(MeshType8::read(&mut cur).unwrap(), mesh);

    let short = MeshType8 { tex_coords2: Some(vec![]), ..mesh };
    assert!(short.write(&mut Writer::new()).is_err());
}
