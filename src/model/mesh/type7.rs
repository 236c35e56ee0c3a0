use cgmath::{Vector2, Vector3, Vector4};
use crate::errors::{malformed, unsupported, Result};
use crate::io::writer::Writer;
use crate::model::mesh::{check_len, count_i16, MeshFlags, Triangle};
use crate::util::cur::Cur;
use crate::vif::{read_code, read_packet, Command, Format, StreamBuilder, UnpackData};

/// Weighted mesh. The triangles index the whole mesh; the vertices are
/// split into VIF batches that each hold every used node's share of their
/// vertices. The batches form one VIF stream written inline.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshType7 {
    pub material: i16,
    /// Flags other than `TEX_COORD2`, which follows `tex_coords2`.
    pub flags: MeshFlags,
    pub triangles: Vec<Triangle>,
    pub batches: Vec<MeshType7Batch>,
    pub tex_coords2: Option<Vec<Vector2<f32>>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshType7Batch {
    pub node_batches: Vec<MeshType7NodeBatch>,
    pub tex_coords: Vec<Vector2<f32>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshType7NodeBatch {
    pub node_index: i16,
    /// Node space position in xyz, weight in w.
    pub positions: Vec<Vector4<f32>>,
    pub normals: Vec<Vector3<f32>>,
}

impl Default for MeshType7 {
    fn default() -> MeshType7 {
        MeshType7 {
            material: 0,
            flags: MeshFlags::SMOOTH_SHADING | MeshFlags::TEX_COORD | MeshFlags::BIT5 |
                MeshFlags::BIT6 | MeshFlags::REQUIRED_FOR_FIELD | MeshFlags::BIT22 |
                MeshFlags::NORMAL | MeshFlags::FIELD_TEXTURE | MeshFlags::WEIGHTS,
            triangles: vec![],
            batches: vec![],
            tex_coords2: None,
        }
    }
}

impl MeshType7 {
    pub fn vertex_count(&self) -> usize {
        self.batches.iter().map(|b| b.vertex_count()).sum()
    }

    /// Node indices used by the batches, in node batch order.
    pub fn used_nodes(&self) -> Vec<i16> {
        self.batches.first()
            .map(|b| b.node_batches.iter().map(|nb| nb.node_index).collect())
            .unwrap_or_default()
    }

    pub fn header_flags(&self) -> MeshFlags {
        self.flags.with_data(MeshFlags::TEX_COORD2, self.tex_coords2.is_some())
    }

    pub fn read(cur: &mut Cur) -> Result<MeshType7> {
        cur.expect(0i16, "mesh_type7.field00")?;
        let material = cur.next::<i16>()?;
        cur.expect(0i32, "mesh_type7.field04")?;
        cur.expect(0i32, "mesh_type7.field08")?;
        fields!(cur, mesh_type7 {
            triangle_count: i16,
            vertex_count: i16,
            flags: u32,
            used_node_count: i16,
        });
        let used_nodes = cur.next_vec::<i16>(used_node_count.max(0) as usize)?;
        cur.align(16)?;
        let flags = MeshFlags::from_bits_truncate(flags);
        let vertex_count = vertex_count as u16 as usize;

        let triangles = cur.next_vec::<Triangle>(triangle_count as u16 as usize)?;
        cur.align(16)?;

        let mut batches = vec![];
        let mut read_vertices = 0;
        while read_vertices < vertex_count {
            let batch = MeshType7Batch::read(cur, &used_nodes)?;
            if batch.vertex_count() == 0 {
                return Err(malformed("empty type 7 batch"));
            }
            read_vertices += batch.vertex_count();
            batches.push(batch);
        }
        check_stream!(read_vertices == vertex_count)?;

        let tex_coords2 = if flags.contains(MeshFlags::TEX_COORD2) {
            Some(cur.next_vec::<Vector2<f32>>(vertex_count)?)
        } else {
            None
        };

        Ok(MeshType7 {
            material,
            flags: flags - MeshFlags::TEX_COORD2,
            triangles,
            batches,
            tex_coords2,
        })
    }

    pub fn write(&self, w: &mut Writer) -> Result<()> {
        let used_nodes = self.used_nodes();
        for batch in &self.batches {
            let nodes: Vec<i16> = batch.node_batches.iter().map(|nb| nb.node_index).collect();
            if nodes != used_nodes {
                return Err(unsupported("type 7 batches use different nodes"));
            }
        }
        let vertex_count = self.vertex_count();
        check_len("second texture coordinates", self.tex_coords2.as_ref(), vertex_count)?;

        w.put(0i16);
        w.put(self.material);
        w.put(0i32);
        w.put(0i32);
        w.put(count_i16("triangle count", self.triangles.len())?);
        w.put(count_i16("vertex count", vertex_count)?);
        w.put(self.header_flags().bits());
        w.put(count_i16("used node count", used_nodes.len())?);
        w.put_all(&used_nodes);
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

impl MeshType7Batch {
    pub fn vertex_count(&self) -> usize {
        self.tex_coords.len()
    }

    pub fn read(cur: &mut Cur, used_nodes: &[i16]) -> Result<MeshType7Batch> {
        let header = read_packet(cur)?;
        header.ensure(Some(0xff), true, false, Some(1), Format::Short, 2)?;
        let h = header.i16s()?;
        if h[0] as i32 + 1 != used_nodes.len() as i32 {
            return Err(malformed(format!(
                "batch uses {} nodes, mesh lists {}", h[0] as i32 + 1, used_nodes.len(),
            )));
        }
        let vertex_count = h[1] as u16 as usize;

        let mut node_batches = Vec::with_capacity(used_nodes.len());
        for &node_index in used_nodes {
            let packet = read_packet(cur)?;
            packet.ensure(None, true, false, None, Format::Float, 4)?;
            let positions = packet.vec4s()?;
            check_stream!(positions.len() == vertex_count)?;

            let packet = read_packet(cur)?;
            packet.ensure(None, true, false, Some(positions.len()), Format::Float, 3)?;
            let normals = packet.vec3s()?;

            let code = read_code(cur)?;
            match code.command {
                Command::ActMicro => code.ensure(0x14, 0, Command::ActMicro)?,
                Command::CntMicro => (),
                c => return Err(malformed(format!(
                    "expected a microprogram start or continue, found {:?}", c,
                ))),
            }

            node_batches.push(MeshType7NodeBatch { node_index, positions, normals });
        }

        let packet = read_packet(cur)?;
        packet.ensure(None, true, false, Some(vertex_count), Format::Float, 2)?;
        let tex_coords = packet.vec2s()?;

        read_code(cur)?.ensure(0, 0, Command::CntMicro)?;
        read_code(cur)?.ensure(0, 0, Command::FlushEnd)?;
        cur.align(16)?;

        Ok(MeshType7Batch { node_batches, tex_coords })
    }

    pub fn build(&self, vif: &mut StreamBuilder) -> Result<()> {
        if self.node_batches.len() < 2 {
            return Err(unsupported("a type 7 batch needs at least 2 nodes"));
        }
        let vertex_count = self.vertex_count();
        vif.unpack_header2(
            count_i16("used node count", self.node_batches.len() - 1)?,
            count_i16("vertex count", vertex_count)?,
        )?;
        for (i, nb) in self.node_batches.iter().enumerate() {
            check_len("node batch positions", Some(&nb.positions), vertex_count)?;
            check_len("node batch normals", Some(&nb.normals), vertex_count)?;
            vif.unpack(UnpackData::vec4s(&nb.positions))?;
            vif.unpack(UnpackData::vec3s(&nb.normals))?;
            if i == 0 {
                vif.activate_micro(0x14);
            } else {
                vif.continue_micro();
            }
        }
        vif.unpack(UnpackData::vec2s(&self.tex_coords))?;
        vif.continue_micro();
        vif.flush_end();
        Ok(())
    }
}

#[cfg(test)]
use crate::model::mesh::Mesh;

#[cfg(test)]
fn batch(n: usize) -> MeshType7Batch {
    MeshType7Batch {
        node_batches: vec![
            MeshType7NodeBatch {
                node_index: 2,
                positions: vec![Vector4::new(1.0, 0.0, 0.0, 0.75); n],
                normals: vec![Vector3::new(0.0, 1.0, 0.0); n],
            },
            MeshType7NodeBatch {
                node_index: 5,
                positions: vec![Vector4::new(0.0, 1.0, 0.0, 0.25); n],
                normals: vec![Vector3::new(0.0, 1.0, 0.0); n],
            },
        ],
        tex_coords: vec![Vector2::new(0.0, 0.5); n],
    }
}

#[test]
fn test_round_trip() {
    let mesh = Mesh::Type7(MeshType7 {
        material: 4,
        triangles: vec![Triangle::new(0, 1, 2), Triangle::new(24, 25, 26)],
        batches: vec![batch(24), batch(6)],
        tex_coords2: Some(vec![Vector2::new(1.0, 1.0); 30]),
        ..Default::default()
    });
    let mut w = Writer::new();
    mesh.write(&mut w).unwrap();
    let bytes = w.into_bytes();
    let mut cur = Cur::new(&bytes);
    let mesh2 = Mesh::read(&mut cur).unwrap().unwrap();
    assert_eq!(mesh2, mesh);
    assert_eq!(cur.pos(), bytes.len());
    assert_eq!(mesh2.vertex_count(), 30);

    let mut w = Writer::new();
    mesh2.write(&mut w).unwrap();
    assert_eq!(w.into_bytes(), bytes);
}

#[test]
fn test_vertex_count_checked() {
    let mesh = MeshType7 {
        triangles: vec![Triangle::new(0, 1, 2)],
        batches: vec![batch(24), batch(6)],
        ..Default::default()
    };
    let mut w = Writer::new();
    mesh.write(&mut w).unwrap();
    let mut bytes = w.into_bytes();
    assert_eq!(MeshType7::read(&mut Cur::new(&bytes)).unwrap(), mesh);

    // the batches hold more vertices than the header says
    bytes[14..16].copy_from_slice(&26i16.to_le_bytes());
    let err = MeshType7::read(&mut Cur::new(&bytes)).unwrap_err();
    assert!(err.to_string().contains("read_vertices"));

    // a node batch with fewer positions than the batch header
    let mut vif = StreamBuilder::new();
    vif.unpack_header2(1, 3).unwrap();
    for _ in 0..2 {
        vif.unpack(UnpackData::vec4s(&[Vector4::new(0.0, 0.0, 0.0, 0.5); 2])).unwrap();
        vif.unpack(UnpackData::vec3s(&[Vector3::new(0.0, 1.0, 0.0); 2])).unwrap();
        vif.continue_micro();
    }
    vif.unpack(UnpackData::vec2s(&[Vector2::new(0.0, 0.0); 3])).unwrap();
    vif.continue_micro();
    vif.flush_end();
    let mut w = Writer::new();
    vif.write(&mut w);
    let bytes = w.into_bytes();
    let err = MeshType7Batch::read(&mut Cur::new(&bytes), &[2, 5]).unwrap_err();
    assert!(err.to_string().contains("positions"));
}

#[test]
fn test_single_node_batch_rejected() {
    let mut b = batch(3);
    b.node_batches.pop();
    assert!(b.build(&mut StreamBuilder::new()).is_err());
}

#[test]
fn test_node_count_mismatch() {
    let mut vif = StreamBuilder::new();
    batch(3).build(&mut vif).unwrap();
    let mut w = Writer::new();
    vif.write(&mut w);
    let bytes = w.into_bytes();
    let mut cur = Cur::new(&bytes);
    let err = MeshType7Batch::read(&mut cur, &[2, 5, 6]).unwrap_err();
    assert!(err.to_string().contains("nodes"));
}
