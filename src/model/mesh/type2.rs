use cgmath::{Vector2, Vector3, Vector4};
use crate::errors::{unsupported, Result};
use crate::io::writer::Writer;
use crate::model::mesh::type1::{colors_from_bytes, colors_to_bytes, read_tex_coords, unpack_tex_coords};
use crate::model::mesh::{
    check_len, count_i16, read_vif_batches, triangles_from_bytes, triangles_to_bytes,
    MeshFlags, RenderMode, Triangle,
};
use crate::model::Color;
use crate::util::cur::Cur;
use crate::vif::{read_activate_micro, read_packet, Format, StreamBuilder, UnpackData};

/// Weighted mesh. Every batch has one node batch per used node, each
/// holding that node's share of every vertex in the node's space.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshType2 {
    pub material: i16,
    pub used_nodes: Vec<i16>,
    pub batches: Vec<MeshType2Batch>,
}

/// The last node batch also carries the triangles, texture coordinates and
/// colors of the whole batch; they live here.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshType2Batch {
    pub node_batches: Vec<MeshType2NodeBatch>,
    pub triangles: Vec<Triangle>,
    pub tex_coords: Option<Vec<Vector2<f32>>>,
    pub tex_coords2: Option<Vec<Vector2<f32>>>,
    pub colors: Option<Vec<Color>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshType2NodeBatch {
    pub node_index: i16,
    /// Flag word of the node batch, as read. Non-last node batches carry
    /// data bits for arrays they do not hold, so the word is kept whole; on
    /// write `NORMAL` follows `normals`, and in the last node batch the
    /// texture coordinate and color bits follow the batch.
    pub flags: MeshFlags,
    pub render_mode: RenderMode,
    /// Node space position in xyz, weight in w.
    pub positions: Vec<Vector4<f32>>,
    pub normals: Option<Vec<Vector3<f32>>>,
}

impl Default for MeshType2NodeBatch {
    fn default() -> MeshType2NodeBatch {
        MeshType2NodeBatch {
            node_index: 0,
            flags: MeshFlags::SMOOTH_SHADING | MeshFlags::TEX_COORD | MeshFlags::BIT5 |
                MeshFlags::BIT6 | MeshFlags::BIT22 | MeshFlags::NORMAL | MeshFlags::FIELD_TEXTURE |
                MeshFlags::BIT26 | MeshFlags::WEIGHTS | MeshFlags::BIT29,
            render_mode: RenderMode::Mode1,
            positions: vec![],
            normals: None,
        }
    }
}

impl MeshType2 {
    pub fn read(cur: &mut Cur) -> Result<MeshType2> {
        fields!(cur, mesh_type2 {
            vif_size: i16,
            material: i16,
            vif_offset: (offset),
            used_node_count: i16,
            field0a: i16,
        });
        check_stream!(field0a == 0)?;
        check_stream!(used_node_count > 0 && used_node_count <= 4)?;
        let used_nodes = cur.next_vec::<i16>(used_node_count as usize)?;

        let batches = cur.read_at(vif_offset, |cur| {
            let end = cur.pos() + vif_size as u16 as usize * 16;
            read_vif_batches(cur, end, |cur| MeshType2Batch::read(cur, &used_nodes))
        })?.unwrap_or_default();
        cur.align(16)?;
        Ok(MeshType2 { material, used_nodes, batches })
    }

    pub fn write<'a>(&'a self, w: &mut Writer<'a>) -> Result<()> {
        for batch in &self.batches {
            let nodes: Vec<i16> = batch.node_batches.iter().map(|nb| nb.node_index).collect();
            if nodes != self.used_nodes {
                return Err(unsupported("type 2 batch nodes differ from the mesh's used nodes"));
            }
        }
        let start = w.pos();
        w.put(0i16);
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
        w.put(count_i16("used node count", self.used_nodes.len())?);
        w.put(0i16);
        w.put_all(&self.used_nodes);
        w.align(16);
        Ok(())
    }
}

impl MeshType2Batch {
    pub fn vertex_count(&self) -> usize {
        self.node_batches.first().map(|nb| nb.positions.len()).unwrap_or(0)
    }

    pub fn read(cur: &mut Cur, used_nodes: &[i16]) -> Result<MeshType2Batch> {
        let mut batch = MeshType2Batch::default();
        for (i, &node_index) in used_nodes.iter().enumerate() {
            let last = if i == used_nodes.len() - 1 { Some(&mut batch) } else { None };
            let nb = MeshType2NodeBatch::read(cur, node_index, last)?;
            batch.node_batches.push(nb);
        }
        Ok(batch)
    }

    pub fn build(&self, vif: &mut StreamBuilder) -> Result<()> {
        let vertex_count = self.vertex_count();
        check_len("texture coordinates", self.tex_coords.as_ref(), vertex_count)?;
        check_len("second texture coordinates", self.tex_coords2.as_ref(), vertex_count)?;
        check_len("colors", self.colors.as_ref(), vertex_count)?;
        let n = self.node_batches.len();
        for (i, nb) in self.node_batches.iter().enumerate() {
            check_len("node batch positions", Some(&nb.positions), vertex_count)?;
            nb.build(vif, self, i == n - 1)?;
        }
        Ok(())
    }

    fn last_flags(&self, flags: MeshFlags) -> MeshFlags {
        flags
            .with_data(MeshFlags::TEX_COORD, self.tex_coords.is_some())
            .with_data(MeshFlags::TEX_COORD2, self.tex_coords2.is_some())
            .with_data(MeshFlags::COLOR, self.colors.is_some())
    }
}

impl MeshType2NodeBatch {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Reads a node batch. `last` is the enclosing batch when this is its
    /// last node batch; the shared data is stored there.
    fn read(cur: &mut Cur, node_index: i16, last: Option<&mut MeshType2Batch>) -> Result<MeshType2NodeBatch> {
        let header = read_packet(cur)?;
        header.ensure(Some(0), true, true, Some(1), Format::Short, 4)?;
        let h = header.i16s()?;
        let (triangle_count, vertex_count) = (h[0] as u16 as usize, h[1] as u16 as usize);
        let flags = MeshFlags::from_halves(h[2], h[3]);
        let is_last = last.is_some();

        let triangles = if is_last {
            let packet = read_packet(cur)?;
            packet.ensure(Some(1), true, true, Some(triangle_count), Format::Byte, 4)?;
            Some(triangles_from_bytes(packet.i8s()?)?)
        } else {
            None
        };

        let packet = read_packet(cur)?;
        let address = if is_last { None } else { Some(1) };
        packet.ensure(address, true, true, Some(vertex_count), Format::Float, 4)?;
        let positions = packet.vec4s()?;

        let normals = if flags.contains(MeshFlags::NORMAL) {
            let packet = read_packet(cur)?;
            packet.ensure(None, true, true, Some(vertex_count), Format::Float, 3)?;
            Some(packet.vec3s()?)
        } else {
            None
        };

        if let Some(batch) = last {
            let (tex_coords, tex_coords2) = read_tex_coords(cur, flags, vertex_count)?;
            batch.colors = if flags.contains(MeshFlags::COLOR) {
                let packet = read_packet(cur)?;
                packet.ensure(None, true, true, Some(vertex_count), Format::Byte, 4)?;
                Some(colors_from_bytes(packet.i8s()?))
            } else {
                None
            };
            batch.triangles = triangles.unwrap_or_default();
            batch.tex_coords = tex_coords;
            batch.tex_coords2 = tex_coords2;
        }

        let code = read_activate_micro(cur)?;

        Ok(MeshType2NodeBatch {
            node_index,
            flags,
            render_mode: RenderMode::from_program(code.immediate),
            positions,
            normals,
        })
    }

    fn build(&self, vif: &mut StreamBuilder, batch: &MeshType2Batch, last: bool) -> Result<()> {
        let vertex_count = self.vertex_count();
        check_len("normals", self.normals.as_ref(), vertex_count)?;

        let mut flags = self.flags.with_data(MeshFlags::NORMAL, self.normals.is_some());
        if last {
            flags = batch.last_flags(flags);
        }
        // Every node batch announces the triangle count of the whole batch.
        vif.unpack_header(
            count_i16("triangle count", batch.triangles.len())?,
            count_i16("vertex count", vertex_count)?,
            flags.bits(),
        )?;

        let mut next = 8;
        if last {
            vif.unpack_at(next, UnpackData::i8s(4, triangles_to_bytes(&batch.triangles)?))?;
            next = crate::util::align_up(next + batch.triangles.len() * 8, 8);
        }

        vif.unpack_at(next, UnpackData::vec4s(&self.positions))?;
        next = crate::util::align_up(next + vertex_count * 8, 8);

        if let Some(ref normals) = self.normals {
            vif.unpack_at(next, UnpackData::vec3s(normals))?;
            next = crate::util::align_up(next + vertex_count * 8, 8);
        }

        if last {
            next = unpack_tex_coords(vif, next, batch.tex_coords.as_ref(), batch.tex_coords2.as_ref())?;
            if let Some(ref colors) = batch.colors {
                vif.unpack_at(next, UnpackData::i8s(4, colors_to_bytes(colors)))?;
            }
        }

        vif.activate_micro(self.render_mode.program());
        Ok(())
    }
}

#[cfg(test)]
use crate::model::mesh::Mesh;

#[cfg(test)]
fn node_batch(node_index: i16, weight: f32) -> MeshType2NodeBatch {
    MeshType2NodeBatch {
        node_index,
        positions: vec![Vector4::new(1.0, 2.0, 3.0, weight); 3],
        normals: Some(vec![Vector3::new(0.0, 0.0, 1.0); 3]),
        ..Default::default()
    }
}

#[test]
fn test_round_trip() {
    let mesh = Mesh::Type2(MeshType2 {
        material: 1,
        used_nodes: vec![4, 7],
        batches: vec![MeshType2Batch {
            node_batches: vec![node_batch(4, 0.25), node_batch(7, 0.75)],
            triangles: vec![Triangle::new(0, 1, 2)],
            tex_coords: Some(vec![Vector2::new(0.0, 1.0); 3]),
            tex_coords2: None,
            colors: None,
        }],
    });
    let mut w = Writer::new();
    mesh.write(&mut w).unwrap();
    w.run_scheduled_writes().unwrap();
    let bytes = w.into_bytes();

    let mut cur = Cur::new(&bytes);
    let mesh2 = Mesh::read(&mut cur).unwrap().unwrap();
    assert_eq!(mesh2, mesh);
    // 4 + 12 + 2 shorts of used nodes, aligned
    assert_eq!(cur.pos(), 32);

    let mut w = Writer::new();
    mesh2.write(&mut w).unwrap();
    w.run_scheduled_writes().unwrap();
    assert_eq!(w.into_bytes(), bytes);
}

#[test]
fn test_batch_nodes_must_match() {
    let mesh = MeshType2 {
        material: 0,
        used_nodes: vec![1, 2],
        batches: vec![MeshType2Batch {
            node_batches: vec![node_batch(1, 1.0)],
            ..Default::default()
        }],
    };
    let mut w = Writer::new();
    assert!(mesh.write(&mut w).is_err());
}
