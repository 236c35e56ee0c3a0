use cgmath::{InnerSpace, Vector2, Vector3, Vector4};
use crate::errors::{unsupported, Result};
use crate::io::writer::Writer;
use crate::model::mesh::{check_len, count_i16, MeshFlags, Triangle};
use crate::util::cur::Cur;

/// Mesh with morph shapes. The first shape is the base; the others are
/// offsets from it.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshType5 {
    pub material: i16,
    pub material2: i16,
    /// Flags other than `TEX_COORD` and `TEX_COORD2`, which follow the
    /// texture coordinate arrays.
    pub flags: MeshFlags,
    pub triangles: Vec<Triangle>,
    pub shapes: Vec<MorphShape>,
    pub tex_coords: Option<Vec<Vector2<f32>>>,
    pub tex_coords2: Option<Vec<Vector2<f32>>>,
    pub node_batches: Vec<MeshType5NodeBatch>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MorphShape {
    pub positions: Vec<Vector3<f32>>,
    pub normals: Vec<Vector3<f32>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshType5NodeBatch {
    pub node_index: i16,
    /// Node space position in xyz, weight in w.
    pub positions: Vec<Vector4<f32>>,
    pub normals: Vec<Vector3<f32>>,
}

impl Default for MeshType5 {
    fn default() -> MeshType5 {
        MeshType5 {
            material: 0,
            material2: 0,
            flags: MeshFlags::SMOOTH_SHADING | MeshFlags::BIT5 | MeshFlags::BIT6 |
                MeshFlags::REQUIRED_FOR_FIELD | MeshFlags::BIT22 | MeshFlags::FIELD_TEXTURE |
                MeshFlags::BIT28,
            triangles: vec![],
            shapes: vec![],
            tex_coords: None,
            tex_coords2: None,
            node_batches: vec![],
        }
    }
}

impl MeshType5 {
    pub fn vertex_count(&self) -> usize {
        if let Some(shape) = self.shapes.first() {
            shape.positions.len()
        } else if let Some(nb) = self.node_batches.first() {
            nb.positions.len()
        } else {
            self.tex_coords.as_ref().map(|uv| uv.len()).unwrap_or(0)
        }
    }

    pub fn header_flags(&self) -> MeshFlags {
        self.flags
            .with_data(MeshFlags::TEX_COORD, self.tex_coords.is_some())
            .with_data(MeshFlags::TEX_COORD2, self.tex_coords2.is_some())
    }

    /// Absolute positions and normals of shape `i`.
    pub fn shape(&self, i: usize) -> Option<MorphShape> {
        let base = self.shapes.first()?;
        let shape = self.shapes.get(i)?;
        if i == 0 {
            return Some(shape.clone());
        }
        Some(MorphShape {
            positions: shape.positions.iter().zip(&base.positions)
                .map(|(&p, &b)| p + b)
                .collect(),
            normals: shape.normals.iter().zip(&base.normals)
                .map(|(&n, &b)| {
                    let sum = n + b;
                    if sum.magnitude2() > 0.0 { sum.normalize() } else { sum }
                })
                .collect(),
        })
    }

    pub fn read(cur: &mut Cur) -> Result<MeshType5> {
        cur.expect(0i16, "mesh_type5.field00")?;
        fields!(cur, mesh_type5 {
            material: i16,
            shape_count: i16,
            material2: i16,
        });
        cur.expect(0i32, "mesh_type5.field08")?;
        fields!(cur, mesh_type5 {
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

        let mut shapes = Vec::with_capacity(shape_count.max(0) as usize);
        for _ in 0..shape_count.max(0) {
            let positions = cur.next_vec::<Vector3<f32>>(vertex_count)?;
            cur.align(16)?;
            let normals = cur.next_vec::<Vector3<f32>>(vertex_count)?;
            cur.align(16)?;
            shapes.push(MorphShape { positions, normals });
        }

        let tex_coords = if flags.contains(MeshFlags::TEX_COORD) {
            Some(cur.next_vec::<Vector2<f32>>(vertex_count)?)
        } else {
            None
        };
        let tex_coords2 = if flags.contains(MeshFlags::TEX_COORD2) {
            Some(cur.next_vec::<Vector2<f32>>(vertex_count)?)
        } else {
            None
        };

        let mut node_batches = Vec::with_capacity(used_nodes.len());
        for node_index in used_nodes {
            let positions = cur.next_vec::<Vector4<f32>>(vertex_count)?;
            let normals = cur.next_vec::<Vector3<f32>>(vertex_count)?;
            cur.align(16)?;
            node_batches.push(MeshType5NodeBatch { node_index, positions, normals });
        }

        Ok(MeshType5 {
            material,
            material2,
            flags: flags - (MeshFlags::TEX_COORD | MeshFlags::TEX_COORD2),
            triangles,
            shapes,
            tex_coords,
            tex_coords2,
            node_batches,
        })
    }

    pub fn write(&self, w: &mut Writer) -> Result<()> {
        let vertex_count = self.vertex_count();
        for shape in &self.shapes {
            check_len("shape positions", Some(&shape.positions), vertex_count)?;
            check_len("shape normals", Some(&shape.normals), vertex_count)?;
        }
        for nb in &self.node_batches {
            check_len("node batch positions", Some(&nb.positions), vertex_count)?;
            check_len("node batch normals", Some(&nb.normals), vertex_count)?;
        }
        check_len("texture coordinates", self.tex_coords.as_ref(), vertex_count)?;
        check_len("second texture coordinates", self.tex_coords2.as_ref(), vertex_count)?;
        if self.tex_coords2.is_some() && self.tex_coords.is_none() {
            return Err(unsupported("second texture coordinates without the first set"));
        }

        w.put(0i16);
        w.put(self.material);
        w.put(count_i16("shape count", self.shapes.len())?);
        w.put(self.material2);
        w.put(0i32);
        w.put(count_i16("triangle count", self.triangles.len())?);
        w.put(count_i16("vertex count", vertex_count)?);
        w.put(self.header_flags().bits());
        w.put(count_i16("used node count", self.node_batches.len())?);
        for nb in &self.node_batches {
            w.put(nb.node_index);
        }
        w.align(16);

        w.put_all(&self.triangles);
        w.align(16);

        for shape in &self.shapes {
            w.put_all(&shape.positions);
            w.align(16);
            w.put_all(&shape.normals);
            w.align(16);
        }

        if let Some(ref uv) = self.tex_coords {
            w.put_all(uv);
        }
        if let Some(ref uv) = self.tex_coords2 {
            w.put_all(uv);
        }

        for nb in &self.node_batches {
            w.put_all(&nb.positions);
            w.put_all(&nb.normals);
            w.align(16);
        }
        Ok(())
    }
}

#[cfg(test)]
use crate::model::mesh::Mesh;

#[cfg(test)]
fn morph_mesh() -> MeshType5 {
    MeshType5 {
        material: 1,
        material2: 2,
        triangles: vec![Triangle::new(0, 1, 2)],
        shapes: vec![
            MorphShape {
                positions: vec![Vector3::new(1.0, 1.0, 1.0); 3],
                normals: vec![Vector3::new(0.0, 1.0, 0.0); 3],
            },
            MorphShape {
                positions: vec![Vector3::new(0.0, 2.0, 0.0); 3],
                normals: vec![Vector3::new(0.0, 0.0, 0.0); 3],
            },
        ],
        tex_coords: Some(vec![Vector2::new(0.5, 0.5); 3]),
        ..Default::default()
    }
}

#[test]
fn test_round_trip() {
    let mesh = Mesh::Type5(morph_mesh());
    let mut w = Writer::new();
    mesh.write(&mut w).unwrap();
    let bytes = w.into_bytes();
    let mut cur = Cur::new(&bytes);
    assert_eq!(Mesh::read(&mut cur).unwrap(), Some(mesh));
    assert_eq!(cur.pos(), bytes.len());
}

#[test]
fn test_node_batches_only() {
    let mesh = Mesh::Type5(MeshType5 {
        node_batches: vec![
            MeshType5NodeBatch {
                node_index: 3,
                positions: vec![Vector4::new(0.0, 0.0, 0.0, 1.0); 2],
                normals: vec![Vector3::new(1.0, 0.0, 0.0); 2],
            },
        ],
        ..Default::default()
    });
    assert_eq!(mesh.vertex_count(), 2);
    let mut w = Writer::new();
    mesh.write(&mut w).unwrap();
    let bytes = w.into_bytes();
    let mut cur = Cur::new(&bytes);
    assert_eq!(Mesh::read(&mut cur).unwrap(), Some(mesh));
}

#[test]
fn test_shape_offsets() {
    let mesh = morph_mesh();
    let shape = mesh.shape(1).unwrap();
    assert_eq!(shape.positions[0], Vector3::new(1.0, 3.0, 1.0));
    assert_eq!(shape.normals[0], Vector3::new(0.0, 1.0, 0.0));
    assert!(mesh.shape(2).is_none());
}
