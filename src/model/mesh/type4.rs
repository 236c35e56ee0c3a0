use cgmath::Vector3;
use crate::errors::Result;
use crate::io::writer::Writer;
use crate::model::mesh::{check_len, count_i16, MeshFlags, Triangle};
use crate::util::cur::Cur;

/// Unweighted mesh stored as plain arrays. Normals are always present.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshType4 {
    pub material: i16,
    pub flags: MeshFlags,
    pub triangles: Vec<Triangle>,
    pub positions: Vec<Vector3<f32>>,
    pub normals: Vec<Vector3<f32>>,
}

impl Default for MeshType4 {
    fn default() -> MeshType4 {
        MeshType4 {
            material: 0,
            flags: MeshFlags::SMOOTH_SHADING | MeshFlags::BIT5 | MeshFlags::BIT6 |
                MeshFlags::REQUIRED_FOR_FIELD | MeshFlags::BIT22 | MeshFlags::NORMAL,
            triangles: vec![],
            positions: vec![],
            normals: vec![],
        }
    }
}

impl MeshType4 {
    pub fn read(cur: &mut Cur) -> Result<MeshType4> {
        cur.expect(0i16, "mesh_type4.field00")?;
        let material = cur.next::<i16>()?;
        cur.expect(0i16, "mesh_type4.field04")?;
        cur.expect(0i16, "mesh_type4.field06")?;
        cur.expect(0i32, "mesh_type4.field08")?;
        fields!(cur, mesh_type4 {
            triangle_count: i16,
            vertex_count: i16,
            flags: u32,
        });
        cur.align(16)?;
        let triangles = cur.next_vec::<Triangle>(triangle_count as u16 as usize)?;
        cur.align(16)?;
        let positions = cur.next_vec::<Vector3<f32>>(vertex_count as u16 as usize)?;
        cur.align(16)?;
        let normals = cur.next_vec::<Vector3<f32>>(vertex_count as u16 as usize)?;
        cur.align(16)?;
        Ok(MeshType4 {
            material,
            flags: MeshFlags::from_bits_truncate(flags),
            triangles,
            positions,
            normals,
        })
    }

    pub fn write(&self, w: &mut Writer) -> Result<()> {
        check_len("normals", Some(&self.normals), self.positions.len())?;
        w.put(0i16);
        w.put(self.material);
        w.put(0i16);
        w.put(0i16);
        w.put(0i32);
        w.put(count_i16("triangle count", self.triangles.len())?);
        w.put(count_i16("vertex count", self.positions.len())?);
        w.put(self.flags.bits());
        w.align(16);
        w.put_all(&self.triangles);
        w.align(16);
        w.put_all(&self.positions);
        w.align(16);
        w.put_all(&self.normals);
        w.align(16);
        Ok(())
    }
}

#[test]
fn test_round_trip() {
    use crate::model::mesh::Mesh;

    let mesh = Mesh::Type4(MeshType4 {
        material: 3,
        triangles: vec![Triangle::new(0, 1, 2), Triangle::new(2, 1, 3)],
        positions: vec![Vector3::new(0.0, 1.0, 2.0); 4],
        normals: vec![Vector3::new(0.0, 1.0, 0.0); 4],
        ..Default::default()
    });
    let mut w = Writer::new();
    mesh.write(&mut w).unwrap();
    let bytes = w.into_bytes();
    // header 4 + 20 -> 32, triangles 12 -> 48, positions 48 -> 96, normals 48
    assert_eq!(bytes.len(), 144);

    let mut cur = Cur::new(&bytes);
    assert_eq!(Mesh::read(&mut cur).unwrap(), Some(mesh));
    assert_eq!(cur.pos(), bytes.len());
}
