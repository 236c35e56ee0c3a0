use crate::errors::{unsupported, Result};
use crate::io::writer::Writer;
use crate::model::mesh::Mesh;
use crate::util::cur::Cur;

/// Most geometries hold one or two lists; the format has room for three.
pub const MAX_MESH_LISTS: usize = 3;

/// The mesh lists of a node: opaque meshes, translucent meshes, and a third
/// list of unknown purpose.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Geometry {
    pub mesh_lists: Vec<MeshList>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshList {
    pub field02: i16,
    pub meshes: Vec<Mesh>,
}

impl Geometry {
    pub fn opaque(&self) -> Option<&MeshList> {
        self.mesh_lists.get(0)
    }

    pub fn translucent(&self) -> Option<&MeshList> {
        self.mesh_lists.get(1)
    }

    pub fn meshes(&self) -> impl Iterator<Item = &Mesh> {
        self.mesh_lists.iter().flat_map(|list| list.meshes.iter())
    }

    /// Reads mesh list offsets until a zero one or until the list array is
    /// full.
    pub fn read(cur: &mut Cur) -> Result<Geometry> {
        let mut mesh_lists = vec![];
        while mesh_lists.len() < MAX_MESH_LISTS {
            match cur.read_offset(MeshList::read)? {
                Some(list) => mesh_lists.push(list),
                None => break,
            }
        }
        Ok(Geometry { mesh_lists })
    }

    pub fn write<'a>(&'a self, w: &mut Writer<'a>) -> Result<()> {
        if self.mesh_lists.len() > MAX_MESH_LISTS {
            return Err(unsupported(format!("{} mesh lists in one geometry", self.mesh_lists.len())));
        }
        for list in &self.mesh_lists {
            w.schedule_offset(4, move |w| list.write(w));
        }
        if self.mesh_lists.len() < MAX_MESH_LISTS {
            w.put(0u32);
        }
        Ok(())
    }
}

impl MeshList {
    pub fn read(cur: &mut Cur) -> Result<MeshList> {
        fields!(cur, mesh_list {
            count: i16,
            field02: i16,
        });
        let mut meshes = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count.max(0) {
            if let Some(mesh) = cur.read_offset(Mesh::read)?.and_then(|m| m) {
                meshes.push(mesh);
            }
        }
        Ok(MeshList { field02, meshes })
    }

    pub fn write<'a>(&'a self, w: &mut Writer<'a>) -> Result<()> {
        if self.meshes.len() > i16::max_value() as usize {
            return Err(unsupported(format!("{} meshes in one list", self.meshes.len())));
        }
        w.put(self.meshes.len() as i16);
        w.put(self.field02);
        for mesh in &self.meshes {
            w.schedule_offset(16, move |w| mesh.write(w));
        }
        Ok(())
    }
}

#[cfg(test)]
use crate::model::mesh::{MeshType4, Triangle};
#[cfg(test)]
use cgmath::Vector3;

#[cfg(test)]
fn flat_mesh(material: i16) -> Mesh {
    Mesh::Type4(MeshType4 {
        material,
        triangles: vec![Triangle::new(0, 1, 2)],
        positions: vec![Vector3::new(1.0, 0.0, 0.0); 3],
        normals: vec![Vector3::new(0.0, 0.0, 1.0); 3],
        ..Default::default()
    })
}

#[cfg(test)]
fn write_geometry(geometry: &Geometry) -> Vec<u8> {
    let mut w = Writer::new();
    geometry.write(&mut w).unwrap();
    w.run_scheduled_writes().unwrap();
    w.into_bytes()
}

#[test]
fn test_two_lists() {
    let geometry = Geometry {
        mesh_lists: vec![
            MeshList { field02: 0, meshes: vec![flat_mesh(0), flat_mesh(1)] },
            MeshList { field02: 5, meshes: vec![flat_mesh(2)] },
        ],
    };
    let bytes = write_geometry(&geometry);
    // two offsets and the terminator
    assert_eq!(&bytes[8..12], &[0, 0, 0, 0]);
    let mut cur = Cur::new(&bytes);
    assert_eq!(Geometry::read(&mut cur).unwrap(), geometry);
    assert_eq!(cur.pos(), 12);
}

#[test]
fn test_full_geometry_has_no_terminator() {
    let list = MeshList { field02: 0, meshes: vec![flat_mesh(0)] };
    let geometry = Geometry { mesh_lists: vec![list.clone(), list.clone(), list] };
    let bytes = write_geometry(&geometry);
    let mut cur = Cur::new(&bytes);
    assert_eq!(Geometry::read(&mut cur).unwrap(), geometry);
    assert_eq!(cur.pos(), 12);
    assert_eq!(geometry.meshes().count(), 3);
}

#[test]
fn test_skipped_mesh_type() {
    // one list of two meshes, the first of them a type 3
    let m = flat_mesh(4);
    let mut w = Writer::new();
    w.put(2i16);
    w.put(0i16);
    w.put(12u32);
    w.put(16u32);
    w.put(3i32);
    m.write(&mut w).unwrap();
    let bytes = w.into_bytes();

    let mut cur = Cur::new(&bytes);
    let list = MeshList::read(&mut cur).unwrap();
    assert_eq!(list.meshes, vec![m]);
}
