//! Models (MD00).
//!
//! A model is a list of nodes, a list of materials and a list of
//! extensions. Nodes carry the geometry; a node's geometry holds up to three
//! mesh lists.
//!
//! The content starts with a relocation header. When the model is a
//! standalone resource, offsets in it are relative to the end of that
//! header and the relocation table is written after everything else. A
//! model embedded in a field resource has neither; its offsets are relative
//! to the field resource and the field resource's table covers them.

pub mod geometry;
pub mod material;
pub mod mesh;
pub mod node;

use cgmath::{Matrix4, SquareMatrix};
use crate::errors::{malformed, Result};
use crate::io::header::{file_type, ident, ResourceDescriptor, ResourceHeader};
use crate::io::reloc;
use crate::io::resource::Resource;
use crate::io::writer::{Writable, Writer, PRIORITY_LAST};
use crate::util::cur::Cur;
use crate::util::view::Viewable;

pub use self::geometry::{Geometry, MeshList};
pub use self::material::{Material, MaterialFlags};
pub use self::mesh::Mesh;
pub use self::node::{BoundingBox, Node};

/// RGBA color, one byte per channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Color {
        Color { r, g, b, a }
    }
}

impl Viewable for Color {
    fn size() -> usize { 4 }
    fn view(buf: &[u8]) -> Color {
        Color::new(buf[0], buf[1], buf[2], buf[3])
    }
}

impl Writable for Color {
    fn write_le(&self, out: &mut [u8]) {
        out[..4].copy_from_slice(&[self.r, self.g, self.b, self.a]);
    }
    fn size() -> usize { 4 }
}

/// Identifier of the node name extension, "NDNM".
pub const NODE_NAME_EXTENSION: i32 = 0x4d4e444e;

/// Extension kept as raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelExtension {
    pub id: i32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Model {
    pub nodes: Vec<Node>,
    pub materials: Vec<Material>,
    /// Extensions other than node names, which live in the nodes.
    pub extensions: Vec<ModelExtension>,
}

impl Model {
    /// Meshes of every node's geometry and deprecated mesh lists.
    pub fn meshes(&self) -> impl Iterator<Item = &Mesh> {
        self.nodes.iter().flat_map(|node| {
            node.geometry.iter().flat_map(|g| g.meshes())
                .chain(node.deprecated_mesh_list.iter().flat_map(|l| l.meshes.iter()))
                .chain(node.deprecated_mesh_list2.iter().flat_map(|l| l.meshes.iter()))
        })
    }

    /// Number of morpher meshes in the opaque lists, as stored in the model
    /// header.
    pub fn morpher_mesh_count(&self) -> usize {
        self.nodes.iter()
            .filter_map(|node| node.geometry.as_ref()?.opaque())
            .map(|list| list.meshes.iter().filter(|m| m.has_morphers()).count())
            .sum()
    }

    /// World transform of every node. Parents precede their children, so one
    /// pass suffices.
    pub fn world_transforms(&self) -> Vec<Matrix4<f32>> {
        let mut mats: Vec<Matrix4<f32>> = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let parent = node.parent
                .and_then(|p| mats.get(p).cloned())
                .unwrap_or_else(Matrix4::identity);
            mats.push(parent * node.local_transform());
        }
        mats
    }

    pub fn read(cur: &mut Cur, field_object: bool) -> Result<Model> {
        fields!(cur, model {
            relocation_table_offset: (offset),
            relocation_table_size: u32,
        });
        trace!("relocation table at {:#x} ({:#x} bytes)",
            relocation_table_offset, relocation_table_size);
        cur.expect(0u32, "model.field08")?;
        cur.expect(0u32, "model.field0c")?;

        let depth = cur.depth();
        if !field_object {
            cur.push_base_here();
        }
        let res = Model::read_body(cur);
        if !field_object {
            cur.pop_base()?;
        }
        check_stream!(cur.depth() == depth)?;
        res
    }

    fn read_body(cur: &mut Cur) -> Result<Model> {
        let nodes = cur.read_offset(|cur| {
            let count = cur.next::<i32>()?;
            cur.align(16)?;
            let mut nodes: Vec<Node> = Vec::with_capacity(count.max(0) as usize);
            for _ in 0..count.max(0) {
                let node = Node::read(cur, &nodes)?;
                nodes.push(node);
            }
            Ok(nodes)
        })?.unwrap_or_default();

        let materials = cur.read_offset(|cur| {
            let count = cur.next::<i32>()?;
            (0..count.max(0)).map(|_| Material::read(cur)).collect::<Result<Vec<_>>>()
        })?.unwrap_or_default();

        fields!(cur, model {
            morpher_mesh_count: i32,
        });

        let mut model = Model { nodes, materials, extensions: vec![] };
        cur.read_offset(|cur| model.read_extensions(cur))?;

        if morpher_mesh_count as usize != model.morpher_mesh_count() {
            debug!("model declares {} morpher meshes, found {}",
                morpher_mesh_count, model.morpher_mesh_count());
        }
        Ok(model)
    }

    fn read_extensions(&mut self, cur: &mut Cur) -> Result<()> {
        loop {
            let start = cur.pos();
            fields!(cur, extension {
                id: i32,
                size: i32,
            });
            if id == 0 {
                return Ok(());
            }
            if size < 8 {
                return Err(malformed(format!("extension {:#x} has size {}", id, size)));
            }
            let end = start + size as usize;

            if id == NODE_NAME_EXTENSION {
                for _ in 0..self.nodes.len() {
                    let name = cur.next_string()?;
                    cur.align(4)?;
                    let node_id = cur.next::<i32>()?;
                    let node = match self.nodes.get_mut(node_id as usize) {
                        Some(node) if node_id >= 0 => node,
                        _ => return Err(malformed(format!("node name for node {}", node_id))),
                    };
                    node.name = if name.is_empty() { None } else { Some(name) };
                }
            } else {
                let data = cur.next_n_u8s(size as usize - 8)?.to_vec();
                self.extensions.push(ModelExtension { id, data });
            }

            cur.jump_to(end)?;
        }
    }

    pub fn write<'a>(&'a self, w: &mut Writer<'a>, field_object: bool) -> Result<()> {
        let depth = w.depth();
        if field_object {
            w.put(0u32);
            w.put(0u32);
        } else {
            w.clear_slots();
            let start = w.pos();
            w.push_base_at(start + 16);
            w.schedule_offset_unrecorded(PRIORITY_LAST, 16, move |w| {
                let mut slots = w.slots().to_vec();
                slots.sort();
                let table = reloc::encode(&slots, w.base())?;
                debug!("model relocation table: {} slots, {:#x} bytes", slots.len(), table.len());
                w.put_bytes(&table);
                w.patch_u32(start + 4, table.len() as u32);
                Ok(())
            });
            w.put(0u32);
        }
        w.put(0u32);
        w.put(0u32);

        w.schedule_offset(16, move |w| {
            w.put(self.nodes.len() as i32);
            w.align(16);
            for (i, node) in self.nodes.iter().enumerate() {
                node.write(w, i)?;
            }
            Ok(())
        });
        w.schedule_offset(16, move |w| {
            w.put(self.materials.len() as i32);
            for (i, material) in self.materials.iter().enumerate() {
                material.write(w, i);
            }
            Ok(())
        });
        w.put(self.morpher_mesh_count() as i32);
        w.schedule_offset(16, move |w| self.write_extensions(w));

        if !field_object {
            w.run_scheduled_writes()?;
            w.pop_base()?;
        }
        if w.depth() != depth {
            return Err(malformed("model write left the base stack unbalanced"));
        }
        Ok(())
    }

    fn write_extensions(&self, w: &mut Writer) -> Result<()> {
        if self.nodes.iter().any(|node| node.name.is_some()) {
            write_extension(w, NODE_NAME_EXTENSION, |w| {
                for (i, node) in self.nodes.iter().enumerate() {
                    w.put_string(node.name.as_ref().map(|s| s.as_str()).unwrap_or(""));
                    w.align(4);
                    w.put(i as i32);
                }
            });
        }
        for ext in &self.extensions {
            write_extension(w, ext.id, |w| w.put_bytes(&ext.data));
        }
        w.put(0i32);
        w.put(0i32);
        w.align(16);
        Ok(())
    }
}

/// Writes an extension record: id, size, body, padding to 16.
fn write_extension<F: FnOnce(&mut Writer)>(w: &mut Writer, id: i32, body: F) {
    let start = w.pos();
    w.skip(8);
    body(w);
    w.align(16);
    let end = w.pos();
    w.seek(start);
    w.put(id);
    w.put((end - start) as i32);
    w.seek(end);
}

impl Resource for Model {
    const DESCRIPTOR: ResourceDescriptor = ResourceDescriptor {
        file_type: file_type::MODEL,
        identifier: ident::MODEL,
    };

    fn read_content(cur: &mut Cur, _header: &ResourceHeader) -> Result<Model> {
        Model::read(cur, false)
    }

    fn write_content<'a>(&'a self, w: &mut Writer<'a>) -> Result<()> {
        self.write(w, false)
    }
}

#[cfg(test)]
use crate::io::header::FieldResourceHeader;
#[cfg(test)]
use crate::io::resource::{
    field_relocations, read_field_resource, read_resource, write_field_resource,
    write_resource, FieldResource,
};
#[cfg(test)]
use crate::model::mesh::{MeshType4, MeshType5, MorphShape, Triangle};
#[cfg(test)]
use cgmath::{Vector3, Vector4};

#[cfg(test)]
fn flat_mesh() -> Mesh {
    Mesh::Type4(MeshType4 {
        material: 0,
        triangles: vec![Triangle::new(0, 1, 2)],
        positions: vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        ],
        normals: vec![Vector3::new(0.0, 0.0, 1.0); 3],
        ..Default::default()
    })
}

#[cfg(test)]
fn morph_mesh() -> Mesh {
    Mesh::Type5(MeshType5 {
        triangles: vec![Triangle::new(0, 1, 2)],
        shapes: vec![MorphShape {
            positions: vec![Vector3::new(0.0, 0.0, 0.0); 3],
            normals: vec![Vector3::new(0.0, 1.0, 0.0); 3],
        }],
        ..Default::default()
    })
}

#[cfg(test)]
fn sample_model() -> Model {
    let root = Node {
        name: Some("root".to_string()),
        ..Default::default()
    };
    let body = Node {
        name: Some("body".to_string()),
        parent: Some(0),
        position: Vector3::new(0.0, 2.0, 0.0),
        bounding_box: Some(BoundingBox {
            min: Vector3::new(0.0, 0.0, 0.0),
            max: Vector3::new(1.0, 1.0, 0.0),
        }),
        geometry: Some(Geometry {
            mesh_lists: vec![MeshList { field02: 0, meshes: vec![flat_mesh(), morph_mesh()] }],
        }),
        ..Default::default()
    };
    let unnamed = Node { parent: Some(1), ..Default::default() };
    Model {
        nodes: vec![root, body, unnamed],
        materials: vec![Material::with_texture(0), Material::with_overlay(1, 2, 3)],
        extensions: vec![ModelExtension { id: 0x12345678, data: vec![1, 2, 3, 4, 5, 6, 7, 8] }],
    }
}

#[test]
fn test_round_trip() {
    let model = sample_model();
    let mut w = Writer::new();
    write_resource(&mut w, &model).unwrap();
    assert_eq!(w.depth(), 0);
    let bytes = w.into_bytes();
    assert_eq!(bytes.len() % 64, 0);

    let mut cur = Cur::new(&bytes);
    let model2: Model = read_resource(&mut cur, None).unwrap();
    assert_eq!(cur.depth(), 0);
    assert_eq!(model2, model);
    assert_eq!(model2.morpher_mesh_count(), 1);

    let mut w = Writer::new();
    write_resource(&mut w, &model2).unwrap();
    assert_eq!(w.into_bytes(), bytes);
}

#[test]
fn test_relocation_table_lists_every_offset() {
    let model = sample_model();
    let mut w = Writer::new();
    write_resource(&mut w, &model).unwrap();
    let mut slots = w.slots().to_vec();
    slots.sort();
    let bytes = w.into_bytes();

    // the content starts after the 16-byte resource header
    let mut cur = Cur::new(&bytes);
    cur.jump_to(16).unwrap();
    let table_offset = cur.next::<u32>().unwrap() as usize;
    let table_size = cur.next::<u32>().unwrap() as usize;
    let base = 32;
    let table = &bytes[base + table_offset..base + table_offset + table_size];
    assert_eq!(reloc::decode(table, base).unwrap(), slots);

    // nodes, materials, extensions are the first three offsets
    assert_eq!(&slots[..2], &[32, 36]);
    assert_eq!(slots[2], 44);
    for &slot in &slots {
        let x = u32::from_le_bytes([bytes[slot], bytes[slot + 1], bytes[slot + 2], bytes[slot + 3]]);
        assert!(x != 0 && base + (x as usize) < bytes.len());
    }
}

#[test]
fn test_node_names() {
    let model = sample_model();
    let mut w = Writer::new();
    write_resource(&mut w, &model).unwrap();
    let bytes = w.into_bytes();
    let mut cur = Cur::new(&bytes);
    let model2: Model = read_resource(&mut cur, None).unwrap();
    let names: Vec<Option<&str>> = model2.nodes.iter()
        .map(|n| n.name.as_ref().map(|s| s.as_str()))
        .collect();
    assert_eq!(names, vec![Some("root"), Some("body"), None]);
}

#[test]
fn test_world_transforms() {
    let model = sample_model();
    let mats = model.world_transforms();
    let p = mats[2] * Vector4::new(0.0, 0.0, 0.0, 1.0);
    assert_eq!(p, Vector4::new(0.0, 2.0, 0.0, 1.0));
}

/// A model embedded in a field resource.
#[cfg(test)]
#[derive(Debug, PartialEq)]
struct FieldModel(Model);

#[cfg(test)]
impl FieldResource for FieldModel {
    const DESCRIPTOR: ResourceDescriptor = ResourceDescriptor {
        file_type: file_type::FIELD_RESOURCE,
        identifier: ident::FIELD_RESOURCE2,
    };

    fn read_content(cur: &mut Cur, _header: &FieldResourceHeader) -> Result<FieldModel> {
        Ok(FieldModel(Model::read(cur, true)?))
    }

    fn write_content<'a>(&'a self, w: &mut Writer<'a>) -> Result<()> {
        self.0.write(w, true)
    }
}

#[test]
fn test_field_object_model() {
    let model = FieldModel(sample_model());
    let mut w = Writer::new();
    write_field_resource(&mut w, &model).unwrap();
    assert_eq!(w.depth(), 0);
    let slots = w.slots().to_vec();
    let bytes = w.into_bytes();

    // no relocation header of its own
    assert_eq!(&bytes[20..28], &[0; 8]);
    let mut sorted = slots.clone();
    sorted.sort();
    assert_eq!(field_relocations(&bytes, 0).unwrap(), sorted);

    let mut cur = Cur::new(&bytes);
    let model2: FieldModel = read_field_resource(&mut cur, None).unwrap();
    assert_eq!(model2, model);
}
