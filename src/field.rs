//! Field scenes (FLD1).
//!
//! A scene is a field resource listing the objects placed in a field map.
//! Objects are grouped into lists by the kind of resource they point at.
//! Models stored here have no relocation table of their own; their offsets
//! go into the scene's table.

use cgmath::{Matrix4, Rad, Vector3, Vector4};
use crate::errors::{malformed, unsupported, Result};
use crate::io::header::{file_type, ident, FieldResourceHeader, ResourceDescriptor};
use crate::io::reloc;
use crate::io::resource::FieldResource;
use crate::io::writer::Writer;
use crate::model::Model;
use crate::util::cur::Cur;

/// Kinds of resource a field object points at.
pub mod object_kind {
    pub const MODEL: i32 = 1;
    pub const TYPE3: i32 = 3;
    pub const TEXTURE_LIST_FILE_NAME: i32 = 4;
    pub const EFFECT: i32 = 5;
    pub const LIGHT: i32 = 6;
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldScene {
    /// Object lists in file order, one kind per list.
    pub lists: Vec<FieldObjectList>,
    /// Undecoded block behind the scene's second offset. It runs up to the
    /// next offset target, so it includes its padding.
    pub field1c: Option<Vec<u8>>,
}

impl FieldScene {
    pub fn objects(&self) -> impl Iterator<Item = &FieldObject> {
        self.lists.iter().flat_map(|list| list.objects.iter())
    }

    /// Adds an object to the list of its kind. Lists are kept sorted by
    /// kind when a new one is needed.
    pub fn add_object(&mut self, object: FieldObject) {
        let kind = object.kind();
        if let Some(list) = self.lists.iter_mut().find(|list| list.kind == kind) {
            list.objects.push(object);
            return;
        }
        let at = self.lists.iter().position(|list| list.kind > kind).unwrap_or(self.lists.len());
        self.lists.insert(at, FieldObjectList { kind, objects: vec![object] });
    }
}

impl FieldResource for FieldScene {
    const DESCRIPTOR: ResourceDescriptor = ResourceDescriptor {
        file_type: file_type::FIELD_RESOURCE,
        identifier: ident::FIELD_SCENE,
    };

    fn read_content(cur: &mut Cur, header: &FieldResourceHeader) -> Result<FieldScene> {
        let list_count = cur.next::<i32>()?;
        let lists = cur.read_offset(|cur| {
            (0..list_count.max(0))
                .map(|_| FieldObjectList::read(cur))
                .collect::<Result<Vec<_>>>()
        })?.unwrap_or_default();

        let field1c_offset = cur.next::<u32>()?;
        let field1c = match field1c_offset {
            0 => None,
            offset => {
                let start = cur.resolve(offset)?;
                let end = block_end(cur, header, start)?;
                cur.read_at(offset, |cur| Ok(cur.next_n_u8s(end - start)?.to_vec()))?
            }
        };
        debug!("field scene: {} object lists", lists.len());
        Ok(FieldScene { lists, field1c })
    }

    fn write_content<'a>(&'a self, w: &mut Writer<'a>) -> Result<()> {
        for list in &self.lists {
            list.check()?;
        }
        w.put(self.lists.len() as i32);
        w.schedule_offset_if(non_empty(&self.lists), 16, |w, lists| {
            for list in lists {
                list.write(w);
            }
            Ok(())
        });
        w.schedule_offset_if(self.field1c.as_ref(), 16, |w, block| {
            w.put_bytes(block);
            Ok(())
        });
        Ok(())
    }
}

/// End of an undecoded block at `start`: the nearest offset target after
/// it, or the end of the data.
fn block_end(cur: &Cur, header: &FieldResourceHeader, start: usize) -> Result<usize> {
    let base = cur.base();
    let mut c = cur.clone();
    c.jump_to(base + header.relocation_table_offset as usize)?;
    let table = c.next_n_u8s(header.relocation_table_size as usize)?;
    let slots = reloc::decode(table, base)?;

    let mut end = base + header.data_size as usize;
    if end < start {
        return Err(malformed(format!("block at {:#x} is past the end of the data", start)));
    }
    for &slot in &slots {
        c.jump_to(slot)?;
        let target = base + c.next::<u32>()? as usize;
        if target > start && target < end {
            end = target;
        }
    }
    if slots.iter().any(|&slot| slot >= start && slot < end) {
        return Err(unsupported(format!("offsets inside the undecoded block at {:#x}", start)));
    }
    Ok(end)
}

fn non_empty<T>(xs: &[T]) -> Option<&[T]> {
    if xs.is_empty() { None } else { Some(xs) }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldObjectList {
    pub kind: i32,
    pub objects: Vec<FieldObject>,
}

impl FieldObjectList {
    pub fn read(cur: &mut Cur) -> Result<FieldObjectList> {
        fields!(cur, object_list {
            kind: i32,
            count: i32,
        });
        let objects = cur.read_offset(|cur| {
            (0..count.max(0))
                .map(|_| FieldObject::read(cur))
                .collect::<Result<Vec<_>>>()
        })?.unwrap_or_default();
        if let Some(object) = objects.iter().find(|object| object.kind() != kind) {
            warn!("object {} of kind {} is in a list of kind {}", object.id, object.kind(), kind);
        }
        Ok(FieldObjectList { kind, objects })
    }

    /// Every object must have the list's kind.
    pub fn check(&self) -> Result<()> {
        match self.objects.iter().find(|object| object.kind() != self.kind) {
            Some(object) => Err(unsupported(format!(
                "object {} of kind {} in a list of kind {}", object.id, object.kind(), self.kind,
            ))),
            None => Ok(()),
        }
    }

    pub fn write<'a>(&'a self, w: &mut Writer<'a>) {
        w.put(self.kind);
        w.put(self.objects.len() as i32);
        w.schedule_offset_if(non_empty(&self.objects), 16, |w, objects| {
            for object in objects {
                object.write(w);
            }
            Ok(())
        });
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldObject {
    pub id: i32,
    pub name: Option<String>,
    pub field0c: i32,
    pub transform: Option<FieldObjectTransform>,
    pub field14: Option<FieldObjectField14>,
    pub field18: i32,
    pub field1c: i32,
    pub resource: FieldObjectResource,
}

impl FieldObject {
    pub fn new(id: i32, resource: FieldObjectResource) -> FieldObject {
        FieldObject {
            id,
            name: None,
            field0c: 0,
            transform: Some(FieldObjectTransform::default()),
            field14: Some(FieldObjectField14::default()),
            field18: 0,
            field1c: 0,
            resource,
        }
    }

    pub fn kind(&self) -> i32 {
        self.resource.kind()
    }

    pub fn read(cur: &mut Cur) -> Result<FieldObject> {
        fields!(cur, field_object {
            id: i32,
            kind: i32,
        });
        let name = cur.read_offset(|cur| cur.next_string())?;
        let field0c = cur.next::<i32>()?;
        let transform = cur.read_offset(FieldObjectTransform::read)?;
        let field14 = cur.read_offset(FieldObjectField14::read)?;
        fields!(cur, field_object {
            field18: i32,
            field1c: i32,
            resource_offset: (offset),
        });
        let resource = FieldObjectResource::read_at(cur, kind, resource_offset)?;
        Ok(FieldObject { id, name, field0c, transform, field14, field18, field1c, resource })
    }

    pub fn write<'a>(&'a self, w: &mut Writer<'a>) {
        w.put(self.id);
        w.put(self.kind());
        w.schedule_offset_if(self.name.as_ref(), 16, |w, name| {
            w.put_string(name);
            Ok(())
        });
        w.put(self.field0c);
        w.schedule_offset_if(self.transform.as_ref(), 16, |w, transform| {
            transform.write(w);
            Ok(())
        });
        w.schedule_offset_if(self.field14.as_ref(), 16, |w, field14| {
            field14.write(w);
            Ok(())
        });
        w.put(self.field18);
        w.put(self.field1c);
        self.resource.write(w);
    }
}

/// What a field object places.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldObjectResource {
    Model(Model),
    Type3(FieldObjectType3),
    TextureListFileName(String),
    Effect(FieldEffect),
    Light(FieldLight),
    /// Nothing, or a kind that isn't decoded. The word is written back as
    /// is, so a non-zero one is not relocated.
    Raw { kind: i32, word: u32 },
}

impl FieldObjectResource {
    pub fn kind(&self) -> i32 {
        match *self {
            FieldObjectResource::Model(_) => object_kind::MODEL,
            FieldObjectResource::Type3(_) => object_kind::TYPE3,
            FieldObjectResource::TextureListFileName(_) => object_kind::TEXTURE_LIST_FILE_NAME,
            FieldObjectResource::Effect(_) => object_kind::EFFECT,
            FieldObjectResource::Light(_) => object_kind::LIGHT,
            FieldObjectResource::Raw { kind, .. } => kind,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match *self {
            FieldObjectResource::Model(_) => "model",
            FieldObjectResource::Type3(_) => "type 3",
            FieldObjectResource::TextureListFileName(_) => "texture list file name",
            FieldObjectResource::Effect(_) => "effect",
            FieldObjectResource::Light(_) => "light",
            FieldObjectResource::Raw { .. } => "raw",
        }
    }

    fn read_at(cur: &mut Cur, kind: i32, offset: u32) -> Result<FieldObjectResource> {
        if offset == 0 {
            return Ok(FieldObjectResource::Raw { kind, word: 0 });
        }
        let res = match kind {
            object_kind::MODEL =>
                cur.read_at(offset, |cur| Model::read(cur, true))?.map(FieldObjectResource::Model),
            object_kind::TYPE3 =>
                cur.read_at(offset, FieldObjectType3::read)?.map(FieldObjectResource::Type3),
            object_kind::TEXTURE_LIST_FILE_NAME =>
                cur.read_at(offset, |cur| cur.next_string())?.map(FieldObjectResource::TextureListFileName),
            object_kind::EFFECT =>
                cur.read_at(offset, FieldEffect::read)?.map(FieldObjectResource::Effect),
            object_kind::LIGHT =>
                cur.read_at(offset, FieldLight::read)?.map(FieldObjectResource::Light),
            _ => {
                warn!("field object resource of unknown kind {} kept as {:#x}", kind, offset);
                None
            }
        };
        Ok(res.unwrap_or(FieldObjectResource::Raw { kind, word: offset }))
    }

    fn write<'a>(&'a self, w: &mut Writer<'a>) {
        match *self {
            FieldObjectResource::Model(ref model) => {
                w.schedule_offset(16, move |w| model.write(w, true));
            }
            FieldObjectResource::Type3(ref type3) => {
                w.schedule_offset(16, move |w| {
                    type3.write(w);
                    Ok(())
                });
            }
            FieldObjectResource::TextureListFileName(ref name) => {
                w.schedule_offset(16, move |w| {
                    w.put_string(name);
                    Ok(())
                });
            }
            FieldObjectResource::Effect(ref effect) => {
                w.schedule_offset(16, move |w| {
                    effect.write(w);
                    Ok(())
                });
            }
            FieldObjectResource::Light(ref light) => {
                w.schedule_offset(16, move |w| {
                    light.write(w);
                    Ok(())
                });
            }
            FieldObjectResource::Raw { word, .. } => w.put(word),
        }
    }
}

/// Placement of a field object. Each vector is stored padded with a 1.0.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FieldObjectTransform {
    pub position: Vector3<f32>,
    /// Euler angles in radians, applied x first.
    pub rotation: Vector3<f32>,
    pub scale: Vector3<f32>,
}

impl Default for FieldObjectTransform {
    fn default() -> FieldObjectTransform {
        FieldObjectTransform {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Vector3::new(0.0, 0.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

impl FieldObjectTransform {
    pub fn matrix(&self) -> Matrix4<f32> {
        let r = self.rotation;
        Matrix4::from_translation(self.position) *
            Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z) *
            Matrix4::from_angle_z(Rad(r.z)) *
            Matrix4::from_angle_y(Rad(r.y)) *
            Matrix4::from_angle_x(Rad(r.x))
    }

    pub fn read(cur: &mut Cur) -> Result<FieldObjectTransform> {
        fields!(cur, transform {
            position: (vec3_pad),
            rotation: (vec3_pad),
            scale: (vec3_pad),
        });
        Ok(FieldObjectTransform { position, rotation, scale })
    }

    pub fn write(&self, w: &mut Writer) {
        for &v in &[self.position, self.rotation, self.scale] {
            w.put(v);
            w.put(1.0f32);
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FieldObjectField14 {
    pub field00: i32,
    pub field04: Option<[i32; 4]>,
    pub field08: i32,
    pub field0c: i32,
}

impl Default for FieldObjectField14 {
    fn default() -> FieldObjectField14 {
        FieldObjectField14 {
            field00: 0,
            field04: Some([0x3130, 0, 0, 0]),
            field08: 0,
            field0c: 0,
        }
    }
}

impl FieldObjectField14 {
    pub fn read(cur: &mut Cur) -> Result<FieldObjectField14> {
        let field00 = cur.next::<i32>()?;
        let field04 = cur.read_offset(|cur| {
            let v = cur.next_vec::<i32>(4)?;
            Ok([v[0], v[1], v[2], v[3]])
        })?;
        fields!(cur, field14 {
            field08: i32,
            field0c: i32,
        });
        Ok(FieldObjectField14 { field00, field04, field08, field0c })
    }

    pub fn write<'a>(&'a self, w: &mut Writer<'a>) {
        w.put(self.field00);
        w.schedule_offset_if(self.field04.as_ref(), 16, |w, words| {
            w.put_all(&words[..]);
            Ok(())
        });
        w.put(self.field08);
        w.put(self.field0c);
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldObjectType3 {
    pub field00: i32,
    pub field04: i32,
    pub field08: Option<Type3Data>,
    pub field0c: i32,
}

impl FieldObjectType3 {
    pub fn read(cur: &mut Cur) -> Result<FieldObjectType3> {
        fields!(cur, type3 {
            field00: i32,
            field04: i32,
        });
        let field08 = cur.read_offset(Type3Data::read)?;
        let field0c = cur.next::<i32>()?;
        Ok(FieldObjectType3 { field00, field04, field08, field0c })
    }

    pub fn write<'a>(&'a self, w: &mut Writer<'a>) {
        w.put(self.field00);
        w.put(self.field04);
        w.schedule_offset_if(self.field08.as_ref(), 16, |w, data| {
            data.write(w);
            Ok(())
        });
        w.put(self.field0c);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Type3Data {
    pub field08: i32,
    pub field0c: Vec<Vector4<f32>>,
    pub field10: Vec<Type3Entry>,
    pub field14: Option<[i32; 8]>,
    pub field18: i32,
    pub field1c: i32,
}

impl Default for Type3Data {
    fn default() -> Type3Data {
        Type3Data {
            field08: 1,
            field0c: vec![],
            field10: vec![],
            field14: None,
            field18: 0,
            field1c: 0,
        }
    }
}

impl Type3Data {
    pub fn read(cur: &mut Cur) -> Result<Type3Data> {
        fields!(cur, type3_data {
            vector_count: i32,
            entry_count: i32,
            field08: i32,
        });
        let field0c = cur.read_offset(|cur| {
            cur.next_vec::<Vector4<f32>>(vector_count.max(0) as usize)
        })?.unwrap_or_default();
        let field10 = cur.read_offset(|cur| {
            (0..entry_count.max(0))
                .map(|_| Type3Entry::read(cur))
                .collect::<Result<Vec<_>>>()
        })?.unwrap_or_default();
        let field14 = cur.read_offset(|cur| {
            let v = cur.next_vec::<i32>(8)?;
            let mut words = [0; 8];
            words.copy_from_slice(&v);
            Ok(words)
        })?;
        fields!(cur, type3_data {
            field18: i32,
            field1c: i32,
        });
        Ok(Type3Data { field08, field0c, field10, field14, field18, field1c })
    }

    pub fn write<'a>(&'a self, w: &mut Writer<'a>) {
        w.put(self.field0c.len() as i32);
        w.put(self.field10.len() as i32);
        w.put(self.field08);
        w.schedule_offset_if(non_empty(&self.field0c), 16, |w, vectors| {
            w.put_all(vectors);
            Ok(())
        });
        w.schedule_offset_if(non_empty(&self.field10), 16, |w, entries| {
            for entry in entries {
                entry.write(w);
            }
            Ok(())
        });
        w.schedule_offset_if(self.field14.as_ref(), 16, |w, words| {
            w.put_all(&words[..]);
            Ok(())
        });
        w.put(self.field18);
        w.put(self.field1c);
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Type3Entry {
    pub words: [i32; 8],
    pub field20: i16,
    pub field22: i16,
}

impl Default for Type3Entry {
    fn default() -> Type3Entry {
        Type3Entry {
            words: [0x8000, 0, 0, 0, 0, 0, 0, 0],
            field20: 1,
            field22: 4,
        }
    }
}

impl Type3Entry {
    pub fn read(cur: &mut Cur) -> Result<Type3Entry> {
        let mut words = [0; 8];
        for word in words.iter_mut() {
            *word = cur.next::<i32>()?;
        }
        fields!(cur, type3_entry {
            field20: i16,
            field22: i16,
        });
        Ok(Type3Entry { words, field20, field22 })
    }

    pub fn write(&self, w: &mut Writer) {
        w.put_all(&self.words[..]);
        w.put(self.field20);
        w.put(self.field22);
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FieldEffect {
    pub field00: i32,
    pub field04: i32,
    pub field08: i32,
    pub field0c: f32,
    pub field10: f32,
    pub field14: f32,
    pub field18: [i32; 6],
}

impl Default for FieldEffect {
    fn default() -> FieldEffect {
        FieldEffect {
            field00: 0,
            field04: 2,
            field08: 0,
            field0c: 39.37,
            field10: 1.0,
            field14: 0.0,
            field18: [0; 6],
        }
    }
}

impl FieldEffect {
    pub fn read(cur: &mut Cur) -> Result<FieldEffect> {
        fields!(cur, effect {
            field00: i32,
            field04: i32,
            field08: i32,
            field0c: f32,
            field10: f32,
            field14: f32,
        });
        let mut field18 = [0; 6];
        for word in field18.iter_mut() {
            *word = cur.next::<i32>()?;
        }
        Ok(FieldEffect { field00, field04, field08, field0c, field10, field14, field18 })
    }

    pub fn write(&self, w: &mut Writer) {
        w.put(self.field00);
        w.put(self.field04);
        w.put(self.field08);
        w.put(self.field0c);
        w.put(self.field10);
        w.put(self.field14);
        w.put_all(&self.field18[..]);
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FieldLight {
    pub field00: i32,
    pub field04: i32,
    pub field08: i32,
    pub field0c: f32,
    pub field10: f32,
    pub field14: f32,
    pub field18: i32,
    pub field1c: [f32; 6],
}

impl Default for FieldLight {
    fn default() -> FieldLight {
        FieldLight {
            field00: 0,
            field04: 0,
            field08: 0,
            field0c: 200.0,
            field10: 350.0,
            field14: 5.0,
            field18: 0,
            field1c: [0.6, 0.65, 0.65, 0.4, 0.4, 0.4],
        }
    }
}

impl FieldLight {
    pub fn read(cur: &mut Cur) -> Result<FieldLight> {
        fields!(cur, light {
            field00: i32,
            field04: i32,
            field08: i32,
            field0c: f32,
            field10: f32,
            field14: f32,
            field18: i32,
        });
        let mut field1c = [0.0; 6];
        for x in field1c.iter_mut() {
            *x = cur.next::<f32>()?;
        }
        Ok(FieldLight { field00, field04, field08, field0c, field10, field14, field18, field1c })
    }

    pub fn write(&self, w: &mut Writer) {
        w.put(self.field00);
        w.put(self.field04);
        w.put(self.field08);
        w.put(self.field0c);
        w.put(self.field10);
        w.put(self.field14);
        w.put(self.field18);
        w.put_all(&self.field1c[..]);
    }
}

#[cfg(test)]
use crate::io::resource::{field_relocations, read_field_resource, write_field_resource};
#[cfg(test)]
use crate::model::{Material, Node};
#[cfg(test)]
use cgmath::SquareMatrix;

#[cfg(test)]
fn sample_scene() -> FieldScene {
    let model = Model {
        nodes: vec![Node::default(), Node { parent: Some(0), ..Node::default() }],
        materials: vec![Material::with_texture(0)],
        extensions: vec![],
    };
    let mut house = FieldObject::new(10, FieldObjectResource::Model(model));
    house.name = Some("house".to_string());
    house.transform = Some(FieldObjectTransform {
        position: Vector3::new(1.0, 2.0, 3.0),
        ..FieldObjectTransform::default()
    });

    let type3 = FieldObjectType3 {
        field00: 7,
        field08: Some(Type3Data {
            field0c: vec![Vector4::new(1.0, 2.0, 3.0, 4.0); 3],
            field10: vec![Type3Entry::default(); 2],
            field14: Some([1, 2, 3, 4, 5, 6, 7, 8]),
            ..Type3Data::default()
        }),
        ..FieldObjectType3::default()
    };

    let mut scene = FieldScene { lists: vec![], field1c: Some((0..16).collect()) };
    scene.add_object(FieldObject::new(20, FieldObjectResource::Light(FieldLight::default())));
    scene.add_object(house);
    scene.add_object(FieldObject::new(30, FieldObjectResource::Effect(FieldEffect::default())));
    scene.add_object(FieldObject::new(40, FieldObjectResource::Type3(type3)));
    scene.add_object(FieldObject {
        field14: None,
        ..FieldObject::new(50, FieldObjectResource::TextureListFileName("f010.tbn".to_string()))
    });
    scene.add_object(FieldObject::new(21, FieldObjectResource::Light(FieldLight::default())));
    scene.add_object(FieldObject::new(60, FieldObjectResource::Raw { kind: 9, word: 0 }));
    scene
}

#[test]
fn test_scene_round_trip() {
    let scene = sample_scene();
    let kinds: Vec<i32> = scene.lists.iter().map(|list| list.kind).collect();
    assert_eq!(kinds, vec![1, 3, 4, 5, 6, 9]);
    assert_eq!(scene.objects().count(), 7);

    let mut w = Writer::new();
    write_field_resource(&mut w, &scene).unwrap();
    assert_eq!(w.depth(), 0);
    let mut slots = w.slots().to_vec();
    let bytes = w.into_bytes();
    assert_eq!(&bytes[0..4], &[21, 0, 0, 0]);
    assert_eq!(&bytes[4..8], b"FLD1");

    slots.sort();
    assert_eq!(field_relocations(&bytes, 0).unwrap(), slots);

    let mut cur = Cur::new(&bytes);
    let scene2: FieldScene = read_field_resource(&mut cur, None).unwrap();
    assert_eq!(scene2, scene);
    assert_eq!(cur.pos(), bytes.len());

    let lights: Vec<i32> = scene2.lists[4].objects.iter().map(|o| o.id).collect();
    assert_eq!(lights, vec![20, 21]);
    assert_eq!(scene2.lists[0].objects[0].name.as_ref().map(|s| s.as_str()), Some("house"));
}

#[test]
fn test_empty_scene() {
    let scene = FieldScene::default();
    let mut w = Writer::new();
    write_field_resource(&mut w, &scene).unwrap();
    let bytes = w.into_bytes();
    let scene2: FieldScene = read_field_resource(&mut Cur::new(&bytes), None).unwrap();
    assert_eq!(scene2, scene);
}

#[test]
fn test_mixed_list_rejected() {
    let scene = FieldScene {
        lists: vec![FieldObjectList {
            kind: object_kind::LIGHT,
            objects: vec![FieldObject::new(1, FieldObjectResource::Effect(FieldEffect::default()))],
        }],
        field1c: None,
    };
    let mut w = Writer::new();
    assert!(write_field_resource(&mut w, &scene).is_err());
}

#[test]
fn test_transform_matrix() {
    let t = FieldObjectTransform::default();
    assert_eq!(t.matrix(), Matrix4::identity());

    let t = FieldObjectTransform {
        position: Vector3::new(1.0, 2.0, 3.0),
        rotation: Vector3::new(0.0, 0.0, 0.0),
        scale: Vector3::new(2.0, 2.0, 2.0),
    };
    let p = t.matrix() * Vector4::new(1.0, 0.0, 0.0, 1.0);
    assert_eq!(p, Vector4::new(3.0, 2.0, 3.0, 1.0));

    let mut w = Writer::new();
    t.write(&mut w);
    let bytes = w.into_bytes();
    assert_eq!(bytes.len(), 48);
    assert_eq!(&bytes[12..16], &1.0f32.to_le_bytes());
    assert_eq!(FieldObjectTransform::read(&mut Cur::new(&bytes)).unwrap(), t);
}
