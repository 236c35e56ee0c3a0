#![recursion_limit = "1024"] // for error_chain

#[macro_use]
extern crate log;
#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate bitflags;
extern crate atty;
extern crate cgmath;
extern crate smallvec;
extern crate termcolor;

#[macro_use]
pub mod errors;
#[macro_use]
pub mod util;
pub mod field;
pub mod info;
pub mod io;
pub mod logger;
pub mod model;
pub mod motion;
pub mod pack;
pub mod partition;
pub mod texture;
pub mod version;
pub mod vif;

use crate::errors::Result;
use crate::field::FieldScene;
use crate::io::header::{file_type, ident, stamp, ResourceHeader};
use crate::io::resource::{read_field_resource, read_resource, write_field_resource, write_resource};
use crate::io::writer::Writer;
use crate::model::Model;
use crate::motion::MotionPack;
use crate::pack::ModelPack;
use crate::texture::{Texture, TexturePack};
use crate::util::align_up;
use crate::util::cur::Cur;

/// A loaded file: either a single resource or a model pack.
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    ModelPack(ModelPack),
    Model(Model),
    TexturePack(TexturePack),
    Texture(Texture),
    MotionPack(MotionPack),
    FieldScene(FieldScene),
}

impl Chunk {
    pub fn kind_name(&self) -> &'static str {
        match *self {
            Chunk::ModelPack(_) => "model pack",
            Chunk::Model(_) => "model",
            Chunk::TexturePack(_) => "texture pack",
            Chunk::Texture(_) => "texture",
            Chunk::MotionPack(_) => "motion pack",
            Chunk::FieldScene(_) => "field scene",
        }
    }
}

/// Loads a file's contents.
///
/// A file holding exactly one model, texture, texture pack or motion pack
/// loads as that resource, and one starting with a field header for FLD1
/// loads as a field scene. Anything else is read as a model pack.
pub fn load(bytes: &[u8]) -> Result<Chunk> {
    let mut cur = Cur::new(bytes);
    if is_field_scene(&mut cur) {
        cur.jump_to(0)?;
        debug!("field scene ({:#x} bytes)", bytes.len());
        return Ok(Chunk::FieldScene(read_field_resource(&mut cur, None)?));
    }
    cur.jump_to(0)?;
    let header = ResourceHeader::read(&mut cur)?;
    let whole_file = align_up(header.size as usize, 64) >= bytes.len();
    cur.jump_to(0)?;

    debug!("first chunk is {} ({:#x} bytes of {:#x})",
        stamp(header.identifier), header.size, bytes.len());

    let chunk = match header.identifier {
        ident::MODEL if whole_file => Chunk::Model(read_resource(&mut cur, None)?),
        ident::TEXTURE if whole_file => Chunk::Texture(read_resource(&mut cur, None)?),
        ident::MOTION_PACK if whole_file => Chunk::MotionPack(read_resource(&mut cur, None)?),
        ident::TEXTURE_PACK => {
            // The declared size can't be trusted, so see where the textures end.
            let textures: TexturePack = read_resource(&mut cur, None)?;
            if cur.bytes_remaining() == 0 {
                Chunk::TexturePack(textures)
            } else {
                cur.jump_to(0)?;
                Chunk::ModelPack(ModelPack::read(&mut cur)?)
            }
        }
        _ => Chunk::ModelPack(ModelPack::read(&mut cur)?),
    };
    Ok(chunk)
}

fn is_field_scene(cur: &mut Cur) -> bool {
    match (cur.next::<i32>(), cur.next::<u32>()) {
        (Ok(t), Ok(id)) => t == file_type::FIELD_RESOURCE as i32 && id == ident::FIELD_SCENE,
        _ => false,
    }
}

/// Serializes a chunk into the bytes of a file.
pub fn save(chunk: &Chunk) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    match *chunk {
        Chunk::ModelPack(ref pack) => pack.write(&mut w)?,
        Chunk::Model(ref model) => write_resource(&mut w, model)?,
        Chunk::TexturePack(ref textures) => write_resource(&mut w, textures)?,
        Chunk::Texture(ref texture) => write_resource(&mut w, texture)?,
        Chunk::MotionPack(ref motions) => write_resource(&mut w, motions)?,
        Chunk::FieldScene(ref scene) => write_field_resource(&mut w, scene)?,
    }
    Ok(w.into_bytes())
}

#[cfg(test)]
use crate::field::{FieldLight, FieldObject, FieldObjectResource};
#[cfg(test)]
use crate::model::{Material, Node};
#[cfg(test)]
use crate::motion::{ControllerType, KeyframeTrack, MotionController};
#[cfg(test)]
use crate::texture::pixel_format;

#[cfg(test)]
fn sample_texture() -> Texture {
    Texture {
        user_id: 0,
        palette_count: 0,
        palette_format: 0,
        width: 4,
        height: 4,
        pixel_format: pixel_format::PSMCT32,
        mip_count: 0,
        mip_kl: 0,
        wrap_modes: 0,
        user_texture_id: 0,
        user_clut_id: 0,
        comment: *b"wall\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0",
        data: vec![0x40; 64],
    }
}

#[cfg(test)]
fn sample_model() -> Model {
    Model {
        nodes: vec![Node::default(), Node { parent: Some(0), ..Node::default() }],
        materials: vec![Material::with_texture(0)],
        extensions: vec![],
    }
}

#[cfg(test)]
fn reload(chunk: &Chunk) -> Chunk {
    let bytes = save(chunk).unwrap();
    assert_eq!(bytes.len() % 64, 0);
    let loaded = load(&bytes).unwrap();
    assert_eq!(save(&loaded).unwrap(), bytes);
    loaded
}

#[test]
fn test_single_resources() {
    let chunk = Chunk::Model(sample_model());
    assert_eq!(reload(&chunk), chunk);

    let chunk = Chunk::Texture(sample_texture());
    assert_eq!(reload(&chunk), chunk);

    let chunk = Chunk::TexturePack(TexturePack { user_id: 0, textures: vec![sample_texture(), sample_texture()] });
    assert_eq!(reload(&chunk), chunk);

    let mut motions = MotionPack::default();
    motions.add_motion(4, vec![(
        MotionController { kind: ControllerType::Position, node_index: 1 },
        KeyframeTrack::from_vector3s(vec![0, 4], &[
            cgmath::Vector3::new(0.0, 0.0, 0.0),
            cgmath::Vector3::new(1.0, 2.0, 3.0),
        ]),
    )]).unwrap();
    let chunk = Chunk::MotionPack(motions);
    assert_eq!(reload(&chunk), chunk);
}

#[test]
fn test_model_pack() {
    let pack = ModelPack {
        texture_pack: TexturePack { user_id: 0, textures: vec![sample_texture()] },
        models: vec![sample_model(), sample_model()],
        ..ModelPack::default()
    };
    let chunk = Chunk::ModelPack(pack);
    assert_eq!(reload(&chunk), chunk);

    // a pack starting with its texture pack is still a pack
    let pack = ModelPack {
        texture_pack: TexturePack { user_id: 0, textures: vec![sample_texture()] },
        ..ModelPack::default()
    };
    let loaded = reload(&Chunk::ModelPack(pack));
    assert_eq!(loaded.kind_name(), "model pack");

    let chunk = Chunk::ModelPack(ModelPack::default());
    assert_eq!(reload(&chunk), chunk);
}

#[test]
fn test_empty_texture_pack() {
    let chunk = Chunk::TexturePack(TexturePack::default());
    let bytes = save(&chunk).unwrap();
    assert_eq!(bytes.len(), 64);
    let loaded = reload(&chunk);
    assert_eq!(loaded.kind_name(), "texture pack");
    assert_eq!(loaded, chunk);
}

#[test]
fn test_field_scene() {
    let mut scene = FieldScene::default();
    scene.add_object(FieldObject::new(1, FieldObjectResource::Model(sample_model())));
    scene.add_object(FieldObject::new(2, FieldObjectResource::Light(FieldLight::default())));
    let chunk = Chunk::FieldScene(scene);
    let bytes = save(&chunk).unwrap();
    let loaded = load(&bytes).unwrap();
    assert_eq!(loaded.kind_name(), "field scene");
    assert_eq!(loaded, chunk);
    assert_eq!(save(&loaded).unwrap(), bytes);
}

#[test]
fn test_truncated() {
    let bytes = save(&Chunk::Model(sample_model())).unwrap();
    assert!(load(&bytes[..8]).is_err());
}
