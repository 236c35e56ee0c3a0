//! Human-readable summaries of loaded files.

use crate::field::{FieldObjectResource, FieldScene};
use crate::io::header::stamp;
use crate::model::Model;
use crate::motion::MotionPack;
use crate::pack::ModelPack;
use crate::texture::{Texture, TexturePack};
use crate::Chunk;

pub fn print_chunk(chunk: &Chunk) {
    match *chunk {
        Chunk::ModelPack(ref pack) => pack_info(pack),
        Chunk::Model(ref model) => model_info(model, 0),
        Chunk::TexturePack(ref textures) => texture_pack_info(textures),
        Chunk::Texture(ref texture) => texture_info(texture, 0),
        Chunk::MotionPack(ref motions) => motion_pack_info(motions, 0),
        Chunk::FieldScene(ref scene) => field_scene_info(scene),
    }
}

fn pack_info(pack: &ModelPack) {
    println!("Model Pack:");
    match pack.info {
        Some(ref info) => println!("  Effect Infos: {}", info.effect_infos.len()),
        None => println!("  (no pack info)"),
    }
    println!("  Effects ({} total):", pack.effects.len());
    for (i, effect) in pack.effects.iter().enumerate() {
        println!("    Effect {}: {} ({} bytes)", i, stamp(effect.identifier), effect.data.len());
    }
    println!();

    texture_pack_info(&pack.texture_pack);
    for (i, model) in pack.models.iter().enumerate() {
        model_info(model, i);
    }
    for i in 0..pack.motion_packs.len() {
        match pack.motion_pack(i) {
            Some(Ok(motions)) => motion_pack_info(&motions, i),
            Some(Err(e)) => {
                println!("Motion Pack {}:", i);
                println!("  (unreadable: {})", e);
                println!();
            }
            None => (),
        }
    }
}

fn model_info(model: &Model, model_id: usize) {
    println!("Model {}:", model_id);
    println!("  Nodes ({} total):", model.nodes.len());
    for (i, node) in model.nodes.iter().enumerate() {
        print!("    Node {}: {:?} ", i, node.name.as_ref().map(|s| s.as_str()).unwrap_or(""));
        match node.parent {
            Some(parent) => print!("(parent {})", parent),
            None => print!("(root)"),
        }
        if let Some(ref geometry) = node.geometry {
            print!(" {} meshes", geometry.meshes().count());
        }
        println!();
    }

    let mut by_type = [0usize; 9];
    for mesh in model.meshes() {
        by_type[mesh.tag() as usize] += 1;
    }
    println!("  Num Meshes: {}", by_type.iter().sum::<usize>());
    for (tag, &count) in by_type.iter().enumerate() {
        if count != 0 {
            println!("    Type {}: {}", tag, count);
        }
    }
    println!("  Morpher Meshes: {}", model.morpher_mesh_count());

    println!("  Materials ({} total):", model.materials.len());
    for (i, material) in model.materials.iter().enumerate() {
        print!("    Material {}: ", i);
        match material.texture_id {
            Some(id) => print!("texture {}", id),
            None => print!("untextured"),
        }
        if let Some([mask, overlay]) = material.overlay_texture_ids {
            print!(", overlay {} masked by {}", overlay, mask);
        }
        println!(" (flags {:#x})", material.flags().bits());
    }
    if !model.extensions.is_empty() {
        println!("  Extensions:");
        for ext in &model.extensions {
            println!("    {}: {} bytes", ext.id, ext.data.len());
        }
    }
    println!();
}

fn texture_pack_info(textures: &TexturePack) {
    if textures.is_empty() {
        return;
    }
    println!("Texture Pack ({} textures):", textures.textures.len());
    println!();
    for (i, texture) in textures.textures.iter().enumerate() {
        texture_info(texture, i);
    }
}

fn texture_info(texture: &Texture, texture_id: usize) {
    println!("Texture {}:", texture_id);
    let comment = texture.comment_text();
    if !comment.is_empty() {
        println!("  Comment: {:?}", comment);
    }
    println!("  Dimensions: {}x{}", texture.width, texture.height);
    println!("  Pixel Format: {:#04x}", texture.pixel_format);
    if texture.is_indexed() {
        println!("  Palettes: {} of {} colors (format {:#04x})",
            texture.palette_count, texture.palette_color_count(), texture.palette_format);
    }
    println!("  Mipmaps: {}", texture.mip_count);
    println!("  Wrap Modes: {} {}", texture.wrap_mode_x(), texture.wrap_mode_y());
    println!("  Data Size: {}", texture.data.len());
    println!();
}

fn motion_pack_info(motions: &MotionPack, pack_id: usize) {
    println!("Motion Pack {}:", pack_id);
    println!("  Controllers ({} total):", motions.controllers.len());
    for (i, controller) in motions.controllers.iter().enumerate() {
        println!("    Controller {}: {:?} on node {}", i, controller.kind, controller.node_index);
    }
    println!("  Motions ({} total):", motions.motions.len());
    for (i, motion) in motions.motions.iter().enumerate() {
        match *motion {
            Some(ref motion) => {
                let keys: usize = motion.tracks.iter().map(|t| t.times.len()).sum();
                println!("    Motion {}: {} frames, {} keys", i, motion.duration, keys);
            }
            None => println!("    Motion {}: (empty)", i),
        }
    }
    println!();
}

fn field_scene_info(scene: &FieldScene) {
    println!("Field Scene:");
    for list in &scene.lists {
        println!("  Object List (kind {}, {} objects):", list.kind, list.objects.len());
        for object in &list.objects {
            print!("    Object {}: {:?} ", object.id, object.name.as_ref().map(|s| s.as_str()).unwrap_or(""));
            print!("({})", object.resource.kind_name());
            if let Some(ref transform) = object.transform {
                let p = transform.position;
                print!(" at ({}, {}, {})", p.x, p.y, p.z);
            }
            println!();
        }
    }
    if let Some(ref block) = scene.field1c {
        println!("  Field 0x1c: {} bytes", block.len());
    }
    println!();

    for object in scene.objects() {
        if let FieldObjectResource::Model(ref model) = object.resource {
            model_info(model, object.id as usize);
        }
    }
}
