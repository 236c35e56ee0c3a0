//! Model packs: a run of resources ended by an END0 chunk.
//!
//! The pack has no header of its own. Each chunk starts on a 64-byte
//! boundary.

use crate::errors::{ErrorKind, Result};
use crate::io::header::{file_type, ident, stamp, ResourceDescriptor, ResourceHeader, SHORT_HEADER_SIZE};
use crate::io::resource::{read_framed, read_resource, write_framed, write_resource, Resource};
use crate::io::writer::Writer;
use crate::model::Model;
use crate::motion::MotionPack;
use crate::texture::TexturePack;
use crate::util::align_up;
use crate::util::cur::Cur;

const INFO_MAGIC: u32 = 0xfffffffe;
const INFO_OFFSET: u32 = 0x14;

#[derive(Debug, Clone, PartialEq)]
pub struct EffectInfo {
    pub id: i32,
    pub fields: Vec<i16>,
}

/// Contents of the PIB0 chunk. The chunk also stores how many models,
/// effects and motion packs the pack has; those are computed on write.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelPackInfo {
    pub user_id: u16,
    pub effect_infos: Vec<EffectInfo>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct PackCounts {
    pub models: usize,
    pub effects: usize,
    pub motion_packs: usize,
}

impl ModelPackInfo {
    pub const DESCRIPTOR: ResourceDescriptor = ResourceDescriptor {
        file_type: file_type::DEFAULT,
        identifier: ident::MODEL_PACK_INFO,
    };

    fn read_content(cur: &mut Cur, header: &ResourceHeader) -> Result<(ModelPackInfo, PackCounts)> {
        cur.expect(INFO_MAGIC, "pack_info.magic")?;
        cur.expect(INFO_OFFSET, "pack_info.info_offset")?;
        fields!(cur, pack_info {
            model_count: i16,
        });
        cur.expect(0i16, "pack_info.field1a")?;
        fields!(cur, pack_info {
            effect_info_count: i16,
            effect_count: i16,
            motion_pack_count: i16,
        });
        cur.expect(0i16, "pack_info.field22")?;

        let mut effect_infos = Vec::with_capacity(effect_info_count.max(0) as usize);
        for _ in 0..effect_info_count.max(0) {
            fields!(cur, effect_info {
                id: i32,
                size: i32,
            });
            if size < 8 || size % 2 != 0 {
                bail!(ErrorKind::MalformedStream(format!("effect info {} has size {}", id, size)));
            }
            let fields = cur.next_vec::<i16>((size as usize - 8) / 2)?;
            effect_infos.push(EffectInfo { id, fields });
        }

        let counts = PackCounts {
            models: model_count.max(0) as usize,
            effects: effect_count.max(0) as usize,
            motion_packs: motion_pack_count.max(0) as usize,
        };
        Ok((ModelPackInfo { user_id: header.user_id, effect_infos }, counts))
    }

    fn write_content(&self, w: &mut Writer, counts: PackCounts) -> Result<()> {
        w.put(INFO_MAGIC);
        w.put(INFO_OFFSET);
        w.put(counts.models as i16);
        w.put(0i16);
        w.put(self.effect_infos.len() as i16);
        w.put(counts.effects as i16);
        w.put(counts.motion_packs as i16);
        w.put(0i16);
        for info in &self.effect_infos {
            w.put(info.id);
            w.put((8 + 2 * info.fields.len()) as i32);
            w.put_all(&info.fields);
        }
        Ok(())
    }
}

/// A resource kept as its header and raw content.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryResource {
    pub file_type: u8,
    pub identifier: u32,
    pub user_id: u16,
    pub data: Vec<u8>,
}

impl BinaryResource {
    pub fn descriptor(&self) -> ResourceDescriptor {
        ResourceDescriptor { file_type: self.file_type, identifier: self.identifier }
    }

    /// Reads the content of a resource whose header was just read.
    pub fn read(cur: &mut Cur, header: ResourceHeader) -> Result<BinaryResource> {
        read_framed(cur, Some(header), None, |cur, header| {
            let size = (header.size as usize).saturating_sub(SHORT_HEADER_SIZE);
            Ok(BinaryResource {
                file_type: header.file_type,
                identifier: header.identifier,
                user_id: header.user_id,
                data: cur.next_n_u8s(size)?.to_vec(),
            })
        })
    }

    pub fn write(&self, w: &mut Writer) -> Result<()> {
        write_framed(w, self.descriptor(), self.user_id, |w| {
            w.put_bytes(&self.data);
            Ok(())
        })
    }

    /// Serializes a resource into its binary form.
    pub fn encode<T: Resource>(res: &T) -> Result<BinaryResource> {
        let mut w = Writer::new();
        write_resource(&mut w, res)?;
        let bytes = w.into_bytes();
        let mut cur = Cur::new(&bytes);
        let header = ResourceHeader::read(&mut cur)?;
        BinaryResource::read(&mut cur, header)
    }

    /// Parses the content as a `T`.
    pub fn decode<T: Resource>(&self) -> Result<T> {
        let mut w = Writer::new();
        ResourceHeader {
            file_type: self.file_type,
            compressed: false,
            user_id: self.user_id,
            size: (SHORT_HEADER_SIZE + self.data.len()) as u32,
            identifier: self.identifier,
            memory_size: 0,
        }.write(&mut w);
        w.put_bytes(&self.data);
        let bytes = w.into_bytes();
        read_resource(&mut Cur::new(&bytes), None)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelPack {
    /// Missing in some packs.
    pub info: Option<ModelPackInfo>,
    /// Particle and video chunks.
    pub effects: Vec<BinaryResource>,
    pub texture_pack: TexturePack,
    pub models: Vec<Model>,
    /// Motion packs, kept in their stored form. See `motion_pack`.
    pub motion_packs: Vec<BinaryResource>,
}

impl ModelPack {
    pub fn counts(&self) -> PackCounts {
        PackCounts {
            models: self.models.len(),
            effects: self.effects.len(),
            motion_packs: self.motion_packs.len(),
        }
    }

    pub fn motion_pack(&self, i: usize) -> Option<Result<MotionPack>> {
        self.motion_packs.get(i).map(|res| res.decode())
    }

    pub fn read(cur: &mut Cur) -> Result<ModelPack> {
        let mut pack = ModelPack::default();
        let mut declared = None;

        while cur.bytes_remaining() > 0 {
            let start = cur.pos();
            let header = ResourceHeader::read(cur)?;
            let end = align_up(start + header.size as usize, 64);
            trace!("pack chunk {} at {:#x}", stamp(header.identifier), start);

            match header.identifier {
                ident::MODEL_PACK_INFO => {
                    let (info, counts) = read_framed(cur, Some(header), None, ModelPackInfo::read_content)?;
                    pack.info = Some(info);
                    declared = Some(counts);
                }
                ident::PARTICLE | ident::VIDEO => {
                    pack.effects.push(BinaryResource::read(cur, header)?);
                }
                ident::TEXTURE_PACK => {
                    pack.texture_pack = read_resource(cur, Some(header))?;
                    if cur.pos() != end {
                        warn!("texture pack declares {:#x} bytes but takes {:#x}",
                            header.size, cur.pos() - start);
                    }
                }
                ident::MODEL => {
                    pack.models.push(read_resource(cur, Some(header))?);
                }
                ident::MOTION_PACK => {
                    pack.motion_packs.push(BinaryResource::read(cur, header)?);
                }
                ident::MODEL_PACK_END => break,
                id => bail!(ErrorKind::UnknownResource(id)),
            }

            if header.identifier != ident::TEXTURE_PACK {
                cur.jump_to(end.min(cur.len()))?;
            }
        }

        if let Some(declared) = declared {
            if declared != pack.counts() {
                debug!("pack info declares {:?}, found {:?}", declared, pack.counts());
            }
        }
        Ok(pack)
    }

    pub fn write<'a>(&'a self, w: &mut Writer<'a>) -> Result<()> {
        if let Some(ref info) = self.info {
            let counts = self.counts();
            write_framed(w, ModelPackInfo::DESCRIPTOR, info.user_id, |w| info.write_content(w, counts))?;
        }
        for effect in &self.effects {
            effect.write(w)?;
        }
        if !self.texture_pack.is_empty() {
            write_resource(w, &self.texture_pack)?;
        }
        for model in &self.models {
            write_resource(w, model)?;
        }
        for motion_pack in &self.motion_packs {
            motion_pack.write(w)?;
        }

        w.put(file_type::MODEL_PACK_END as i32);
        w.put(SHORT_HEADER_SIZE as i32);
        w.put(ident::MODEL_PACK_END);
        w.put(0i32);
        w.align(64);
        Ok(())
    }
}

#[cfg(test)]
use crate::model::{Material, Node};
#[cfg(test)]
use crate::motion::{ControllerType, KeyframeTrack, MotionController};
#[cfg(test)]
use crate::texture::{pixel_format, Texture, COMMENT_SIZE};

#[cfg(test)]
fn sample_pack() -> ModelPack {
    let texture = Texture {
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
        comment: [0; COMMENT_SIZE],
        data: vec![0x80; 64],
    };
    let model = Model {
        nodes: vec![Node::default()],
        materials: vec![Material::with_texture(0)],
        extensions: vec![],
    };
    let mut motions = MotionPack::default();
    motions.add_motion(1, vec![(
        MotionController { kind: ControllerType::Type5, node_index: 0 },
        KeyframeTrack::from_f32s(vec![0], &[1.0]),
    )]).unwrap();

    ModelPack {
        info: Some(ModelPackInfo {
            user_id: 0,
            effect_infos: vec![EffectInfo { id: 4, fields: vec![1, 2, 3] }],
        }),
        effects: vec![BinaryResource {
            file_type: file_type::DEFAULT,
            identifier: ident::PARTICLE,
            user_id: 2,
            data: vec![9; 20],
        }],
        texture_pack: TexturePack { user_id: 0, textures: vec![texture] },
        models: vec![model],
        motion_packs: vec![BinaryResource::encode(&motions).unwrap()],
    }
}

#[cfg(test)]
fn write_pack(pack: &ModelPack) -> Vec<u8> {
    let mut w = Writer::new();
    pack.write(&mut w).unwrap();
    w.into_bytes()
}

#[test]
fn test_round_trip() {
    let pack = sample_pack();
    let bytes = write_pack(&pack);
    assert_eq!(bytes.len() % 64, 0);
    assert_eq!(&bytes[8..12], b"PIB0");
    // info counts: 1 model, 1 effect info, 1 effect, 1 motion pack
    assert_eq!(&bytes[24..26], &[1, 0]);
    assert_eq!(&bytes[28..34], &[1, 0, 1, 0, 1, 0]);

    let pack2 = ModelPack::read(&mut Cur::new(&bytes)).unwrap();
    assert_eq!(pack2, pack);
    assert_eq!(write_pack(&pack2), bytes);

    let motions = pack2.motion_pack(0).unwrap().unwrap();
    assert_eq!(motions.controllers.len(), 1);
    assert!(pack2.motion_pack(1).is_none());
}

#[test]
fn test_end_chunk() {
    let bytes = write_pack(&ModelPack::default());
    assert_eq!(bytes.len(), 64);
    assert_eq!(&bytes[0..4], &[0xff, 0, 0, 0]);
    assert_eq!(&bytes[8..12], b"END0");

    // chunks after the end are ignored
    let mut more = bytes.clone();
    more.extend_from_slice(&[0xaa; 64]);
    assert_eq!(ModelPack::read(&mut Cur::new(&more)).unwrap(), ModelPack::default());
}

#[test]
fn test_unknown_chunk() {
    let mut bytes = write_pack(&sample_pack());
    bytes[8..12].copy_from_slice(b"ZZZ0");
    match *ModelPack::read(&mut Cur::new(&bytes)).unwrap_err().kind() {
        ErrorKind::UnknownResource(id) => assert_eq!(stamp(id), "ZZZ0"),
        ref k => panic!("unexpected error {:?}", k),
    }
}
