//! Motion packs (MT00).
//!
//! A pack lists controllers, each animating one property of one node, and
//! motions. Every motion has one keyframe track per controller of the pack.
//! Like models, the content starts with a relocation header and offsets are
//! relative to the end of it.

use cgmath::{Quaternion, Vector3};
use crate::errors::{malformed, unsupported, Result};
use crate::io::header::{file_type, ident, ResourceDescriptor, ResourceHeader};
use crate::io::reloc;
use crate::io::resource::Resource;
use crate::io::writer::{Writer, PRIORITY_LAST};
use crate::util::cur::Cur;
use crate::util::fixed::{q12, to_q12};

/// What a controller animates.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ControllerType {
    Position,
    Type1,
    Scale,
    Rotation,
    Morph,
    Type5,
    Type8,
    Type10004,
    Type20000,
    Other(i32),
}

impl ControllerType {
    pub fn from_raw(x: i32) -> ControllerType {
        use self::ControllerType::*;
        match x {
            0 => Position,
            1 => Type1,
            2 => Scale,
            3 => Rotation,
            4 => Morph,
            5 => Type5,
            8 => Type8,
            0x10004 => Type10004,
            0x20000 => Type20000,
            x => Other(x),
        }
    }

    pub fn raw(self) -> i32 {
        use self::ControllerType::*;
        match self {
            Position => 0,
            Type1 => 1,
            Scale => 2,
            Rotation => 3,
            Morph => 4,
            Type5 => 5,
            Type8 => 8,
            Type10004 => 0x10004,
            Type20000 => 0x20000,
            Other(x) => x,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MotionController {
    pub kind: ControllerType,
    pub node_index: i32,
}

/// Keyframes of one controller. Keys are kept as raw fixed-size payloads;
/// the accessors decode them when the key size matches.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeyframeTrack {
    pub times: Vec<i16>,
    pub key_size: usize,
    pub data: Vec<u8>,
}

impl KeyframeTrack {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn key(&self, i: usize) -> &[u8] {
        &self.data[i * self.key_size..(i + 1) * self.key_size]
    }

    fn keys(&self) -> impl Iterator<Item = &[u8]> {
        // chunks panics on 0
        self.data.chunks(self.key_size.max(1))
    }

    pub fn from_vector3s(times: Vec<i16>, values: &[Vector3<f32>]) -> KeyframeTrack {
        let mut data = Vec::with_capacity(values.len() * 12);
        for v in values {
            for &x in &[v.x, v.y, v.z] {
                data.extend_from_slice(&x.to_le_bytes());
            }
        }
        KeyframeTrack { times, key_size: 12, data }
    }

    pub fn from_rotations(times: Vec<i16>, values: &[Quaternion<f32>]) -> KeyframeTrack {
        let mut data = Vec::with_capacity(values.len() * 8);
        for q in values {
            for &x in &[q.v.x, q.v.y, q.v.z, q.s] {
                data.extend_from_slice(&to_q12(x).to_le_bytes());
            }
        }
        KeyframeTrack { times, key_size: 8, data }
    }

    pub fn from_u32s(times: Vec<i16>, values: &[u32]) -> KeyframeTrack {
        let data = values.iter().flat_map(|x| x.to_le_bytes().to_vec()).collect();
        KeyframeTrack { times, key_size: 4, data }
    }

    pub fn from_f32s(times: Vec<i16>, values: &[f32]) -> KeyframeTrack {
        let data = values.iter().flat_map(|x| x.to_le_bytes().to_vec()).collect();
        KeyframeTrack { times, key_size: 4, data }
    }

    /// Position and scale keys.
    pub fn vector3s(&self) -> Option<Vec<Vector3<f32>>> {
        if self.key_size != 12 {
            return None;
        }
        Some(self.keys().map(|k| Vector3::new(f32_at(k, 0), f32_at(k, 4), f32_at(k, 8))).collect())
    }

    /// Rotation keys: Q12 quaternions stored x, y, z, w.
    pub fn rotations(&self) -> Option<Vec<Quaternion<f32>>> {
        if self.key_size != 8 {
            return None;
        }
        Some(self.keys().map(|k| {
            let c = |i: usize| q12(u16::from_le_bytes([k[2 * i], k[2 * i + 1]]));
            Quaternion::new(c(3), c(0), c(1), c(2))
        }).collect())
    }

    pub fn u32s(&self) -> Option<Vec<u32>> {
        if self.key_size != 4 {
            return None;
        }
        Some(self.keys().map(|k| u32::from_le_bytes([k[0], k[1], k[2], k[3]])).collect())
    }

    pub fn f32s(&self) -> Option<Vec<f32>> {
        if self.key_size != 4 {
            return None;
        }
        Some(self.keys().map(|k| f32_at(k, 0)).collect())
    }

    /// Single key at time 0 holding the rest value of a controller.
    pub fn placeholder(kind: ControllerType) -> Result<KeyframeTrack> {
        use self::ControllerType::*;
        Ok(match kind {
            Position => KeyframeTrack::from_vector3s(vec![0], &[Vector3::new(0.0, 0.0, 0.0)]),
            Scale => KeyframeTrack::from_vector3s(vec![0], &[Vector3::new(1.0, 1.0, 1.0)]),
            Rotation => KeyframeTrack::from_rotations(vec![0], &[Quaternion::new(1.0, 0.0, 0.0, 0.0)]),
            Type1 | Morph | Type8 => KeyframeTrack::from_u32s(vec![0], &[0]),
            Type5 => KeyframeTrack::from_f32s(vec![0], &[0.0]),
            kind => return Err(unsupported(format!("no rest value for controller {:?}", kind))),
        })
    }

    fn read(cur: &mut Cur) -> Result<KeyframeTrack> {
        let start = cur.pos();
        fields!(cur, track {
            data_size: i32,
            count: i16,
            key_size: i16,
        });
        if count < 0 || key_size < 0 {
            return Err(malformed(format!("track with {} keys of size {}", count, key_size)));
        }
        let times = cur.next_vec::<i16>(count as usize)?;
        cur.align(4)?;
        let data = cur.next_n_u8s(count as usize * key_size as usize)?.to_vec();
        cur.align(4)?;
        if cur.pos() - start != data_size as usize {
            debug!("track at {:#x} declares {:#x} bytes, read {:#x}", start, data_size, cur.pos() - start);
        }
        Ok(KeyframeTrack { times, key_size: key_size as usize, data })
    }

    fn write(&self, w: &mut Writer) -> Result<()> {
        if self.times.len() * self.key_size != self.data.len() {
            return Err(unsupported(format!(
                "track has {} times but {:#x} bytes of {}-byte keys",
                self.times.len(), self.data.len(), self.key_size,
            )));
        }
        if self.times.len() > i16::max_value() as usize || self.key_size > i16::max_value() as usize {
            return Err(unsupported(format!("track of {} keys", self.times.len())));
        }
        let start = w.pos();
        w.put(0i32);
        w.put(self.times.len() as i16);
        w.put(self.key_size as i16);
        w.put_all(&self.times);
        w.align(4);
        w.put_bytes(&self.data);
        w.align(4);
        let end = w.pos();
        w.seek(start);
        w.put((end - start) as i32);
        w.seek(end);
        Ok(())
    }
}

fn f32_at(k: &[u8], i: usize) -> f32 {
    f32::from_le_bytes([k[i], k[i + 1], k[i + 2], k[i + 3]])
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Motion {
    pub duration: i32,
    /// One track per controller of the pack, in the same order.
    pub tracks: Vec<KeyframeTrack>,
}

impl Motion {
    fn read(cur: &mut Cur, controller_count: usize) -> Result<Motion> {
        let duration = cur.next::<i32>()?;
        let tracks = (0..controller_count)
            .map(|_| KeyframeTrack::read(cur))
            .collect::<Result<Vec<_>>>()?;
        Ok(Motion { duration, tracks })
    }

    fn write(&self, w: &mut Writer) -> Result<()> {
        w.put(self.duration);
        for track in &self.tracks {
            track.write(w)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MotionPack {
    pub user_id: u16,
    pub group: i16,
    pub play_group: i16,
    pub first_motion: i16,
    pub flags: i16,
    pub controllers: Vec<MotionController>,
    /// Motion slots; empty slots are stored as null offsets.
    pub motions: Vec<Option<Motion>>,
}

impl MotionPack {
    pub fn track(&self, motion: usize, controller: MotionController) -> Option<&KeyframeTrack> {
        let i = self.controllers.iter().position(|&c| c == controller)?;
        self.motions.get(motion)?.as_ref()?.tracks.get(i)
    }

    /// Appends a motion animating the given controllers. Controllers the
    /// pack does not have yet are added; every other controller of the pack
    /// gets a placeholder track holding its rest value.
    pub fn add_motion(&mut self, duration: i32, tracks: Vec<(MotionController, KeyframeTrack)>) -> Result<()> {
        for &(controller, _) in &tracks {
            if !self.controllers.contains(&controller) {
                let kind = controller.kind;
                for motion in self.motions.iter_mut().flatten() {
                    motion.tracks.push(KeyframeTrack::placeholder(kind)?);
                }
                self.controllers.push(controller);
            }
        }

        let mut motion_tracks = Vec::with_capacity(self.controllers.len());
        for &controller in &self.controllers {
            let track = tracks.iter()
                .find(|&&(c, _)| c == controller)
                .map(|&(_, ref t)| t.clone());
            motion_tracks.push(match track {
                Some(t) => t,
                None => KeyframeTrack::placeholder(controller.kind)?,
            });
        }
        self.motions.push(Some(Motion { duration, tracks: motion_tracks }));
        Ok(())
    }

    fn read_body(cur: &mut Cur, header: &ResourceHeader) -> Result<MotionPack> {
        fields!(cur, motion_pack {
            motion_count: i16,
            controller_count: i16,
            motion_table_offset: (offset),
        });
        if motion_count < 0 || controller_count < 0 {
            return Err(malformed(format!(
                "motion pack with {} motions and {} controllers", motion_count, controller_count,
            )));
        }

        let mut controllers = Vec::with_capacity(controller_count as usize);
        for _ in 0..controller_count {
            fields!(cur, controller {
                kind: i32,
                node_index: i32,
            });
            controllers.push(MotionController { kind: ControllerType::from_raw(kind), node_index });
        }

        let motions = cur.read_at(motion_table_offset, |cur| {
            (0..motion_count)
                .map(|_| cur.read_offset(|cur| Motion::read(cur, controllers.len())))
                .collect::<Result<Vec<_>>>()
        })?.unwrap_or_default();

        Ok(MotionPack {
            user_id: header.user_id,
            group: 0,
            play_group: 0,
            first_motion: 0,
            flags: 0,
            controllers,
            motions,
        })
    }
}

impl Resource for MotionPack {
    const DESCRIPTOR: ResourceDescriptor = ResourceDescriptor {
        file_type: file_type::MOTION_PACK,
        identifier: ident::MOTION_PACK,
    };

    fn read_content(cur: &mut Cur, header: &ResourceHeader) -> Result<MotionPack> {
        fields!(cur, motion_pack {
            relocation_table_offset: (offset),
            relocation_table_size: u32,
            group: i16,
            play_group: i16,
            first_motion: i16,
            flags: i16,
        });
        trace!("relocation table at {:#x} ({:#x} bytes)",
            relocation_table_offset, relocation_table_size);

        let depth = cur.depth();
        cur.push_base_here();
        let res = MotionPack::read_body(cur, header);
        cur.pop_base()?;
        check_stream!(cur.depth() == depth)?;
        Ok(MotionPack { group, play_group, first_motion, flags, ..res? })
    }

    fn write_content<'a>(&'a self, w: &mut Writer<'a>) -> Result<()> {
        for motion in self.motions.iter().flatten() {
            if motion.tracks.len() != self.controllers.len() {
                return Err(unsupported(format!(
                    "motion has {} tracks for {} controllers",
                    motion.tracks.len(), self.controllers.len(),
                )));
            }
        }
        if self.motions.len() > i16::max_value() as usize
            || self.controllers.len() > i16::max_value() as usize
        {
            return Err(unsupported("too many motions or controllers"));
        }

        w.clear_slots();
        let start = w.pos();
        w.push_base_at(start + 16);
        w.schedule_offset_unrecorded(PRIORITY_LAST, 4, move |w| {
            let mut slots = w.slots().to_vec();
            slots.sort();
            let table = reloc::encode(&slots, w.base())?;
            debug!("motion pack relocation table: {} slots, {:#x} bytes", slots.len(), table.len());
            w.put_bytes(&table);
            w.patch_u32(start + 4, table.len() as u32);
            Ok(())
        });
        w.put(0u32);
        w.put(self.group);
        w.put(self.play_group);
        w.put(self.first_motion);
        w.put(self.flags);

        w.put(self.motions.len() as i16);
        w.put(self.controllers.len() as i16);
        w.schedule_offset(4, move |w| {
            for motion in &self.motions {
                w.schedule_offset_if(motion.as_ref(), 4, |w, m| m.write(w));
            }
            Ok(())
        });
        for c in &self.controllers {
            w.put(c.kind.raw());
            w.put(c.node_index);
        }

        w.run_scheduled_writes()?;
        w.pop_base()?;
        Ok(())
    }

    fn user_id(&self) -> u16 { self.user_id }
}

#[cfg(test)]
use crate::io::resource::{read_resource, write_resource};

#[cfg(test)]
fn sample_pack() -> MotionPack {
    let pos = MotionController { kind: ControllerType::Position, node_index: 0 };
    let rot = MotionController { kind: ControllerType::Rotation, node_index: 1 };
    let mut pack = MotionPack { group: 2, play_group: 1, flags: 3, ..Default::default() };
    pack.add_motion(30, vec![
        (pos, KeyframeTrack::from_vector3s(vec![0, 30], &[
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 5.0, 0.0),
        ])),
    ]).unwrap();
    pack.motions.push(None);
    pack.add_motion(10, vec![
        (rot, KeyframeTrack::from_rotations(vec![0, 5, 10], &[
            Quaternion::new(1.0, 0.0, 0.0, 0.0),
            Quaternion::new(0.5, 0.5, 0.5, 0.5),
            Quaternion::new(0.0, 0.0, 1.0, 0.0),
        ])),
    ]).unwrap();
    pack
}

#[test]
fn test_add_motion_fills_placeholders() {
    let pack = sample_pack();
    assert_eq!(pack.controllers.len(), 2);
    let rot = pack.controllers[1];
    // the first motion was given a rest rotation when the controller
    // was added
    let rest = pack.track(0, rot).unwrap().rotations().unwrap();
    assert_eq!(rest, vec![Quaternion::new(1.0, 0.0, 0.0, 0.0)]);
    assert!(pack.track(1, rot).is_none());
    let pos = pack.track(2, pack.controllers[0]).unwrap();
    assert_eq!(pos.vector3s().unwrap(), vec![Vector3::new(0.0, 0.0, 0.0)]);
}

#[test]
fn test_round_trip() {
    let pack = sample_pack();
    let mut w = Writer::new();
    write_resource(&mut w, &pack).unwrap();
    assert_eq!(w.depth(), 0);
    let slots = w.slots().to_vec();
    let bytes = w.into_bytes();

    let mut cur = Cur::new(&bytes);
    let pack2: MotionPack = read_resource(&mut cur, None).unwrap();
    assert_eq!(pack2, pack);
    let rot = pack2.track(2, pack2.controllers[1]).unwrap().rotations().unwrap();
    assert_eq!(rot[1], Quaternion::new(0.5, 0.5, 0.5, 0.5));

    // motion table offset and two non-null motion offsets
    assert_eq!(slots.len(), 3);
    let base = 32;
    let table_offset = u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]) as usize;
    let table_size = u32::from_le_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]) as usize;
    let table = &bytes[base + table_offset..base + table_offset + table_size];
    let mut sorted = slots.clone();
    sorted.sort();
    assert_eq!(reloc::decode(table, base).unwrap(), sorted);

    let mut w = Writer::new();
    write_resource(&mut w, &pack2).unwrap();
    assert_eq!(w.into_bytes(), bytes);
}

#[test]
fn test_track_layout() {
    let track = KeyframeTrack::from_u32s(vec![0, 1, 2], &[7, 8, 9]);
    let mut w = Writer::new();
    track.write(&mut w).unwrap();
    let bytes = w.into_bytes();
    // size, count, key size, 3 times padded to 8, 12 bytes of keys
    assert_eq!(bytes.len(), 4 + 4 + 8 + 12);
    assert_eq!(&bytes[0..4], &[28, 0, 0, 0]);
    let mut cur = Cur::new(&bytes);
    let track2 = KeyframeTrack::read(&mut cur).unwrap();
    assert_eq!(track2.u32s().unwrap(), vec![7, 8, 9]);
    assert!(track2.vector3s().is_none());
}

#[test]
fn test_mismatched_tracks() {
    let mut pack = sample_pack();
    if let Some(Some(m)) = pack.motions.get_mut(0) {
        m.tracks.pop();
    }
    let mut w = Writer::new();
    assert!(write_resource(&mut w, &pack).is_err());
}

#[test]
fn test_unknown_controller_has_no_rest_value() {
    assert!(KeyframeTrack::placeholder(ControllerType::Other(77)).is_err());
    assert_eq!(ControllerType::from_raw(0x20000), ControllerType::Type20000);
    assert_eq!(ControllerType::Other(77).raw(), 77);
}
