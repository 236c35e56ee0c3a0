//! Binary writer with base-relative offsets and deferred writes.
//!
//! Structures that point at other data write a placeholder slot and
//! schedule a closure to emit the pointed-at data later. Scheduled closures
//! run at the end of the stream in `run_scheduled_writes`, after which the
//! slot is back-patched with the data's position relative to the base that
//! was active when the offset was scheduled.
//!
//! Every recorded slot goes into the slot table, from which the relocation
//! table is built.

use cgmath::{Vector2, Vector3, Vector4};
use crate::errors::{ErrorKind, Result};
use crate::util::align_up;
use std::fmt;

/// Types with a fixed little-endian encoding.
pub trait Writable {
    fn write_le(&self, out: &mut [u8]);
    fn size() -> usize where Self: Sized;
}

macro_rules! def_writable {
    ($t:ty, $n:expr) => {
        impl Writable for $t {
            fn write_le(&self, out: &mut [u8]) {
                out[..$n].copy_from_slice(&self.to_le_bytes());
            }
            fn size() -> usize { $n }
        }
    }
}

def_writable!(u8, 1);
def_writable!(i8, 1);
def_writable!(u16, 2);
def_writable!(i16, 2);
def_writable!(u32, 4);
def_writable!(i32, 4);
def_writable!(f32, 4);

impl Writable for Vector2<f32> {
    fn write_le(&self, out: &mut [u8]) {
        self.x.write_le(&mut out[0..4]);
        self.y.write_le(&mut out[4..8]);
    }
    fn size() -> usize { 8 }
}

impl Writable for Vector3<f32> {
    fn write_le(&self, out: &mut [u8]) {
        self.x.write_le(&mut out[0..4]);
        self.y.write_le(&mut out[4..8]);
        self.z.write_le(&mut out[8..12]);
    }
    fn size() -> usize { 12 }
}

impl Writable for Vector4<f32> {
    fn write_le(&self, out: &mut [u8]) {
        self.x.write_le(&mut out[0..4]);
        self.y.write_le(&mut out[4..8]);
        self.z.write_le(&mut out[8..12]);
        self.w.write_le(&mut out[12..16]);
    }
    fn size() -> usize { 16 }
}

type Body<'a> = Box<dyn FnOnce(&mut Writer<'a>) -> Result<()> + 'a>;

struct Scheduled<'a> {
    priority: i32,
    seq: u64,
    slot: usize,
    base: usize,
    align: usize,
    body: Body<'a>,
}

/// Priority of the relocation table. Runs after everything else.
pub const PRIORITY_LAST: i32 = -1;

pub struct Writer<'a> {
    buf: Vec<u8>,
    pos: usize,
    bases: Vec<usize>,
    slots: Vec<usize>,
    queue: Vec<Scheduled<'a>>,
    next_seq: u64,
}

impl<'a> Writer<'a> {
    pub fn new() -> Writer<'a> {
        Writer {
            buf: vec![],
            pos: 0,
            bases: vec![],
            slots: vec![],
            queue: vec![],
            next_seq: 0,
        }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn seek(&mut self, pos: usize) {
        if pos > self.buf.len() {
            self.buf.resize(pos, 0);
        }
        self.pos = pos;
    }

    pub fn seek_end(&mut self) {
        let end = self.buf.len();
        self.pos = end;
    }

    pub fn skip(&mut self, n: usize) {
        let pos = self.pos + n;
        self.seek(pos);
    }

    /// Pads with zeroes up to a multiple of `alignment`.
    pub fn align(&mut self, alignment: usize) {
        let pos = align_up(self.pos, alignment);
        self.seek(pos);
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        let end = self.pos + bytes.len();
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
    }

    pub fn put<T: Writable>(&mut self, x: T) {
        let n = T::size();
        let end = self.pos + n;
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        x.write_le(&mut self.buf[self.pos..end]);
        self.pos = end;
    }

    pub fn put_all<T: Writable + Copy>(&mut self, xs: &[T]) {
        for &x in xs {
            self.put(x);
        }
    }

    /// Writes a NUL-terminated Latin-1 string.
    pub fn put_string(&mut self, s: &str) {
        for c in s.chars() {
            let b = if (c as u32) < 0x100 { c as u32 as u8 } else { b'?' };
            self.put(b);
        }
        self.put(0u8);
    }

    /// Overwrites a u32 at `pos` without moving the write position.
    pub fn patch_u32(&mut self, pos: usize, x: u32) {
        let saved = self.pos;
        self.seek(pos);
        self.put(x);
        self.pos = saved;
    }

    pub fn patch_i16(&mut self, pos: usize, x: i16) {
        let saved = self.pos;
        self.seek(pos);
        self.put(x);
        self.pos = saved;
    }

    pub fn push_base(&mut self) {
        let pos = self.pos;
        self.bases.push(pos);
    }

    pub fn push_base_at(&mut self, pos: usize) {
        self.bases.push(pos);
    }

    pub fn pop_base(&mut self) -> Result<usize> {
        match self.bases.pop() {
            Some(base) => Ok(base),
            None => {
                debug_assert!(false, "base offset stack underflow");
                bail!(ErrorKind::BaseStack("pop with an empty stack".into()))
            }
        }
    }

    pub fn base(&self) -> usize {
        self.bases.last().cloned().unwrap_or(0)
    }

    pub fn depth(&self) -> usize {
        self.bases.len()
    }

    /// Writes a zero placeholder for an offset and records it in the slot
    /// table. Returns the slot position.
    pub fn write_offset_slot(&mut self) -> usize {
        let slot = self.pos;
        self.put(0u32);
        self.slots.push(slot);
        slot
    }

    /// Writes an offset that will point at the data `body` writes.
    pub fn schedule_offset<F>(&mut self, align: usize, body: F)
    where F: FnOnce(&mut Writer<'a>) -> Result<()> + 'a
    {
        self.schedule_offset_with(0, align, body)
    }

    pub fn schedule_offset_with<F>(&mut self, priority: i32, align: usize, body: F)
    where F: FnOnce(&mut Writer<'a>) -> Result<()> + 'a
    {
        let slot = self.write_offset_slot();
        self.enqueue(priority, slot, align, Box::new(body));
    }

    /// Like `schedule_offset_with` but the slot stays out of the slot
    /// table. Used for the relocation table's own pointer.
    pub fn schedule_offset_unrecorded<F>(&mut self, priority: i32, align: usize, body: F)
    where F: FnOnce(&mut Writer<'a>) -> Result<()> + 'a
    {
        let slot = self.pos;
        self.put(0u32);
        self.enqueue(priority, slot, align, Box::new(body));
    }

    /// Writes a literal 0 when `value` is `None`, otherwise schedules `body`
    /// with the value.
    pub fn schedule_offset_if<T, F>(&mut self, value: Option<T>, align: usize, body: F)
    where
        T: 'a,
        F: FnOnce(&mut Writer<'a>, T) -> Result<()> + 'a,
    {
        match value {
            Some(x) => self.schedule_offset(align, move |w| body(w, x)),
            None => self.put(0u32),
        }
    }

    fn enqueue(&mut self, priority: i32, slot: usize, align: usize, body: Body<'a>) {
        let base = self.base();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Scheduled { priority, seq, slot, base, align, body });
    }

    pub fn has_scheduled(&self) -> bool {
        !self.queue.is_empty()
    }

    fn next_scheduled(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, job) in self.queue.iter().enumerate() {
            best = match best {
                None => Some(i),
                Some(b) => {
                    let cur = &self.queue[b];
                    if (job.priority, -(job.seq as i64)) > (cur.priority, -(cur.seq as i64)) {
                        Some(i)
                    } else {
                        Some(b)
                    }
                }
            };
        }
        best
    }

    /// Runs scheduled writes until none are left, including the ones
    /// scheduled by the bodies themselves.
    pub fn run_scheduled_writes(&mut self) -> Result<()> {
        while let Some(idx) = self.next_scheduled() {
            let job = self.queue.remove(idx);
            self.seek_end();
            self.align(job.align);
            let start = self.pos;
            if start < job.base {
                bail!(ErrorKind::BaseStack(format!(
                    "data at {:#x} precedes its base {:#x}", start, job.base,
                )));
            }

            let depth = self.bases.len();
            self.bases.push(job.base);
            (job.body)(self)?;
            self.pop_base()?;
            if self.bases.len() != depth {
                bail!(ErrorKind::BaseStack(format!(
                    "scheduled write at {:#x} left the stack at depth {} (expected {})",
                    start, self.bases.len(), depth,
                )));
            }

            self.patch_u32(job.slot, (start - job.base) as u32);
        }
        self.seek_end();
        Ok(())
    }

    /// Recorded slot positions in emission order.
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }

    pub fn clear_slots(&mut self) {
        self.slots.clear();
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }
}

impl<'a> Default for Writer<'a> {
    fn default() -> Writer<'a> {
        Writer::new()
    }
}

impl<'a> fmt::Debug for Writer<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Writer {{ pos: {:#x}, len: {:#x}, pending: {} }}",
            self.pos, self.buf.len(), self.queue.len())
    }
}

#[cfg(test)]
use crate::util::cur::Cur;

#[test]
fn test_schedule_patches_slot() {
    let data = vec![7u32, 8, 9];
    let mut w = Writer::new();
    w.put(0xaabbu16);
    w.align(4);
    w.schedule_offset(16, |w| {
        w.put_all(&data);
        Ok(())
    });
    w.put(1u32);
    w.run_scheduled_writes().unwrap();

    let bytes = w.into_bytes();
    assert_eq!(bytes.len(), 16 + 12);
    let mut cur = Cur::new(&bytes);
    cur.jump_to(4).unwrap();
    let xs = cur.read_offset(|cur| cur.next_vec::<u32>(3)).unwrap();
    assert_eq!(xs, Some(vec![7, 8, 9]));
}

#[test]
fn test_fifo_and_priority() {
    let mut w = Writer::new();
    w.schedule_offset_unrecorded(PRIORITY_LAST, 1, |w| { w.put(3u8); Ok(()) });
    w.schedule_offset(1, |w| {
        w.put(1u8);
        // nested writes run after everything already queued
        w.schedule_offset(1, |w| { w.put(4u8); Ok(()) });
        Ok(())
    });
    w.schedule_offset(1, |w| { w.put(2u8); Ok(()) });
    w.run_scheduled_writes().unwrap();
    assert_eq!(w.slots().len(), 3);
    let bytes = w.into_bytes();
    // 3 slots (12 bytes), then nested slot (4 bytes) inside the first body
    assert_eq!(&bytes[12..], &[1, 0x12, 0, 0, 0, 2, 4, 3][..]);
    assert_eq!(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]), 19);
}

#[test]
fn test_schedule_if_absent_writes_zero() {
    let mut w = Writer::new();
    w.schedule_offset_if(None::<u8>, 16, |w, x| { w.put(x); Ok(()) });
    w.schedule_offset_if(Some(5u8), 16, |w, x| { w.put(x); Ok(()) });
    w.run_scheduled_writes().unwrap();
    assert_eq!(w.slots(), &[4]);
    let bytes = w.into_bytes();
    assert_eq!(&bytes[0..8], &[0, 0, 0, 0, 16, 0, 0, 0]);
    assert_eq!(bytes[16], 5);
}

#[test]
fn test_base_relative_offset() {
    let mut w = Writer::new();
    w.put_bytes(&[0xff; 8]);
    w.push_base();
    w.schedule_offset(4, |w| { w.put(0x55u8); Ok(()) });
    w.run_scheduled_writes().unwrap();
    assert_eq!(w.pop_base().unwrap(), 8);
    assert_eq!(w.depth(), 0);
    let bytes = w.into_bytes();
    assert_eq!(&bytes[8..12], &[4, 0, 0, 0]);
    assert_eq!(bytes[12], 0x55);
}
