//! Reading VIF codes.
//!
//! Mesh readers pull tags one at a time with `read_tag` (or the stricter
//! `read_packet`/`read_code`) and check each against the shape they expect.
//! A `VifParser` iterates over a whole stream and is used for inspecting
//! streams without interpreting them.

use crate::errors::{malformed, Result};
use crate::io::writer::Writer;
use crate::util::cur::Cur;
use crate::vif::code::{Command, VifCode};
use crate::vif::packet::Packet;

#[derive(Debug, Clone, PartialEq)]
pub enum VifTag {
    Code(VifCode),
    Unpack(Packet),
}

impl VifTag {
    pub fn command(&self) -> Command {
        match *self {
            VifTag::Code(ref code) => code.command,
            VifTag::Unpack(_) => Command::Unpack,
        }
    }

    pub fn write(&self, w: &mut Writer) {
        match *self {
            VifTag::Code(ref code) => code.write(w),
            VifTag::Unpack(ref packet) => packet.write(w),
        }
    }
}

pub fn read_tag(cur: &mut Cur) -> Result<VifTag> {
    fields!(cur, vif_tag {
        immediate: u16,
        count: u8,
        cmd: u8,
    });
    if (0x60..=0x7f).contains(&cmd) {
        Ok(VifTag::Unpack(Packet::read_rest(cur, immediate, count, cmd)?))
    } else {
        Ok(VifTag::Code(VifCode::read_rest(cur, immediate, count, cmd)?))
    }
}

/// Reads a tag that must be an unpack packet.
pub fn read_packet(cur: &mut Cur) -> Result<Packet> {
    let pos = cur.pos();
    match read_tag(cur)? {
        VifTag::Unpack(packet) => Ok(packet),
        VifTag::Code(code) => Err(malformed(format!(
            "expected an unpack packet at {:#x}, found {:?}", pos, code.command,
        ))),
    }
}

/// Reads a tag that must not be an unpack packet.
pub fn read_code(cur: &mut Cur) -> Result<VifCode> {
    let pos = cur.pos();
    match read_tag(cur)? {
        VifTag::Code(code) => Ok(code),
        VifTag::Unpack(_) => Err(malformed(format!(
            "expected a vifcode at {:#x}, found an unpack packet", pos,
        ))),
    }
}

/// Reads the code that starts a batch's microprogram. Only programs 0x0c
/// and 0x10 are used by flat batches.
pub fn read_activate_micro(cur: &mut Cur) -> Result<VifCode> {
    let code = read_code(cur)?;
    if code.command != Command::ActMicro || (code.immediate != 0x0c && code.immediate != 0x10) {
        return Err(malformed(format!(
            "invalid ActMicro vifcode: {:?} {:#x}", code.command, code.immediate,
        )));
    }
    Ok(code)
}

/// Iterates over the tags in a region of a buffer.
pub struct VifParser<'a> {
    cur: Cur<'a>,
    end: usize,
    /// Whether we're done. Always set after an error.
    done: bool,
}

impl<'a> VifParser<'a> {
    pub fn new(buf: &'a [u8]) -> VifParser<'a> {
        VifParser { cur: Cur::new(buf), end: buf.len(), done: false }
    }

    /// Parses `buf[start..end]`.
    pub fn with_range(buf: &'a [u8], start: usize, end: usize) -> Result<VifParser<'a>> {
        let mut cur = Cur::new(buf);
        cur.jump_to(start)?;
        if end > buf.len() || end < start {
            bail!(crate::errors::ErrorKind::CorruptOffset(end, buf.len()));
        }
        Ok(VifParser { cur, end, done: false })
    }

    pub fn pos(&self) -> usize {
        self.cur.pos()
    }
}

impl<'a> Iterator for VifParser<'a> {
    type Item = Result<VifTag>;

    fn next(&mut self) -> Option<Result<VifTag>> {
        if self.done {
            return None;
        }
        if self.cur.pos() >= self.end {
            // Finished successfully.
            self.done = true;
            return None;
        }
        let res = read_tag(&mut self.cur);
        if res.is_err() || self.cur.pos() > self.end {
            self.done = true;
        }
        if res.is_ok() && self.cur.pos() > self.end {
            return Some(Err(malformed("vif tag runs past the end of the stream")));
        }
        Some(res)
    }
}

#[cfg(test)]
use crate::errors::ErrorKind;

#[test]
fn test_parse_stream() {
    let bytes = [
        0x00, 0x80, 0x01, 0x65, 1, 0, 2, 0, // header, short x2
        0x0c, 0x00, 0x00, 0x14,             // ActMicro 0x0c
        0x00, 0x00, 0x00, 0x10,             // FlushEnd
    ];
    let tags: Vec<VifTag> = VifParser::new(&bytes).collect::<Result<_>>().unwrap();
    assert_eq!(tags.len(), 3);
    assert_eq!(tags[0].command(), Command::Unpack);
    assert_eq!(tags[1].command(), Command::ActMicro);
    assert_eq!(tags[2].command(), Command::FlushEnd);

    let mut w = Writer::new();
    for tag in &tags {
        tag.write(&mut w);
    }
    assert_eq!(&w.into_bytes()[..], &bytes[..]);
}

#[test]
fn test_unknown_instruction() {
    let bytes = [0, 0, 0, 0x12, 0, 0, 0, 0];
    let mut parser = VifParser::new(&bytes);
    let err = parser.next().unwrap().unwrap_err();
    match *err.kind() {
        ErrorKind::UnknownInstruction(0x12) => (),
        ref k => panic!("unexpected error {:?}", k),
    }
    assert!(parser.next().is_none());
}

#[test]
fn test_activate_micro() {
    let bytes = [0x10, 0, 0, 0x14, 0x16, 0, 0, 0x14];
    let mut cur = Cur::new(&bytes);
    assert!(read_activate_micro(&mut cur).is_ok());
    assert!(read_activate_micro(&mut cur).is_err());
}
