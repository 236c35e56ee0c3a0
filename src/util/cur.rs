use crate::errors::{ErrorKind, Result};
use crate::util::align_up;
use crate::util::view::{View, Viewable};
use std::fmt;

/// A pointer into a buffer of bytes. Used for binary file parsing.
///
/// Besides the read position, the cursor carries a stack of base offsets.
/// Relative offsets stored in the file are resolved against the innermost
/// base.
#[derive(Clone)]
pub struct Cur<'a> {
    buf_: &'a [u8],
    pos_: usize,
    bases: Vec<usize>,
}

impl<'a> Cur<'a> {
    pub fn new(buf: &[u8]) -> Cur {
        Cur { buf_: buf, pos_: 0, bases: vec![] }
    }

    pub fn pos(&self) -> usize {
        self.pos_
    }

    pub fn len(&self) -> usize {
        self.buf_.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf_.is_empty()
    }

    pub fn bytes_remaining(&self) -> usize {
        self.buf_.len().saturating_sub(self.pos_)
    }

    pub fn next<T: Viewable>(&mut self) -> Result<T> {
        let size = <T as Viewable>::size();
        let buf = self.next_n_u8s(size)?;
        Ok(<T as Viewable>::view(buf))
    }

    pub fn next_n<T: Viewable>(&mut self, n: usize) -> Result<View<'a, T>> {
        let size = <T as Viewable>::size();
        let buf = self.next_n_u8s(size * n)?;
        Ok(View::from_buf(buf))
    }

    pub fn next_vec<T: Viewable>(&mut self, n: usize) -> Result<Vec<T>> {
        Ok(self.next_n::<T>(n)?.collect())
    }

    pub fn next_n_u8s(&mut self, n: usize) -> Result<&'a [u8]> {
        let end_pos = self.pos_ + n;
        if end_pos > self.buf_.len() {
            bail!(ErrorKind::CorruptOffset(end_pos, self.buf_.len()));
        }
        let res = &self.buf_[self.pos_ .. end_pos];
        self.pos_ = end_pos;
        Ok(res)
    }

    /// Reads a NUL-terminated string. Bytes are taken as Latin-1.
    pub fn next_string(&mut self) -> Result<String> {
        let rest = &self.buf_[self.pos_.min(self.buf_.len())..];
        let len = match rest.iter().position(|&b| b == 0) {
            Some(len) => len,
            None => bail!(ErrorKind::MalformedStream("unterminated string".into())),
        };
        let s = rest[..len].iter().map(|&b| b as char).collect();
        self.pos_ += len + 1;
        Ok(s)
    }

    /// Reads a value and fails with `MalformedStream` unless it is `expected`.
    pub fn expect<T>(&mut self, expected: T, what: &str) -> Result<T>
    where T: Viewable + PartialEq + fmt::Debug
    {
        let pos = self.pos_;
        let x = self.next::<T>()?;
        if x != expected {
            bail!(ErrorKind::MalformedStream(format!(
                "{}@{:#x}: expected {:?}, found {:?}", what, pos, expected, x,
            )));
        }
        Ok(x)
    }

    pub fn jump_to(&mut self, pos: usize) -> Result<()> {
        if pos > self.buf_.len() {
            bail!(ErrorKind::CorruptOffset(pos, self.buf_.len()));
        }
        self.pos_ = pos;
        Ok(())
    }

    pub fn jump_forward(&mut self, amt: usize) -> Result<()> {
        let pos = self.pos_;
        self.jump_to(pos + amt)
    }

    /// Skips forward to the next multiple of `alignment`.
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let pos = align_up(self.pos_, alignment);
        self.jump_to(pos)
    }

    pub fn push_base(&mut self, pos: usize) -> Result<()> {
        if pos > self.buf_.len() {
            bail!(ErrorKind::CorruptOffset(pos, self.buf_.len()));
        }
        self.bases.push(pos);
        Ok(())
    }

    pub fn push_base_here(&mut self) {
        let pos = self.pos_;
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

    /// The innermost base, or 0 if no base has been pushed.
    pub fn base(&self) -> usize {
        self.bases.last().cloned().unwrap_or(0)
    }

    pub fn depth(&self) -> usize {
        self.bases.len()
    }

    /// Resolves a relative offset against the current base.
    pub fn resolve(&self, offset: u32) -> Result<usize> {
        let pos = self.base() + offset as usize;
        if pos >= self.buf_.len() {
            bail!(ErrorKind::CorruptOffset(pos, self.buf_.len()));
        }
        Ok(pos)
    }

    /// Reads a 4-byte relative offset. A zero offset means there is nothing
    /// there and `None` is returned. Otherwise `f` runs with the cursor at the
    /// target and the read position is restored afterwards, whether `f`
    /// succeeds or not.
    pub fn read_offset<T, F>(&mut self, f: F) -> Result<Option<T>>
    where F: FnOnce(&mut Cur<'a>) -> Result<T>
    {
        let offset = self.next::<u32>()?;
        self.read_at(offset, f)
    }

    /// Like `read_offset` for an offset that was already read.
    pub fn read_at<T, F>(&mut self, offset: u32, f: F) -> Result<Option<T>>
    where F: FnOnce(&mut Cur<'a>) -> Result<T>
    {
        if offset == 0 {
            return Ok(None);
        }
        let target = self.resolve(offset)?;
        let saved = self.pos_;
        self.pos_ = target;
        let res = f(self);
        self.pos_ = saved;
        res.map(Some)
    }
}

impl<'a> fmt::Debug for Cur<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Cur {{ pos: {:#x}, base: {:#x} }}", self.pos(), self.base())
    }
}

#[test]
fn test_read_offset_restores_position() {
    // base at 4; offset 8 points at 0x0c
    let buf = [
        0, 0, 0, 0,
        8, 0, 0, 0,
        0, 0, 0, 0,
        0x2a, 0, 0, 0,
    ];
    let mut cur = Cur::new(&buf);
    cur.push_base(4).unwrap();
    cur.jump_to(4).unwrap();
    let x = cur.read_offset(|cur| cur.next::<u32>()).unwrap();
    assert_eq!(x, Some(0x2a));
    assert_eq!(cur.pos(), 8);

    cur.jump_to(4).unwrap();
    let res: Result<Option<()>> = cur.read_offset(|cur| {
        cur.next::<u32>()?;
        bail!("inner failure")
    });
    assert!(res.is_err());
    assert_eq!(cur.pos(), 8);
    assert_eq!(cur.pop_base().unwrap(), 4);
    assert_eq!(cur.depth(), 0);
}

#[test]
fn test_offset_outside_buffer() {
    let buf = [0xf0, 0, 0, 0];
    let mut cur = Cur::new(&buf);
    let err = cur.read_offset(|cur| cur.next::<u8>()).unwrap_err();
    match *err.kind() {
        ErrorKind::CorruptOffset(pos, len) => {
            assert_eq!(pos, 0xf0);
            assert_eq!(len, 4);
        }
        ref k => panic!("unexpected error {:?}", k),
    }
}

#[test]
fn test_zero_offset_is_absent() {
    let buf = [0, 0, 0, 0, 1];
    let mut cur = Cur::new(&buf);
    let x = cur.read_offset(|cur| cur.next::<u8>()).unwrap();
    assert_eq!(x, None);
    assert_eq!(cur.pos(), 4);
}
