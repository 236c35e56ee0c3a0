//! Resource framing.
//!
//! A resource is a header followed by content. Offsets inside the content
//! are relative to the start of the header, so the header start is pushed
//! as a base while the content is read or written.

use crate::errors::{ErrorKind, Result, ResultExt};
use crate::io::header::{
    ident, stamp, FieldResourceHeader, ResourceDescriptor, ResourceHeader,
    FIELD_HEADER_SIZE, SHORT_HEADER_SIZE,
};
use crate::io::reloc;
use crate::io::writer::{Writer, PRIORITY_LAST};
use crate::util::cur::Cur;

/// A resource framed by a short header.
pub trait Resource: Sized {
    const DESCRIPTOR: ResourceDescriptor;

    /// Reads the content. The cursor is just past the header and the header
    /// start is the current base.
    fn read_content(cur: &mut Cur, header: &ResourceHeader) -> Result<Self>;

    /// Writes the content. The header start is the current base.
    fn write_content<'a>(&'a self, w: &mut Writer<'a>) -> Result<()>;

    fn user_id(&self) -> u16 { 0 }
}

/// A resource framed by a field header and followed by a relocation table.
pub trait FieldResource: Sized {
    const DESCRIPTOR: ResourceDescriptor;

    fn read_content(cur: &mut Cur, header: &FieldResourceHeader) -> Result<Self>;
    fn write_content<'a>(&'a self, w: &mut Writer<'a>) -> Result<()>;
}

fn check_balance(depth: usize, now: usize, what: &str) -> Result<()> {
    if depth != now {
        debug_assert!(false, "unbalanced base stack after {}", what);
        bail!(ErrorKind::BaseStack(format!(
            "{} left the stack at depth {} (expected {})", what, now, depth,
        )));
    }
    Ok(())
}

/// Reads a resource. If the caller already read the header it passes it in
/// and the cursor must be just past it; otherwise the header is read here
/// and checked against the resource type.
pub fn read_resource<T: Resource>(cur: &mut Cur, header: Option<ResourceHeader>) -> Result<T> {
    read_framed(cur, header, Some(T::DESCRIPTOR), |cur, header| T::read_content(cur, header))
}

/// Reads a resource whose content is parsed by `f`. The header is checked
/// against `expected` when it is read here.
pub fn read_framed<T, F>(
    cur: &mut Cur,
    header: Option<ResourceHeader>,
    expected: Option<ResourceDescriptor>,
    f: F,
) -> Result<T>
where F: FnOnce(&mut Cur, &ResourceHeader) -> Result<T>
{
    let (start, header) = match header {
        Some(header) => {
            let start = match cur.pos().checked_sub(SHORT_HEADER_SIZE) {
                Some(start) => start,
                None => bail!(ErrorKind::CorruptOffset(cur.pos(), cur.len())),
            };
            (start, header)
        }
        None => {
            let start = cur.pos();
            let header = ResourceHeader::read(cur)?;
            if let Some(expected) = expected {
                if header.descriptor() != expected {
                    bail!("resource header does not match: expected {} (type {}), found {} (type {})",
                        stamp(expected.identifier), expected.file_type,
                        stamp(header.identifier), header.file_type);
                }
            }
            (start, header)
        }
    };

    debug!("reading {} at {:#x} ({:#x} bytes)", stamp(header.identifier), start, header.size);

    let depth = cur.depth();
    cur.push_base(start)?;
    let res = f(cur, &header);
    cur.pop_base()?;
    let x = res.chain_err(|| format!("reading {} at {:#x}", stamp(header.identifier), start))?;
    check_balance(depth, cur.depth(), "resource read")?;

    // Some texture packs have broken sizes; they are read by structure.
    if header.identifier != ident::TEXTURE_PACK {
        cur.jump_to(start + header.size as usize)?;
    }
    Ok(x)
}

/// Writes a resource with its header and pads it to 64 bytes.
pub fn write_resource<'a, T: Resource>(w: &mut Writer<'a>, res: &'a T) -> Result<()> {
    write_framed(w, T::DESCRIPTOR, res.user_id(), |w| res.write_content(w))
}

/// Writes a header for `descriptor`, the content `body` writes, and the
/// padding. The header's size is measured.
pub fn write_framed<'a, F>(
    w: &mut Writer<'a>,
    descriptor: ResourceDescriptor,
    user_id: u16,
    body: F,
) -> Result<()>
where F: FnOnce(&mut Writer<'a>) -> Result<()>
{
    let depth = w.depth();
    w.push_base();
    let start = w.pos();
    w.skip(SHORT_HEADER_SIZE);

    body(w)?;

    let end = w.pos();
    let header = ResourceHeader {
        file_type: descriptor.file_type,
        compressed: false,
        user_id,
        size: (end - start) as u32,
        identifier: descriptor.identifier,
        memory_size: 0,
    };
    w.seek(start);
    header.write(w);
    w.seek(end);
    w.align(64);
    w.pop_base()?;
    check_balance(depth, w.depth(), "resource write")?;

    debug!("wrote {} at {:#x} ({:#x} bytes)", stamp(header.identifier), start, header.size);
    Ok(())
}

pub fn read_field_resource<T: FieldResource>(
    cur: &mut Cur,
    header: Option<FieldResourceHeader>,
) -> Result<T> {
    let (start, header) = match header {
        Some(header) => {
            let start = match cur.pos().checked_sub(FIELD_HEADER_SIZE) {
                Some(start) => start,
                None => bail!(ErrorKind::CorruptOffset(cur.pos(), cur.len())),
            };
            (start, header)
        }
        None => {
            let start = cur.pos();
            let header = FieldResourceHeader::read(cur)?;
            if header.identifier != T::DESCRIPTOR.identifier {
                bail!("field resource header does not match: expected {}, found {}",
                    stamp(T::DESCRIPTOR.identifier), stamp(header.identifier));
            }
            (start, header)
        }
    };

    let depth = cur.depth();
    cur.push_base(start)?;
    let end = start + header.data_size as usize + header.relocation_table_size as usize;
    let res = T::read_content(cur, &header);
    cur.pop_base()?;
    let x = res.chain_err(|| format!("reading {} at {:#x}", stamp(header.identifier), start))?;
    check_balance(depth, cur.depth(), "field resource read")?;
    cur.jump_to(end)?;
    Ok(x)
}

pub fn write_field_resource<'a, T: FieldResource>(w: &mut Writer<'a>, res: &'a T) -> Result<()> {
    let depth = w.depth();
    w.push_base();
    let start = w.pos();
    w.put(T::DESCRIPTOR.file_type as i32);
    w.put(T::DESCRIPTOR.identifier);
    w.put(0u32); // data size
    w.schedule_offset_unrecorded(PRIORITY_LAST, 16, move |w| {
        let table_start = w.pos();
        w.patch_u32(start + 8, (table_start - start) as u32);
        let mut slots = w.slots().to_vec();
        slots.sort();
        let table = reloc::encode(&slots, w.base())?;
        debug!("relocation table: {} slots, {:#x} bytes", slots.len(), table.len());
        w.put_bytes(&table);
        w.patch_u32(start + 16, table.len() as u32);
        Ok(())
    });
    w.put(0u32); // relocation table size

    res.write_content(w)?;
    w.run_scheduled_writes()?;
    w.pop_base()?;
    check_balance(depth, w.depth(), "field resource write")
}

/// Decodes the relocation table of a field resource, giving the absolute
/// position of each offset slot.
pub fn field_relocations(bytes: &[u8], start: usize) -> Result<Vec<usize>> {
    let mut cur = Cur::new(bytes);
    cur.jump_to(start)?;
    let header = FieldResourceHeader::read(&mut cur)?;
    let table_start = start + header.relocation_table_offset as usize;
    cur.jump_to(table_start)?;
    let table = cur.next_n_u8s(header.relocation_table_size as usize)?;
    reloc::decode(table, start)
}

#[cfg(test)]
use crate::io::header::file_type;

#[cfg(test)]
#[derive(Debug, PartialEq)]
struct Blob {
    user_id: u16,
    data: Vec<u8>,
}

#[cfg(test)]
impl Resource for Blob {
    const DESCRIPTOR: ResourceDescriptor = ResourceDescriptor {
        file_type: file_type::DEFAULT,
        identifier: ident::PARTICLE,
    };

    fn read_content(cur: &mut Cur, header: &ResourceHeader) -> Result<Blob> {
        let n = header.size as usize - SHORT_HEADER_SIZE;
        let data = cur.next_n_u8s(n)?.to_vec();
        Ok(Blob { user_id: header.user_id, data })
    }

    fn write_content<'a>(&'a self, w: &mut Writer<'a>) -> Result<()> {
        w.put_bytes(&self.data);
        Ok(())
    }

    fn user_id(&self) -> u16 { self.user_id }
}

/// Two lists behind offsets, one of them nested.
#[cfg(test)]
#[derive(Debug, PartialEq)]
struct Lists {
    a: Vec<u32>,
    b: Option<Vec<u16>>,
}

#[cfg(test)]
impl FieldResource for Lists {
    const DESCRIPTOR: ResourceDescriptor = ResourceDescriptor {
        file_type: file_type::FIELD_RESOURCE,
        identifier: ident::FIELD_RESOURCE2,
    };

    fn read_content(cur: &mut Cur, _header: &FieldResourceHeader) -> Result<Lists> {
        let a = cur.read_offset(|cur| {
            let n = cur.next::<u32>()? as usize;
            cur.next_vec::<u32>(n)
        })?.unwrap_or_default();
        let b = cur.read_offset(|cur| {
            let n = cur.next::<u32>()? as usize;
            cur.read_offset(|cur| cur.next_vec::<u16>(n))
        })?.and_then(|x| x);
        Ok(Lists { a, b })
    }

    fn write_content<'a>(&'a self, w: &mut Writer<'a>) -> Result<()> {
        w.schedule_offset(16, move |w| {
            w.put(self.a.len() as u32);
            w.put_all(&self.a);
            Ok(())
        });
        w.schedule_offset_if(self.b.as_ref(), 4, |w, b| {
            w.put(b.len() as u32);
            w.schedule_offset(4, move |w| {
                w.put_all(b);
                Ok(())
            });
            Ok(())
        });
        Ok(())
    }
}

#[test]
fn test_resource_framing() {
    let blob = Blob { user_id: 9, data: vec![1, 2, 3] };
    let mut w = Writer::new();
    write_resource(&mut w, &blob).unwrap();
    assert_eq!(w.depth(), 0);
    let bytes = w.into_bytes();
    assert_eq!(bytes.len(), 64);
    assert_eq!(&bytes[4..8], &[19, 0, 0, 0]);

    let mut cur = Cur::new(&bytes);
    let blob2: Blob = read_resource(&mut cur, None).unwrap();
    assert_eq!(blob2, blob);
    assert_eq!(cur.depth(), 0);
    assert_eq!(cur.pos(), 19);

    // a header the container already read
    let mut cur = Cur::new(&bytes);
    let header = ResourceHeader::read(&mut cur).unwrap();
    let blob3: Blob = read_resource(&mut cur, Some(header)).unwrap();
    assert_eq!(blob3, blob);
}

#[test]
fn test_resource_type_mismatch() {
    let blob = Blob { user_id: 0, data: vec![] };
    let mut w = Writer::new();
    write_resource(&mut w, &blob).unwrap();
    let mut bytes = w.into_bytes();
    bytes[8] = b'X';
    let mut cur = Cur::new(&bytes);
    assert!(read_resource::<Blob>(&mut cur, None).is_err());
    assert_eq!(cur.depth(), 0);
}

#[test]
fn test_field_resource_relocations() {
    let lists = Lists { a: vec![10, 20, 30], b: Some(vec![7, 8]) };
    let mut w = Writer::new();
    w.put_bytes(&[0xee; 16]);
    write_field_resource(&mut w, &lists).unwrap();
    assert_eq!(w.depth(), 0);
    let slots = w.slots().to_vec();
    let bytes = w.into_bytes();

    let start = 16;
    let mut cur = Cur::new(&bytes);
    cur.jump_to(start).unwrap();
    let header = FieldResourceHeader::read(&mut cur).unwrap();
    assert_eq!(header.data_size, header.relocation_table_offset);
    assert_eq!(bytes.len(), start + (header.data_size + header.relocation_table_size) as usize);

    // three recorded offsets: a, b, and the one nested in b
    assert_eq!(slots.len(), 3);
    assert_eq!(slots[0], start + FIELD_HEADER_SIZE);
    assert_eq!(field_relocations(&bytes, start).unwrap(), slots);

    let mut cur = Cur::new(&bytes);
    cur.jump_to(start).unwrap();
    let lists2: Lists = read_field_resource(&mut cur, None).unwrap();
    assert_eq!(lists2, lists);
    assert_eq!(cur.pos(), bytes.len());
}
