//! Writing side of the binary format and the resource framing shared by
//! every resource kind. The reading side is `util::cur::Cur`.

pub mod header;
pub mod reloc;
pub mod resource;
pub mod writer;

pub use self::header::{ResourceDescriptor, ResourceHeader};
pub use self::resource::{read_resource, write_resource, Resource};
pub use self::writer::Writer;
