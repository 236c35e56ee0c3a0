//! PS2 VIF code streams.
//!
//! Mesh data is stored as the stream of VIF codes the engine sends to the
//! vector unit: unpack packets that load vertex data into VU memory,
//! interleaved with codes that start the microprogram that draws them. This
//! module knows how the codes are laid out; the mesh modules know what they
//! mean.

pub mod builder;
pub mod code;
pub mod packet;
pub mod parser;

pub use self::builder::{StreamBuilder, UnpackData};
pub use self::code::{Command, VifCode};
pub use self::packet::{Elements, Format, Packet};
pub use self::parser::{read_activate_micro, read_code, read_packet, read_tag, VifParser, VifTag};
