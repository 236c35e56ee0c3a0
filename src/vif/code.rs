//! Plain VIF codes.

use crate::errors::{malformed, ErrorKind, Result};
use crate::io::writer::Writer;
use crate::util::cur::Cur;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Command {
    Nop,
    SetCycle,
    SetOffset,
    SetBase,
    SetItops,
    SetMode,
    MaskPath,
    SetMark,
    FlushEnd,
    Flush,
    FlushAll,
    /// MSCAL; the immediate is the microprogram address.
    ActMicro,
    ActMicroF,
    /// MSCNT
    CntMicro,
    SetMask,
    SetRow,
    SetCol,
    LoadMicro,
    Direct,
    DirectHl,
    /// 0x60..=0x7f. Bit 4 selects the write mask; the low bits hold the
    /// element layout.
    Unpack,
}

impl Command {
    pub fn from_byte(cmd: u8) -> Option<Command> {
        use self::Command::*;
        Some(match cmd {
            0x00 => Nop,
            0x01 => SetCycle,
            0x02 => SetOffset,
            0x03 => SetBase,
            0x04 => SetItops,
            0x05 => SetMode,
            0x06 => MaskPath,
            0x07 => SetMark,
            0x10 => FlushEnd,
            0x11 => Flush,
            0x13 => FlushAll,
            0x14 => ActMicro,
            0x15 => ActMicroF,
            0x17 => CntMicro,
            0x20 => SetMask,
            0x30 => SetRow,
            0x31 => SetCol,
            0x4a => LoadMicro,
            0x50 => Direct,
            0x51 => DirectHl,
            0x60..=0x7f => Unpack,
            _ => return None,
        })
    }

    /// The command byte. For `Unpack` this is the unmasked base value.
    pub fn to_byte(self) -> u8 {
        use self::Command::*;
        match self {
            Nop => 0x00,
            SetCycle => 0x01,
            SetOffset => 0x02,
            SetBase => 0x03,
            SetItops => 0x04,
            SetMode => 0x05,
            MaskPath => 0x06,
            SetMark => 0x07,
            FlushEnd => 0x10,
            Flush => 0x11,
            FlushAll => 0x13,
            ActMicro => 0x14,
            ActMicroF => 0x15,
            CntMicro => 0x17,
            SetMask => 0x20,
            SetRow => 0x30,
            SetCol => 0x31,
            LoadMicro => 0x4a,
            Direct => 0x50,
            DirectHl => 0x51,
            Unpack => 0x60,
        }
    }

    /// Size of the data following a code of this kind.
    fn payload_size(self, immediate: u16, count: u8) -> usize {
        match self {
            Command::SetMask => 4,
            Command::SetRow | Command::SetCol => 16,
            Command::LoadMicro => {
                let n = if count == 0 { 256 } else { count as usize };
                8 * n
            }
            Command::Direct | Command::DirectHl => {
                let n = if immediate == 0 { 0x10000 } else { immediate as usize };
                16 * n
            }
            _ => 0,
        }
    }
}

/// A VIF code other than an unpack. Codes that carry data (masks, rows,
/// microprogram uploads, GIF transfers) keep it raw.
#[derive(Debug, Clone, PartialEq)]
pub struct VifCode {
    pub immediate: u16,
    pub count: u8,
    pub command: Command,
    pub data: Vec<u8>,
}

impl VifCode {
    pub fn new(immediate: u16, count: u8, command: Command) -> VifCode {
        VifCode { immediate, count, command, data: vec![] }
    }

    /// Reads the code's data. The 4-byte code itself has already been read.
    pub(crate) fn read_rest(cur: &mut Cur, immediate: u16, count: u8, cmd: u8) -> Result<VifCode> {
        let command = match Command::from_byte(cmd) {
            Some(c) => c,
            None => bail!(ErrorKind::UnknownInstruction(cmd)),
        };
        let n = command.payload_size(immediate, count);
        let data = cur.next_n_u8s(n)?.to_vec();
        Ok(VifCode { immediate, count, command, data })
    }

    pub fn write(&self, w: &mut Writer) {
        w.put(self.immediate);
        w.put(self.count);
        w.put(self.command.to_byte());
        w.put_bytes(&self.data);
    }

    /// Checks that this code is exactly `command` with the given immediate
    /// and count.
    pub fn ensure(&self, immediate: u16, count: u8, command: Command) -> Result<()> {
        if self.immediate != immediate {
            return Err(malformed(format!(
                "vifcode immediate value is not {:#x} (found {:#x})", immediate, self.immediate,
            )));
        }
        if self.count != count {
            return Err(malformed(format!(
                "vifcode count value is not {} (found {})", count, self.count,
            )));
        }
        if self.command != command {
            return Err(malformed(format!(
                "vifcode command type is not {:?} (found {:?})", command, self.command,
            )));
        }
        Ok(())
    }
}

#[test]
fn test_command_bytes() {
    for b in 0..=0xffu8 {
        if let Some(c) = Command::from_byte(b) {
            if c != Command::Unpack {
                assert_eq!(c.to_byte(), b);
            }
        }
    }
    assert_eq!(Command::from_byte(0x7c), Some(Command::Unpack));
    assert_eq!(Command::from_byte(0x12), None);
    assert_eq!(Command::from_byte(0x16), None);
}

#[test]
fn test_code_ensure() {
    let code = VifCode::new(0x0c, 0, Command::ActMicro);
    assert!(code.ensure(0x0c, 0, Command::ActMicro).is_ok());
    assert!(code.ensure(0x10, 0, Command::ActMicro).is_err());
    assert!(code.ensure(0x0c, 0, Command::CntMicro).is_err());
}
