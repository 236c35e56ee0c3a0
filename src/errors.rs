error_chain! {
    foreign_links {
        Fmt(::std::fmt::Error);
        Io(::std::io::Error);
    }

    errors {
        CorruptOffset(pos: usize, len: usize) {
            description("offset points outside of the buffer")
            display("offset {:#x} points outside of the buffer (length {:#x})", pos, len)
        }
        BaseStack(msg: String) {
            description("base offset stack misuse")
            display("base offset stack misuse: {}", msg)
        }
        MalformedStream(msg: String) {
            description("malformed stream")
            display("malformed stream: {}", msg)
        }
        UnknownInstruction(cmd: u8) {
            description("unknown VIF instruction")
            display("unknown VIF instruction: command byte {:#04x}", cmd)
        }
        UnknownMeshType(tag: i32) {
            description("unknown mesh type")
            display("unknown mesh type: {}", tag)
        }
        UnknownFlag(what: &'static str, bits: u32) {
            description("unknown flag")
            display("unknown {} flag: {:#010x}", what, bits)
        }
        UnknownResource(identifier: u32) {
            description("unknown resource")
            display("unknown resource identifier: {:#010x}", identifier)
        }
        UnsupportedConversion(msg: String) {
            description("unsupported conversion")
            display("unsupported conversion: {}", msg)
        }
    }
}

/// Fails with `MalformedStream` unless the condition holds. Used for
/// structural checks on decoded data.
macro_rules! check_stream {
    ($b:expr) => {
        if !$b {
            use $crate::errors::Error;
            use $crate::errors::ErrorKind;
            Err(Error::from_kind(ErrorKind::MalformedStream(format!(
                "expected: {}",
                stringify!($b)
            ))))
        } else {
            Ok(())
        }
    };
}

pub fn malformed<S: Into<String>>(msg: S) -> Error {
    ErrorKind::MalformedStream(msg.into()).into()
}

pub fn unsupported<S: Into<String>>(msg: S) -> Error {
    ErrorKind::UnsupportedConversion(msg.into()).into()
}
