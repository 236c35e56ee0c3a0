//! The `fields!` macro reads a run of fixed fields from a `Cur`, binding
//! each to a local and tracing it as `struct.field@0xpos: value`.
//!
//! ```ignore
//! fields!(cur, node {
//!     field00: i32,
//!     index: i32,
//!     rotation: (vec3_pad),
//! });
//! ```

macro_rules! field_helper2 {
    ($cur:ident, [u8; $n:expr]) => { $cur.next_n_u8s($n as usize)? };
    ($cur:ident, [$t:ty; $n:expr]) => { $cur.next_vec::<$t>($n as usize)? };
    ($cur:ident, (q12)) => {
        {
            let x = $cur.next::<u16>()?;
            $crate::util::fixed::q12(x)
        }
    };
    ($cur:ident, (vec3_pad)) => {
        {
            let v = $cur.next::<::cgmath::Vector3<f32>>()?;
            $cur.next::<f32>()?;
            v
        }
    };
    ($cur:ident, (offset)) => { $cur.next::<u32>()? };
    ($cur:ident, Cur) => { $cur.clone() };
    ($cur:ident, $t:ty) => { $cur.next::<$t>()? };
}

macro_rules! field_helper {
    ($c:ident, $name:ident, $field:ident, Cur) => {
        let $field = field_helper2!($c, Cur);
    };
    ($c:ident, $name:ident, $field:ident, $ty:tt) => {
        let pos = $c.pos();
        let $field = field_helper2!($c, $ty);
        trace!("{}.{}@{:#x}: {:?}",
            stringify!($name),
            stringify!($field),
            pos,
            $field,
        );
    }
}

macro_rules! fields {
    ($cur:ident, $name:ident { $($field:ident : $ty:tt,)* }) => {
        $(field_helper!($cur, $name, $field, $ty);)*
    };
    ($cur:ident, $name:ident { $($field:ident : $ty:tt),* }) => {
        fields!($cur, $name { $($field : $ty,)* });
    };
}

#[cfg(test)]
use crate::errors::Result;
#[cfg(test)]
use crate::util::cur::Cur;

#[cfg(test)]
fn read_pair(cur: &mut Cur) -> Result<(i16, u32, f32)> {
    fields!(cur, pair {
        a: i16,
        b: (offset),
        c: (q12),
    });
    Ok((a, b, c))
}

#[test]
fn test_fields_advance() {
    let buf = [0xff, 0xff, 0x10, 0, 0, 0, 0x00, 0x08];
    let mut cur = Cur::new(&buf);
    let (a, b, c) = read_pair(&mut cur).unwrap();
    assert_eq!(a, -1);
    assert_eq!(b, 0x10);
    assert_eq!(c, 0.5);
    assert_eq!(cur.pos(), 8);
}
