//! Bit ranges of packed words.
//!
//! `x.bits(lo, hi)` is the range [`lo`, `hi`) of `x` shifted down to bit 0;
//! `x.with_bits(lo, hi, v)` is `x` with that range replaced by the low bits
//! of `v`. VIF codes and texture wrap modes are read and built with these.

pub trait BitField: Sized {
    fn bits(self, lo: u32, hi: u32) -> Self;
    fn with_bits(self, lo: u32, hi: u32, v: Self) -> Self;
}

macro_rules! impl_bitfield {
    ($($t:ty),*) => {$(
        impl BitField for $t {
            #[inline]
            fn bits(self, lo: u32, hi: u32) -> $t {
                let width = (::std::mem::size_of::<$t>() * 8) as u32;
                debug_assert!(lo <= hi && hi <= width);
                if hi == lo {
                    return 0;
                }
                (self >> lo) & (!0 >> (width - (hi - lo)))
            }

            #[inline]
            fn with_bits(self, lo: u32, hi: u32, v: $t) -> $t {
                let width = (::std::mem::size_of::<$t>() * 8) as u32;
                debug_assert!(lo < hi && hi <= width);
                let mask: $t = (!0 >> (width - (hi - lo))) << lo;
                (self & !mask) | ((v << lo) & mask)
            }
        }
    )*}
}

impl_bitfield!(u8, u16, u32);

#[test]
fn test_bits() {
    // UNPACK V4-32, 8 elements, to address 0x12 with the USN flag
    let code = 0x6c08_4012u32;
    assert_eq!(code.bits(24, 32), 0x6c);
    assert_eq!(code.bits(16, 24), 8);
    assert_eq!(code.bits(14, 15), 1);
    assert_eq!(code.bits(0, 10), 0x12);
    assert_eq!(code.bits(5, 5), 0);

    let built = 0u32.with_bits(24, 32, 0x6c).with_bits(16, 24, 8).with_bits(14, 15, 1).with_bits(0, 10, 0x12);
    assert_eq!(built, code);
    assert_eq!(0xffu8.with_bits(4, 8, 0x21), 0x1f);
}
