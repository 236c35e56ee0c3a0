//! More-or-less general-purpose utility functions.

pub mod bits;
pub mod cur;
#[macro_use]
pub mod fields;
pub mod fixed;
pub mod view;

/// Rounds `x` up to a multiple of `alignment`. An alignment of 0 or 1
/// leaves `x` unchanged.
pub fn align_up(x: usize, alignment: usize) -> usize {
    if alignment <= 1 {
        return x;
    }
    (x + alignment - 1) / alignment * alignment
}

#[test]
fn test_align_up() {
    assert_eq!(align_up(0, 16), 0);
    assert_eq!(align_up(1, 16), 16);
    assert_eq!(align_up(16, 16), 16);
    assert_eq!(align_up(17, 64), 64);
    assert_eq!(align_up(5, 0), 5);
}
