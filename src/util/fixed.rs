//! Q12 fixed point: a signed 16-bit value with 12 fraction bits. Rotation
//! keys store quaternion components this way.

const ONE: f32 = 4096.0;

pub fn q12(x: u16) -> f32 {
    x as i16 as f32 / ONE
}

/// Rounds to the nearest step, saturating at the ends of the range.
pub fn to_q12(x: f32) -> u16 {
    let scaled = (x * ONE).round();
    scaled.max(i16::min_value() as f32).min(i16::max_value() as f32) as i16 as u16
}

#[test]
fn test_q12() {
    assert_eq!(q12(0x1000), 1.0);
    assert_eq!(q12(0xf000), -1.0);
    assert_eq!(q12(0x0800), 0.5);
    assert_eq!(q12(0x8000), -8.0);
    assert_eq!(to_q12(1.0), 0x1000);
    assert_eq!(to_q12(-0.5), 0xf800);
    assert_eq!(to_q12(100.0), 0x7fff);
    assert_eq!(to_q12(-100.0), 0x8000);
    assert_eq!(q12(to_q12(0.25)), 0.25);
}
