//! Relocation table codec.
//!
//! The table lists the position of every offset slot in a resource, as a
//! sequence of deltas from the previous slot (the first one from the base).
//! Deltas are always even. Each entry is one of:
//!
//! | low bits | size | meaning |
//! |---|---|---|
//! | `xxxxxxx0` | 1 | delta `b` (up to 0xfe) |
//! | `xxxxxx01` | 2 | delta `(v >> 2) << 1` (up to 0x7ffe) |
//! | `xxxxx011` | 4 | delta `(v >> 3) << 1` |
//! | `nnnnn111` | 1 | `n + 2` slots, each 4 past the previous |
//!
//! The table is not terminated; its length is stored next to its offset.

use crate::errors::{ErrorKind, Result};

const MAX_RUN: usize = 33;

pub fn encode(slots: &[usize], base: usize) -> Result<Vec<u8>> {
    let mut deltas = Vec::with_capacity(slots.len());
    let mut prev = base;
    for (i, &slot) in slots.iter().enumerate() {
        if slot < prev || (i != 0 && slot == prev) {
            bail!("relocation slots must be increasing and past the base ({:#x} after {:#x})",
                slot, prev);
        }
        let delta = slot - prev;
        if delta % 2 != 0 {
            bail!("relocation slot {:#x} is not 2-aligned relative to {:#x}", slot, prev);
        }
        deltas.push(delta);
        prev = slot;
    }

    let mut out = vec![];
    let mut i = 0;
    while i < deltas.len() {
        let run = deltas[i..].iter().take(MAX_RUN).take_while(|&&d| d == 4).count();
        if run >= 2 {
            out.push((((run - 2) << 3) | 7) as u8);
            i += run;
            continue;
        }

        let d = deltas[i];
        if d <= 0xfe {
            out.push(d as u8);
        } else if d <= 0x7ffe {
            let v = (((d >> 1) << 2) | 1) as u16;
            out.extend_from_slice(&v.to_le_bytes());
        } else if d < (1 << 30) {
            let v = (((d >> 1) << 3) | 3) as u32;
            out.extend_from_slice(&v.to_le_bytes());
        } else {
            bail!("relocation delta {:#x} is too large", d);
        }
        i += 1;
    }
    Ok(out)
}

pub fn decode(bytes: &[u8], base: usize) -> Result<Vec<usize>> {
    let truncated = || ErrorKind::MalformedStream("truncated relocation table".into());

    let mut slots = vec![];
    let mut prev = base;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 1 == 0 {
            prev += b as usize;
            slots.push(prev);
            i += 1;
        } else if b & 3 == 1 {
            if i + 2 > bytes.len() {
                bail!(truncated());
            }
            let v = u16::from_le_bytes([bytes[i], bytes[i + 1]]) as usize;
            prev += (v >> 2) << 1;
            slots.push(prev);
            i += 2;
        } else if b & 7 == 3 {
            if i + 4 > bytes.len() {
                bail!(truncated());
            }
            let v = u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
            prev += ((v >> 3) as usize) << 1;
            slots.push(prev);
            i += 4;
        } else {
            let n = (b >> 3) as usize + 2;
            for _ in 0..n {
                prev += 4;
                slots.push(prev);
            }
            i += 1;
        }
    }
    Ok(slots)
}

#[test]
fn test_small_table() {
    let slots = [0x14, 0x18, 0x1c, 0x20, 0x40, 0x240];
    let bytes = encode(&slots, 0x10).unwrap();
    // run of 4 from the base, 0x20, then 0x200 as a u16
    assert_eq!(bytes, vec![(2 << 3) | 7, 0x20, 0x01, 0x04]);
    assert_eq!(decode(&bytes, 0x10).unwrap(), slots.to_vec());
}

#[test]
fn test_roundtrip_mixed() {
    let mut slots = vec![];
    let mut pos = 0x40;
    for i in 0..200usize {
        pos += match i % 7 {
            0 | 1 | 2 => 4,
            3 => 0x10,
            4 => 0x1000,
            5 => 0x12_3456,
            _ => 8,
        };
        slots.push(pos);
    }
    let bytes = encode(&slots, 0x40).unwrap();
    assert_eq!(decode(&bytes, 0x40).unwrap(), slots);
}

#[test]
fn test_long_run_splits() {
    let slots: Vec<usize> = (1..=70).map(|i| i * 4).collect();
    let bytes = encode(&slots, 0).unwrap();
    assert_eq!(bytes.len(), 3);
    assert_eq!(decode(&bytes, 0).unwrap(), slots);
}

#[test]
fn test_rejects_bad_slots() {
    assert!(encode(&[0x13], 0x10).is_err());
    assert!(encode(&[0x20, 0x18], 0).is_err());
    assert!(encode(&[0x08], 0x10).is_err());
    assert!(decode(&[0x01], 0).is_err());
}
