//! Reading little-endian values out of byte slices.

use cgmath::{Vector2, Vector3, Vector4};
use std::marker::PhantomData;

/// Types with a fixed-size little-endian encoding.
pub trait Viewable: Sized {
    fn size() -> usize;
    /// `buf` is exactly `size()` bytes.
    fn view(buf: &[u8]) -> Self;
}

macro_rules! impl_viewable_scalar {
    ($($t:ty: $n:expr),*) => {$(
        impl Viewable for $t {
            fn size() -> usize { $n }
            fn view(buf: &[u8]) -> $t {
                let mut bytes = [0; $n];
                bytes.copy_from_slice(&buf[..$n]);
                <$t>::from_le_bytes(bytes)
            }
        }
    )*}
}

impl_viewable_scalar!(u8: 1, i8: 1, u16: 2, i16: 2, u32: 4, i32: 4, f32: 4);

impl Viewable for Vector2<f32> {
    fn size() -> usize { 8 }
    fn view(buf: &[u8]) -> Vector2<f32> {
        Vector2::new(f32::view(&buf[0..4]), f32::view(&buf[4..8]))
    }
}

impl Viewable for Vector3<f32> {
    fn size() -> usize { 12 }
    fn view(buf: &[u8]) -> Vector3<f32> {
        Vector2::<f32>::view(&buf[0..8]).extend(f32::view(&buf[8..12]))
    }
}

impl Viewable for Vector4<f32> {
    fn size() -> usize { 16 }
    fn view(buf: &[u8]) -> Vector4<f32> {
        Vector3::<f32>::view(&buf[0..12]).extend(f32::view(&buf[12..16]))
    }
}

/// A run of `Viewable` values, decoded as it is iterated.
#[derive(Copy, Clone)]
pub struct View<'a, T> {
    buf: &'a [u8],
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Viewable> View<'a, T> {
    /// `buf` must hold a whole number of elements.
    pub fn from_buf(buf: &'a [u8]) -> View<'a, T> {
        debug_assert!(T::size() == 0 || buf.len() % T::size() == 0);
        View { buf, _marker: PhantomData }
    }

    pub fn len(&self) -> usize {
        self.buf.len() / T::size()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl<'a, T: Viewable> Iterator for View<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.buf.len() < T::size() || self.buf.is_empty() {
            return None;
        }
        let (head, rest) = self.buf.split_at(T::size());
        self.buf = rest;
        Some(T::view(head))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.len();
        (len, Some(len))
    }
}

impl<'a, T: Viewable> ExactSizeIterator for View<'a, T> {}

#[test]
fn test_view_scalars() {
    let buf = [0xfe, 0xff, 0x00, 0x00, 0x80, 0x3f];
    assert_eq!(i16::view(&buf[0..2]), -2);
    assert_eq!(u32::view(&buf[0..4]), 0xfffe);
    assert_eq!(f32::view(&buf[2..6]), 1.0);
    let v: Vec<u16> = View::from_buf(&buf).collect();
    assert_eq!(v, vec![0xfffe, 0, 0x3f80]);
}

#[test]
fn test_view_vectors() {
    let mut buf = vec![];
    for x in &[1.0f32, 2.0, 3.0, 4.0] {
        buf.extend_from_slice(&x.to_le_bytes());
    }
    assert_eq!(Vector4::<f32>::view(&buf), Vector4::new(1.0, 2.0, 3.0, 4.0));
    let v: Vec<Vector2<f32>> = View::from_buf(&buf).collect();
    assert_eq!(v, vec![Vector2::new(1.0, 2.0), Vector2::new(3.0, 4.0)]);
}
