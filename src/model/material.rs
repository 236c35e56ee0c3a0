use crate::errors::{ErrorKind, Result};
use crate::io::writer::Writer;
use crate::model::Color;
use crate::util::cur::Cur;

bitflags! {
    /// Which optional fields follow the material header. Fields are stored
    /// in ascending bit order.
    pub struct MaterialFlags: u32 {
        const COLOR1 = 1 << 16;
        const COLOR2 = 1 << 17;
        const TEXTURE_ID = 1 << 18;
        const FLOAT_ARRAY1 = 1 << 19;
        const COLOR3 = 1 << 20;
        const OVERLAY_TEXTURE_IDS = 1 << 21;
        const FLOAT_ARRAY2 = 1 << 22;
        const COLOR4 = 1 << 23;
        const COLOR5 = 1 << 24;
        const FLOAT1 = 1 << 25;
        const FLOAT_ARRAY3 = 1 << 26;
    }
}

/// Surface material. The flag word is not stored; it is computed from which
/// fields are present.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Material {
    pub color1: Option<Color>,
    pub color2: Option<Color>,
    pub texture_id: Option<i32>,
    pub float_array1: Option<[f32; 5]>,
    pub color3: Option<Color>,
    /// Overlay mask texture and overlay texture.
    pub overlay_texture_ids: Option<[i16; 2]>,
    pub float_array2: Option<[f32; 5]>,
    pub color4: Option<Color>,
    pub color5: Option<Color>,
    pub float1: Option<f32>,
    pub float_array3: Option<[f32; 2]>,
}

impl Material {
    /// The material imported meshes get.
    pub fn with_texture(texture_id: i32) -> Material {
        Material {
            color3: Some(Color::new(0xd1, 0xfe, 0x01, 0x80)),
            float_array3: Some([0.0, 0.01]),
            texture_id: Some(texture_id),
            ..Default::default()
        }
    }

    pub fn with_overlay(texture_id: i32, overlay_mask_texture_id: i16, overlay_texture_id: i16) -> Material {
        Material {
            overlay_texture_ids: Some([overlay_mask_texture_id, overlay_texture_id]),
            ..Material::with_texture(texture_id)
        }
    }

    pub fn flags(&self) -> MaterialFlags {
        let mut flags = MaterialFlags::empty();
        flags.set(MaterialFlags::COLOR1, self.color1.is_some());
        flags.set(MaterialFlags::COLOR2, self.color2.is_some());
        flags.set(MaterialFlags::TEXTURE_ID, self.texture_id.is_some());
        flags.set(MaterialFlags::FLOAT_ARRAY1, self.float_array1.is_some());
        flags.set(MaterialFlags::COLOR3, self.color3.is_some());
        flags.set(MaterialFlags::OVERLAY_TEXTURE_IDS, self.overlay_texture_ids.is_some());
        flags.set(MaterialFlags::FLOAT_ARRAY2, self.float_array2.is_some());
        flags.set(MaterialFlags::COLOR4, self.color4.is_some());
        flags.set(MaterialFlags::COLOR5, self.color5.is_some());
        flags.set(MaterialFlags::FLOAT1, self.float1.is_some());
        flags.set(MaterialFlags::FLOAT_ARRAY3, self.float_array3.is_some());
        flags
    }

    pub fn read(cur: &mut Cur) -> Result<Material> {
        fields!(cur, material {
            index: i32,
            flags: u32,
        });
        let flags = match MaterialFlags::from_bits(flags) {
            Some(flags) => flags,
            None => bail!(ErrorKind::UnknownFlag("material", flags & !MaterialFlags::all().bits())),
        };

        let mut mat = Material::default();
        if flags.contains(MaterialFlags::COLOR1) {
            mat.color1 = Some(cur.next::<Color>()?);
        }
        if flags.contains(MaterialFlags::COLOR2) {
            mat.color2 = Some(cur.next::<Color>()?);
        }
        if flags.contains(MaterialFlags::TEXTURE_ID) {
            mat.texture_id = Some(cur.next::<i32>()?);
        }
        if flags.contains(MaterialFlags::FLOAT_ARRAY1) {
            mat.float_array1 = Some(read_f32s5(cur)?);
        }
        if flags.contains(MaterialFlags::COLOR3) {
            mat.color3 = Some(cur.next::<Color>()?);
        }
        if flags.contains(MaterialFlags::OVERLAY_TEXTURE_IDS) {
            mat.overlay_texture_ids = Some([cur.next::<i16>()?, cur.next::<i16>()?]);
        }
        if flags.contains(MaterialFlags::FLOAT_ARRAY2) {
            mat.float_array2 = Some(read_f32s5(cur)?);
        }
        if flags.contains(MaterialFlags::COLOR4) {
            mat.color4 = Some(cur.next::<Color>()?);
        }
        if flags.contains(MaterialFlags::COLOR5) {
            mat.color5 = Some(cur.next::<Color>()?);
        }
        if flags.contains(MaterialFlags::FLOAT1) {
            mat.float1 = Some(cur.next::<f32>()?);
        }
        if flags.contains(MaterialFlags::FLOAT_ARRAY3) {
            mat.float_array3 = Some([cur.next::<f32>()?, cur.next::<f32>()?]);
        }
        debug_assert_eq!(mat.flags(), flags);
        Ok(mat)
    }

    /// Writes the material as entry `index` of the material list.
    pub fn write(&self, w: &mut Writer, index: usize) {
        w.put(index as i32);
        w.put(self.flags().bits());
        if let Some(c) = self.color1 { w.put(c); }
        if let Some(c) = self.color2 { w.put(c); }
        if let Some(id) = self.texture_id { w.put(id); }
        if let Some(ref xs) = self.float_array1 { w.put_all(xs); }
        if let Some(c) = self.color3 { w.put(c); }
        if let Some(ref ids) = self.overlay_texture_ids { w.put_all(ids); }
        if let Some(ref xs) = self.float_array2 { w.put_all(xs); }
        if let Some(c) = self.color4 { w.put(c); }
        if let Some(c) = self.color5 { w.put(c); }
        if let Some(x) = self.float1 { w.put(x); }
        if let Some(ref xs) = self.float_array3 { w.put_all(xs); }
    }
}

fn read_f32s5(cur: &mut Cur) -> Result<[f32; 5]> {
    let mut xs = [0.0; 5];
    for x in xs.iter_mut() {
        *x = cur.next::<f32>()?;
    }
    Ok(xs)
}

#[test]
fn test_flags_follow_fields() {
    let mut mat = Material::with_texture(3);
    assert_eq!(mat.flags(),
        MaterialFlags::COLOR3 | MaterialFlags::FLOAT_ARRAY3 | MaterialFlags::TEXTURE_ID);
    mat.texture_id = None;
    assert_eq!(mat.flags(), MaterialFlags::COLOR3 | MaterialFlags::FLOAT_ARRAY3);
}

#[test]
fn test_round_trip() {
    let mat = Material {
        color1: Some(Color::new(1, 2, 3, 4)),
        float_array1: Some([1.0, 2.0, 3.0, 4.0, 5.0]),
        float1: Some(0.5),
        ..Material::with_overlay(7, 8, 9)
    };
    let mut w = Writer::new();
    mat.write(&mut w, 5);
    let bytes = w.into_bytes();
    // index, flags, 4 colors/ids of 4 bytes, 20 + 4 + 8 bytes of floats
    assert_eq!(bytes.len(), 8 + 4 * 4 + 20 + 4 + 8);
    assert_eq!(&bytes[0..4], &[5, 0, 0, 0]);

    let mut cur = Cur::new(&bytes);
    assert_eq!(Material::read(&mut cur).unwrap(), mat);
    assert_eq!(cur.pos(), bytes.len());
}

#[test]
fn test_unknown_flag() {
    let buf = [0, 0, 0, 0, 0x01, 0x00, 0x01, 0x00, 0, 0, 0, 0];
    let mut cur = Cur::new(&buf);
    match *Material::read(&mut cur).unwrap_err().kind() {
        ErrorKind::UnknownFlag("material", 1) => (),
        ref k => panic!("unexpected error {:?}", k),
    }
}
