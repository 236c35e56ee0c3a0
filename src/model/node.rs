use cgmath::{Matrix4, Rad, Vector3};
use crate::errors::{malformed, unsupported, Result};
use crate::io::writer::Writer;
use crate::model::geometry::{Geometry, MeshList};
use crate::util::cur::Cur;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BoundingBox {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl BoundingBox {
    /// Smallest box containing every point, or `None` for no points.
    pub fn from_points<I>(points: I) -> Option<BoundingBox>
    where I: IntoIterator<Item = Vector3<f32>>
    {
        let mut it = points.into_iter();
        let first = it.next()?;
        let mut bb = BoundingBox { min: first, max: first };
        for p in it {
            bb.min.x = bb.min.x.min(p.x);
            bb.min.y = bb.min.y.min(p.y);
            bb.min.z = bb.min.z.min(p.z);
            bb.max.x = bb.max.x.max(p.x);
            bb.max.y = bb.max.y.max(p.y);
            bb.max.z = bb.max.z.max(p.z);
        }
        Some(bb)
    }

    pub fn read(cur: &mut Cur) -> Result<BoundingBox> {
        let min = cur.next::<Vector3<f32>>()?;
        let max = cur.next::<Vector3<f32>>()?;
        Ok(BoundingBox { min, max })
    }

    pub fn write(&self, w: &mut Writer) {
        w.put(self.min);
        w.put(self.max);
    }
}

/// Node of the model's hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Usually 1.
    pub field00: i32,
    pub name: Option<String>,
    /// Index of the parent node. Parents precede their children.
    pub parent: Option<usize>,
    /// Euler angles in radians, applied X then Y then Z.
    pub rotation: Vector3<f32>,
    pub position: Vector3<f32>,
    pub scale: Vector3<f32>,
    pub bounding_box: Option<BoundingBox>,
    pub geometry: Option<Geometry>,
    /// Mesh list found in place of the geometry in a few old models.
    pub deprecated_mesh_list: Option<MeshList>,
    pub deprecated_mesh_list2: Option<MeshList>,
}

impl Default for Node {
    fn default() -> Node {
        Node {
            field00: 1,
            name: None,
            parent: None,
            rotation: Vector3::new(0.0, 0.0, 0.0),
            position: Vector3::new(0.0, 0.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
            bounding_box: None,
            geometry: None,
            deprecated_mesh_list: None,
            deprecated_mesh_list2: None,
        }
    }
}

impl Node {
    pub fn local_transform(&self) -> Matrix4<f32> {
        let r = self.rotation;
        Matrix4::from_translation(self.position) *
            Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z) *
            Matrix4::from_angle_z(Rad(r.z)) *
            Matrix4::from_angle_y(Rad(r.y)) *
            Matrix4::from_angle_x(Rad(r.x))
    }

    /// Reads a node. `nodes` are the nodes read so far; the parent must be
    /// one of them.
    pub fn read(cur: &mut Cur, nodes: &[Node]) -> Result<Node> {
        let field00 = cur.next::<i32>()?;
        cur.expect(0i32, "node.field04")?;
        fields!(cur, node {
            index: i32,
            parent: i32,
        });
        if index as usize != nodes.len() {
            debug!("node {} stored with index {}", nodes.len(), index);
        }
        let parent = match parent {
            -1 => None,
            p if p >= 0 && (p as usize) < nodes.len() => Some(p as usize),
            p => return Err(malformed(format!(
                "node {} has parent {} which has not been read", nodes.len(), p,
            ))),
        };
        let rotation = cur.next::<Vector3<f32>>()?;
        cur.expect(0.0f32, "node.rotation.w")?;
        let position = cur.next::<Vector3<f32>>()?;
        cur.expect(1.0f32, "node.position.w")?;
        let scale = cur.next::<Vector3<f32>>()?;
        cur.expect(0.0f32, "node.scale.w")?;

        let bounding_box = cur.read_offset(BoundingBox::read)?;
        let geometry_offset = cur.next::<u32>()?;
        let (geometry, deprecated_mesh_list) = if bounding_box.is_some() {
            (cur.read_at(geometry_offset, Geometry::read)?, None)
        } else {
            (None, cur.read_at(geometry_offset, MeshList::read)?)
        };
        cur.expect(0i32, "node.field48")?;
        let deprecated_mesh_list2 = cur.read_offset(MeshList::read)?;

        Ok(Node {
            field00,
            name: None,
            parent,
            rotation,
            position,
            scale,
            bounding_box,
            geometry,
            deprecated_mesh_list,
            deprecated_mesh_list2,
        })
    }

    /// Writes the node as entry `index` of the node list.
    pub fn write<'a>(&'a self, w: &mut Writer<'a>, index: usize) -> Result<()> {
        if self.geometry.is_some() && self.bounding_box.is_none() {
            return Err(unsupported(format!("node {} has geometry but no bounding box", index)));
        }
        if self.parent.map(|p| p >= index).unwrap_or(false) {
            return Err(unsupported(format!("node {} comes before its parent", index)));
        }

        w.put(self.field00);
        w.put(0i32);
        w.put(index as i32);
        w.put(self.parent.map(|p| p as i32).unwrap_or(-1));
        w.put(self.rotation);
        w.put(0.0f32);
        w.put(self.position);
        w.put(1.0f32);
        w.put(self.scale);
        w.put(0.0f32);

        w.schedule_offset_if(self.bounding_box.as_ref(), 16, |w, bb| {
            bb.write(w);
            Ok(())
        });
        if let Some(ref geometry) = self.geometry {
            w.schedule_offset(16, move |w| geometry.write(w));
        } else if let Some(ref list) = self.deprecated_mesh_list {
            w.schedule_offset(16, move |w| list.write(w));
        } else {
            w.put(0u32);
        }
        w.put(0i32);
        w.schedule_offset_if(self.deprecated_mesh_list2.as_ref(), 16, |w, list| list.write(w));
        Ok(())
    }
}

#[cfg(test)]
use cgmath::Vector4;

#[test]
fn test_local_transform_order() {
    let node = Node {
        rotation: Vector3::new(0.0, 0.0, ::std::f32::consts::FRAC_PI_2),
        position: Vector3::new(10.0, 0.0, 0.0),
        scale: Vector3::new(2.0, 2.0, 2.0),
        ..Default::default()
    };
    // rotate (1,0,0) to (0,1,0), scale to (0,2,0), then translate
    let p = node.local_transform() * Vector4::new(1.0, 0.0, 0.0, 1.0);
    assert!((p.x - 10.0).abs() < 1e-5);
    assert!((p.y - 2.0).abs() < 1e-5);
    assert!(p.z.abs() < 1e-5);
}

#[test]
fn test_parent_must_precede() {
    let mut w = Writer::new();
    w.put(1i32);
    w.put(0i32);
    w.put(0i32);
    w.put(3i32);
    let bytes = w.into_bytes();
    let mut cur = Cur::new(&bytes);
    assert!(Node::read(&mut cur, &[]).is_err());

    let node = Node { parent: Some(0), ..Default::default() };
    assert!(node.write(&mut Writer::new(), 0).is_err());
}

#[test]
fn test_bounding_box() {
    let bb = BoundingBox::from_points(vec![
        Vector3::new(1.0, -1.0, 0.0),
        Vector3::new(-2.0, 3.0, 0.5),
    ]).unwrap();
    assert_eq!(bb.min, Vector3::new(-2.0, -1.0, 0.0));
    assert_eq!(bb.max, Vector3::new(1.0, 3.0, 0.5));
    assert!(BoundingBox::from_points(Vec::new()).is_none());
}
