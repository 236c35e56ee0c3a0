//! Splitting a source mesh into VIF batches.

use cgmath::{InnerSpace, Matrix4, Vector2, Vector3, Vector4, Zero};
use crate::errors::{unsupported, Result};
use crate::model::mesh::{MeshType7, MeshType7Batch, MeshType7NodeBatch, MeshType8, MeshType8Batch, Triangle};
use crate::partition::influence::Influence;
use crate::partition::{PartitionOptions, SourceMesh};

pub fn transform_point(m: &Matrix4<f32>, p: Vector3<f32>) -> Vector3<f32> {
    (m * p.extend(1.0)).truncate()
}

/// Transforms a direction and renormalizes it. Zero stays zero.
pub fn transform_normal(m: &Matrix4<f32>, n: Vector3<f32>) -> Vector3<f32> {
    let v = (m * n.extend(0.0)).truncate();
    if v.is_zero() { v } else { v.normalize() }
}

fn triangles(mesh: &SourceMesh) -> Result<Vec<Triangle>> {
    let n = mesh.positions.len();
    mesh.triangles.iter().map(|t| {
        if t.iter().any(|&i| i >= n || i > u16::max_value() as usize) {
            return Err(unsupported(format!("triangle {:?} in a mesh of {} vertices", t, n)));
        }
        Ok(Triangle::new(t[0] as u16, t[1] as u16, t[2] as u16))
    }).collect()
}

fn tex_coord(mesh: &SourceMesh, i: usize) -> Vector2<f32> {
    mesh.tex_coords.get(i).cloned().unwrap_or_else(|| Vector2::new(0.0, 0.0))
}

fn normal(mesh: &SourceMesh, i: usize) -> Vector3<f32> {
    mesh.normals.get(i).cloned().unwrap_or_else(Vector3::zero)
}

/// Vertex ranges of at most `max` vertices, in order.
fn batch_ranges(count: usize, max: usize) -> Result<Vec<::std::ops::Range<usize>>> {
    if max == 0 {
        return Err(unsupported("batches of 0 vertices"));
    }
    Ok((0..count).step_by(max).map(|start| start..(start + max).min(count)).collect())
}

/// Builds a weighted mesh. `inverse_world` maps each node index to the
/// inverse of its world transform; positions and normals are stored in the
/// space of each influencing node, with the node's weight in the position's
/// w. Every batch holds an entry for every used node at every vertex.
pub fn partition_weighted(
    mesh: &SourceMesh,
    influence: &Influence,
    inverse_world: &[Option<Matrix4<f32>>],
    material: i16,
    options: &PartitionOptions,
) -> Result<MeshType7> {
    let used = &influence.used_nodes;
    if used.len() < 2 || used.len() > options.max_batch_nodes {
        return Err(unsupported(format!(
            "weighted mesh with {} nodes (budget {})", used.len(), options.max_batch_nodes,
        )));
    }
    if influence.weights.len() != mesh.positions.len() {
        return Err(unsupported("weights do not cover every vertex"));
    }

    let mut node_inverses = Vec::with_capacity(used.len());
    for &node in used {
        if node > i16::max_value() as usize {
            return Err(unsupported(format!("node index {}", node)));
        }
        match inverse_world.get(node) {
            Some(&Some(m)) => node_inverses.push(m),
            Some(&None) => return Err(unsupported(format!("node {} has a singular transform", node))),
            None => return Err(unsupported(format!("mesh is weighted to missing node {}", node))),
        }
    }

    let mut batches = vec![];
    for range in batch_ranges(mesh.positions.len(), options.max_batch_vertices)? {
        let node_batches = used.iter().zip(&node_inverses).map(|(&node, inv)| {
            let mut nb = MeshType7NodeBatch {
                node_index: node as i16,
                positions: Vec::with_capacity(range.len()),
                normals: Vec::with_capacity(range.len()),
            };
            for v in range.clone() {
                let weight = influence.weight(v, node);
                if weight == 0.0 {
                    nb.positions.push(Vector4::zero());
                    nb.normals.push(Vector3::zero());
                } else {
                    nb.positions.push(transform_point(inv, mesh.positions[v]).extend(weight));
                    nb.normals.push(transform_normal(inv, normal(mesh, v)));
                }
            }
            nb
        }).collect();
        let tex_coords = range.map(|v| tex_coord(mesh, v)).collect();
        batches.push(MeshType7Batch { node_batches, tex_coords });
    }

    Ok(MeshType7 {
        material,
        triangles: triangles(mesh)?,
        batches,
        ..Default::default()
    })
}

/// Builds an unweighted mesh in the space `inverse` maps into.
pub fn partition_unweighted(
    mesh: &SourceMesh,
    inverse: &Matrix4<f32>,
    material: i16,
    options: &PartitionOptions,
) -> Result<MeshType8> {
    let batches = batch_ranges(mesh.positions.len(), options.max_batch_vertices)?
        .into_iter()
        .map(|range| MeshType8Batch {
            positions: range.clone().map(|v| transform_point(inverse, mesh.positions[v])).collect(),
            normals: range.clone().map(|v| transform_normal(inverse, normal(mesh, v))).collect(),
            tex_coords: range.map(|v| tex_coord(mesh, v)).collect(),
        })
        .collect();

    Ok(MeshType8 {
        material,
        triangles: triangles(mesh)?,
        batches,
        ..Default::default()
    })
}

#[cfg(test)]
use crate::partition::influence::reduce_node_influences;
#[cfg(test)]
use cgmath::SquareMatrix;

#[cfg(test)]
fn strip(n: usize, weights: Vec<Vec<(usize, f32)>>) -> SourceMesh {
    SourceMesh {
        node_index: 0,
        material: 0,
        positions: (0..n).map(|i| Vector3::new(i as f32, 0.0, 0.0)).collect(),
        normals: vec![Vector3::new(0.0, 0.0, 2.0); n],
        tex_coords: vec![],
        weights,
        triangles: (0..n.saturating_sub(2)).map(|i| [i, i + 1, i + 2]).collect(),
    }
}

#[test]
fn test_thirty_vertices_make_two_batches() {
    let weights = (0..30)
        .map(|i| if i % 2 == 0 { vec![(0, 1.0)] } else { vec![(0, 0.5), (1, 0.5)] })
        .collect();
    let mesh = strip(30, weights);
    let inf = reduce_node_influences(&mesh.weights, 4);
    let ident = Some(Matrix4::identity());
    let shifted = Some(Matrix4::from_translation(Vector3::new(0.0, -1.0, 0.0)));
    let m = partition_weighted(&mesh, &inf, &[ident, shifted], 3, &PartitionOptions::default()).unwrap();

    assert_eq!(m.material, 3);
    assert_eq!(m.batches.len(), 2);
    assert_eq!(m.batches[0].vertex_count(), 24);
    assert_eq!(m.batches[1].vertex_count(), 6);
    assert_eq!(m.used_nodes(), vec![0, 1]);
    assert_eq!(m.triangles.len(), 28);
    for b in &m.batches {
        assert_eq!(b.node_batches.len(), 2);
        for nb in &b.node_batches {
            assert_eq!(nb.positions.len(), b.vertex_count());
            assert_eq!(nb.normals.len(), b.vertex_count());
        }
    }
    // node 1 does not influence even vertices
    let nb1 = &m.batches[0].node_batches[1];
    assert_eq!(nb1.positions[0], Vector4::zero());
    assert_eq!(nb1.positions[1], Vector4::new(1.0, -1.0, 0.0, 0.5));
    assert_eq!(m.batches[0].node_batches[0].normals[0], Vector3::new(0.0, 0.0, 1.0));
}

#[test]
fn test_weighted_needs_two_nodes() {
    let mesh = strip(3, vec![vec![(0, 1.0)]; 3]);
    let inf = reduce_node_influences(&mesh.weights, 4);
    let ident = Some(Matrix4::identity());
    assert!(partition_weighted(&mesh, &inf, &[ident], 0, &PartitionOptions::default()).is_err());
}

#[test]
fn test_unweighted() {
    let mesh = strip(25, vec![]);
    let inv = Matrix4::from_translation(Vector3::new(-1.0, 0.0, 0.0));
    let m = partition_unweighted(&mesh, &inv, 1, &PartitionOptions::default()).unwrap();
    assert_eq!(m.batches.len(), 2);
    assert_eq!(m.batches[1].positions, vec![Vector3::new(23.0, 0.0, 0.0)]);
    assert_eq!(m.batches[0].tex_coords.len(), 24);
}

#[test]
fn test_bad_triangle() {
    let mut mesh = strip(3, vec![]);
    mesh.triangles.push([0, 1, 3]);
    let inv = Matrix4::identity();
    assert!(partition_unweighted(&mesh, &inv, 0, &PartitionOptions::default()).is_err());
}
