//! Converting externally authored meshes into model geometry.
//!
//! Source meshes come with world-space vertices and any number of node
//! influences per vertex. Weighted meshes are reduced to a node budget and
//! split into type 7 batches; meshes with at most one influencing node
//! become type 8 meshes in the space of the node they are attached to.

pub mod batch;
pub mod influence;

pub use self::batch::{partition_unweighted, partition_weighted};
pub use self::influence::{reduce_node_influences, Influence};

use cgmath::{Matrix4, SquareMatrix, Vector2, Vector3};
use crate::errors::{unsupported, Result};
use crate::model::mesh::Mesh;
use crate::model::{BoundingBox, Geometry, Material, MeshList, Model};
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_BATCH_VERTICES: usize = 24;
pub const DEFAULT_MAX_BATCH_NODES: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct PartitionOptions {
    /// Directory relative texture paths are resolved against.
    pub texture_base_dir: Option<PathBuf>,
    pub max_batch_vertices: usize,
    pub max_batch_nodes: usize,
    /// Give materials with overlay textures the overlay fields.
    pub overlays: bool,
}

impl Default for PartitionOptions {
    fn default() -> PartitionOptions {
        PartitionOptions {
            texture_base_dir: None,
            max_batch_vertices: DEFAULT_MAX_BATCH_VERTICES,
            max_batch_nodes: DEFAULT_MAX_BATCH_NODES,
            overlays: false,
        }
    }
}

impl PartitionOptions {
    pub fn texture_base_dir<P: Into<PathBuf>>(mut self, dir: P) -> PartitionOptions {
        self.texture_base_dir = Some(dir.into());
        self
    }

    pub fn max_batch_vertices(mut self, n: usize) -> PartitionOptions {
        self.max_batch_vertices = n;
        self
    }

    pub fn max_batch_nodes(mut self, n: usize) -> PartitionOptions {
        self.max_batch_nodes = n;
        self
    }

    pub fn overlays(mut self, on: bool) -> PartitionOptions {
        self.overlays = on;
        self
    }

    fn resolve_texture(&self, path: &Path) -> PathBuf {
        match self.texture_base_dir {
            Some(ref dir) if !path.is_absolute() && !path.exists() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceMaterial {
    pub texture: Option<PathBuf>,
    /// Overlay mask and overlay texture.
    pub overlay: Option<(PathBuf, PathBuf)>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceMesh {
    /// Node the mesh is attached to.
    pub node_index: usize,
    /// Index into the scene's materials.
    pub material: usize,
    /// World-space positions.
    pub positions: Vec<Vector3<f32>>,
    /// World-space normals; empty or one per vertex.
    pub normals: Vec<Vector3<f32>>,
    /// Empty or one per vertex.
    pub tex_coords: Vec<Vector2<f32>>,
    /// Empty or one (node, weight) list per vertex.
    pub weights: Vec<Vec<(usize, f32)>>,
    pub triangles: Vec<[usize; 3]>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceScene {
    pub materials: Vec<SourceMaterial>,
    pub meshes: Vec<SourceMesh>,
}

/// Textures referenced by the new materials, indexed by texture id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextureTable {
    pub paths: Vec<PathBuf>,
}

impl TextureTable {
    fn id(&mut self, path: PathBuf) -> usize {
        match self.paths.iter().position(|p| *p == path) {
            Some(id) => id,
            None => {
                self.paths.push(path);
                self.paths.len() - 1
            }
        }
    }
}

fn check_mesh(mesh: &SourceMesh, i: usize) -> Result<()> {
    let n = mesh.positions.len();
    for &(what, len) in &[
        ("normals", mesh.normals.len()),
        ("texture coordinates", mesh.tex_coords.len()),
        ("weights", mesh.weights.len()),
    ] {
        if len != 0 && len != n {
            return Err(unsupported(format!("mesh {} has {} {} for {} vertices", i, len, what, n)));
        }
    }
    Ok(())
}

fn make_material(
    source: &SourceMaterial,
    textures: &mut TextureTable,
    options: &PartitionOptions,
) -> Result<Material> {
    let texture_path = match source.texture {
        Some(ref path) => path,
        None => return Ok(Material { texture_id: None, ..Material::with_texture(0) }),
    };
    let texture_id = textures.id(options.resolve_texture(texture_path));
    let overlay = match source.overlay {
        Some((ref mask, ref overlay)) if options.overlays => Some((
            textures.id(options.resolve_texture(mask)),
            textures.id(options.resolve_texture(overlay)),
        )),
        _ => None,
    };
    let id16 = |id: usize| -> Result<i16> {
        if id > i16::max_value() as usize {
            return Err(unsupported(format!("texture id {}", id)));
        }
        Ok(id as i16)
    };
    Ok(match overlay {
        Some((mask, ovl)) => Material::with_overlay(texture_id as i32, id16(mask)?, id16(ovl)?),
        None => Material::with_texture(texture_id as i32),
    })
}

/// Replaces the materials and geometry of `model` with the contents of
/// `scene`. Returns the textures the new materials refer to.
///
/// Every node loses its geometry and bounding box. Each source mesh is added
/// to the opaque list of its node, or of the one node it is weighted to when
/// there is exactly one, and nodes that received meshes get a
/// bounding box around the meshes' node-space positions.
pub fn replace_mesh_data(
    model: &mut Model,
    scene: &SourceScene,
    options: &PartitionOptions,
) -> Result<TextureTable> {
    if scene.materials.len() > i16::max_value() as usize {
        return Err(unsupported(format!("{} materials", scene.materials.len())));
    }
    for (i, mesh) in scene.meshes.iter().enumerate() {
        check_mesh(mesh, i)?;
        if mesh.node_index >= model.nodes.len() {
            return Err(unsupported(format!(
                "mesh {} is attached to node {} of {}", i, mesh.node_index, model.nodes.len(),
            )));
        }
        if mesh.material >= scene.materials.len() {
            return Err(unsupported(format!("mesh {} uses missing material {}", i, mesh.material)));
        }
    }

    let inverse_world: Vec<Option<Matrix4<f32>>> = model.world_transforms().iter()
        .map(|m| m.invert())
        .collect();

    let mut textures = TextureTable::default();
    let materials = scene.materials.iter()
        .map(|m| make_material(m, &mut textures, options))
        .collect::<Result<Vec<_>>>()?;

    let mut meshes: Vec<Vec<Mesh>> = vec![vec![]; model.nodes.len()];
    let mut local_positions: Vec<Vec<Vector3<f32>>> = vec![vec![]; model.nodes.len()];
    for (i, source) in scene.meshes.iter().enumerate() {
        let influence = reduce_node_influences(&source.weights, options.max_batch_nodes);

        // a mesh skinned to a single node lives in that node's space
        let node = match influence.used_nodes[..] {
            [only] => only,
            _ => source.node_index,
        };
        let inverse = match inverse_world.get(node) {
            Some(&Some(m)) => m,
            Some(&None) => return Err(unsupported(format!("node {} has a singular transform", node))),
            None => return Err(unsupported(format!(
                "mesh {} is weighted to node {} of {}", i, node, model.nodes.len(),
            ))),
        };
        let material = source.material as i16;

        let mesh = if influence.used_nodes.len() >= 2 {
            debug!("mesh {}: {} vertices weighted to nodes {:?}",
                i, source.positions.len(), influence.used_nodes);
            Mesh::Type7(partition_weighted(source, &influence, &inverse_world, material, options)?)
        } else {
            debug!("mesh {}: {} unweighted vertices", i, source.positions.len());
            Mesh::Type8(partition_unweighted(source, &inverse, material, options)?)
        };

        local_positions[node].extend(source.positions.iter().map(|&p| batch::transform_point(&inverse, p)));
        meshes[node].push(mesh);
    }

    model.materials = materials;
    for ((node, meshes), positions) in model.nodes.iter_mut().zip(meshes).zip(local_positions) {
        node.bounding_box = None;
        node.geometry = None;
        if meshes.is_empty() {
            continue;
        }
        node.bounding_box = BoundingBox::from_points(positions);
        if node.bounding_box.is_none() {
            // meshes without vertices
            node.bounding_box = Some(BoundingBox {
                min: Vector3::new(0.0, 0.0, 0.0),
                max: Vector3::new(0.0, 0.0, 0.0),
            });
        }
        node.geometry = Some(Geometry {
            mesh_lists: vec![MeshList { field02: 0, meshes }],
        });
    }
    Ok(textures)
}

#[cfg(test)]
use crate::io::resource::{read_resource, write_resource};
#[cfg(test)]
use crate::io::writer::Writer;
#[cfg(test)]
use crate::model::{MaterialFlags, Node};
#[cfg(test)]
use crate::util::cur::Cur;

#[cfg(test)]
fn skeleton() -> Model {
    Model {
        nodes: vec![
            Node::default(),
            Node { parent: Some(0), position: Vector3::new(0.0, 1.0, 0.0), ..Default::default() },
            Node { parent: Some(1), position: Vector3::new(0.0, 1.0, 0.0), ..Default::default() },
        ],
        materials: vec![Material::default()],
        extensions: vec![],
    }
}

#[cfg(test)]
fn quad(node_index: usize, weights: Vec<Vec<(usize, f32)>>) -> SourceMesh {
    SourceMesh {
        node_index,
        material: 0,
        positions: vec![
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(1.0, 2.0, 0.0),
            Vector3::new(0.0, 2.0, 0.0),
        ],
        normals: vec![Vector3::new(0.0, 0.0, 1.0); 4],
        tex_coords: vec![Vector2::new(0.5, 0.5); 4],
        weights,
        triangles: vec![[0, 1, 2], [0, 2, 3]],
    }
}

#[test]
fn test_replace_mesh_data() {
    let mut model = skeleton();
    model.nodes[2].bounding_box = Some(BoundingBox {
        min: Vector3::new(0.0, 0.0, 0.0),
        max: Vector3::new(1.0, 1.0, 1.0),
    });
    let scene = SourceScene {
        materials: vec![
            SourceMaterial {
                texture: Some(PathBuf::from("body.png")),
                overlay: Some((PathBuf::from("mask.png"), PathBuf::from("ovl.png"))),
            },
            SourceMaterial::default(),
        ],
        meshes: vec![
            quad(1, vec![vec![(1, 1.0)], vec![(1, 0.5), (2, 0.5)], vec![(2, 1.0)], vec![(1, 1.0)]]),
            SourceMesh { material: 1, ..quad(1, vec![]) },
        ],
    };
    let options = PartitionOptions::default()
        .texture_base_dir("/nonexistent/textures")
        .overlays(true);
    let textures = replace_mesh_data(&mut model, &scene, &options).unwrap();

    assert_eq!(textures.paths, vec![
        PathBuf::from("/nonexistent/textures/body.png"),
        PathBuf::from("/nonexistent/textures/mask.png"),
        PathBuf::from("/nonexistent/textures/ovl.png"),
    ]);
    assert_eq!(model.materials.len(), 2);
    assert_eq!(model.materials[0].overlay_texture_ids, Some([1, 2]));
    assert!(!model.materials[1].flags().contains(MaterialFlags::TEXTURE_ID));

    assert!(model.nodes[2].geometry.is_none());
    assert!(model.nodes[2].bounding_box.is_none());
    let geometry = model.nodes[1].geometry.as_ref().unwrap();
    let tags: Vec<i32> = geometry.meshes().map(|m| m.tag()).collect();
    assert_eq!(tags, vec![7, 8]);
    let bb = model.nodes[1].bounding_box.unwrap();
    assert_eq!(bb.min, Vector3::new(0.0, 0.0, 0.0));
    assert_eq!(bb.max, Vector3::new(1.0, 1.0, 0.0));

    // the result serializes
    let mut w = Writer::new();
    write_resource(&mut w, &model).unwrap();
    let bytes = w.into_bytes();
    let model2: Model = read_resource(&mut Cur::new(&bytes), None).unwrap();
    assert_eq!(model2, model);
}

#[test]
fn test_single_weight_node_takes_the_mesh() {
    let mut model = skeleton();
    let scene = SourceScene {
        materials: vec![SourceMaterial::default()],
        meshes: vec![quad(1, vec![vec![(2, 1.0)]; 4])],
    };
    replace_mesh_data(&mut model, &scene, &PartitionOptions::default()).unwrap();

    assert!(model.nodes[1].geometry.is_none());
    assert!(model.nodes[1].bounding_box.is_none());
    let geometry = model.nodes[2].geometry.as_ref().unwrap();
    let tags: Vec<i32> = geometry.meshes().map(|m| m.tag()).collect();
    assert_eq!(tags, vec![8]);
    // node 2 sits at y = 2 in world space
    let bb = model.nodes[2].bounding_box.unwrap();
    assert_eq!(bb.min, Vector3::new(0.0, -1.0, 0.0));
    assert_eq!(bb.max, Vector3::new(1.0, 0.0, 0.0));

    let scene = SourceScene {
        materials: vec![SourceMaterial::default()],
        meshes: vec![quad(1, vec![vec![(5, 1.0)]; 4])],
    };
    assert!(replace_mesh_data(&mut skeleton(), &scene, &PartitionOptions::default()).is_err());
}

#[test]
fn test_overlays_off_by_default() {
    let mut model = skeleton();
    let scene = SourceScene {
        materials: vec![SourceMaterial {
            texture: Some(PathBuf::from("a.png")),
            overlay: Some((PathBuf::from("b.png"), PathBuf::from("c.png"))),
        }],
        meshes: vec![quad(0, vec![])],
    };
    let textures = replace_mesh_data(&mut model, &scene, &PartitionOptions::default()).unwrap();
    assert_eq!(textures.paths, vec![PathBuf::from("a.png")]);
    assert_eq!(model.materials[0], Material::with_texture(0));
}

#[test]
fn test_mismatched_attributes() {
    let mut model = skeleton();
    let mut mesh = quad(0, vec![]);
    mesh.normals.pop();
    let scene = SourceScene { materials: vec![SourceMaterial::default()], meshes: vec![mesh] };
    assert!(replace_mesh_data(&mut model, &scene, &PartitionOptions::default()).is_err());

    let scene = SourceScene { materials: vec![], meshes: vec![quad(0, vec![])] };
    assert!(replace_mesh_data(&mut model, &scene, &PartitionOptions::default()).is_err());
}
