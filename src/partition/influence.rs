//! Reducing the nodes that influence a skinned mesh to a fixed budget.

use smallvec::SmallVec;

/// Weights within this distance of 1 count as normalized.
pub const WEIGHT_TOLERANCE: f32 = 0.002;

/// Weights of one vertex as `(node, weight)` pairs.
pub type VertexWeights = SmallVec<[(usize, f32); 4]>;

/// Result of `reduce_node_influences`.
#[derive(Debug, Clone, PartialEq)]
pub struct Influence {
    /// Coverage score of every node the input referenced, in order of first
    /// appearance.
    pub scores: Vec<(usize, f32)>,
    /// Nodes kept, by descending coverage.
    pub used_nodes: Vec<usize>,
    /// Nodes dropped, in the order they were dropped.
    pub dropped_nodes: Vec<usize>,
    /// Per-vertex weights referring only to `used_nodes`.
    pub weights: Vec<VertexWeights>,
}

impl Influence {
    pub fn score(&self, node: usize) -> f32 {
        self.scores.iter()
            .find(|&&(n, _)| n == node)
            .map(|&(_, s)| s)
            .unwrap_or(0.0)
    }

    /// Weight of `node` at vertex `vertex`, 0 if it has no entry.
    pub fn weight(&self, vertex: usize, node: usize) -> f32 {
        self.weights[vertex].iter()
            .find(|&&(n, _)| n == node)
            .map(|&(_, w)| w)
            .unwrap_or(0.0)
    }
}

/// Limits the nodes referenced by a mesh to `budget`.
///
/// Nodes are ranked by coverage, the sum of their weights over all
/// vertices; ties keep the order of first appearance. While too many nodes
/// are used, the lowest ranked one is dropped: each vertex referencing it
/// hands the removed weight to the top `budget` nodes, each getting
/// `removed * score / vertex_count`. After every drop, each vertex whose
/// sum is below 1 spreads the remainder evenly over its entries.
pub fn reduce_node_influences(weights: &[Vec<(usize, f32)>], budget: usize) -> Influence {
    // merge duplicate entries of a vertex
    let mut weights: Vec<VertexWeights> = weights.iter().map(|vw| {
        let mut merged = VertexWeights::new();
        for &(node, w) in vw {
            match merged.iter_mut().find(|e| e.0 == node) {
                Some(e) => e.1 += w,
                None => merged.push((node, w)),
            }
        }
        merged
    }).collect();

    let mut scores: Vec<(usize, f32)> = vec![];
    for &(node, w) in weights.iter().flatten() {
        match scores.iter_mut().find(|e| e.0 == node) {
            Some(e) => e.1 += w,
            None => scores.push((node, w)),
        }
    }

    let mut ranked = scores.clone();
    // stable, so equal scores keep their first appearance order
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(::std::cmp::Ordering::Equal));
    let mut used_nodes: Vec<usize> = ranked.iter().map(|&(n, _)| n).collect();

    let vertex_count = weights.len() as f32;
    let mut dropped_nodes = vec![];
    while used_nodes.len() > budget && budget > 0 {
        let dropped = match used_nodes.pop() {
            Some(node) => node,
            None => break,
        };
        let targets: Vec<(usize, f32)> = used_nodes[..budget].iter()
            .map(|&n| (n, ranked.iter().find(|e| e.0 == n).map(|e| e.1).unwrap_or(0.0)))
            .collect();

        let mut affected = 0;
        for vw in weights.iter_mut() {
            let removed = match vw.iter().position(|e| e.0 == dropped) {
                Some(i) => vw.remove(i).1,
                None => continue,
            };
            affected += 1;

            for &(target, score) in &targets {
                let delta = removed * score / vertex_count;
                match vw.iter_mut().find(|e| e.0 == target) {
                    Some(e) => e.1 += delta,
                    None => vw.push((target, delta)),
                }
            }
        }
        for vw in weights.iter_mut() {
            spread_remainder(vw);
        }

        debug!("dropped node {} from {} vertices", dropped, affected);
        dropped_nodes.push(dropped);
    }

    Influence { scores, used_nodes, dropped_nodes, weights }
}

/// Makes the weights of a vertex sum to 1 when they fall short.
fn spread_remainder(vw: &mut VertexWeights) {
    if vw.is_empty() {
        return;
    }
    let sum: f32 = vw.iter().map(|e| e.1).sum();
    if sum < 1.0 {
        let share = (1.0 - sum) / vw.len() as f32;
        for e in vw.iter_mut() {
            e.1 += share;
        }
    }
}

#[cfg(test)]
fn sum(vw: &[(usize, f32)]) -> f32 {
    vw.iter().map(|e| e.1).sum()
}

#[test]
fn test_five_vertices_six_nodes() {
    let weights = vec![
        vec![(0, 0.5), (1, 0.3), (5, 0.2)],
        vec![(0, 0.6), (2, 0.2), (4, 0.2)],
        vec![(1, 0.7), (3, 0.3)],
        vec![(2, 0.4), (0, 0.4), (5, 0.2)],
        vec![(3, 0.5), (4, 0.5)],
    ];
    let inf = reduce_node_influences(&weights, 4);

    // scores: 0 1.5, 1 1.0, 2 0.6, 3 0.8, 4 0.7, 5 0.4
    assert_eq!(inf.used_nodes, vec![0, 1, 3, 4]);
    assert_eq!(inf.dropped_nodes, vec![5, 2]);
    for vw in &inf.weights {
        assert!(vw.len() <= 4);
        assert!(vw.iter().all(|e| inf.used_nodes.contains(&e.0)));
        let s = sum(vw);
        assert!(s >= 1.0 - WEIGHT_TOLERANCE && s <= 1.0 + WEIGHT_TOLERANCE, "sum {}", s);
    }
    // vertex 2 never referenced a dropped node
    assert_eq!(&inf.weights[2][..], &[(1, 0.7), (3, 0.3)][..]);
    assert!(inf.weight(0, 3) > 0.0);
}

#[test]
fn test_underweight_vertex_is_normalized() {
    let weights = vec![
        vec![(0, 0.5), (1, 0.4)],
        vec![(2, 1.0)],
        vec![(3, 0.5), (4, 0.5)],
        vec![(0, 0.5), (2, 0.5)],
        vec![(3, 0.9)],
    ];
    let inf = reduce_node_influences(&weights, 4);
    assert_eq!(inf.dropped_nodes, vec![1]);
    for vw in &inf.weights {
        assert!((sum(vw) - 1.0).abs() <= WEIGHT_TOLERANCE, "sum {}", sum(vw));
    }
    // vertex 4 lost nothing but still makes up its shortfall
    assert_eq!(inf.weights[4].len(), 1);
    assert!((inf.weight(4, 3) - 1.0).abs() <= WEIGHT_TOLERANCE);

    // nothing is normalized when no node is dropped
    let inf = reduce_node_influences(&weights, 5);
    assert!(inf.dropped_nodes.is_empty());
    assert_eq!(&inf.weights[4][..], &[(3, 0.9)][..]);
}

#[test]
fn test_ties_keep_first_appearance() {
    let weights = vec![
        vec![(7, 0.5), (3, 0.5)],
        vec![(9, 0.5), (1, 0.5)],
    ];
    let inf = reduce_node_influences(&weights, 4);
    assert_eq!(inf.used_nodes, vec![7, 3, 9, 1]);
    assert!(inf.dropped_nodes.is_empty());
    for (vw, expected) in inf.weights.iter().zip(&weights) {
        assert_eq!(&vw[..], &expected[..]);
    }

    let inf = reduce_node_influences(&weights, 2);
    assert_eq!(inf.used_nodes, vec![7, 3]);
    assert_eq!(inf.dropped_nodes, vec![1, 9]);
    for vw in &inf.weights {
        assert!((sum(vw) - 1.0).abs() <= WEIGHT_TOLERANCE);
    }
}

#[test]
fn test_duplicate_entries_merge() {
    let weights = vec![vec![(2, 0.25), (2, 0.75)]];
    let inf = reduce_node_influences(&weights, 4);
    assert_eq!(inf.weights.len(), 1);
    assert_eq!(&inf.weights[0][..], &[(2, 1.0)][..]);
    assert_eq!(inf.score(2), 1.0);
}
