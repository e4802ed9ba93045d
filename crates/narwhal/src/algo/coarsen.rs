//! Multi-level graph coarsening by greedy pairwise matching.
//!
//! Each round pairs every node with its first still-unmatched neighbour (in graph order), turning
//! each pair (or leftover singleton) into one coarse node. Parallel coarse edges are collapsed.

use crate::graph::IndexedGraph;
use crate::math::Vector3D;
use indexmap::{IndexMap, IndexSet};
use rand::Rng;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    /// Synthetic id of the coarse node, `L{level}:{index}`.
    pub id: String,
    /// Indices into the fine graph.
    pub members: Vec<usize>,
}

/// Partition of a fine graph's nodes into the nodes of the next coarser graph.
///
/// Cluster `i` is coarse node `i`.
#[derive(Debug, Clone)]
pub struct ClusterMap {
    clusters: Vec<Cluster>,
    fine_to_coarse: Vec<usize>,
}

impl ClusterMap {
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter()
    }

    pub fn cluster_of(&self, fine_idx: usize) -> usize {
        self.fine_to_coarse[fine_idx]
    }

    /// Id-keyed view: coarse id -> member fine ids.
    pub fn to_id_map(&self, fine: &IndexedGraph) -> IndexMap<String, Vec<String>> {
        self.clusters
            .iter()
            .map(|c| {
                let members = c.members.iter().map(|&m| fine.id(m).to_string()).collect();
                (c.id.clone(), members)
            })
            .collect()
    }

    /// Places every fine node at its cluster's coarse position plus a uniform jitter in
    /// `[-jitter, jitter]³`.
    pub fn project<R: Rng + ?Sized>(
        &self,
        coarse_positions: &[Vector3D],
        jitter: f64,
        rng: &mut R,
    ) -> Vec<Vector3D> {
        debug_assert_eq!(coarse_positions.len(), self.clusters.len());
        self.fine_to_coarse
            .iter()
            .map(|&c| coarse_positions[c] + random_offset(rng, jitter))
            .collect()
    }
}

pub(crate) fn random_offset<R: Rng + ?Sized>(rng: &mut R, half_width: f64) -> Vector3D {
    if half_width <= 0.0 {
        return Vector3D::ZERO;
    }
    Vector3D::new(
        rng.random_range(-half_width..=half_width),
        rng.random_range(-half_width..=half_width),
        rng.random_range(-half_width..=half_width),
    )
}

/// One coarsening round. `level` only affects the synthetic coarse ids.
pub fn coarsen(graph: &IndexedGraph, level: usize) -> (ClusterMap, IndexedGraph) {
    let n = graph.len();
    let mut fine_to_coarse: Vec<Option<usize>> = vec![None; n];
    let mut clusters: Vec<Cluster> = Vec::with_capacity(n.div_ceil(2));

    for node in 0..n {
        if fine_to_coarse[node].is_some() {
            continue;
        }
        let coarse = clusters.len();
        fine_to_coarse[node] = Some(coarse);
        let mut members = vec![node];
        if let Some(&partner) = graph
            .neighbors(node)
            .iter()
            .find(|&&nb| fine_to_coarse[nb].is_none())
        {
            fine_to_coarse[partner] = Some(coarse);
            members.push(partner);
        }
        clusters.push(Cluster {
            id: format!("L{level}:{coarse}"),
            members,
        });
    }

    let fine_to_coarse: Vec<usize> = fine_to_coarse.into_iter().flatten().collect();
    debug_assert_eq!(fine_to_coarse.len(), n);

    let mut coarse_edges: IndexSet<(usize, usize)> = IndexSet::new();
    for &(a, b) in graph.edges() {
        let (ca, cb) = (fine_to_coarse[a], fine_to_coarse[b]);
        if ca != cb {
            coarse_edges.insert((ca.min(cb), ca.max(cb)));
        }
    }

    let coarse = IndexedGraph::from_parts(
        clusters.iter().map(|c| c.id.clone()).collect(),
        coarse_edges.into_iter().collect(),
    );
    (
        ClusterMap {
            clusters,
            fine_to_coarse,
        },
        coarse,
    )
}

/// One recorded coarsening round: the graph that was coarsened and how its nodes were grouped.
#[derive(Debug, Clone)]
pub struct Level {
    pub fine: IndexedGraph,
    pub clusters: ClusterMap,
}

/// Stack of coarsening levels, finest first, plus the coarsest graph produced.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    levels: Vec<Level>,
    coarsest: IndexedGraph,
}

impl Hierarchy {
    /// Coarsens while the current graph has more than `threshold` nodes.
    ///
    /// Stops early when a round merges nothing (an edgeless remainder cannot shrink further).
    pub fn build(graph: IndexedGraph, threshold: usize) -> Self {
        let mut levels: Vec<Level> = Vec::new();
        let mut current = graph;
        while current.len() > threshold {
            let (clusters, coarse) = coarsen(&current, levels.len() + 1);
            if coarse.len() == current.len() {
                break;
            }
            tracing::debug!(
                level = levels.len() + 1,
                fine_nodes = current.len(),
                coarse_nodes = coarse.len(),
                coarse_edges = coarse.edges().len(),
                "coarsened graph"
            );
            levels.push(Level {
                fine: current,
                clusters,
            });
            current = coarse;
        }
        Self {
            levels,
            coarsest: current,
        }
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn coarsest(&self) -> &IndexedGraph {
        &self.coarsest
    }

    pub fn into_parts(self) -> (Vec<Level>, IndexedGraph) {
        (self.levels, self.coarsest)
    }
}
