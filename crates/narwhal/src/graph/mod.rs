use crate::error::{MalformedGraph, Result};
use crate::math::Vector3D;
use indexmap::IndexSet;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Plain undirected graph description consumed by the layout engine.
///
/// Node order is significant: it is the visiting order used by coarsening.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<String>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, id: impl Into<String>) -> Self {
        self.nodes.push(id.into());
        self
    }

    pub fn with_edge(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.edges.push(Edge::new(source, target));
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.index().map(|_| ())
    }

    /// Resolves node ids to dense indices, checking the edge-endpoint invariant.
    pub fn index(&self) -> Result<IndexedGraph> {
        let mut id_to_idx: FxHashMap<&str, usize> = FxHashMap::default();
        id_to_idx.reserve(self.nodes.len());
        for (idx, id) in self.nodes.iter().enumerate() {
            if id_to_idx.insert(id.as_str(), idx).is_some() {
                return Err(MalformedGraph::DuplicateNode {
                    node_id: id.clone(),
                }
                .into());
            }
        }

        let mut edges = Vec::with_capacity(self.edges.len());
        for (edge_index, e) in self.edges.iter().enumerate() {
            let resolve = |id: &str| {
                id_to_idx
                    .get(id)
                    .copied()
                    .ok_or_else(|| MalformedGraph::UnknownEndpoint {
                        edge_index,
                        node_id: id.to_string(),
                    })
            };
            edges.push((resolve(&e.source)?, resolve(&e.target)?));
        }

        Ok(IndexedGraph::from_parts(self.nodes.clone(), edges))
    }
}

/// Undirected edge between two node ids.
///
/// Deserialises from either `{"source": "a", "target": "b"}` or `["a", "b"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "EdgeRepr")]
pub struct Edge {
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EdgeRepr {
    Pair(String, String),
    Named { source: String, target: String },
}

impl From<EdgeRepr> for Edge {
    fn from(value: EdgeRepr) -> Self {
        match value {
            EdgeRepr::Pair(source, target) | EdgeRepr::Named { source, target } => {
                Self { source, target }
            }
        }
    }
}

/// Validated graph with dense node indices and a de-duplicated adjacency list.
///
/// `edges` keeps every input edge (including parallel edges and self-loops) because the force and
/// energy terms are defined per edge; `adjacency` is the simple neighbour relation used for
/// coarsening.
#[derive(Debug, Clone)]
pub struct IndexedGraph {
    ids: Vec<String>,
    edges: Vec<(usize, usize)>,
    adjacency: Vec<Vec<usize>>,
}

impl IndexedGraph {
    pub(crate) fn from_parts(ids: Vec<String>, edges: Vec<(usize, usize)>) -> Self {
        let mut neighbours: Vec<IndexSet<usize>> = vec![IndexSet::new(); ids.len()];
        for &(a, b) in &edges {
            if a == b {
                continue;
            }
            neighbours[a].insert(b);
            neighbours[b].insert(a);
        }
        let adjacency = neighbours
            .into_iter()
            .map(|set| set.into_iter().collect())
            .collect();
        Self {
            ids,
            edges,
            adjacency,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn id(&self, idx: usize) -> &str {
        &self.ids[idx]
    }

    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    pub fn neighbors(&self, idx: usize) -> &[usize] {
        &self.adjacency[idx]
    }

    /// Edge indices incident to each node; a self-loop is listed once.
    pub(crate) fn incident_edges(&self) -> Vec<Vec<usize>> {
        let mut out: Vec<Vec<usize>> = vec![Vec::new(); self.ids.len()];
        for (edge_idx, &(a, b)) in self.edges.iter().enumerate() {
            out[a].push(edge_idx);
            if a != b {
                out[b].push(edge_idx);
            }
        }
        out
    }

    /// Pairs each node id with its entry in `positions` (indexed like this graph).
    pub(crate) fn position_map(&self, positions: &[Vector3D]) -> PositionMap {
        self.ids
            .iter()
            .zip(positions)
            .map(|(id, p)| (id.clone(), *p))
            .collect()
    }
}

pub type PositionMap = std::collections::BTreeMap<String, Vector3D>;
