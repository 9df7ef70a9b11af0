//! Reduced (fused) graph representation for one protocol trial.
//!
//! Each trial collapses the physical network into a much smaller graph:
//! one vertex per cluster plus one vertex per endpoint, with an edge for
//! every fusion that succeeded. The graph is produced fresh per trial,
//! consumed by the connectivity oracle and then dropped.

/// Reduced connectivity graph of one trial.
///
/// Stores edges as a flat list of (u, v) vertex pairs. Vertex ids are dense
/// in `0..num_vertices`; vertices without edges are isolated but still part
/// of the graph, so every endpoint always has a vertex of its own.
#[derive(Clone, Debug, Default)]
pub struct FusedGraph {
    /// Flat list of successful fusions as (u, v) vertex pairs.
    ///
    /// Stored as u32 pairs to halve the footprint on 64-bit targets; a
    /// reduced graph never comes close to four billion vertices.
    pub edges: Vec<(u32, u32)>,

    /// Number of vertices in the graph.
    num_vertices: usize,
}

impl FusedGraph {
    /// Creates an edgeless graph with `num_vertices` vertices.
    ///
    /// Pre-allocates edge storage for a typical trial, where most clusters
    /// have a handful of cut links.
    ///
    /// # Arguments
    ///
    /// * `num_vertices` - Number of vertices of the reduced graph
    pub fn with_vertices(num_vertices: usize) -> Self {
        Self {
            edges: Vec::with_capacity(num_vertices * 2),
            num_vertices,
        }
    }

    /// Adds an undirected edge between vertices `u` and `v`.
    ///
    /// Grows the vertex count if either endpoint lies beyond it, so the
    /// graph always covers every vertex referenced by an edge.
    pub fn add_edge(&mut self, u: usize, v: usize) {
        let max_idx = u.max(v);
        if max_idx >= self.num_vertices {
            self.num_vertices = max_idx + 1;
        }
        self.edges.push((u as u32, v as u32));
    }

    pub fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }
}

/// Outcome of one protocol trial.
///
/// The reduced graph together with the vertices that originate from
/// Alice's and Bob's physical locations. Both vertex sets are non-empty.
#[derive(Clone, Debug, Default)]
pub struct FusionResult {
    pub graph: FusedGraph,
    pub alice_vertices: Vec<usize>,
    pub bob_vertices: Vec<usize>,
}
