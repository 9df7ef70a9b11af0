//! Physical network topology shared by every trial.
//!
//! A topology is an undirected graph of repeater nodes together with the
//! planar position of every node. Every physical link is a connection with
//! a dense index, reachable from either of its (vertex, edge) pairs, so
//! protocols can address link qubits by index. The structure is built once
//! per experiment and only read afterwards, so it is shared freely across
//! threads.

use crate::TopologyError;
use crate::vec2::Vec2;

/// Undirected multigraph stored as an edge list plus per-vertex incidence.
///
/// Edge ids are assigned in insertion order. The incidence list of each
/// vertex keeps the ids of its edges in the same order, which fixes the
/// numbering of connections.
#[derive(Clone, Debug)]
pub struct PhysicalGraph {
    edges: Vec<(usize, usize)>,
    incidence: Vec<Vec<usize>>,
}

impl PhysicalGraph {
    /// Returns the number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.incidence.len()
    }

    /// Returns the number of edges.
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Returns the two endpoints of edge `e`.
    ///
    /// # Panics
    ///
    /// Panics if `e` is not a valid edge id.
    pub fn endpoints(&self, e: usize) -> (usize, usize) {
        self.edges[e]
    }

    /// Returns the endpoint of edge `e` that is not `v`.
    pub fn opposite(&self, v: usize, e: usize) -> usize {
        let (a, b) = self.edges[e];
        if a == v { b } else { a }
    }

    /// Returns the ids of the edges incident on `v`, in insertion order.
    pub fn incident_edges(&self, v: usize) -> &[usize] {
        &self.incidence[v]
    }

    /// Iterates over all edges as `(id, u, v)`.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        self.edges.iter().enumerate().map(|(e, &(u, v))| (e, u, v))
    }
}

/// The (vertex, incident edge) pair owning a connection index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Connection {
    pub vertex: usize,
    pub edge: usize,
}

/// Immutable topology: graph, node positions and connection numbering.
///
/// Connections are numbered by scanning vertices in order and, within a
/// vertex, its edges in insertion order; an edge takes the next index the
/// first time it is met. Every edge therefore owns exactly one index in
/// `0..E`, and its owner is the endpoint that reached it first.
#[derive(Clone, Debug)]
pub struct Topology {
    graph: PhysicalGraph,
    positions: Vec<Vec2>,
    connections: Vec<Connection>,
    index_of_edge: Vec<usize>,
}

impl Topology {
    /// Builds a topology from a vertex count, an edge list and positions.
    ///
    /// # Arguments
    ///
    /// * `num_vertices` - Number of physical nodes
    /// * `edges` - Undirected links as vertex pairs; the position in the
    ///   slice becomes the edge id
    /// * `positions` - One planar position per vertex
    ///
    /// # Returns
    ///
    /// The topology, or an error if an edge references a missing vertex or
    /// the position list does not match the vertex count.
    pub fn new(
        num_vertices: usize,
        edges: Vec<(usize, usize)>,
        positions: Vec<Vec2>,
    ) -> Result<Self, TopologyError> {
        if positions.len() != num_vertices {
            return Err(TopologyError::PositionCount {
                vertices: num_vertices,
                positions: positions.len(),
            });
        }

        let mut incidence = vec![Vec::new(); num_vertices];
        for (e, &(u, v)) in edges.iter().enumerate() {
            if let Some(vertex) = [u, v].into_iter().find(|&x| x >= num_vertices) {
                return Err(TopologyError::EdgeOutOfRange { edge: e, vertex });
            }
            incidence[u].push(e);
            if u != v {
                incidence[v].push(e);
            }
        }

        let mut index_of_edge = vec![usize::MAX; edges.len()];
        let mut connections = Vec::with_capacity(edges.len());
        for (v, incident) in incidence.iter().enumerate() {
            for &edge in incident {
                if index_of_edge[edge] == usize::MAX {
                    index_of_edge[edge] = connections.len();
                    connections.push(Connection { vertex: v, edge });
                }
            }
        }

        Ok(Self {
            graph: PhysicalGraph { edges, incidence },
            positions,
            connections,
            index_of_edge,
        })
    }

    pub fn graph(&self) -> &PhysicalGraph {
        &self.graph
    }

    pub fn positions(&self) -> &[Vec2] {
        &self.positions
    }

    pub fn num_vertices(&self) -> usize {
        self.graph.num_vertices()
    }

    /// Returns the number of connections, one per edge.
    pub fn num_connections(&self) -> usize {
        self.connections.len()
    }

    /// Returns the (vertex, edge) pair owning connection `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.num_connections()`. Connection indices are
    /// produced by [`Topology::connection_index`], so an out-of-range index
    /// is a caller bug.
    pub fn get_connection(&self, index: usize) -> Connection {
        self.connections[index]
    }

    /// Returns the connection index of edge `e` seen from vertex `v`.
    ///
    /// Both endpoints of an edge map to the same index. Returns `None` if
    /// `e` is not incident on `v`.
    pub fn connection_index(&self, v: usize, e: usize) -> Option<usize> {
        let incident = self.graph.incidence.get(v)?;
        incident.contains(&e).then(|| self.index_of_edge[e])
    }

    /// Euclidean distance between the positions of two vertices.
    pub fn distance(&self, u: usize, v: usize) -> f64 {
        self.positions[u].distance(self.positions[v])
    }

    /// Physical length of edge `e`.
    pub fn edge_length(&self, e: usize) -> f64 {
        let (u, v) = self.graph.endpoints(e);
        self.distance(u, v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path3() -> Topology {
        let positions = vec![Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), Vec2::new(20.0, 0.0)];
        Topology::new(3, vec![(0, 1), (1, 2)], positions).unwrap()
    }

    #[test]
    fn connections_are_dense_and_invertible() {
        let topology = path3();
        assert_eq!(topology.num_connections(), 2);
        for index in 0..topology.num_connections() {
            let c = topology.get_connection(index);
            assert_eq!(topology.connection_index(c.vertex, c.edge), Some(index));
        }
        // both endpoints of a link share its index; the first one owns it
        assert_eq!(topology.connection_index(1, 0), Some(0));
        assert_eq!(topology.connection_index(2, 1), Some(1));
        assert_eq!(topology.get_connection(1), Connection { vertex: 1, edge: 1 });
    }

    #[test]
    fn numbering_follows_vertex_scan() {
        // edge 0 joins 2 and 3, so vertex 0's edge is met first
        let positions = vec![Vec2::default(); 4];
        let topology = Topology::new(4, vec![(2, 3), (0, 3), (1, 2)], positions).unwrap();
        assert_eq!(topology.connection_index(0, 1), Some(0));
        assert_eq!(topology.connection_index(1, 2), Some(1));
        assert_eq!(topology.connection_index(2, 0), Some(2));
        assert_eq!(topology.connection_index(3, 0), Some(2));
    }

    #[test]
    fn non_incident_edge_has_no_connection() {
        assert_eq!(path3().connection_index(0, 1), None);
    }

    #[test]
    fn distances_follow_positions() {
        let topology = path3();
        assert_eq!(topology.distance(0, 2), 20.0);
        assert_eq!(topology.edge_length(1), 10.0);
        assert_eq!(topology.graph().opposite(1, 1), 2);
    }

    #[test]
    fn rejects_mismatched_input() {
        let err = Topology::new(2, vec![(0, 5)], vec![Vec2::default(); 2]).unwrap_err();
        assert!(matches!(err, TopologyError::EdgeOutOfRange { edge: 0, vertex: 5 }));

        let err = Topology::new(3, Vec::new(), vec![Vec2::default(); 2]).unwrap_err();
        assert!(matches!(err, TopologyError::PositionCount { vertices: 3, positions: 2 }));
    }
}
