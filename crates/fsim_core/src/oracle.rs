use crate::dsu::UnionFind;
use crate::graph::FusionResult;
use std::collections::HashMap;

/// Decides whether a trial connected Alice and Bob.
///
/// Keeps its union-find buffers between calls so one oracle per worker lane
/// serves every trial of that lane.
#[derive(Debug, Default)]
pub struct ConnectivityOracle {
    parent: Vec<usize>,
    rank: Vec<u8>,
    has_alice_bob: HashMap<usize, (bool, bool)>,
}

impl ConnectivityOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts the components of the reduced graph that contain both an
    /// Alice vertex and a Bob vertex.
    ///
    /// The input is not modified. With one vertex per endpoint the count is
    /// zero or one; callers treat any non-zero count as success.
    pub fn count_connected(&mut self, result: &FusionResult) -> usize {
        let n = result.graph.num_vertices();
        self.parent.resize(n, 0);
        self.rank.resize(n, 0);
        self.has_alice_bob.clear();

        let mut dsu = UnionFind::new(&mut self.parent[..n], &mut self.rank[..n]);
        for &(u, v) in &result.graph.edges {
            dsu.union(u as usize, v as usize);
        }

        for &v in &result.alice_vertices {
            self.has_alice_bob.entry(dsu.find(v)).or_default().0 = true;
        }
        for &v in &result.bob_vertices {
            self.has_alice_bob.entry(dsu.find(v)).or_default().1 = true;
        }

        self.has_alice_bob
            .values()
            .filter(|&&(alice, bob)| alice && bob)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::FusedGraph;

    fn result(n: usize, edges: &[(usize, usize)], alice: &[usize], bob: &[usize]) -> FusionResult {
        let mut graph = FusedGraph::with_vertices(n);
        for &(u, v) in edges {
            graph.add_edge(u, v);
        }
        FusionResult {
            graph,
            alice_vertices: alice.to_vec(),
            bob_vertices: bob.to_vec(),
        }
    }

    #[test]
    fn path_connects_endpoints() {
        let mut oracle = ConnectivityOracle::new();
        let r = result(4, &[(0, 1), (1, 2), (2, 3)], &[0], &[3]);
        assert_eq!(oracle.count_connected(&r), 1);
    }

    #[test]
    fn isolated_endpoints_fail() {
        let mut oracle = ConnectivityOracle::new();
        let r = result(4, &[(0, 1), (2, 3)], &[0], &[3]);
        assert_eq!(oracle.count_connected(&r), 0);
        let r = result(2, &[], &[0], &[1]);
        assert_eq!(oracle.count_connected(&r), 0);
    }

    #[test]
    fn duplicated_endpoints_count_per_component() {
        let mut oracle = ConnectivityOracle::new();
        let r = result(6, &[(0, 1), (2, 3)], &[0, 2, 4], &[1, 3, 5]);
        assert_eq!(oracle.count_connected(&r), 2);
    }

    #[test]
    fn buffers_shrink_and_grow_between_trials() {
        let mut oracle = ConnectivityOracle::new();
        let big = result(10, &[(0, 9)], &[0], &[9]);
        let small = result(3, &[(1, 2)], &[0], &[2]);
        assert_eq!(oracle.count_connected(&big), 1);
        assert_eq!(oracle.count_connected(&small), 0);
        assert_eq!(oracle.count_connected(&big), 1);
    }

    #[test]
    fn shared_vertex_is_both_endpoints() {
        let mut oracle = ConnectivityOracle::new();
        let r = result(1, &[], &[0], &[0]);
        assert_eq!(oracle.count_connected(&r), 1);
    }
}
