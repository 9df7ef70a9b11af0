//! Disjoint Set Union (DSU) data structure over borrowed buffers.
//!
//! Implements a union-find structure that groups reduced-graph vertices
//! into connected components. The parent and rank arrays are borrowed so
//! that the caller can keep them between trials and avoid reallocating for
//! every reduced graph.

/// Union-Find data structure for connected-component labelling.
///
/// Uses path halving and union by rank, which keeps every operation close
/// to constant time on the small, sparse graphs produced per trial.
pub struct UnionFind<'a> {
    /// Parent pointer array for the union-find forest.
    ///
    /// Each element stores the parent vertex, with roots pointing to
    /// themselves. Rewritten during find operations (path halving).
    pub parent: &'a mut [usize],

    /// Rank array for the union-by-rank heuristic.
    ///
    /// Approximates the depth of each tree so unions attach the shallower
    /// tree below the deeper one.
    pub rank: &'a mut [u8],
}

impl<'a> UnionFind<'a> {
    /// Initializes a new union-find structure from pre-allocated slices.
    ///
    /// Every vertex becomes its own singleton set. The slices must have
    /// matching lengths.
    ///
    /// # Arguments
    ///
    /// * `parent` - Mutable slice for parent pointers
    /// * `rank` - Mutable slice for rank values
    pub fn new(parent: &'a mut [usize], rank: &'a mut [u8]) -> Self {
        debug_assert_eq!(parent.len(), rank.len());
        for (i, p) in parent.iter_mut().enumerate() {
            *p = i;
        }
        rank.fill(0);
        Self { parent, rank }
    }

    /// Finds the root of the set containing vertex i, with path halving.
    ///
    /// Every visited vertex is re-pointed to its grandparent on the way up,
    /// flattening the tree for later lookups.
    ///
    /// # Arguments
    ///
    /// * `i` - Vertex index to find the root for
    ///
    /// # Returns
    ///
    /// The root vertex index of the set containing i.
    #[inline(always)]
    pub fn find(&mut self, mut i: usize) -> usize {
        while i != self.parent[i] {
            let p = self.parent[i];
            let gp = self.parent[p];
            self.parent[i] = gp;
            i = p;
        }
        i
    }

    /// Merges the sets containing vertices i and j.
    ///
    /// # Returns
    ///
    /// True if the sets were merged, false if they were already united.
    pub fn union(&mut self, i: usize, j: usize) -> bool {
        let (root_i, root_j) = (self.find(i), self.find(j));
        if root_i == root_j {
            return false;
        }

        if self.rank[root_i] < self.rank[root_j] {
            self.parent[root_i] = root_j;
        } else {
            self.parent[root_j] = root_i;
            if self.rank[root_i] == self.rank[root_j] {
                self.rank[root_i] += 1;
            }
        }
        true
    }
}
