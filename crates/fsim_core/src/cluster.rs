//! Cluster layout of a topology for a given cluster radius.
//!
//! The physical graph is covered greedily by BFS balls: vertices are visited
//! in index order and every vertex not yet claimed seeds a new cluster
//! containing all unclaimed vertices within graph distance `k - 1`. The
//! links whose endpoints fall into different clusters are the cut links; the
//! qubits sitting on them are the boundary qubits a cluster must entangle
//! into one GHZ resource. The layout depends only on the topology and the
//! run configuration, never on random draws.

use crate::SimError;
use crate::topology::Topology;
use std::collections::VecDeque;

const UNCLAIMED: usize = usize::MAX;

/// The two designated endpoints of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Endpoints {
    pub alice: usize,
    pub bob: usize,
}

/// One cluster of the layout.
#[derive(Clone, Debug)]
pub struct Cluster {
    /// Vertex that seeded the BFS ball.
    pub centre: usize,

    /// Member vertices in BFS order, centre first.
    pub members: Vec<usize>,

    /// Connection indices of the cut links touching the cluster, in
    /// ascending order. Each one stands for the member qubit on that link.
    pub boundary: Vec<usize>,

    /// Number of endpoints (Alice, Bob) housed in this cluster.
    pub endpoint_qubits: usize,

    /// Elementary GHZ states needed to cover all qubits of the cluster.
    ///
    /// `m` states of `g` qubits joined by `m - 1` local fusions hold
    /// `m * (g - 1) + 1` qubits, so `m = ceil((n - 1) / (g - 1))` with a
    /// minimum of one.
    pub ghz_states: usize,

    /// Largest distance from the centre to a member.
    pub extent: f64,
}

/// A physical link whose endpoints belong to different clusters.
#[derive(Clone, Copy, Debug)]
pub struct CutLink {
    pub edge: usize,
    pub clusters: (usize, usize),
    pub length: f64,
}

/// Clustering of a topology shared by all trials of one radius.
#[derive(Clone, Debug)]
pub struct ClusterLayout<'t> {
    topology: &'t Topology,
    radius: usize,
    ghz_size: usize,
    endpoints: Endpoints,
    cluster_of: Vec<usize>,
    clusters: Vec<Cluster>,
    cut_links: Vec<CutLink>,
}

impl<'t> ClusterLayout<'t> {
    /// Builds the layout of `topology` for cluster radius `radius`.
    ///
    /// # Arguments
    ///
    /// * `topology` - Physical network, borrowed for the layout's lifetime
    /// * `radius` - Cluster radius `k`, at least one (one means every node
    ///   is its own cluster)
    /// * `ghz_size` - Qubits per elementary GHZ state, at least two
    /// * `endpoints` - Nodes housing Alice and Bob
    ///
    /// # Returns
    ///
    /// The layout, or an error if the parameters admit no valid clustering.
    pub fn new(
        topology: &'t Topology,
        radius: usize,
        ghz_size: usize,
        endpoints: Endpoints,
    ) -> Result<Self, SimError> {
        if radius == 0 {
            return Err(SimError::InvalidRadius);
        }
        if ghz_size < 2 {
            return Err(SimError::GhzTooSmall(ghz_size));
        }
        let n = topology.num_vertices();
        for vertex in [endpoints.alice, endpoints.bob] {
            if vertex >= n {
                return Err(SimError::EndpointOutOfRange { vertex, vertices: n });
            }
        }

        let graph = topology.graph();
        let mut cluster_of = vec![UNCLAIMED; n];
        let mut clusters = Vec::new();
        let mut queue = VecDeque::new();

        for seed in 0..n {
            if cluster_of[seed] != UNCLAIMED {
                continue;
            }
            let id = clusters.len();
            cluster_of[seed] = id;
            queue.push_back((seed, 0));

            let mut members = Vec::new();
            while let Some((u, depth)) = queue.pop_front() {
                members.push(u);
                if depth + 1 >= radius {
                    continue;
                }
                for &e in graph.incident_edges(u) {
                    let w = graph.opposite(u, e);
                    if cluster_of[w] == UNCLAIMED {
                        cluster_of[w] = id;
                        queue.push_back((w, depth + 1));
                    }
                }
            }

            let extent = members
                .iter()
                .map(|&m| topology.distance(seed, m))
                .fold(0.0, f64::max);
            clusters.push(Cluster {
                centre: seed,
                members,
                boundary: Vec::new(),
                endpoint_qubits: 0,
                ghz_states: 1,
                extent,
            });
        }

        for index in 0..topology.num_connections() {
            let (u, v) = graph.endpoints(topology.get_connection(index).edge);
            let (a, b) = (cluster_of[u], cluster_of[v]);
            if a != b {
                clusters[a].boundary.push(index);
                clusters[b].boundary.push(index);
            }
        }

        let cut_links = graph
            .edges()
            .filter(|&(_, u, v)| cluster_of[u] != cluster_of[v])
            .map(|(edge, u, v)| CutLink {
                edge,
                clusters: (cluster_of[u], cluster_of[v]),
                length: topology.edge_length(edge),
            })
            .collect();

        clusters[cluster_of[endpoints.alice]].endpoint_qubits += 1;
        clusters[cluster_of[endpoints.bob]].endpoint_qubits += 1;

        for cluster in &mut clusters {
            let qubits = cluster.boundary.len() + cluster.endpoint_qubits;
            cluster.ghz_states = qubits.saturating_sub(1).div_ceil(ghz_size - 1).max(1);
        }

        Ok(Self {
            topology,
            radius,
            ghz_size,
            endpoints,
            cluster_of,
            clusters,
            cut_links,
        })
    }

    pub fn topology(&self) -> &'t Topology {
        self.topology
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    pub fn ghz_size(&self) -> usize {
        self.ghz_size
    }

    pub fn endpoints(&self) -> Endpoints {
        self.endpoints
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn num_clusters(&self) -> usize {
        self.clusters.len()
    }

    /// Returns the id of the cluster containing physical vertex `v`.
    pub fn cluster_of(&self, v: usize) -> usize {
        self.cluster_of[v]
    }

    pub fn cut_links(&self) -> &[CutLink] {
        &self.cut_links
    }

    /// Distance from a vertex to the centre of its cluster.
    pub fn distance_to_centre(&self, v: usize) -> f64 {
        let centre = self.clusters[self.cluster_of[v]].centre;
        self.topology.distance(v, centre)
    }
}
