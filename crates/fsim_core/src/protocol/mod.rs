//! Fusion protocols turning a cluster layout and random draws into a
//! reduced graph.
//!
//! A trial proceeds in three stages, always drawing from the RNG in the same
//! order and the same number of times whatever the parameters:
//!
//! 1. every cluster prepares its elementary GHZ states (each succeeds with
//!    probability `q`) and joins them with local fusions (probability `p`);
//! 2. every cut link attempts a fusion between the two clusters it joins
//!    (probability `p`);
//! 3. Alice and Bob each fuse their memory qubit onto their cluster
//!    (probability `p`).
//!
//! The decoherence-aware variant adds one lifetime draw per cluster, link
//! and attachment; the step survives only if the lifetime exceeds its time
//! budget. Because the draw sequence never depends on `p` or `q`, two runs
//! sharing a seed see the same uniforms and their outcomes are ordered
//! whenever their probabilities are.

mod decohere;
mod fusion;

pub use decohere::{DecoheringFusion, Timing};
pub use fusion::Fusion;

use crate::SimError;
use crate::cluster::{ClusterLayout, Endpoints};
use crate::graph::{FusedGraph, FusionResult};
use crate::topology::Topology;
use bitvec::prelude::*;
use rand::Rng;
use rand::distributions::{Distribution, Standard};

/// Capability shared by the protocol variants.
///
/// Given an RNG, a cluster layout (which fixes the topology, the cluster
/// radius, the GHZ size and the endpoints) and the success probabilities,
/// produce the reduced graph of one trial.
pub trait Protocol: Sync {
    fn fuse<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        layout: &ClusterLayout<'_>,
        p: f64,
        q: f64,
    ) -> FusionResult;
}

/// A protocol step exposed to decoherence, with the geometry that sets its
/// time budget.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Step {
    /// GHZ assembly of a cluster from `ghz_states` elementary states spread
    /// over `extent`.
    Cluster { ghz_states: usize, extent: f64 },
    /// Fusion across a cut link of the given physical length.
    Link { length: f64 },
    /// Endpoint attachment at the given distance from the cluster centre.
    Attach { distance: f64 },
}

/// Bernoulli draw consuming exactly one uniform.
fn bernoulli<R: Rng + ?Sized>(rng: &mut R, prob: f64) -> bool {
    let u: f64 = Standard.sample(rng);
    u < prob
}

/// Runs the three protocol stages over `layout`.
///
/// `survives` decides whether a step outlives decoherence; the plain
/// variant passes a closure that always succeeds without drawing.
fn fuse_layout<R, S>(rng: &mut R, layout: &ClusterLayout<'_>, p: f64, q: f64, mut survives: S) -> FusionResult
where
    R: Rng + ?Sized,
    S: FnMut(&mut R, Step) -> bool,
{
    let clusters = layout.clusters();
    let alice_vertex = clusters.len();
    let bob_vertex = clusters.len() + 1;
    let mut graph = FusedGraph::with_vertices(clusters.len() + 2);
    let mut ready = bitvec![0; clusters.len()];

    for (id, cluster) in clusters.iter().enumerate() {
        let mut ok = true;
        for _ in 0..cluster.ghz_states {
            ok &= bernoulli(rng, q);
        }
        for _ in 1..cluster.ghz_states {
            ok &= bernoulli(rng, p);
        }
        ok &= survives(
            rng,
            Step::Cluster {
                ghz_states: cluster.ghz_states,
                extent: cluster.extent,
            },
        );
        ready.set(id, ok);
    }

    for link in layout.cut_links() {
        let fused = bernoulli(rng, p);
        let kept = survives(rng, Step::Link { length: link.length });
        let (a, b) = link.clusters;
        if fused && kept && ready[a] && ready[b] {
            graph.add_edge(a, b);
        }
    }

    let Endpoints { alice, bob } = layout.endpoints();
    for (vertex, endpoint) in [(alice_vertex, alice), (bob_vertex, bob)] {
        let fused = bernoulli(rng, p);
        let kept = survives(
            rng,
            Step::Attach {
                distance: layout.distance_to_centre(endpoint),
            },
        );
        let cluster = layout.cluster_of(endpoint);
        if fused && kept && ready[cluster] {
            graph.add_edge(vertex, cluster);
        }
    }

    FusionResult {
        graph,
        alice_vertices: vec![alice_vertex],
        bob_vertices: vec![bob_vertex],
    }
}

/// Runs one trial straight from a topology, building the layout on the fly.
///
/// Convenient for single experiments; sweeps should build the
/// [`ClusterLayout`] once per radius and call [`Protocol::fuse`] directly.
#[allow(clippy::too_many_arguments)]
pub fn fuse_once<P, R>(
    protocol: &P,
    rng: &mut R,
    topology: &Topology,
    k: usize,
    ghz_size: usize,
    p: f64,
    q: f64,
    endpoints: Endpoints,
) -> Result<FusionResult, SimError>
where
    P: Protocol,
    R: Rng + ?Sized,
{
    let layout = ClusterLayout::new(topology, k, ghz_size, endpoints)?;
    Ok(protocol.fuse(rng, &layout, p, q))
}
