use super::{Protocol, fuse_layout};
use crate::cluster::ClusterLayout;
use crate::graph::FusionResult;
use rand::Rng;

/// Plain fusion protocol: only the Bernoulli `p`/`q` draws decide outcomes.
#[derive(Clone, Copy, Debug, Default)]
pub struct Fusion;

impl Protocol for Fusion {
    fn fuse<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        layout: &ClusterLayout<'_>,
        p: f64,
        q: f64,
    ) -> FusionResult {
        fuse_layout(rng, layout, p, q, |_, _| true)
    }
}
