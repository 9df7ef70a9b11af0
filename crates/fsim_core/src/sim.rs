//! Single-trial network simulation.
//!
//! Couples a protocol with the connectivity oracle: run the protocol on the
//! layout, then count the components joining Alice and Bob.

use crate::cluster::ClusterLayout;
use crate::oracle::ConnectivityOracle;
use crate::protocol::Protocol;
use rand::Rng;

/// A protocol ready to be evaluated trial by trial.
#[derive(Clone, Debug, Default)]
pub struct NetworkSim<P> {
    protocol: P,
}

impl<P: Protocol> NetworkSim<P> {
    pub fn new(protocol: P) -> Self {
        Self { protocol }
    }

    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    /// Runs one trial and returns the number of components holding both
    /// endpoints (zero on failure).
    ///
    /// # Arguments
    ///
    /// * `rng` - Caller-owned random stream, advanced by the trial
    /// * `layout` - Cluster layout of the current radius
    /// * `p` - Fusion success probability
    /// * `q` - GHZ preparation success probability
    /// * `oracle` - Scratch oracle reused across the caller's trials
    pub fn run<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        layout: &ClusterLayout<'_>,
        p: f64,
        q: f64,
        oracle: &mut ConnectivityOracle,
    ) -> usize {
        let result = self.protocol.fuse(rng, layout, p, q);
        oracle.count_connected(&result)
    }
}
