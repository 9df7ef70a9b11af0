//! Decoherence-aware fusion.
//!
//! Each protocol step races the lifetime of the entangled resource against
//! the time the step needs. Lifetimes are exponential with mean `mu`; a step
//! is kept only if its sampled lifetime exceeds the step's budget, on top of
//! the usual Bernoulli draws.

use super::{Protocol, Step, fuse_layout};
use crate::SimError;
use crate::cluster::ClusterLayout;
use crate::graph::FusionResult;
use fsim_common::timing::{OP_TIME, SIGNAL_SPEED};
use rand::Rng;
use rand_distr::{Distribution, Exp};

/// Time model converting protocol steps into waiting-time budgets.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timing {
    /// Duration of one local operation.
    pub op_time: f64,
    /// Classical signal speed in position units per time unit.
    pub signal_speed: f64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            op_time: OP_TIME,
            signal_speed: SIGNAL_SPEED,
        }
    }
}

impl Timing {
    /// Time a step must survive.
    ///
    /// A cluster pays one operation per elementary GHZ state plus the delay
    /// across its extent; links and attachments pay one operation plus the
    /// delay across their length.
    pub fn budget(&self, step: Step) -> f64 {
        match step {
            Step::Cluster { ghz_states, extent } => {
                self.op_time * ghz_states as f64 + extent / self.signal_speed
            }
            Step::Link { length } => self.op_time + length / self.signal_speed,
            Step::Attach { distance } => self.op_time + distance / self.signal_speed,
        }
    }
}

/// Fusion protocol with exponentially distributed resource lifetimes.
///
/// An infinite mean is stored as `None`: resources never decohere and no
/// lifetime is drawn, so such a run consumes the same draws as [`Fusion`]
/// and reproduces it exactly for equal seeds.
///
/// [`Fusion`]: super::Fusion
#[derive(Clone, Copy, Debug)]
pub struct DecoheringFusion {
    lifetime: Option<Exp<f64>>,
    timing: Timing,
}

impl DecoheringFusion {
    /// Creates the protocol for decoherence mean `mu`.
    ///
    /// `mu = 0` makes every step fail; `mu = inf` makes every step survive,
    /// which reproduces the plain protocol's statistics.
    ///
    /// # Returns
    ///
    /// The protocol, or an error if `mu` is negative or NaN.
    pub fn new(mu: f64, timing: Timing) -> Result<Self, SimError> {
        if mu.is_nan() || mu < 0.0 {
            return Err(SimError::InvalidLifetime(mu));
        }
        let lifetime = if mu.is_infinite() {
            None
        } else {
            Some(Exp::new(mu.recip()).map_err(|_| SimError::InvalidLifetime(mu))?)
        };
        Ok(Self { lifetime, timing })
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }
}

impl Protocol for DecoheringFusion {
    fn fuse<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        layout: &ClusterLayout<'_>,
        p: f64,
        q: f64,
    ) -> FusionResult {
        match &self.lifetime {
            Some(lifetime) => fuse_layout(rng, layout, p, q, |rng, step| {
                lifetime.sample(rng) > self.timing.budget(step)
            }),
            None => fuse_layout(rng, layout, p, q, |_, _| true),
        }
    }
}
