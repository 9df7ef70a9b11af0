//! Monte-Carlo sweep over the parameter grid.
//!
//! For every decoherence scale `mu` and cluster radius `k`, the
//! `trials * |p| * |q|` trials of the (p, q) grid are laid out as one index
//! space in which trial `i` belongs to combination `i / trials`. Each rank
//! takes its contiguous slice of that space and splits it further into
//! lanes, one per worker thread. Lanes keep their random stream and oracle
//! for the whole sweep; successes land in per-combination atomic counters
//! that are summed onto the root after every radius.

use crate::comm::Communicator;
use crate::seed::lane_seed;
use anyhow::{Context, Result, bail};
use fsim_core::cluster::{ClusterLayout, Endpoints};
use fsim_core::oracle::ConnectivityOracle;
use fsim_core::partition::work_range;
use fsim_core::protocol::{DecoheringFusion, Fusion, Protocol, Timing};
use fsim_core::sim::NetworkSim;
use fsim_core::topology::Topology;
use fsim_io::params::ParameterGrid;
use fsim_io::results::{ResultRow, RowSink};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Which fusion protocol a sweep evaluates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ProtocolKind {
    /// Fusion without decoherence; produces a single table tagged `mu = inf`.
    Plain,
    /// Fusion racing exponential resource lifetimes, one table per `mu`.
    Decohere,
}

/// Settings shared by every table of a sweep.
#[derive(Clone, Copy, Debug)]
pub struct SweepConfig {
    /// Trials per (p, q) combination across the whole world.
    pub trials: u64,
    /// Worker lanes per rank.
    pub lanes: usize,
    /// Base seed from which every lane seed is derived.
    pub seed: u64,
    pub ghz_size: usize,
    pub endpoints: Endpoints,
    pub timing: Timing,
}

impl SweepConfig {
    /// Rejects settings that would make every table meaningless.
    ///
    /// Failures that depend on a single radius are not checked here; the
    /// sweep counts those as failed trials instead.
    pub fn validate(&self) -> Result<()> {
        if self.trials == 0 {
            bail!("trials per combination must be at least one");
        }
        if self.ghz_size < 2 {
            bail!(
                "GHZ size {} is too small, at least two qubits are needed",
                self.ghz_size
            );
        }
        Ok(())
    }
}

/// What a rank did during a sweep.

#[derive(Clone, Copy, Debug, Default)]
pub struct SweepSummary {
    pub tables: usize,
    /// Trials run by this rank.
    pub trials: u64,
    pub elapsed: Duration,
}

/// Per-lane state that lives for the whole sweep.
struct Lane {
    rng: ChaCha8Rng,
    oracle: ConnectivityOracle,
}

/// Success rate of a combination: successes over `trials * k`.
pub fn success_rate(successes: u64, trials: u64, k: usize) -> f64 {
    successes as f64 / (trials as f64 * k as f64)
}

/// Decoherence scales the sweep produces tables for.
pub fn table_scales(kind: ProtocolKind, grid: &ParameterGrid) -> Vec<f64> {
    match kind {
        ProtocolKind::Plain => vec![f64::INFINITY],
        ProtocolKind::Decohere if grid.mu.is_empty() => vec![f64::INFINITY],
        ProtocolKind::Decohere => grid.mu.iter().collect(),
    }
}

/// Runs the full sweep on this rank.
///
/// Every rank must call this with the same topology, grid and config except
/// for its communicator. Only the root feeds `sink`.
///
/// # Returns
///
/// A summary of the local work, or an error if a reduction or the sink
/// fails.
pub fn sweep<C, S>(
    comm: &mut C,
    topology: &Topology,
    grid: &ParameterGrid,
    kind: ProtocolKind,
    config: &SweepConfig,
    sink: &mut S,
) -> Result<SweepSummary>
where
    C: Communicator,
    S: RowSink,
{
    config.validate()?;
    let root = comm.is_root();
    if root && kind == ProtocolKind::Decohere && grid.mu.is_empty() {
        warn!("no mu values given, running without decoherence (mu = inf)");
    }

    let lanes = config.lanes.max(1);
    let mut lanes: Vec<Lane> = (0..lanes)
        .map(|lane| Lane {
            rng: ChaCha8Rng::seed_from_u64(lane_seed(config.seed, comm.rank(), lane)),
            oracle: ConnectivityOracle::new(),
        })
        .collect();

    let combos = grid.combinations();
    let start = Instant::now();
    let mut summary = SweepSummary::default();

    for mu in table_scales(kind, grid) {
        if root {
            sink.begin_table(mu)?;
        }
        for &k in &grid.k {
            let table_start = Instant::now();
            let layout = match ClusterLayout::new(topology, k, config.ghz_size, config.endpoints) {
                Ok(layout) => Some(layout),
                Err(e) => {
                    if root {
                        warn!(k, error = %e, "no valid layout, counting every trial as failed");
                    }
                    None
                }
            };

            let (local, ran) = match (&layout, kind) {
                (None, _) => (vec![0; combos.len()], 0),
                (Some(layout), ProtocolKind::Plain) => {
                    let sim = NetworkSim::new(Fusion);
                    run_trials(comm, &sim, layout, &combos, config.trials, &mut lanes)?
                }
                (Some(layout), ProtocolKind::Decohere) => {
                    let protocol = DecoheringFusion::new(mu, config.timing)
                        .with_context(|| format!("Invalid decoherence scale {mu}"))?;
                    let sim = NetworkSim::new(protocol);
                    run_trials(comm, &sim, layout, &combos, config.trials, &mut lanes)?
                }
            };
            summary.trials += ran;

            let Some(total) = comm.reduce_sum(&local)? else {
                continue;
            };
            let seconds = table_start.elapsed().as_secs_f64();
            info!(
                mu,
                k,
                trials = ran,
                seconds,
                throughput = ran as f64 / seconds.max(f64::MIN_POSITIVE),
                "radius finished"
            );
            for (&(p, q), &successes) in combos.iter().zip(&total) {
                sink.push_row(&ResultRow {
                    mu,
                    k,
                    p,
                    q,
                    rate: success_rate(successes, config.trials, k),
                })?;
            }
        }
        if root {
            sink.finish_table()?;
        }
        summary.tables += 1;
    }

    summary.elapsed = start.elapsed();
    Ok(summary)
}

/// Runs this rank's share of one radius and returns the per-combination
/// success counts together with the number of trials run.
fn run_trials<C, P>(
    comm: &C,
    sim: &NetworkSim<P>,
    layout: &ClusterLayout<'_>,
    combos: &[(f64, f64)],
    trials: u64,
    lanes: &mut [Lane],
) -> Result<(Vec<u64>, u64)>
where
    C: Communicator,
    P: Protocol,
{
    let per_combo = usize::try_from(trials).context("Trial count does not fit in memory")?;
    let n_tasks = per_combo
        .checked_mul(combos.len())
        .with_context(|| format!("{trials} trials over {} combinations overflow", combos.len()))?;
    let mine = work_range(comm.rank(), comm.size(), n_tasks);
    let counters: Vec<AtomicU64> = combos.iter().map(|_| AtomicU64::new(0)).collect();
    let n_lanes = lanes.len();

    lanes.par_iter_mut().enumerate().for_each(|(i, lane)| {
        let share = work_range(i, n_lanes, mine.len());
        for index in share.start + mine.start..share.end + mine.start {
            let slot = index / per_combo;
            let (p, q) = combos[slot];
            if sim.run(&mut lane.rng, layout, p, q, &mut lane.oracle) > 0 {
                counters[slot].fetch_add(1, Ordering::Relaxed);
            }
        }
    });

    let counts = counters.into_iter().map(AtomicU64::into_inner).collect();
    Ok((counts, mine.len() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{Solo, local_world};
    use fsim_core::topologies::square_grid;
    use fsim_io::params::parse_parameters;
    use std::thread;

    fn config(trials: u64, lanes: usize, endpoints: Endpoints) -> SweepConfig {
        SweepConfig {
            trials,
            lanes,
            seed: 11,
            ghz_size: 4,
            endpoints,
            timing: Timing::default(),
        }
    }

    const CORNERS_3: Endpoints = Endpoints { alice: 0, bob: 8 };

    #[test]
    fn certain_fusions_give_unit_rate_at_unit_radius() {
        let grid_topology = square_grid(3).unwrap();
        let grid = parse_parameters("k 1\np 1\nq 1\n").grid;
        let mut rows = Vec::new();
        let summary = sweep(
            &mut Solo,
            &grid_topology,
            &grid,
            ProtocolKind::Plain,
            &config(200, 3, CORNERS_3),
            &mut rows,
        )
        .unwrap();

        assert_eq!(summary.tables, 1);
        assert_eq!(summary.trials, 200);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].mu.is_infinite());
        assert_eq!(rows[0].rate, 1.0);
    }

    // The rate divides by trials * k, not trials alone. This follows the
    // reference runs and still has to be confirmed against the physical
    // model before the tables are read as per-trial probabilities.
    #[test]
    fn rate_is_divided_by_radius() {
        let topology = square_grid(3).unwrap();
        let grid = parse_parameters("k 2 4\np 1\nq 1\n").grid;
        let mut rows = Vec::new();
        sweep(
            &mut Solo,
            &topology,
            &grid,
            ProtocolKind::Plain,
            &config(100, 2, CORNERS_3),
            &mut rows,
        )
        .unwrap();

        let rates: Vec<_> = rows.iter().map(|r| (r.k, r.rate)).collect();
        assert_eq!(rates, vec![(2, 0.5), (4, 0.25)]);
    }

    #[test]
    fn zero_probabilities_give_zero_rate() {
        let topology = square_grid(3).unwrap();
        let grid = parse_parameters("k 1 2\np 0 1\nq 0 1\nmu 5 50\n").grid;
        let mut rows = Vec::new();
        sweep(
            &mut Solo,
            &topology,
            &grid,
            ProtocolKind::Decohere,
            &config(50, 2, CORNERS_3),
            &mut rows,
        )
        .unwrap();

        // two tables, two radii, four combinations
        assert_eq!(rows.len(), 2 * 2 * 4);
        for row in &rows {
            if row.p == 0.0 || row.q == 0.0 {
                assert_eq!(row.rate, 0.0, "{row:?}");
            }
        }
        assert_eq!(rows[0].mu, 5.0);
        assert_eq!(rows[8].mu, 50.0);
    }

    #[test]
    fn invalid_layout_counts_as_failure() {
        let topology = square_grid(3).unwrap();
        let grid = parse_parameters("k 1\np 1\nq 1\n").grid;
        let mut rows = Vec::new();
        let outside = Endpoints { alice: 0, bob: 99 };
        sweep(
            &mut Solo,
            &topology,
            &grid,
            ProtocolKind::Plain,
            &config(10, 1, outside),
            &mut rows,
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rate, 0.0);
    }

    #[test]
    fn too_small_ghz_size_is_rejected_before_any_table() {
        let topology = square_grid(3).unwrap();
        let grid = parse_parameters("k 1\np 1\nq 1\n").grid;
        for ghz_size in [0, 1] {
            let mut rows = Vec::new();
            let config = SweepConfig {
                ghz_size,
                ..config(100, 1, CORNERS_3)
            };
            let err = sweep(&mut Solo, &topology, &grid, ProtocolKind::Plain, &config, &mut rows)
                .unwrap_err();
            assert!(err.to_string().contains("GHZ size"), "{err}");
            assert!(rows.is_empty());
        }
    }

    #[test]
    fn zero_trials_are_rejected() {
        let topology = square_grid(3).unwrap();
        let grid = parse_parameters("k 1\np 1\nq 1\n").grid;
        let mut rows = Vec::new();
        let result = sweep(
            &mut Solo,
            &topology,
            &grid,
            ProtocolKind::Plain,
            &config(0, 1, CORNERS_3),
            &mut rows,
        );
        assert!(result.is_err());
        assert!(rows.is_empty());
    }

    #[test]
    fn overflowing_trial_space_is_an_error() {
        let topology = square_grid(3).unwrap();
        let grid = parse_parameters("k 1\np 0.5 1\nq 1\n").grid;
        let mut rows = Vec::new();
        let result = sweep(
            &mut Solo,
            &topology,
            &grid,
            ProtocolKind::Plain,
            &config(u64::MAX, 1, CORNERS_3),
            &mut rows,
        );
        assert!(result.is_err());
        assert!(rows.is_empty());
    }

    #[test]
    fn missing_mu_falls_back_to_infinity() {
        let grid = parse_parameters("k 1\np 1\nq 1\n").grid;
        assert_eq!(table_scales(ProtocolKind::Decohere, &grid), vec![f64::INFINITY]);
        let grid = parse_parameters("mu 3 1\n").grid;
        assert_eq!(table_scales(ProtocolKind::Decohere, &grid), vec![1.0, 3.0]);
        assert_eq!(table_scales(ProtocolKind::Plain, &grid), vec![f64::INFINITY]);
    }

    #[test]
    fn ranks_share_trials_and_root_sees_totals() {
        let topology = square_grid(3).unwrap();
        let grid = parse_parameters("k 1\np 1 0.5\nq 1\n").grid;
        let world = local_world(3);

        let results: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = world
                .into_iter()
                .map(|mut comm| {
                    let topology = &topology;
                    let grid = &grid;
                    s.spawn(move || {
                        let mut rows = Vec::new();
                        let summary = sweep(
                            &mut comm,
                            topology,
                            grid,
                            ProtocolKind::Plain,
                            &config(101, 2, CORNERS_3),
                            &mut rows,
                        )
                        .unwrap();
                        (summary.trials, rows)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let trials: u64 = results.iter().map(|(t, _)| t).sum();
        assert_eq!(trials, 2 * 101);
        assert!(results[1..].iter().all(|(_, rows)| rows.is_empty()));

        let rows = &results[0].1;
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].p, rows[1].p), (0.5, 1.0));
        assert_eq!(rows[1].rate, 1.0);
        assert!(rows[0].rate < 1.0);
    }

    #[test]
    fn lane_count_does_not_change_certain_outcomes() {
        let topology = square_grid(4).unwrap();
        let grid = parse_parameters("k 1 2 3\np 1\nq 1\n").grid;
        let corners = Endpoints { alice: 0, bob: 15 };
        for lanes in [1, 4, 7] {
            let mut rows = Vec::new();
            sweep(
                &mut Solo,
                &topology,
                &grid,
                ProtocolKind::Plain,
                &config(30, lanes, corners),
                &mut rows,
            )
            .unwrap();
            for row in &rows {
                assert_eq!(row.rate, 1.0 / row.k as f64, "lanes {lanes}, k {}", row.k);
            }
        }
    }
}
