mod comm;
mod driver;
mod seed;

use anyhow::{Context, Result, bail};
use clap::Parser;
use comm::{Communicator, Solo, TcpWorld, local_world};
use driver::{ProtocolKind, SweepConfig};
use fsim_common::defaults::{
    ALICE, BOB, GHZ_SIZE, GRID_SIDE, OUTPUT_DIR, PARAMETER_FILE, TRIALS,
};
use fsim_common::timing::{OP_TIME, SIGNAL_SPEED};
use fsim_common::wire::ROOT_ADDR;
use fsim_core::cluster::Endpoints;
use fsim_core::protocol::Timing;
use fsim_core::topologies::{split_square_grid, square_grid};
use fsim_core::topology::Topology;
use fsim_io::params::{ParsedParameters, load_parameter_file};
use fsim_io::results::{ResultFiles, RunTag};
use std::path::PathBuf;
use std::thread;
use tracing::{info, warn};

/// Monte-Carlo simulator of a GHZ-fusion quantum repeater network.
#[derive(Parser, Debug)]
#[command(name = "fsim")]
struct Cli {
    /// Parameter file listing the k, p, q and mu values to sweep.
    #[arg(long, default_value = PARAMETER_FILE)]
    params: PathBuf,

    /// Directory receiving one result table per mu.
    #[arg(long, default_value = OUTPUT_DIR)]
    out_dir: PathBuf,

    #[arg(long, default_value_t = GRID_SIDE)]
    grid_side: usize,

    /// Cut a diamond-shaped slit of this radius around the grid centre.
    #[arg(long)]
    defect_radius: Option<usize>,

    /// Trials per (p, q) combination, at least one.
    #[arg(long, default_value_t = TRIALS as u64, value_parser = clap::value_parser!(u64).range(1..))]
    trials: u64,

    /// Qubits per elementary GHZ state, at least two.
    #[arg(long, default_value_t = GHZ_SIZE)]
    ghz_size: usize,

    #[arg(long, default_value_t = ALICE)]
    alice: usize,

    #[arg(long, default_value_t = BOB)]
    bob: usize,

    #[arg(long, value_enum, default_value_t = ProtocolKind::Decohere)]
    protocol: ProtocolKind,

    #[arg(long, default_value_t = OP_TIME)]
    op_time: f64,

    #[arg(long, default_value_t = SIGNAL_SPEED)]
    signal_speed: f64,

    /// Worker threads per process (defaults to one per core).
    #[arg(long)]
    threads: Option<usize>,

    /// Base seed; the wall clock is used when absent.
    #[arg(long, env = "FSIM_SEED")]
    seed: Option<u64>,

    #[arg(long, env = "FSIM_RANK", default_value_t = 0)]
    rank: usize,

    #[arg(long, env = "FSIM_WORLD_SIZE", default_value_t = 1)]
    world_size: usize,

    /// Address the root rank listens on and peers connect to.
    #[arg(long, env = "FSIM_ROOT_ADDR", default_value = ROOT_ADDR)]
    root_addr: String,

    /// Run this many ranks as threads of the current process.
    #[arg(long)]
    local_ranks: Option<usize>,
}

fn build_topology(cli: &Cli) -> Result<Topology> {
    let topology = match cli.defect_radius {
        Some(radius) => split_square_grid(cli.grid_side, radius),
        None => square_grid(cli.grid_side),
    }
    .context("Failed to build topology")?;

    let n = topology.num_vertices();
    for (name, vertex) in [("alice", cli.alice), ("bob", cli.bob)] {
        if vertex >= n {
            bail!("{name} = {vertex} is not a node of a topology with {n} nodes");
        }
    }
    Ok(topology)
}

/// Everything a rank needs besides its communicator.
struct Job<'a> {
    topology: &'a Topology,
    params: &'a ParsedParameters,
    kind: ProtocolKind,
    config: SweepConfig,
    out_dir: &'a PathBuf,
    tag: RunTag,
}

fn run_rank<C: Communicator>(comm: &mut C, job: &Job<'_>) -> Result<()> {
    let root = comm.is_root();
    if root {
        for warning in &job.params.warnings {
            warn!("{warning}");
        }
        let grid = &job.params.grid;
        if grid.k.is_empty() || grid.p.is_empty() || grid.q.is_empty() {
            warn!("parameter grid has no (k, p, q) combination, tables will be empty");
        }
    }

    let mut files = ResultFiles::new(job.out_dir, job.tag);
    let summary = driver::sweep(
        comm,
        job.topology,
        &job.params.grid,
        job.kind,
        &job.config,
        &mut files,
    )?;

    if root {
        for path in files.written() {
            info!(path = %path.display(), "wrote results");
        }
    }
    info!(
        rank = comm.rank(),
        tables = summary.tables,
        trials = summary.trials,
        seconds = summary.elapsed.as_secs_f64(),
        "rank finished"
    );
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure worker threads")?;
    }

    let topology = build_topology(&cli)?;
    info!(
        nodes = topology.num_vertices(),
        links = topology.graph().num_edges(),
        "topology ready"
    );
    let params = load_parameter_file(&cli.params)?;

    let seed = cli.seed.unwrap_or_else(seed::clock_seed);
    let job = Job {
        topology: &topology,
        params: &params,
        kind: cli.protocol,
        config: SweepConfig {
            trials: cli.trials,
            lanes: rayon::current_num_threads(),
            seed,
            ghz_size: cli.ghz_size,
            endpoints: Endpoints {
                alice: cli.alice,
                bob: cli.bob,
            },
            timing: Timing {
                op_time: cli.op_time,
                signal_speed: cli.signal_speed,
            },
        },
        out_dir: &cli.out_dir,
        tag: RunTag {
            size: cli.grid_side,
            alice: cli.alice,
            bob: cli.bob,
        },
    };
    job.config.validate().context("Invalid run configuration")?;
    info!(seed, protocol = ?cli.protocol, trials = cli.trials, "starting sweep");

    match (cli.local_ranks, cli.world_size) {
        (Some(_), size) if size > 1 => {
            bail!("--local-ranks cannot be combined with a world size of {size}")
        }
        (Some(0), _) => bail!("--local-ranks must be at least one"),
        (Some(n), _) => thread::scope(|s| {
            let handles: Vec<_> = local_world(n)
                .into_iter()
                .map(|mut comm| {
                    let job = &job;
                    s.spawn(move || run_rank(&mut comm, job))
                })
                .collect();
            handles.into_iter().try_for_each(|h| match h.join() {
                Ok(result) => result,
                Err(_) => bail!("a local rank panicked"),
            })
        }),
        (None, 1) => run_rank(&mut Solo, &job),
        (None, size) => {
            let mut world = TcpWorld::establish(cli.rank, size, &cli.root_addr)
                .context("Failed to join the distributed run")?;
            info!(rank = world.rank(), size, "joined world");
            run_rank(&mut world, &job)
        }
    }
}
