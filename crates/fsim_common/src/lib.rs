//! Common definitions and constants shared across the fusion simulator.
//!
//! This crate provides the default experiment constants (network size,
//! endpoint locations, trial counts), the timing constants used by the
//! decoherence-aware protocol, and the wire constants of the distributed
//! reduction. Host tools and the core crate both read from here so that a
//! default run is fully described in one place.

#![no_std]

/// Default experiment layout for a simulation run.
///
/// These values reproduce the reference experiment: a 100x100 square grid
/// with Alice and Bob placed on two interior nodes, 1500 trials per
/// parameter combination and GHZ clusters of four qubits.
pub mod defaults {
    /// Side length of the default square grid topology.
    ///
    /// The grid has `GRID_SIDE * GRID_SIDE` physical nodes. Larger grids
    /// increase the cost of each trial linearly in the number of edges.
    pub const GRID_SIDE: usize = 100;

    /// Distance between neighbouring grid nodes in position units.
    ///
    /// Used when laying out node positions and, through the signal speed,
    /// when converting link lengths into waiting times.
    pub const GRID_SPACING: f64 = 10.0;

    /// Number of Monte-Carlo trials per (p, q) combination.
    pub const TRIALS: usize = 1500;

    /// Number of qubits taking part in one elementary GHZ state.
    ///
    /// Larger clusters need fewer local fusions to cover their boundary.
    /// Must be at least two.
    pub const GHZ_SIZE: usize = 4;

    /// Physical node housing Alice in the default topology.
    pub const ALICE: usize = 3939;

    /// Physical node housing Bob in the default topology.
    pub const BOB: usize = 7979;

    /// Parameter file read when no path is given on the command line.
    pub const PARAMETER_FILE: &str = "./parameters.txt";

    /// Directory receiving one result table per decoherence scale.
    pub const OUTPUT_DIR: &str = "./out";
}

/// Timing model of the decoherence-aware protocol.
///
/// Every protocol step has a time budget: a fixed local operation time plus
/// the classical signalling delay across the distance involved. An
/// entangled resource survives the step only if its sampled lifetime
/// exceeds that budget.
pub mod timing {
    /// Duration of one local operation (GHZ preparation or fusion).
    pub const OP_TIME: f64 = 1.0;

    /// Signal speed in position units per time unit.
    ///
    /// With the default grid spacing one hop costs one time unit.
    pub const SIGNAL_SPEED: f64 = 10.0;
}

/// Constants of the distributed counter reduction.
pub mod wire {
    /// Rank that receives the reduced counters and writes the output.
    pub const ROOT_RANK: usize = 0;

    /// Magic word opening every TCP handshake ("FSIM").
    pub const HANDSHAKE_MAGIC: u32 = 0x4653_494D;

    /// Default address the root rank listens on.
    pub const ROOT_ADDR: &str = "127.0.0.1:47000";

    /// Seconds a peer keeps retrying to reach the root before giving up.
    pub const CONNECT_TIMEOUT_SECS: u64 = 30;
}
