//! Core algorithms of the GHZ-fusion repeater simulation.
//!
//! This crate turns a physical network topology and a stream of random
//! draws into the reduced connectivity graph of one protocol trial, and
//! decides whether that trial entangled the two endpoints. Everything here
//! is deterministic given the RNG, so the host can parallelise trials
//! freely and still reason about the aggregate.

/// Clustering of the physical graph for one cluster radius.
///
/// Partitions the nodes into BFS balls, collects the links cut by the
/// partition and sizes the GHZ resources each cluster needs. A layout is
/// built once per radius and shared by all trials.
pub mod cluster;

/// Disjoint set union used by the connectivity oracle.
///
/// Slice-backed union-find with path halving and union by rank, so the
/// oracle can keep its buffers between trials.
pub mod dsu;

/// Reduced graph produced by one protocol trial.
///
/// A flat edge list over cluster and endpoint vertices, together with the
/// vertex sets that stand for Alice and Bob.
pub mod graph;

/// Connectivity oracle deciding whether a trial succeeded.
pub mod oracle;

/// Contiguous partition of trial indices across distributed workers.
pub mod partition;

/// Fusion protocols: the plain variant and the decoherence-aware variant.
///
/// Both implement the [`protocol::Protocol`] capability and share the same
/// draw order, which makes runs with equal seeds directly comparable.
pub mod protocol;

/// One complete trial: protocol run followed by the oracle check.
pub mod sim;

/// Regular grid and grid-with-slit topology generators.
pub mod topologies;

/// Immutable physical topology with connection numbering.
pub mod topology;

/// Planar point type for node positions.
pub mod vec2;

use thiserror::Error;

/// Errors raised while building a topology.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// The position list does not have one entry per vertex.
    #[error("topology has {vertices} vertices but {positions} positions")]
    PositionCount { vertices: usize, positions: usize },

    /// An edge references a vertex that does not exist.
    #[error("edge {edge} references missing vertex {vertex}")]
    EdgeOutOfRange { edge: usize, vertex: usize },

    /// A grid generator was asked for a grid without nodes.
    #[error("grid side must be at least one")]
    EmptyGrid,

    /// The slit of a split grid does not fit inside the grid.
    #[error("defect radius {radius} does not fit inside a grid of side {side}")]
    DefectTooLarge { side: usize, radius: usize },
}

/// Errors raised while preparing a protocol run.
///
/// These describe parameter combinations for which no trial can be built.
/// The driver counts every trial of such a combination as a failure rather
/// than skipping it, so success rates keep their denominators.
#[derive(Debug, Error)]
pub enum SimError {
    /// Cluster radius zero leaves no room for a cluster.
    #[error("cluster radius must be at least one")]
    InvalidRadius,

    /// A GHZ state needs at least two qubits to be fused.
    #[error("GHZ size {0} is too small, at least two qubits are needed")]
    GhzTooSmall(usize),

    /// Alice or Bob is not a node of the topology.
    #[error("endpoint {vertex} is not a node of a topology with {vertices} nodes")]
    EndpointOutOfRange { vertex: usize, vertices: usize },

    /// The decoherence scale is negative or not a number.
    #[error("decoherence mean {0} must be a non-negative number")]
    InvalidLifetime(f64),
}
