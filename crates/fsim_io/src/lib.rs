//! I/O utilities for simulation parameters and result tables.
//!
//! Provides the reader for the line-oriented parameter file that drives a
//! sweep and the sinks that receive the success-rate rows it produces.
//! These utilities keep file formats out of the core crate.

/// Parser for the parameter file.
///
/// Reads `k`, `p`, `q` and `mu` directives into a deduplicated, sorted
/// parameter grid. Malformed input is reported as warnings rather than
/// errors so a single bad line never stops a run.
pub mod params;

/// Result-table sinks.
///
/// Writes one tab-separated table per decoherence scale, or collects rows
/// in memory for inspection.
pub mod results;
