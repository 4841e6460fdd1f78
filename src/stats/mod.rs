//! Statistics collection and reporting module
//!
//! This module provides functionality for tracking and reporting mining statistics,
//! including:
//! - Routing shares between the two payout addresses
//! - Hashrate calculations
//! - Hardware monitoring (CPU, memory, temperature)
//!
//! [`ShareDistributor`] does the accounting; [`StatsReporter`] listens to the
//! resulting events and writes them to the log alongside hardware figures.
//!

/// Share routing and hashrate accounting
pub mod distributor;

/// Submodule containing the statistics reporter implementation
///
/// The reporter handles:
/// - Hardware monitoring
/// - Logging hashrate reports and status messages as they arrive
pub mod reporter;

// Re-export main components
pub use distributor::{PayoutSplit, Payout, ShareDistributor};
pub use reporter::{HardwareStats, StatsReporter};
