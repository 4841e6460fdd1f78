// src/network/mod.rs
//! Work sources and share sinks
//!
//! The mining core only talks to the outside world through two traits:
//! - [`JobSource`]: hands each worker its next job
//! - [`ShareSubmitter`]: forwards a found share for a payout address
//!
//! Two implementations ship with the crate:
//! - `PoolClient` / `PoolWork`: a Stratum-style JSON pool over WebSocket
//! - `LocalJobSource` / `LogSubmitter`: offline work that never touches the network

use crate::miner::cancel::CancelToken;
use crate::types::{MiningJob, MiningResult};
use crate::utils::error::MinerError;

/// Mining pool client implementation
///
/// Handles communication with mining pools using a Stratum-style protocol.
/// Manages the WebSocket connection, job distribution, and share submission.
pub mod pool;

/// Offline job source and logging submitter
pub mod local;

/// Supplies jobs to worker threads
///
/// Called concurrently from every worker. Implementations may block
/// (network I/O, waiting for the first job) but should return promptly
/// once `cancel` fires.
pub trait JobSource: Send + Sync {
    /// Fetches the next job for the calling worker
    ///
    /// # Returns
    /// * `Ok(Some(job))` - Work to search
    /// * `Ok(None)` - Nothing available yet; the worker will ask again
    /// * `Err(MinerError)` - Unexpected failure; the worker backs off and retries
    fn next_job(&self, cancel: &CancelToken) -> Result<Option<MiningJob>, MinerError>;
}

/// Forwards found shares to the pool
///
/// Retrying failed submissions is the submitter's own business; the caller
/// only logs the error.
pub trait ShareSubmitter: Send + Sync {
    /// Submits `result` for `job`, credited to `address`
    fn submit(&self, address: &str, result: &MiningResult, job: &MiningJob)
    -> Result<(), MinerError>;
}

// Re-export main components for cleaner imports
pub use local::{LocalJobSource, LogSubmitter};
pub use pool::{PoolClient, PoolConfig, PoolWork};
