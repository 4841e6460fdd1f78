//! Split Miner - multi-threaded CPU proof-of-work miner in Rust
//!
//! This crate searches nonce ranges for candidates whose digest meets a
//! target and splits the resulting shares between two payout addresses:
//! - A two-stage SHA-256 digest behind a swappable [`PowHash`] trait
//! - Worker threads managed by a start/stop/pause/resume orchestrator
//! - Random or quota-based share splitting with hashrate reporting
//! - Pool (WebSocket JSON) and offline work sources
//! - Fullscreen auto-pause, interactive console and benchmarking

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Miner core: digest, search loop, workers and orchestrator
pub mod miner;

/// Job sources and share submitters, including the pool client
pub mod network;

/// Share distribution, hashrate accounting and reporting
pub mod stats;

/// Structured events published by the miner
pub mod events;

/// Fullscreen application detection
pub mod monitor;

/// Utility functions and error handling
pub mod utils;

/// Command-line interface definitions
pub mod cli;

/// Configuration management
pub mod config;

/// Shared type definitions
pub mod types;

// Core exports
pub use cli::Commands;
pub use config::Config;
pub use events::{EventBus, MinerEvent};
pub use miner::{CancelToken, Miner, MixedSha256, PowHash, SearchEngine};
pub use network::{JobSource, LocalJobSource, LogSubmitter, PoolClient, ShareSubmitter};
pub use stats::{HardwareStats, ShareDistributor, StatsReporter};
pub use types::{HashrateSnapshot, MiningJob, MiningResult, MiningState};
pub use utils::{MinerError, init_logging};
