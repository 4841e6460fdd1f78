// src/miner/mod.rs
//! Core mining functionality
//!
//! This module contains all components related to the mining process:
//! - The proof-of-work digest and target comparison
//! - The per-thread nonce search loop
//! - Worker threads and the orchestrator that manages them

/// Proof-of-work digest
///
/// Candidate layout, the two-stage SHA-256 digest and target comparison.
/// The [`PowHash`] trait lets a different digest replace the default one.
pub mod hash;

/// Cooperative cancellation shared by all worker threads
pub mod cancel;

/// Nonce range search
pub mod search;

/// Worker thread implementation
///
/// Contains the worker loop that fetches jobs, searches them and hands
/// shares to the distributor.
pub mod worker;

/// Mining orchestrator
///
/// Starts, pauses, resumes and stops the worker threads.
pub mod manager;

// Re-export main components for cleaner imports
pub use self::cancel::CancelToken;
pub use self::hash::{MixedSha256, PowHash};
pub use self::manager::{Miner, MinerBuilder};
pub use self::search::SearchEngine;
pub use self::worker::{Worker, WorkerContext};
