// src/miner/worker.rs
//! Worker thread implementation
//!
//! A worker repeatedly fetches a job from the job source, searches it and
//! hands any share it finds to the distributor. Workers never coordinate
//! with each other; the only shared state is the pause flag, the cancel
//! token and the distributor's counters.

use crate::miner::cancel::CancelToken;
use crate::miner::hash::PowHash;
use crate::miner::search::SearchEngine;
use crate::network::JobSource;
use crate::stats::ShareDistributor;
use crate::types::{HashrateSource, MiningResult};
use crate::utils::error::MinerError;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How often a paused worker checks whether it may continue
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Everything a worker shares with the orchestrator and its siblings
#[derive(Clone)]
pub struct WorkerContext {
    /// Where jobs come from
    pub source: Arc<dyn JobSource>,
    /// Where shares go
    pub distributor: Arc<ShareDistributor>,
    /// Digest function for the search engine
    pub hasher: Arc<dyn PowHash>,
    /// Set while mining is paused
    pub paused: Arc<AtomicBool>,
    /// Fired when mining stops
    pub cancel: CancelToken,
    /// Delay after a failed iteration
    pub backoff: Duration,
}

/// One mining thread's loop
pub struct Worker {
    /// Index used in thread names and logs
    id: usize,
    /// Search engine owned by this worker
    engine: SearchEngine,
    /// Shared state
    ctx: WorkerContext,
}

impl Worker {
    /// Creates a worker
    ///
    /// When the distributor measures hashrate in attempts, the engine
    /// reports every nonce it tries into the distributor's counter.
    pub fn new(id: usize, ctx: WorkerContext) -> Self {
        let mut engine = SearchEngine::new(Arc::clone(&ctx.hasher));
        if ctx.distributor.hashrate_source() == HashrateSource::Attempts {
            engine = engine.with_attempt_counter(ctx.distributor.hash_counter());
        }

        Worker { id, engine, ctx }
    }

    /// Runs the worker on a named OS thread
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("mining-worker-{}", self.id))
            .spawn(move || self.run())
    }

    /// Loops until the cancel token fires
    ///
    /// Pausing does not interrupt a search already in progress; the flag
    /// is only consulted between jobs.
    pub fn run(&self) {
        log::debug!("Worker {} started", self.id);

        while !self.ctx.cancel.is_cancelled() {
            if self.ctx.paused.load(Ordering::Relaxed) {
                self.ctx.cancel.wait_timeout(PAUSE_POLL_INTERVAL);
                continue;
            }

            if let Err(e) = self.step() {
                log::error!("Error in mining worker {}: {}", self.id, e);
                self.ctx.cancel.wait_timeout(self.ctx.backoff);
            }
        }

        log::debug!("Worker {} exited", self.id);
    }

    /// Fetches, searches and distributes one job
    ///
    /// # Returns
    /// * `Ok(Some(result))` - A share was found and distributed
    /// * `Ok(None)` - No job was available, or the range held no share
    fn step(&self) -> Result<Option<MiningResult>, MinerError> {
        let Some(job) = self.ctx.source.next_job(&self.ctx.cancel)? else {
            return Ok(None);
        };

        let result = self.engine.search(&job, &self.ctx.cancel);
        if let Some(result) = &result {
            self.ctx.distributor.distribute(result, &job);
        }
        Ok(result)
    }
}
