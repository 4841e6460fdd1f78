// src/miner/search.rs
//! Nonce search loop
//!
//! Sweeps a job's nonce range one nonce at a time, hashing each candidate
//! and stopping at the first digest that meets the job target. This is the
//! CPU-bound hot path: the candidate buffer is built once per job and only
//! its nonce bytes are rewritten per attempt.

use crate::miner::cancel::CancelToken;
use crate::miner::hash::{CandidateBuffer, PowHash, meets_target};
use crate::types::{MiningJob, MiningResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Attempts between cooperative yields
pub const YIELD_INTERVAL: u64 = 10_000;

/// How long the loop sleeps at each yield point
pub const YIELD_DURATION: Duration = Duration::from_millis(1);

/// Per-worker search engine
///
/// Each worker owns one engine; the digest function is shared.
pub struct SearchEngine {
    /// Digest function applied to every candidate
    hasher: Arc<dyn PowHash>,
    /// Receives attempted-nonce counts when hashrate is measured in attempts
    attempts: Option<Arc<AtomicU64>>,
    /// Attempts between yields
    yield_interval: u64,
    /// Sleep at each yield
    yield_duration: Duration,
}

impl SearchEngine {
    /// Creates an engine using `hasher` for every candidate
    pub fn new(hasher: Arc<dyn PowHash>) -> Self {
        SearchEngine {
            hasher,
            attempts: None,
            yield_interval: YIELD_INTERVAL,
            yield_duration: YIELD_DURATION,
        }
    }

    /// Adds attempted nonces to `counter` at every yield point and on exit
    pub fn with_attempt_counter(mut self, counter: Arc<AtomicU64>) -> Self {
        self.attempts = Some(counter);
        self
    }

    /// Overrides how many attempts run between cooperative yields
    pub fn with_yield_interval(mut self, interval: u64) -> Self {
        self.yield_interval = interval.max(1);
        self
    }

    /// Searches `[job.nonce_start, job.nonce_end)` for a nonce meeting `job.target`
    ///
    /// # Arguments
    /// * `job` - The work to search
    /// * `cancel` - Checked before every attempt and woken at every yield
    ///
    /// # Returns
    /// * `Some(MiningResult)` - The lowest nonce in range whose digest meets the target
    /// * `None` - The range was exhausted or the search was cancelled
    pub fn search(&self, job: &MiningJob, cancel: &CancelToken) -> Option<MiningResult> {
        let mut candidate = CandidateBuffer::new(&job.header_hash);
        let mut nonce = job.nonce_start;
        let mut since_yield = 0u64;
        let mut found = None;

        while nonce < job.nonce_end && !cancel.is_cancelled() {
            candidate.set_nonce(nonce);
            let hash = self.hasher.digest(candidate.as_bytes());
            since_yield += 1;

            if meets_target(&hash, &job.target) {
                log::info!("Found valid hash for job {} at nonce {}", job.job_id, nonce);
                found = Some(MiningResult::new(nonce, hash));
                break;
            }

            nonce += 1;

            if since_yield == self.yield_interval {
                self.record_attempts(since_yield);
                since_yield = 0;
                if cancel.wait_timeout(self.yield_duration) {
                    break;
                }
            }
        }

        self.record_attempts(since_yield);
        found
    }

    #[inline]
    fn record_attempts(&self, count: u64) {
        if let Some(counter) = &self.attempts {
            if count > 0 {
                counter.fetch_add(count, Ordering::Relaxed);
            }
        }
    }
}
