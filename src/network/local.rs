// src/network/local.rs
//! Offline work source
//!
//! Lets the miner run without a pool: jobs are cut from a fixed header
//! with consecutive nonce ranges, and "submitting" a share only logs it.
//! Used by `start --offline` to exercise the full pipeline locally.

use crate::miner::cancel::CancelToken;
use crate::network::{JobSource, ShareSubmitter};
use crate::types::{HASH_SIZE, MiningJob, MiningResult};
use crate::utils::error::MinerError;
use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out consecutive nonce ranges over one header
pub struct LocalJobSource {
    /// Header every job is built on
    header_hash: [u8; HASH_SIZE],
    /// Target every job must meet
    target: [u8; HASH_SIZE],
    /// Nonces per job
    batch_size: u64,
    /// Start of the next unassigned range
    next_nonce: AtomicU64,
    /// Sequence number used to build job ids
    issued: AtomicU64,
}

impl LocalJobSource {
    /// Creates a source for `header_hash` and `target`
    ///
    /// # Arguments
    /// * `batch_size` - Nonces per job (at least 1)
    pub fn new(header_hash: [u8; HASH_SIZE], target: [u8; HASH_SIZE], batch_size: u64) -> Self {
        LocalJobSource {
            header_hash,
            target,
            batch_size: batch_size.max(1),
            next_nonce: AtomicU64::new(0),
            issued: AtomicU64::new(0),
        }
    }

    /// Number of jobs handed out so far
    pub fn jobs_issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }
}

impl JobSource for LocalJobSource {
    fn next_job(&self, _cancel: &CancelToken) -> Result<Option<MiningJob>, MinerError> {
        let start = self.next_nonce.fetch_add(self.batch_size, Ordering::SeqCst);
        let Some(end) = start.checked_add(self.batch_size) else {
            return Err(MinerError::JobSourceError(
                "Local nonce space exhausted".to_string(),
            ));
        };
        let seq = self.issued.fetch_add(1, Ordering::Relaxed);

        Ok(Some(MiningJob {
            job_id: format!("local-{}", seq),
            header_hash: self.header_hash,
            target: self.target,
            nonce_start: start,
            nonce_end: end,
        }))
    }
}

/// Submitter that records shares in the log only
#[derive(Debug, Default)]
pub struct LogSubmitter;

impl ShareSubmitter for LogSubmitter {
    fn submit(
        &self,
        address: &str,
        result: &MiningResult,
        job: &MiningJob,
    ) -> Result<(), MinerError> {
        log::debug!(
            "Share for {} (job {}, nonce {:016x}, hash {})",
            address,
            job.job_id,
            result.nonce_value,
            hex::encode(result.hash)
        );
        Ok(())
    }
}
