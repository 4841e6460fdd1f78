// src/stats/distributor.rs
//! Share routing and hashrate accounting
//!
//! Every share a worker finds passes through [`ShareDistributor::distribute`],
//! which picks one of the two payout addresses, hands the share to the
//! submitter and updates the lock-free counters behind the periodic
//! hashrate reports.

use crate::events::{EventBus, MinerEvent};
use crate::network::ShareSubmitter;
use crate::types::{HashrateSnapshot, HashrateSource, MiningJob, MiningResult, SplitStrategy};
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

/// Default time between hashrate reports
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(30);

/// Which payout address a share went to
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Payout {
    /// The primary address
    Primary,
    /// The secondary address
    Secondary,
}

/// The two payout addresses and how shares are split between them
///
/// `primary_percentage + secondary_percentage == 100` is checked by
/// configuration validation; the distributor only reads the primary
/// percentage.
#[derive(Debug, Clone)]
pub struct PayoutSplit {
    /// Address receiving `primary_percentage` of shares
    pub primary_address: String,
    /// Address receiving the remainder
    pub secondary_address: String,
    /// Primary share percentage (0-100)
    pub primary_percentage: u8,
    /// Secondary share percentage (0-100)
    pub secondary_percentage: u8,
    /// Per-share draw or deterministic quota
    pub strategy: SplitStrategy,
}

/// Share count for one payout address
struct ShareTally {
    address: String,
    count: AtomicU64,
}

impl ShareTally {
    fn new(address: String) -> Self {
        ShareTally {
            address,
            count: AtomicU64::new(0),
        }
    }

    fn get(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Routes shares between two addresses and reports hashrate
pub struct ShareDistributor {
    /// Percentages and strategy
    split: PayoutSplit,
    /// Where routed shares are sent
    submitter: Arc<dyn ShareSubmitter>,
    /// Destination for hashrate reports
    events: Arc<EventBus>,
    /// What `total_hashes` counts
    source: HashrateSource,
    /// Minimum time between reports
    report_interval: Duration,
    /// Hashes since the last report
    total_hashes: Arc<AtomicU64>,
    /// Shares credited to the primary address
    primary: ShareTally,
    /// Shares credited to the secondary address
    secondary: ShareTally,
    /// Shares routed so far, for quota routing
    quota_seq: AtomicU64,
    /// When the last report was taken
    last_report: Mutex<Instant>,
}

impl ShareDistributor {
    /// Creates a distributor with the default report interval and share-based hashrate
    pub fn new(
        split: PayoutSplit,
        submitter: Arc<dyn ShareSubmitter>,
        events: Arc<EventBus>,
    ) -> Self {
        ShareDistributor {
            primary: ShareTally::new(split.primary_address.clone()),
            secondary: ShareTally::new(split.secondary_address.clone()),
            split,
            submitter,
            events,
            source: HashrateSource::Shares,
            report_interval: DEFAULT_REPORT_INTERVAL,
            total_hashes: Arc::new(AtomicU64::new(0)),
            quota_seq: AtomicU64::new(0),
            last_report: Mutex::new(Instant::now()),
        }
    }

    /// Sets the minimum time between hashrate reports
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Sets what the hash counter measures
    pub fn with_hashrate_source(mut self, source: HashrateSource) -> Self {
        self.source = source;
        self
    }

    /// What the hash counter measures
    pub fn hashrate_source(&self) -> HashrateSource {
        self.source
    }

    /// Counter search engines add attempted nonces to in attempts mode
    pub fn hash_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.total_hashes)
    }

    /// Routes a found share to a payout address and accounts for it
    ///
    /// Submission failures are logged; the share is tallied either way.
    /// Safe to call concurrently from any number of workers.
    pub fn distribute(&self, result: &MiningResult, job: &MiningJob) -> Payout {
        if self.source == HashrateSource::Shares {
            self.total_hashes.fetch_add(1, Ordering::Relaxed);
        }

        let payout = self.choose_payout();
        let tally = self.tally(payout);

        if let Err(e) = self.submitter.submit(&tally.address, result, job) {
            log::error!("Failed to submit share for address {}: {}", tally.address, e);
        }
        tally.count.fetch_add(1, Ordering::Relaxed);

        self.report_if_due();
        payout
    }

    /// Picks the address for the next share
    pub fn choose_payout(&self) -> Payout {
        let pct = u64::from(self.split.primary_percentage.min(100));

        let primary = match self.split.strategy {
            SplitStrategy::Random => rand::thread_rng().gen_range(1..=100) <= pct,
            SplitStrategy::Quota => {
                let n = self.quota_seq.fetch_add(1, Ordering::Relaxed);
                (n + 1) * pct / 100 > n * pct / 100
            }
        };

        if primary { Payout::Primary } else { Payout::Secondary }
    }

    /// Emits a hashrate report if the report interval has elapsed
    ///
    /// Resets the hash counter when a report is taken.
    ///
    /// # Returns
    /// The emitted snapshot, or `None` if no report was due
    pub fn report_if_due(&self) -> Option<HashrateSnapshot> {
        let now = Instant::now();
        let snapshot = {
            let mut last = self.last_report.lock().unwrap_or_else(|p| p.into_inner());
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < self.report_interval || elapsed.is_zero() {
                return None;
            }

            let hashes = self.total_hashes.swap(0, Ordering::Relaxed);
            *last = now;
            self.snapshot(elapsed, hashes)
        };

        log::info!(
            "Hashrate: {:.2} H/s | Primary: {:.2} H/s ({}%) | Secondary: {:.2} H/s ({}%) | Shares: {}",
            snapshot.total_hashrate,
            snapshot.primary_hashrate,
            self.split.primary_percentage,
            snapshot.secondary_hashrate,
            self.split.secondary_percentage,
            snapshot.shares_found
        );
        self.events.emit(MinerEvent::Hashrate(snapshot.clone()));

        Some(snapshot)
    }

    /// Hashrate since the last report, without resetting anything
    pub fn current_hashrate(&self) -> HashrateSnapshot {
        self.hashrate_at(Instant::now())
    }

    /// Hashrate since the last report as of `now`
    pub fn hashrate_at(&self, now: Instant) -> HashrateSnapshot {
        let elapsed = now.saturating_duration_since(self.last_report_at());
        self.snapshot(elapsed, self.total_hashes.load(Ordering::Relaxed))
    }

    /// When the current measurement window began
    pub fn last_report_at(&self) -> Instant {
        *self.last_report.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Cumulative shares per payout address
    pub fn share_counts(&self) -> HashMap<String, u64> {
        let mut counts = HashMap::new();
        for tally in [&self.primary, &self.secondary] {
            *counts.entry(tally.address.clone()).or_insert(0) += tally.get();
        }
        counts
    }

    /// Cumulative shares as (primary, secondary)
    pub fn payout_counts(&self) -> (u64, u64) {
        (self.primary.get(), self.secondary.get())
    }

    fn tally(&self, payout: Payout) -> &ShareTally {
        match payout {
            Payout::Primary => &self.primary,
            Payout::Secondary => &self.secondary,
        }
    }

    /// Builds a snapshot from a window length and its hash count
    ///
    /// The total is split by each address's share of the cumulative tally.
    fn snapshot(&self, elapsed: Duration, hashes: u64) -> HashrateSnapshot {
        let seconds = elapsed.as_secs_f64();
        if seconds <= 0.0 {
            return HashrateSnapshot::zero();
        }

        let total_hashrate = hashes as f64 / seconds;
        let (primary, secondary) = self.payout_counts();
        let shares = primary + secondary;

        let (primary_hashrate, secondary_hashrate) = if shares == 0 {
            (0.0, 0.0)
        } else {
            let shares = shares as f64;
            (
                primary as f64 / shares * total_hashrate,
                secondary as f64 / shares * total_hashrate,
            )
        };

        HashrateSnapshot {
            total_hashrate,
            primary_hashrate,
            secondary_hashrate,
            shares_found: shares,
            timestamp: SystemTime::now(),
        }
    }
}
