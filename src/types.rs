// src/types.rs
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

/// Size in bytes of header hashes, targets and digests
pub const HASH_SIZE: usize = 32;

/// Size in bytes of the encoded nonce
pub const NONCE_SIZE: usize = 8;

/// A unit of work handed to a single worker
///
/// Jobs are immutable once issued: the job source creates one per
/// work assignment and the worker that fetched it owns it until the
/// range is exhausted or a share is found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiningJob {
    /// Opaque identifier assigned by the job source
    pub job_id: String,
    /// Hash of the block header being worked on
    pub header_hash: [u8; HASH_SIZE],
    /// Big-endian threshold a digest must not exceed
    pub target: [u8; HASH_SIZE],
    /// First nonce of the range (inclusive)
    pub nonce_start: u64,
    /// End of the range (exclusive)
    pub nonce_end: u64,
}

impl MiningJob {
    /// Number of nonces in `[nonce_start, nonce_end)`
    pub fn nonce_count(&self) -> u64 {
        self.nonce_end.saturating_sub(self.nonce_start)
    }
}

/// A nonce whose digest satisfied the job target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiningResult {
    /// The winning nonce
    pub nonce_value: u64,
    /// Little-endian encoding of `nonce_value`
    pub nonce: [u8; NONCE_SIZE],
    /// Digest produced for `nonce_value`
    pub hash: [u8; HASH_SIZE],
}

impl MiningResult {
    /// Builds a result, deriving the nonce bytes from `nonce_value`
    pub fn new(nonce_value: u64, hash: [u8; HASH_SIZE]) -> Self {
        MiningResult {
            nonce_value,
            nonce: nonce_value.to_le_bytes(),
            hash,
        }
    }
}

/// Point-in-time hashrate figures, in hashes per second
#[derive(Debug, Clone, PartialEq)]
pub struct HashrateSnapshot {
    /// Combined rate since the last report
    pub total_hashrate: f64,
    /// Portion attributed to the primary address
    pub primary_hashrate: f64,
    /// Portion attributed to the secondary address
    pub secondary_hashrate: f64,
    /// Cumulative shares across both addresses
    pub shares_found: u64,
    /// When the snapshot was taken
    pub timestamp: SystemTime,
}

impl HashrateSnapshot {
    /// A snapshot with every rate and count at zero
    pub fn zero() -> Self {
        HashrateSnapshot {
            total_hashrate: 0.0,
            primary_hashrate: 0.0,
            secondary_hashrate: 0.0,
            shares_found: 0,
            timestamp: SystemTime::now(),
        }
    }
}

/// Lifecycle state of the mining orchestrator
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MiningState {
    /// No workers exist
    Stopped,
    /// Configuration is being validated and workers spawned
    Starting,
    /// Workers are fetching and searching jobs
    Running,
    /// Workers are alive but idle
    Paused,
    /// Cancellation issued, waiting for workers to exit
    Stopping,
}

impl fmt::Display for MiningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiningState::Stopped => write!(f, "stopped"),
            MiningState::Starting => write!(f, "starting"),
            MiningState::Running => write!(f, "running"),
            MiningState::Paused => write!(f, "paused"),
            MiningState::Stopping => write!(f, "stopping"),
        }
    }
}

/// How found shares are assigned to the two payout addresses
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitStrategy {
    /// Independent weighted draw per share
    ///
    /// Converges on the configured percentage over many shares, but
    /// short runs can deviate noticeably.
    #[default]
    #[value(name = "random")]
    Random,

    /// Deterministic weighted round-robin
    ///
    /// After `n` shares the primary address holds exactly
    /// `floor(n * primary_percentage / 100)` of them.
    #[value(name = "quota")]
    Quota,
}

impl fmt::Display for SplitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitStrategy::Random => write!(f, "random"),
            SplitStrategy::Quota => write!(f, "quota"),
        }
    }
}

impl FromStr for SplitStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random" => Ok(SplitStrategy::Random),
            "quota" | "round-robin" => Ok(SplitStrategy::Quota),
            _ => Err(format!("Unknown split strategy: {}", s)),
        }
    }
}

/// What the distributor's hash counter measures
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashrateSource {
    /// One hash per distributed share
    ///
    /// The reported figure is really a share-discovery rate; kept as the
    /// default for compatibility with existing dashboards.
    #[default]
    #[value(name = "shares")]
    Shares,

    /// Every nonce the search engines attempted
    #[value(name = "attempts")]
    Attempts,
}

impl fmt::Display for HashrateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashrateSource::Shares => write!(f, "shares"),
            HashrateSource::Attempts => write!(f, "attempts"),
        }
    }
}

impl FromStr for HashrateSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shares" => Ok(HashrateSource::Shares),
            "attempts" | "nonces" => Ok(HashrateSource::Attempts),
            _ => Err(format!("Unknown hashrate source: {}", s)),
        }
    }
}

/// Builds a target whose `bits` most significant bits are zero and the rest one
///
/// Larger `bits` means a harder target; values above 256 saturate to the
/// all-zero target.
pub fn target_with_leading_zero_bits(bits: u32) -> [u8; HASH_SIZE] {
    let mut target = [0xFFu8; HASH_SIZE];
    let bits = bits.min((HASH_SIZE * 8) as u32) as usize;

    for byte in target.iter_mut().take(bits / 8) {
        *byte = 0;
    }
    if bits % 8 != 0 {
        target[bits / 8] = 0xFF >> (bits % 8);
    }

    target
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_encodes_nonce_little_endian() {
        let result = MiningResult::new(0x0102_0304_0506_0708, [0u8; HASH_SIZE]);
        assert_eq!(result.nonce, [0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn nonce_count_never_underflows() {
        let job = MiningJob {
            job_id: "j".into(),
            header_hash: [0u8; HASH_SIZE],
            target: [0u8; HASH_SIZE],
            nonce_start: 10,
            nonce_end: 5,
        };
        assert_eq!(job.nonce_count(), 0);
    }

    #[test]
    fn leading_zero_targets() {
        assert_eq!(target_with_leading_zero_bits(0), [0xFFu8; HASH_SIZE]);

        let t = target_with_leading_zero_bits(12);
        assert_eq!(t[0], 0x00);
        assert_eq!(t[1], 0x0F);
        assert_eq!(t[2], 0xFF);

        assert_eq!(target_with_leading_zero_bits(256), [0u8; HASH_SIZE]);
        assert_eq!(target_with_leading_zero_bits(1000), [0u8; HASH_SIZE]);
    }

    #[test]
    fn strategy_names_round_trip_through_strings() {
        assert_eq!("Quota".parse::<SplitStrategy>(), Ok(SplitStrategy::Quota));
        assert_eq!(SplitStrategy::Random.to_string(), "random");
        assert!("weighted".parse::<SplitStrategy>().is_err());
        assert_eq!("attempts".parse::<HashrateSource>(), Ok(HashrateSource::Attempts));
    }
}
