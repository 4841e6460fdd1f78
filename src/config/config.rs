// src/config/config.rs
use crate::{
    network::pool::PoolConfig,
    stats::PayoutSplit,
    types::{HashrateSource, SplitStrategy},
    utils::error::MinerError,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Allowed range for `advanced.hashrate_report_interval_seconds`
const REPORT_INTERVAL_RANGE: std::ops::RangeInclusive<u64> = 10..=3600;

/// Allowed range for `advanced.max_reconnect_attempts`
const RECONNECT_ATTEMPTS_RANGE: std::ops::RangeInclusive<u32> = 1..=20;

/// Allowed range for `advanced.reconnect_delay_seconds`
const RECONNECT_DELAY_RANGE: std::ops::RangeInclusive<u64> = 1..=300;

/// Main configuration structure for the mining application
///
/// Every section and key has a default, so a file only needs to name
/// what it changes. Values are checked by [`Config::validate`] when
/// mining starts, not when the file is parsed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Payout addresses, split and pool
    #[serde(default)]
    pub mining: MiningSection,

    /// Threads, batch size and fullscreen handling
    #[serde(default)]
    pub performance: PerformanceSection,

    /// Log output
    #[serde(default)]
    pub logging: LoggingSection,

    /// Reporting cadence, reconnects and accounting options
    #[serde(default)]
    pub advanced: AdvancedSection,
}

/// Where shares go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningSection {
    /// Address receiving `primary_percentage` of shares
    #[serde(default)]
    pub primary_address: String,

    /// Address receiving `secondary_percentage` of shares
    #[serde(default)]
    pub secondary_address: String,

    /// Share of found work credited to the primary address
    #[serde(default = "default_primary_percentage")]
    pub primary_percentage: u32,

    /// Share of found work credited to the secondary address
    #[serde(default = "default_secondary_percentage")]
    pub secondary_percentage: u32,

    /// Pool WebSocket URL
    #[serde(default = "default_pool_url")]
    pub pool_url: String,

    /// Worker name reported at login
    #[serde(default = "default_worker_name")]
    pub worker_name: String,

    /// Pool password
    #[serde(default = "default_password")]
    pub password: String,
}

/// How hard and when to mine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSection {
    /// Worker threads; zero or negative means one per logical CPU
    #[serde(default)]
    pub threads: i32,

    /// Watch for fullscreen applications at all
    #[serde(default = "default_true")]
    pub auto_pause_on_fullscreen: bool,

    /// Pause while a fullscreen application is detected
    #[serde(default = "default_true")]
    pub pause_on_game_detected: bool,

    /// Milliseconds between fullscreen checks
    #[serde(default = "default_fullscreen_poll_ms")]
    pub fullscreen_poll_ms: u64,

    /// Process names that count as a fullscreen application
    #[serde(default)]
    pub game_processes: Vec<String>,

    /// Nonces handed to a worker per job
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
}

/// Log output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    /// One of error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Rarely changed knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancedSection {
    /// Seconds between hashrate reports
    #[serde(default = "default_report_interval")]
    pub hashrate_report_interval_seconds: u64,

    /// Delay after a worker error, in milliseconds
    #[serde(default = "default_worker_backoff_ms")]
    pub worker_backoff_ms: u64,

    /// Consecutive failed pool sessions before giving up
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Seconds between reconnect attempts
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_seconds: u64,

    /// Per-share draw or deterministic quota
    #[serde(default)]
    pub split_strategy: SplitStrategy,

    /// Count found shares or attempted nonces as hashes
    #[serde(default)]
    pub hashrate_source: HashrateSource,
}

fn default_primary_percentage() -> u32 {
    70
}

fn default_secondary_percentage() -> u32 {
    30
}

fn default_pool_url() -> String {
    "ws://127.0.0.1:3333".into()
}

fn default_worker_name() -> String {
    "split-miner".into()
}

fn default_password() -> String {
    "x".into()
}

fn default_true() -> bool {
    true
}

fn default_fullscreen_poll_ms() -> u64 {
    1000
}

fn default_batch_size() -> u64 {
    1_000_000
}

fn default_log_level() -> String {
    "info".into()
}

fn default_report_interval() -> u64 {
    30
}

fn default_worker_backoff_ms() -> u64 {
    1000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_delay() -> u64 {
    10
}

impl Default for MiningSection {
    fn default() -> Self {
        MiningSection {
            primary_address: String::new(),
            secondary_address: String::new(),
            primary_percentage: default_primary_percentage(),
            secondary_percentage: default_secondary_percentage(),
            pool_url: default_pool_url(),
            worker_name: default_worker_name(),
            password: default_password(),
        }
    }
}

impl Default for PerformanceSection {
    fn default() -> Self {
        PerformanceSection {
            threads: 0,
            auto_pause_on_fullscreen: true,
            pause_on_game_detected: true,
            fullscreen_poll_ms: default_fullscreen_poll_ms(),
            game_processes: Vec::new(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        LoggingSection {
            level: default_log_level(),
        }
    }
}

impl Default for AdvancedSection {
    fn default() -> Self {
        AdvancedSection {
            hashrate_report_interval_seconds: default_report_interval(),
            worker_backoff_ms: default_worker_backoff_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_delay_seconds: default_reconnect_delay(),
            split_strategy: SplitStrategy::default(),
            hashrate_source: HashrateSource::default(),
        }
    }
}

impl Config {
    /// Loads configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Ok(Config)` - Successfully loaded configuration
    /// * `Err(MinerError)` - If file couldn't be read or parsed
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, MinerError> {
        let path = path.into();
        let config_str = std::fs::read_to_string(&path).map_err(|e| {
            MinerError::ConfigError(format!(
                "Failed to read config at {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_toml(&config_str)
    }

    /// Parses configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self, MinerError> {
        Ok(toml::from_str(text)?)
    }

    /// Checks the values mining depends on
    ///
    /// # Errors
    /// `MinerError::ConfigError` naming the first offending key
    pub fn validate(&self) -> Result<(), MinerError> {
        let mining = &self.mining;

        if mining.primary_address.trim().is_empty() {
            return Err(invalid("mining.primary_address is not set"));
        }
        if mining.secondary_address.trim().is_empty() {
            return Err(invalid("mining.secondary_address is not set"));
        }
        if mining.primary_percentage > 100 || mining.secondary_percentage > 100 {
            return Err(invalid("mining percentages must be between 0 and 100"));
        }
        if mining.primary_percentage + mining.secondary_percentage != 100 {
            return Err(invalid(format!(
                "mining percentages must sum to 100 (got {} + {})",
                mining.primary_percentage, mining.secondary_percentage
            )));
        }
        if mining.pool_url.trim().is_empty() {
            return Err(invalid("mining.pool_url is not set"));
        }

        if self.performance.batch_size == 0 {
            return Err(invalid("performance.batch_size must be at least 1"));
        }
        if self.performance.fullscreen_poll_ms == 0 {
            return Err(invalid("performance.fullscreen_poll_ms must be at least 1"));
        }

        let advanced = &self.advanced;
        if !REPORT_INTERVAL_RANGE.contains(&advanced.hashrate_report_interval_seconds) {
            return Err(invalid(format!(
                "advanced.hashrate_report_interval_seconds must be within {:?}",
                REPORT_INTERVAL_RANGE
            )));
        }
        if !RECONNECT_ATTEMPTS_RANGE.contains(&advanced.max_reconnect_attempts) {
            return Err(invalid(format!(
                "advanced.max_reconnect_attempts must be within {:?}",
                RECONNECT_ATTEMPTS_RANGE
            )));
        }
        if !RECONNECT_DELAY_RANGE.contains(&advanced.reconnect_delay_seconds) {
            return Err(invalid(format!(
                "advanced.reconnect_delay_seconds must be within {:?}",
                RECONNECT_DELAY_RANGE
            )));
        }

        Ok(())
    }

    /// Worker thread count, resolving zero or negative to the CPU count
    pub fn effective_threads(&self) -> usize {
        match usize::try_from(self.performance.threads) {
            Ok(threads) if threads > 0 => threads,
            _ => num_cpus::get(),
        }
    }

    /// Addresses and split as the distributor consumes them
    ///
    /// Assumes [`Config::validate`] passed; out-of-range percentages are clamped.
    pub fn payout_split(&self) -> PayoutSplit {
        PayoutSplit {
            primary_address: self.mining.primary_address.clone(),
            secondary_address: self.mining.secondary_address.clone(),
            primary_percentage: self.mining.primary_percentage.min(100) as u8,
            secondary_percentage: self.mining.secondary_percentage.min(100) as u8,
            strategy: self.advanced.split_strategy,
        }
    }

    /// Connection settings for the pool client
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            url: self.mining.pool_url.clone(),
            worker_name: self.mining.worker_name.clone(),
            password: self.mining.password.clone(),
            max_reconnect_attempts: self.advanced.max_reconnect_attempts,
            reconnect_delay: Duration::from_secs(self.advanced.reconnect_delay_seconds),
        }
    }

    /// Time between hashrate reports
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.advanced.hashrate_report_interval_seconds)
    }

    /// Delay after a worker error
    pub fn worker_backoff(&self) -> Duration {
        Duration::from_millis(self.advanced.worker_backoff_ms)
    }

    /// Time between fullscreen checks
    pub fn fullscreen_poll_interval(&self) -> Duration {
        Duration::from_millis(self.performance.fullscreen_poll_ms)
    }

    /// Generates a configuration template string
    ///
    /// # Returns
    /// String containing a commented TOML configuration template
    pub fn generate_template() -> String {
        let mut template = String::new();
        template.push_str("# Split Miner Configuration\n\n");

        template.push_str("[mining]\n");
        template.push_str("# Both addresses are required\n");
        template.push_str("primary_address = \"your_primary_address\"\n");
        template.push_str("secondary_address = \"your_secondary_address\"\n");
        template.push_str("# Percentages must sum to 100\n");
        template.push_str("primary_percentage = 70\n");
        template.push_str("secondary_percentage = 30\n");
        template.push_str("pool_url = \"ws://127.0.0.1:3333\"\n");
        template.push_str("worker_name = \"split-miner\"\n");
        template.push_str("password = \"x\"\n\n");

        template.push_str("[performance]\n");
        template.push_str("# Number of worker threads (0 = auto-detect)\n");
        template.push_str("threads = 0\n");
        template.push_str("auto_pause_on_fullscreen = true\n");
        template.push_str("pause_on_game_detected = true\n");
        template.push_str("fullscreen_poll_ms = 1000\n");
        template.push_str("# Processes that pause mining while running\n");
        template.push_str("game_processes = []\n");
        template.push_str("# Nonces per job handed to a worker\n");
        template.push_str("batch_size = 1000000\n\n");

        template.push_str("[logging]\n");
        template.push_str("# error, warn, info, debug or trace\n");
        template.push_str("level = \"info\"\n\n");

        template.push_str("[advanced]\n");
        template.push_str("# Seconds between hashrate reports (10-3600)\n");
        template.push_str("hashrate_report_interval_seconds = 30\n");
        template.push_str("worker_backoff_ms = 1000\n");
        template.push_str("max_reconnect_attempts = 5\n");
        template.push_str("reconnect_delay_seconds = 10\n");
        template.push_str("# random: independent draw per share, quota: exact running split\n");
        template.push_str("split_strategy = \"random\"\n");
        template.push_str("# shares: one hash per found share, attempts: every nonce tried\n");
        template.push_str("hashrate_source = \"shares\"\n");

        template
    }
}

fn invalid(message: impl Into<String>) -> MinerError {
    MinerError::ConfigError(message.into())
}
