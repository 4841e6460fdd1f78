// src/utils/logging.rs
//! Logging configuration and utilities
//!
//! The entry point owns the logger's lifetime: it calls one of the
//! `init_*` functions exactly once, and every component logs through the
//! `log` facade under its own module target.
//!
//! Uses `env_logger` under the hood with custom formatting and filtering.

use env_logger::{Builder, Target};
use log::LevelFilter;
use std::env;

/// Initializes the logging subsystem for a mining session
///
/// # Arguments
/// * `level` - Level name from the `[logging]` config section
///
/// # Configuration
/// - Logs to stdout
/// - Unknown level names fall back to Info
/// - `RUST_LOG` takes precedence over the configured level if set
pub fn init_logging(level: &str) {
    let mut builder = common_log_config();
    builder.filter_level(parse_level(level));

    if env::var("RUST_LOG").is_ok() {
        builder.parse_env("RUST_LOG");
    }

    // A second init (e.g. console `start` after `stop`) keeps the first logger
    let _ = builder.try_init();
}

/// Configures benchmark-specific logging
///
/// # Differences from Standard Logging
/// - Default log level: Debug (if RUST_LOG not set)
/// - Same custom formatting as standard logging
pub fn init_bench_logging() {
    let mut builder = common_log_config();

    if env::var("RUST_LOG").is_err() {
        builder.filter_level(LevelFilter::Debug);
    } else {
        builder.parse_env("RUST_LOG");
    }

    let _ = builder.try_init();
}

/// Maps a configured level name onto a `LevelFilter`
///
/// Accepts the usual `log` names plus `warning` and `critical`, which
/// older configuration files used.
pub fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" | "critical" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Creates and configures a base logger builder with common settings
///
/// # Features
/// - Custom log format including:
///   - Timestamp (seconds since epoch)
///   - Log level
///   - Module path
///   - Line number
///   - Message
/// - Output to stdout
fn common_log_config() -> Builder {
    let mut builder = Builder::new();

    builder
        .format(|buf, record| {
            use std::io::Write;
            let ts = buf.timestamp_seconds();
            let level = record.level();
            let module = record.module_path().unwrap_or_default();
            let line = record.line().unwrap_or(0);

            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                ts,
                level,
                module,
                line,
                record.args()
            )
        })
        .target(Target::Stdout);

    builder
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_map_to_filters() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level("Warning"), LevelFilter::Warn);
        assert_eq!(parse_level("critical"), LevelFilter::Error);
        assert_eq!(parse_level(" trace "), LevelFilter::Trace);
    }

    #[test]
    fn unknown_level_defaults_to_info() {
        assert_eq!(parse_level("loud"), LevelFilter::Info);
        assert_eq!(parse_level(""), LevelFilter::Info);
    }
}
