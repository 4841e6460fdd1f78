// src/config/mod.rs
//! Configuration management for the split miner
//!
//! This module handles all configuration-related functionality including:
//! - Loading and parsing configuration files
//! - Validating the values mining depends on
//! - Generating configuration templates
//!
//! The configuration uses TOML format; every key has a default.

/// Core configuration implementation
///
/// Contains the [`Config`] struct and its sections.
#[allow(clippy::module_inception)]
pub mod config;

// Re-export key items for easy access
pub use config::{AdvancedSection, Config, LoggingSection, MiningSection, PerformanceSection};

use crate::utils::error::MinerError;
use std::path::PathBuf;

/// Loads miner configuration from a TOML file
///
/// # Arguments
/// * `path` - Path to the configuration file (anything convertible to PathBuf)
///
/// # Returns
/// * `Ok(Config)` - Successfully loaded configuration
/// * `Err(MinerError)` - If the file couldn't be read or parsed
pub fn load(path: impl Into<PathBuf>) -> Result<Config, MinerError> {
    Config::load(path)
}

/// Generates a commented configuration template
///
/// # Returns
/// String containing a ready-to-use TOML configuration template
pub fn generate_template() -> String {
    Config::generate_template()
}
