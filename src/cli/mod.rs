// src/cli/mod.rs
//! Command-line interface
//!
//! - [`Commands`]: clap definitions for the `start`, `benchmark` and `config` subcommands
//! - [`Console`]: the interactive prompt shown while mining

/// clap command and option definitions
pub mod commands;

/// Interactive command prompt
pub mod console;

pub use commands::{Action, BenchmarkOptions, Commands, ConfigOptions, StartOptions};
pub use console::{Console, ConsoleCommand};
