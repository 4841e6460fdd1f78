// src/cli/commands.rs
use crate::types::{HashrateSource, SplitStrategy};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Split Miner CLI - CPU proof-of-work miner splitting shares between two addresses
#[derive(Parser, Debug)]
#[command(name = "split-miner")]
#[command(version, about, long_about = None)]
pub struct Commands {
    /// The action to perform (start mining, run benchmarks, or generate config)
    #[command(subcommand)]
    pub action: Action,
}

/// Top-level commands for the miner application
#[derive(Subcommand, Debug)]
pub enum Action {
    /// Start mining operation with specified options
    Start(StartOptions),

    /// Measure raw digest throughput
    Benchmark(BenchmarkOptions),

    /// Generate configuration file template
    Config(ConfigOptions),
}

/// Options for starting the mining operation
#[derive(Parser, Debug)]
pub struct StartOptions {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Number of worker threads to use (overrides config, 0 = all CPUs)
    #[arg(short, long)]
    pub threads: Option<i32>,

    /// Share split strategy (overrides config)
    #[arg(long)]
    pub split: Option<SplitStrategy>,

    /// What the reported hashrate counts (overrides config)
    #[arg(long)]
    pub hashrate_source: Option<HashrateSource>,

    /// Mine locally generated work instead of connecting to the pool
    #[arg(long)]
    pub offline: bool,

    /// Leading zero bits required of offline shares
    #[arg(long, default_value_t = 16)]
    pub offline_difficulty: u32,

    /// Mine until interrupted instead of reading console commands
    #[arg(long)]
    pub headless: bool,
}

/// Options for running mining benchmarks
#[derive(Parser, Debug)]
pub struct BenchmarkOptions {
    /// Duration of benchmark in seconds
    #[arg(short, long, default_value_t = 60)]
    pub duration: u64,

    /// Number of threads to use
    #[arg(short, long, default_value_t = num_cpus::get())]
    pub threads: usize,
}

/// Options for generating configuration files
#[derive(Parser, Debug)]
pub struct ConfigOptions {
    /// Output file path
    #[arg(short, long, default_value = "config.toml")]
    pub output: PathBuf,

    /// Overwrite an existing file
    #[arg(short, long)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_defaults() {
        let cli = Commands::try_parse_from(["split-miner", "start"]).unwrap();
        let Action::Start(opts) = cli.action else {
            panic!("expected start");
        };
        assert_eq!(opts.config, PathBuf::from("config.toml"));
        assert_eq!(opts.threads, None);
        assert!(!opts.offline);
        assert_eq!(opts.offline_difficulty, 16);
    }

    #[test]
    fn start_overrides() {
        let cli = Commands::try_parse_from([
            "split-miner",
            "start",
            "-c",
            "miner.toml",
            "--threads",
            "4",
            "--split",
            "quota",
            "--hashrate-source",
            "attempts",
            "--offline",
            "--headless",
        ])
        .unwrap();
        let Action::Start(opts) = cli.action else {
            panic!("expected start");
        };
        assert_eq!(opts.threads, Some(4));
        assert_eq!(opts.split, Some(SplitStrategy::Quota));
        assert_eq!(opts.hashrate_source, Some(HashrateSource::Attempts));
        assert!(opts.offline && opts.headless);
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        assert!(Commands::try_parse_from(["split-miner", "start", "--split", "weighted"]).is_err());
    }

    #[test]
    fn benchmark_and_config() {
        let cli = Commands::try_parse_from(["split-miner", "benchmark", "-d", "5", "-t", "2"]).unwrap();
        assert!(matches!(
            cli.action,
            Action::Benchmark(BenchmarkOptions { duration: 5, threads: 2 })
        ));

        let cli = Commands::try_parse_from(["split-miner", "config", "-o", "out.toml", "-f"]).unwrap();
        let Action::Config(opts) = cli.action else {
            panic!("expected config");
        };
        assert_eq!(opts.output, PathBuf::from("out.toml"));
        assert!(opts.force);
    }
}
