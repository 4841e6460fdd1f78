// src/cli/console.rs
//! Interactive console
//!
//! Reads one command per line and drives the [`Miner`]. Commands can be
//! given by name or by their menu number.

use crate::miner::Miner;
use crate::stats::StatsReporter;
use crate::types::MiningState;
use std::fmt;
use std::io::{self, BufRead, Write};
use std::str::FromStr;

/// A console command
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Start mining
    Start,
    /// Stop mining and join workers
    Stop,
    /// Show hashrate, shares and hardware figures
    Status,
    /// Show the active configuration
    Config,
    /// List commands
    Help,
    /// Stop mining and leave the console
    Exit,
    /// Pause mining
    Pause,
    /// Resume mining
    Resume,
}

impl ConsoleCommand {
    /// Every command, in menu order
    pub const ALL: [ConsoleCommand; 8] = [
        ConsoleCommand::Start,
        ConsoleCommand::Stop,
        ConsoleCommand::Status,
        ConsoleCommand::Config,
        ConsoleCommand::Help,
        ConsoleCommand::Exit,
        ConsoleCommand::Pause,
        ConsoleCommand::Resume,
    ];

    fn description(self) -> &'static str {
        match self {
            ConsoleCommand::Start => "Start mining",
            ConsoleCommand::Stop => "Stop mining",
            ConsoleCommand::Status => "Show status",
            ConsoleCommand::Config => "Show configuration",
            ConsoleCommand::Help => "Show this help",
            ConsoleCommand::Exit => "Stop mining and exit",
            ConsoleCommand::Pause => "Pause mining",
            ConsoleCommand::Resume => "Resume mining",
        }
    }
}

impl fmt::Display for ConsoleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConsoleCommand::Start => "start",
            ConsoleCommand::Stop => "stop",
            ConsoleCommand::Status => "status",
            ConsoleCommand::Config => "config",
            ConsoleCommand::Help => "help",
            ConsoleCommand::Exit => "exit",
            ConsoleCommand::Pause => "pause",
            ConsoleCommand::Resume => "resume",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "start" | "1" | "-s" | "--start" => Ok(ConsoleCommand::Start),
            "stop" | "2" | "-t" | "--stop" => Ok(ConsoleCommand::Stop),
            "status" | "3" | "-u" | "--status" => Ok(ConsoleCommand::Status),
            "config" | "4" | "-c" | "--config" => Ok(ConsoleCommand::Config),
            "help" | "5" | "-h" | "--help" => Ok(ConsoleCommand::Help),
            "exit" | "6" | "quit" => Ok(ConsoleCommand::Exit),
            "pause" | "7" => Ok(ConsoleCommand::Pause),
            "resume" | "8" => Ok(ConsoleCommand::Resume),
            other => Err(format!("Unknown command: {}", other)),
        }
    }
}

/// Line-oriented front end for a [`Miner`]
pub struct Console {
    miner: Miner,
    hardware: StatsReporter,
}

impl Console {
    /// Creates a console driving `miner`
    pub fn new(miner: Miner) -> Self {
        Console {
            miner,
            hardware: StatsReporter::new(),
        }
    }

    /// Reads and executes commands until `exit` or end of input
    ///
    /// Mining is stopped before returning.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, out: &mut W) -> io::Result<()> {
        self.print_help(out)?;

        let mut lines = input.lines();
        loop {
            write!(out, "> ")?;
            out.flush()?;

            let Some(line) = lines.next() else {
                break;
            };
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match line.parse::<ConsoleCommand>() {
                Ok(command) => {
                    if !self.execute(command, out)? {
                        return Ok(());
                    }
                }
                Err(e) => writeln!(out, "{}. Type 'help' for a list of commands.", e)?,
            }
        }

        self.miner.stop();
        Ok(())
    }

    /// Executes one command
    ///
    /// # Returns
    /// `false` once the console should exit
    pub fn execute<W: Write>(&mut self, command: ConsoleCommand, out: &mut W) -> io::Result<bool> {
        match command {
            ConsoleCommand::Start => {
                if self.miner.state() != MiningState::Stopped {
                    writeln!(out, "Mining is already running")?;
                } else {
                    match self.miner.start() {
                        Ok(()) => writeln!(out, "Mining started")?,
                        Err(e) => writeln!(out, "Failed to start mining: {}", e)?,
                    }
                }
            }
            ConsoleCommand::Stop => {
                if self.miner.state() == MiningState::Stopped {
                    writeln!(out, "Mining is not running")?;
                } else {
                    self.miner.stop();
                    writeln!(out, "Mining stopped")?;
                }
            }
            ConsoleCommand::Pause => {
                if self.miner.is_mining() {
                    self.miner.pause();
                    writeln!(out, "Mining paused")?;
                } else {
                    writeln!(out, "Mining is not running")?;
                }
            }
            ConsoleCommand::Resume => {
                if self.miner.is_paused() {
                    self.miner.resume();
                    writeln!(out, "Mining resumed")?;
                } else {
                    writeln!(out, "Mining is not paused")?;
                }
            }
            ConsoleCommand::Status => self.print_status(out)?,
            ConsoleCommand::Config => self.print_config(out)?,
            ConsoleCommand::Help => self.print_help(out)?,
            ConsoleCommand::Exit => {
                writeln!(out, "Shutting down...")?;
                self.miner.stop();
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn print_status<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        writeln!(out, "=== MINER STATUS ===")?;
        writeln!(out, "State: {}", self.miner.state())?;

        if self.miner.state() != MiningState::Stopped {
            let snapshot = self.miner.current_hashrate();
            writeln!(out, "Total hashrate: {:.2} H/s", snapshot.total_hashrate)?;
            writeln!(out, "Primary hashrate: {:.2} H/s", snapshot.primary_hashrate)?;
            writeln!(out, "Secondary hashrate: {:.2} H/s", snapshot.secondary_hashrate)?;
            writeln!(out, "Shares found: {}", snapshot.shares_found)?;
        }

        let mut counts: Vec<_> = self.miner.share_counts().into_iter().collect();
        counts.sort();
        for (address, count) in counts {
            writeln!(out, "  {}: {} shares", address, count)?;
        }

        let hw = self.hardware.get_hardware_stats();
        writeln!(
            out,
            "CPU: {:.1}% | Memory: {} MiB | Temp: {:.1}°C",
            hw.cpu_usage,
            hw.memory_used / (1024 * 1024),
            hw.temperature
        )?;
        writeln!(out)
    }

    fn print_config<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let config = self.miner.config();
        writeln!(out, "=== CONFIGURATION ===")?;
        writeln!(out, "Primary address: {}", config.mining.primary_address)?;
        writeln!(out, "Secondary address: {}", config.mining.secondary_address)?;
        writeln!(
            out,
            "Split: {}% / {}% ({})",
            config.mining.primary_percentage,
            config.mining.secondary_percentage,
            config.advanced.split_strategy
        )?;
        writeln!(out, "Pool: {}", config.mining.pool_url)?;
        writeln!(out, "Threads: {}", config.effective_threads())?;
        writeln!(
            out,
            "Auto-pause on fullscreen: {}",
            config.performance.auto_pause_on_fullscreen
        )?;
        writeln!(out, "Hashrate source: {}", config.advanced.hashrate_source)?;
        writeln!(out)
    }

    fn print_help<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "Available commands:")?;
        for (i, command) in ConsoleCommand::ALL.iter().enumerate() {
            writeln!(out, "{}. {:<7} - {}", i + 1, command, command.description())?;
        }
        writeln!(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::miner::hash::{CANDIDATE_LEN, PowHash};
    use crate::network::{LocalJobSource, LogSubmitter};
    use crate::types::HASH_SIZE;
    use std::io::Cursor;
    use std::sync::Arc;

    struct ZeroHash;

    impl PowHash for ZeroHash {
        fn digest(&self, _candidate: &[u8; CANDIDATE_LEN]) -> [u8; HASH_SIZE] {
            [0u8; HASH_SIZE]
        }

        fn name(&self) -> &'static str {
            "zero"
        }
    }

    fn miner() -> Miner {
        let mut config = Config::default();
        config.mining.primary_address = "alpha".into();
        config.mining.secondary_address = "beta".into();
        config.performance.threads = 1;
        config.performance.auto_pause_on_fullscreen = false;

        let source = Arc::new(LocalJobSource::new([0u8; HASH_SIZE], [0u8; HASH_SIZE], 100));
        Miner::builder(config, source, Arc::new(LogSubmitter))
            .hasher(Arc::new(ZeroHash))
            .build()
    }

    fn run(miner: &Miner, script: &str) -> String {
        let mut out = Vec::new();
        Console::new(miner.clone())
            .run(Cursor::new(script.to_string()), &mut out)
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn commands_parse_by_name_and_number() {
        assert_eq!("START".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Start));
        assert_eq!(" 3 ".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Status));
        assert_eq!("--stop".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Stop));
        assert_eq!("8".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Resume));
        assert!("mine".parse::<ConsoleCommand>().is_err());

        for (i, command) in ConsoleCommand::ALL.iter().enumerate() {
            assert_eq!((i + 1).to_string().parse::<ConsoleCommand>(), Ok(*command));
            assert_eq!(command.to_string().parse::<ConsoleCommand>(), Ok(*command));
        }
    }

    #[test]
    fn scripted_session() {
        let m = miner();
        let output = run(
            &m,
            "status\nstop\nstart\nstart\npause\nresume\nresume\nstatus\nconfig\nbogus\nexit\nstart\n",
        );

        assert!(output.contains("Available commands"));
        assert!(output.contains("State: stopped"));
        assert!(output.contains("Mining is not running"));
        assert!(output.contains("Mining started"));
        assert!(output.contains("Mining is already running"));
        assert!(output.contains("Mining paused"));
        assert!(output.contains("Mining resumed"));
        assert!(output.contains("Mining is not paused"));
        assert!(output.contains("State: running"));
        assert!(output.contains("Primary address: alpha"));
        assert!(output.contains("Split: 70% / 30% (random)"));
        assert!(output.contains("Unknown command: bogus"));
        assert!(output.contains("Shutting down"));

        // Nothing after exit runs
        assert_eq!(m.state(), MiningState::Stopped);
        assert_eq!(output.matches("Mining started").count(), 1);
    }

    #[test]
    fn end_of_input_stops_mining() {
        let m = miner();
        run(&m, "start\n");
        assert_eq!(m.state(), MiningState::Stopped);
    }

    #[test]
    fn start_failure_is_printed() {
        let source = Arc::new(LocalJobSource::new([0u8; HASH_SIZE], [0u8; HASH_SIZE], 100));
        let m = Miner::new(Config::default(), source, Arc::new(LogSubmitter));
        let output = run(&m, "start\n");
        assert!(output.contains("Failed to start mining"));
        assert_eq!(m.state(), MiningState::Stopped);
    }
}
