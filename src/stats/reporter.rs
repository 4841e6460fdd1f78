// src/stats/reporter.rs
use crate::events::MinerEvent;
use crate::types::HashrateSnapshot;
use crossbeam_channel::Receiver;
use std::io;
use std::thread::{self, JoinHandle};
use sysinfo::{Components, System};

/// Statistics related to hardware performance
#[derive(Debug, Clone, PartialEq)]
pub struct HardwareStats {
    /// Current CPU usage percentage (0-100)
    pub cpu_usage: f32,
    /// Memory currently in use system-wide (in bytes)
    pub memory_used: u64,
    /// Current CPU temperature in Celsius, 0 if unavailable
    pub temperature: f32,
}

/// Logs miner events together with hardware statistics
pub struct StatsReporter {
    /// System information collector
    system: System,
    /// Hardware component information collector
    components: Components,
}

impl Default for StatsReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsReporter {
    /// Creates a new StatsReporter
    pub fn new() -> Self {
        StatsReporter {
            system: System::new_all(),
            components: Components::new_with_refreshed_list(),
        }
    }

    /// Gets the current hardware statistics
    ///
    /// This refreshes system information before returning the stats.
    ///
    /// # Returns
    /// A snapshot of the current hardware statistics
    pub fn get_hardware_stats(&mut self) -> HardwareStats {
        self.system.refresh_cpu_all();
        self.system.refresh_memory();
        self.components.refresh(true);

        let cpus = self.system.cpus();
        let cpu_usage = if cpus.is_empty() {
            0.0
        } else {
            cpus.iter().map(|c| c.cpu_usage()).sum::<f32>() / cpus.len() as f32
        };

        let temperature = self
            .components
            .iter()
            .find(|c| c.label().contains("CPU"))
            .and_then(|c| c.temperature())
            .unwrap_or(0.0);

        HardwareStats {
            cpu_usage,
            memory_used: self.system.used_memory(),
            temperature,
        }
    }

    /// Formats a hashrate report with hardware figures
    pub fn format_report(snapshot: &HashrateSnapshot, hw: &HardwareStats) -> String {
        format!(
            "Hashrate: {:.2} H/s (primary {:.2}, secondary {:.2}) | Shares: {} | CPU: {:.1}% | Mem: {} MiB | Temp: {:.1}°C",
            snapshot.total_hashrate,
            snapshot.primary_hashrate,
            snapshot.secondary_hashrate,
            snapshot.shares_found,
            hw.cpu_usage,
            hw.memory_used / (1024 * 1024),
            hw.temperature
        )
    }

    /// Logs every event from `events` on a background thread
    ///
    /// The thread ends when the event bus is dropped.
    pub fn start_reporting(mut self, events: Receiver<MinerEvent>) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("stats-reporter".into())
            .spawn(move || {
                for event in events {
                    match event {
                        MinerEvent::Hashrate(snapshot) => {
                            let hw = self.get_hardware_stats();
                            log::info!("{}", Self::format_report(&snapshot, &hw));
                        }
                        MinerEvent::Status(message) => log::info!("[Status] {}", message),
                        MinerEvent::StatusChanged(active) => log::debug!(
                            "Mining status changed: {}",
                            if active { "active" } else { "inactive" }
                        ),
                        MinerEvent::State(state) => log::debug!("Miner state: {}", state),
                    }
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;

    #[test]
    fn report_line_includes_every_figure() {
        let snapshot = HashrateSnapshot {
            total_hashrate: 100.0,
            primary_hashrate: 70.0,
            secondary_hashrate: 30.0,
            shares_found: 12,
            ..HashrateSnapshot::zero()
        };
        let hw = HardwareStats {
            cpu_usage: 55.5,
            memory_used: 3 * 1024 * 1024,
            temperature: 0.0,
        };

        let line = StatsReporter::format_report(&snapshot, &hw);
        assert!(line.contains("100.00 H/s"));
        assert!(line.contains("primary 70.00"));
        assert!(line.contains("Shares: 12"));
        assert!(line.contains("CPU: 55.5%"));
        assert!(line.contains("Mem: 3 MiB"));
    }

    #[test]
    fn hardware_stats_are_sane() {
        let hw = StatsReporter::new().get_hardware_stats();
        assert!(hw.cpu_usage >= 0.0);
        assert!(!hw.cpu_usage.is_nan());
    }

    #[test]
    fn reporter_thread_ends_with_the_bus() {
        let bus = EventBus::new();
        let handle = StatsReporter::new().start_reporting(bus.subscribe()).unwrap();

        bus.emit(MinerEvent::Status("hello".into()));
        bus.emit(MinerEvent::Hashrate(HashrateSnapshot::zero()));
        drop(bus);

        handle.join().unwrap();
    }
}
