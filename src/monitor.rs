// src/monitor.rs
//! Fullscreen application watcher
//!
//! Polls a [`ForegroundProbe`] and pauses mining while a fullscreen
//! application (typically a game) is running, resuming once it goes away.
//! The watcher only resumes pauses it caused itself; a pause requested
//! from the console is left alone.

use crate::miner::cancel::CancelToken;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use sysinfo::{ProcessesToUpdate, System};

/// The application currently in front of the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundApp {
    /// Executable name without extension
    pub process_name: String,
    /// Whether it covers the whole screen
    pub fullscreen: bool,
}

/// Detects the foreground application
pub trait ForegroundProbe: Send + Sync {
    /// Current foreground application, if one can be determined
    fn foreground(&self) -> Option<ForegroundApp>;
}

/// Something the watcher can pause and resume
pub trait PauseControl: Send + Sync {
    /// Requests a pause; ignored unless running
    fn pause(&self);
    /// Requests a resume; ignored unless paused
    fn resume(&self);
    /// Whether mining is currently paused
    fn is_paused(&self) -> bool;
}

/// Treats any running process from a configured list as fullscreen
///
/// Window geometry is not portable, so this probe relies on process
/// names instead, read through `sysinfo`.
pub struct ProcessListProbe {
    /// Lowercased names without extension
    names: Vec<String>,
    /// Reused between polls
    system: Mutex<System>,
}

impl ProcessListProbe {
    /// Creates a probe matching any of `names` (case-insensitive, `.exe` optional)
    pub fn new(names: &[String]) -> Self {
        ProcessListProbe {
            names: names.iter().map(|n| normalize(n)).filter(|n| !n.is_empty()).collect(),
            system: Mutex::new(System::new()),
        }
    }

    fn matches(&self, process_name: &str) -> bool {
        let name = normalize(process_name);
        self.names.iter().any(|n| *n == name)
    }
}

impl ForegroundProbe for ProcessListProbe {
    fn foreground(&self) -> Option<ForegroundApp> {
        if self.names.is_empty() {
            return None;
        }

        let mut system = self.system.lock().ok()?;
        system.refresh_processes(ProcessesToUpdate::All, true);

        system
            .processes()
            .values()
            .map(|process| process.name().to_string_lossy().into_owned())
            .find(|name| self.matches(name))
            .map(|name| ForegroundApp {
                process_name: normalize(&name),
                fullscreen: true,
            })
    }
}

fn normalize(name: &str) -> String {
    let name = name.trim().to_lowercase();
    match name.strip_suffix(".exe") {
        Some(stem) => stem.to_string(),
        None => name,
    }
}

/// Pauses mining while a fullscreen application is detected
pub struct FullscreenWatcher<C: PauseControl> {
    /// Source of foreground information
    probe: Arc<dyn ForegroundProbe>,
    /// What gets paused
    control: C,
    /// Pause on detection, or only log
    pause_on_detect: bool,
    /// Whether the current pause was ours
    paused_by_watcher: bool,
    /// Last seen fullscreen process, for transition logging
    last_app: Option<String>,
}

impl<C: PauseControl + 'static> FullscreenWatcher<C> {
    /// Creates a watcher
    ///
    /// # Arguments
    /// * `pause_on_detect` - When false, fullscreen apps are only logged
    pub fn new(probe: Arc<dyn ForegroundProbe>, control: C, pause_on_detect: bool) -> Self {
        FullscreenWatcher {
            probe,
            control,
            pause_on_detect,
            paused_by_watcher: false,
            last_app: None,
        }
    }

    /// Checks the probe once and pauses or resumes on a transition
    pub fn poll(&mut self) {
        let app = self.probe.foreground().filter(|app| app.fullscreen);

        match app {
            Some(app) => {
                if self.last_app.as_deref() != Some(app.process_name.as_str()) {
                    log::info!("Fullscreen application detected: {}", app.process_name);
                }
                if self.pause_on_detect && !self.control.is_paused() {
                    self.control.pause();
                    self.paused_by_watcher = self.control.is_paused();
                }
                self.last_app = Some(app.process_name);
            }
            None => {
                if self.paused_by_watcher {
                    log::info!("Fullscreen application closed");
                    self.control.resume();
                    self.paused_by_watcher = false;
                }
                self.last_app = None;
            }
        }
    }

    /// Polls every `interval` on a named thread until `cancel` fires
    pub fn spawn(mut self, interval: Duration, cancel: CancelToken) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("fullscreen-watcher".into())
            .spawn(move || {
                while !cancel.wait_timeout(interval) {
                    self.poll();
                }
            })
    }
}
