// src/miner/manager.rs
//! Mining orchestrator
//!
//! [`Miner`] owns the worker lifecycle:
//!
//! ```text
//! Stopped --start()--> Running --pause()--> Paused --resume()--> Running
//! Running | Paused --stop()--> Stopped
//! ```
//!
//! Calls that do not fit the current state are ignored. A `start()` or
//! `stop()` that arrives while another caller is stopping waits for the
//! miner to reach `Stopped` first. Every transition is published on the
//! miner's [`EventBus`].

use crate::config::Config;
use crate::events::{EventBus, MinerEvent};
use crate::miner::cancel::CancelToken;
use crate::miner::hash::{MixedSha256, PowHash};
use crate::miner::worker::{Worker, WorkerContext};
use crate::monitor::{ForegroundProbe, FullscreenWatcher, PauseControl};
use crate::network::{JobSource, ShareSubmitter};
use crate::stats::ShareDistributor;
use crate::types::{HashrateSnapshot, MiningState};
use crate::utils::error::MinerError;
use crossbeam_channel::Receiver;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Cloneable handle to a mining orchestrator
///
/// All clones control the same workers.
#[derive(Clone)]
pub struct Miner {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    source: Arc<dyn JobSource>,
    submitter: Arc<dyn ShareSubmitter>,
    hasher: Arc<dyn PowHash>,
    probe: Option<Arc<dyn ForegroundProbe>>,
    events: Arc<EventBus>,
    /// Read by every worker between jobs
    paused: Arc<AtomicBool>,
    control: Mutex<Control>,
    /// Signalled when a stop finishes
    stopped: Condvar,
}

/// State guarded by the control lock
struct Control {
    state: MiningState,
    cancel: Option<CancelToken>,
    threads: Vec<JoinHandle<()>>,
    /// Kept after stop so the last session's figures stay readable
    distributor: Option<Arc<ShareDistributor>>,
}

/// Collects the optional parts of a [`Miner`]
pub struct MinerBuilder {
    config: Config,
    source: Arc<dyn JobSource>,
    submitter: Arc<dyn ShareSubmitter>,
    hasher: Arc<dyn PowHash>,
    probe: Option<Arc<dyn ForegroundProbe>>,
}

impl MinerBuilder {
    /// Replaces the default digest function
    pub fn hasher(mut self, hasher: Arc<dyn PowHash>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Enables fullscreen detection through `probe`
    ///
    /// Only used when `performance.auto_pause_on_fullscreen` is set.
    pub fn foreground_probe(mut self, probe: Arc<dyn ForegroundProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Finishes the miner in the `Stopped` state
    pub fn build(self) -> Miner {
        Miner {
            inner: Arc::new(Inner {
                config: self.config,
                source: self.source,
                submitter: self.submitter,
                hasher: self.hasher,
                probe: self.probe,
                events: Arc::new(EventBus::new()),
                paused: Arc::new(AtomicBool::new(false)),
                control: Mutex::new(Control {
                    state: MiningState::Stopped,
                    cancel: None,
                    threads: Vec::new(),
                    distributor: None,
                }),
                stopped: Condvar::new(),
            }),
        }
    }
}

impl Miner {
    /// Starts building a miner over a job source and share submitter
    pub fn builder(
        config: Config,
        source: Arc<dyn JobSource>,
        submitter: Arc<dyn ShareSubmitter>,
    ) -> MinerBuilder {
        MinerBuilder {
            config,
            source,
            submitter,
            hasher: Arc::new(MixedSha256::new()),
            probe: None,
        }
    }

    /// Creates a miner with the default digest and no fullscreen detection
    pub fn new(
        config: Config,
        source: Arc<dyn JobSource>,
        submitter: Arc<dyn ShareSubmitter>,
    ) -> Self {
        Self::builder(config, source, submitter).build()
    }

    /// Validates the configuration and spawns the workers
    ///
    /// Waits out a concurrent stop, then does nothing unless the miner is
    /// stopped.
    ///
    /// # Errors
    /// * `MinerError::ConfigError` - The configuration is invalid; state stays `Stopped`
    /// * `MinerError::IoError` - A thread could not be spawned; state returns to `Stopped`
    pub fn start(&self) -> Result<(), MinerError> {
        let mut control = self.settled();
        if control.state != MiningState::Stopped {
            log::debug!("Start ignored, miner is {}", control.state);
            return Ok(());
        }

        let config = &self.inner.config;
        if let Err(e) = config.validate() {
            log::error!("Refusing to start: {}", e);
            drop(control);
            self.emit(MinerEvent::Status(format!("Configuration error: {}", e)));
            return Err(e);
        }

        control.state = MiningState::Starting;
        self.emit(MinerEvent::State(MiningState::Starting));

        let threads = config.effective_threads();
        log::info!(
            "Starting {} mining threads using {} ({}% / {}%, {} split)",
            threads,
            self.inner.hasher.name(),
            config.mining.primary_percentage,
            config.mining.secondary_percentage,
            config.advanced.split_strategy
        );

        let distributor = Arc::new(
            ShareDistributor::new(
                config.payout_split(),
                Arc::clone(&self.inner.submitter),
                Arc::clone(&self.inner.events),
            )
            .with_report_interval(config.report_interval())
            .with_hashrate_source(config.advanced.hashrate_source),
        );
        let cancel = CancelToken::new();
        self.inner.paused.store(false, Ordering::SeqCst);

        match self.spawn_threads(threads, &distributor, &cancel) {
            Ok(handles) => {
                control.state = MiningState::Running;
                control.cancel = Some(cancel);
                control.threads = handles;
                control.distributor = Some(distributor);
            }
            Err(e) => {
                log::error!("Failed to spawn mining threads: {}", e);
                control.state = MiningState::Stopped;
                drop(control);
                self.emit(MinerEvent::State(MiningState::Stopped));
                return Err(e);
            }
        }
        drop(control);

        self.emit(MinerEvent::StatusChanged(true));
        self.emit(MinerEvent::Status(format!("Mining started with {} threads", threads)));
        self.emit(MinerEvent::State(MiningState::Running));
        Ok(())
    }

    /// Cancels every worker and waits for them to exit
    ///
    /// Does nothing unless the miner is running or paused. A call made
    /// while another caller is stopping returns once that stop completes.
    pub fn stop(&self) {
        let (cancel, threads) = {
            let mut control = self.settled();
            if !matches!(control.state, MiningState::Running | MiningState::Paused) {
                return;
            }
            control.state = MiningState::Stopping;
            (control.cancel.take(), std::mem::take(&mut control.threads))
        };

        log::info!("Stopping miner");
        self.emit(MinerEvent::State(MiningState::Stopping));

        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        for handle in threads {
            if handle.join().is_err() {
                log::error!("A mining thread panicked");
            }
        }

        self.inner.paused.store(false, Ordering::SeqCst);
        self.emit(MinerEvent::StatusChanged(false));
        self.emit(MinerEvent::Status("Miner stopped".into()));

        // Published under the lock so a waiting start() cannot overtake it
        let mut control = self.control();
        control.state = MiningState::Stopped;
        self.emit(MinerEvent::State(MiningState::Stopped));
        drop(control);
        self.inner.stopped.notify_all();
    }

    /// Idles the workers after their current job
    ///
    /// Does nothing unless the miner is running.
    pub fn pause(&self) {
        {
            let mut control = self.control();
            if control.state != MiningState::Running {
                return;
            }
            control.state = MiningState::Paused;
            self.inner.paused.store(true, Ordering::SeqCst);
        }

        log::info!("Mining paused");
        self.emit(MinerEvent::StatusChanged(false));
        self.emit(MinerEvent::Status("Miner paused".into()));
        self.emit(MinerEvent::State(MiningState::Paused));
    }

    /// Lets paused workers take jobs again
    ///
    /// Does nothing unless the miner is paused.
    pub fn resume(&self) {
        {
            let mut control = self.control();
            if control.state != MiningState::Paused {
                return;
            }
            control.state = MiningState::Running;
            self.inner.paused.store(false, Ordering::SeqCst);
        }

        log::info!("Mining resumed");
        self.emit(MinerEvent::StatusChanged(true));
        self.emit(MinerEvent::Status("Mining resumed".into()));
        self.emit(MinerEvent::State(MiningState::Running));
    }

    /// Current lifecycle state
    pub fn state(&self) -> MiningState {
        self.control().state
    }

    /// Whether workers are actively mining (running and not paused)
    pub fn is_mining(&self) -> bool {
        self.state() == MiningState::Running
    }

    /// Whether the miner is paused
    pub fn is_paused(&self) -> bool {
        self.state() == MiningState::Paused
    }

    /// Subscribes to hashrate reports and lifecycle events
    pub fn subscribe(&self) -> Receiver<MinerEvent> {
        self.inner.events.subscribe()
    }

    /// Hashrate since the last report; zero if mining never started
    pub fn current_hashrate(&self) -> HashrateSnapshot {
        self.distributor()
            .map(|d| d.current_hashrate())
            .unwrap_or_else(HashrateSnapshot::zero)
    }

    /// Shares per payout address for the current or last session
    pub fn share_counts(&self) -> HashMap<String, u64> {
        self.distributor()
            .map(|d| d.share_counts())
            .unwrap_or_default()
    }

    /// Configuration this miner was built with
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    fn distributor(&self) -> Option<Arc<ShareDistributor>> {
        self.control().distributor.clone()
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        self.inner.control.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Locks the control state once no stop is in progress
    fn settled(&self) -> MutexGuard<'_, Control> {
        let mut control = self.control();
        while control.state == MiningState::Stopping {
            control = self
                .inner
                .stopped
                .wait(control)
                .unwrap_or_else(|p| p.into_inner());
        }
        control
    }

    fn emit(&self, event: MinerEvent) {
        self.inner.events.emit(event);
    }

    /// Spawns workers, the reporter and the fullscreen watcher
    ///
    /// On failure every thread already spawned is cancelled and joined.
    fn spawn_threads(
        &self,
        threads: usize,
        distributor: &Arc<ShareDistributor>,
        cancel: &CancelToken,
    ) -> Result<Vec<JoinHandle<()>>, MinerError> {
        let config = &self.inner.config;
        let ctx = WorkerContext {
            source: Arc::clone(&self.inner.source),
            distributor: Arc::clone(distributor),
            hasher: Arc::clone(&self.inner.hasher),
            paused: Arc::clone(&self.inner.paused),
            cancel: cancel.clone(),
            backoff: config.worker_backoff(),
        };

        let mut handles = Vec::with_capacity(threads + 2);
        match self.spawn_into(&mut handles, threads, ctx, distributor) {
            Ok(()) => Ok(handles),
            Err(e) => {
                cancel.cancel();
                for handle in handles {
                    let _ = handle.join();
                }
                Err(MinerError::IoError(e))
            }
        }
    }

    fn spawn_into(
        &self,
        handles: &mut Vec<JoinHandle<()>>,
        threads: usize,
        ctx: WorkerContext,
        distributor: &Arc<ShareDistributor>,
    ) -> std::io::Result<()> {
        let config = &self.inner.config;

        for id in 0..threads {
            handles.push(Worker::new(id, ctx.clone()).spawn()?);
        }
        handles.push(spawn_reporter(
            Arc::clone(distributor),
            config.report_interval(),
            ctx.cancel.clone(),
        )?);

        if config.performance.auto_pause_on_fullscreen {
            if let Some(probe) = &self.inner.probe {
                let watcher = FullscreenWatcher::new(
                    Arc::clone(probe),
                    self.clone(),
                    config.performance.pause_on_game_detected,
                );
                handles.push(watcher.spawn(config.fullscreen_poll_interval(), ctx.cancel.clone())?);
            }
        }

        Ok(())
    }
}

impl PauseControl for Miner {
    fn pause(&self) {
        Miner::pause(self);
    }

    fn resume(&self) {
        Miner::resume(self);
    }

    fn is_paused(&self) -> bool {
        Miner::is_paused(self)
    }
}

/// Emits hashrate reports on schedule even while no shares arrive
fn spawn_reporter(
    distributor: Arc<ShareDistributor>,
    interval: Duration,
    cancel: CancelToken,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("hashrate-reporter".into())
        .spawn(move || {
            while !cancel.wait_timeout(interval) {
                distributor.report_if_due();
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::hash::CANDIDATE_LEN;
    use crate::monitor::ForegroundApp;
    use crate::network::LocalJobSource;
    use crate::types::{HASH_SIZE, MiningJob, MiningResult};
    use std::sync::atomic::AtomicU64;
    use std::time::Instant;

    /// Every digest is zero, so every job yields a share at its first nonce
    struct ZeroHash;

    impl PowHash for ZeroHash {
        fn digest(&self, _candidate: &[u8; CANDIDATE_LEN]) -> [u8; HASH_SIZE] {
            [0u8; HASH_SIZE]
        }

        fn name(&self) -> &'static str {
            "zero"
        }
    }

    #[derive(Default)]
    struct CountingSubmitter {
        count: AtomicU64,
    }

    impl ShareSubmitter for CountingSubmitter {
        fn submit(&self, _: &str, _: &MiningResult, _: &MiningJob) -> Result<(), MinerError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Holds every worker inside `next_job` for a fixed time, ignoring cancel
    struct SlowSource {
        delay: Duration,
    }

    impl JobSource for SlowSource {
        fn next_job(&self, _cancel: &CancelToken) -> Result<Option<MiningJob>, MinerError> {
            thread::sleep(self.delay);
            Ok(None)
        }
    }

    fn slow_miner() -> Miner {
        let source = Arc::new(SlowSource {
            delay: Duration::from_millis(300),
        });
        Miner::builder(config(1), source, Arc::new(CountingSubmitter::default()))
            .hasher(Arc::new(ZeroHash))
            .build()
    }

    struct AlwaysFullscreen;

    impl ForegroundProbe for AlwaysFullscreen {
        fn foreground(&self) -> Option<ForegroundApp> {
            Some(ForegroundApp {
                process_name: "game".into(),
                fullscreen: true,
            })
        }
    }

    fn config(threads: i32) -> Config {
        let mut config = Config::default();
        config.mining.primary_address = "primary".into();
        config.mining.secondary_address = "secondary".into();
        config.performance.threads = threads;
        config.performance.auto_pause_on_fullscreen = false;
        config.performance.fullscreen_poll_ms = 5;
        config.advanced.worker_backoff_ms = 10;
        config
    }

    fn miner(config: Config, submitter: Arc<CountingSubmitter>) -> Miner {
        let source = Arc::new(LocalJobSource::new([0u8; HASH_SIZE], [0u8; HASH_SIZE], 100));
        Miner::builder(config, source, submitter)
            .hasher(Arc::new(ZeroHash))
            .build()
    }

    fn wait_until(mut done: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(5) {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        done()
    }

    #[test]
    fn new_miner_is_stopped() {
        let m = miner(config(1), Arc::default());
        assert_eq!(m.state(), MiningState::Stopped);
        assert!(!m.is_mining());
        assert!(!m.is_paused());
        assert_eq!(m.current_hashrate().total_hashrate, 0.0);
        assert!(m.share_counts().is_empty());
    }

    #[test]
    fn invalid_config_is_reported_and_stays_stopped() {
        let mut c = config(1);
        c.mining.primary_percentage = 50;
        let m = miner(c, Arc::default());
        let events = m.subscribe();

        assert!(matches!(m.start(), Err(MinerError::ConfigError(_))));
        assert_eq!(m.state(), MiningState::Stopped);
        assert!(matches!(events.try_recv(), Ok(MinerEvent::Status(msg)) if msg.contains("Configuration")));
    }

    #[test]
    fn pause_and_resume_outside_their_states_are_ignored() {
        let m = miner(config(1), Arc::default());
        m.pause();
        assert_eq!(m.state(), MiningState::Stopped);
        m.resume();
        assert_eq!(m.state(), MiningState::Stopped);
        m.stop();
        m.stop();
        assert_eq!(m.state(), MiningState::Stopped);
    }

    #[test]
    fn full_lifecycle_with_real_threads() {
        let submitter = Arc::new(CountingSubmitter::default());
        let m = miner(config(2), submitter.clone());
        let events = m.subscribe();

        m.start().unwrap();
        assert!(m.is_mining());
        assert!(wait_until(|| submitter.count.load(Ordering::SeqCst) > 10));

        // Second start is a no-op, resume while running too
        m.start().unwrap();
        m.resume();
        assert_eq!(m.state(), MiningState::Running);

        m.pause();
        assert!(m.is_paused());
        assert!(!m.is_mining());
        // Workers finish their current job, then go idle
        thread::sleep(Duration::from_millis(50));
        let during_pause = submitter.count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(100));
        assert_eq!(submitter.count.load(Ordering::SeqCst), during_pause);

        m.resume();
        assert!(wait_until(|| submitter.count.load(Ordering::SeqCst) > during_pause));

        m.stop();
        assert_eq!(m.state(), MiningState::Stopped);
        let after_stop = submitter.count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(submitter.count.load(Ordering::SeqCst), after_stop);

        let counts = m.share_counts();
        assert_eq!(counts.values().sum::<u64>(), after_stop);

        let states: Vec<MiningState> = events
            .try_iter()
            .filter_map(|e| match e {
                MinerEvent::State(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                MiningState::Starting,
                MiningState::Running,
                MiningState::Paused,
                MiningState::Running,
                MiningState::Stopping,
                MiningState::Stopped,
            ]
        );
    }

    #[test]
    fn status_changes_follow_activity() {
        let m = miner(config(1), Arc::default());
        let events = m.subscribe();

        m.start().unwrap();
        m.pause();
        m.resume();
        m.stop();

        let flags: Vec<bool> = events
            .try_iter()
            .filter_map(|e| match e {
                MinerEvent::StatusChanged(active) => Some(active),
                _ => None,
            })
            .collect();
        assert_eq!(flags, vec![true, false, true, false]);
    }

    #[test]
    fn stop_while_paused_and_restart() {
        let submitter = Arc::new(CountingSubmitter::default());
        let m = miner(config(1), submitter.clone());

        m.start().unwrap();
        m.pause();
        m.stop();
        assert_eq!(m.state(), MiningState::Stopped);

        m.start().unwrap();
        assert!(m.is_mining());
        assert!(wait_until(|| submitter.count.load(Ordering::SeqCst) > 0));
        m.stop();
    }

    #[test]
    fn clones_share_one_orchestrator() {
        let m = miner(config(1), Arc::default());
        let other = m.clone();
        m.start().unwrap();
        assert!(other.is_mining());
        other.stop();
        assert_eq!(m.state(), MiningState::Stopped);
    }

    #[test]
    fn fullscreen_probe_pauses_mining() {
        let mut c = config(1);
        c.performance.auto_pause_on_fullscreen = true;
        let source = Arc::new(LocalJobSource::new([0u8; HASH_SIZE], [0u8; HASH_SIZE], 100));
        let m = Miner::builder(c, source, Arc::new(CountingSubmitter::default()))
            .hasher(Arc::new(ZeroHash))
            .foreground_probe(Arc::new(AlwaysFullscreen))
            .build();

        m.start().unwrap();
        assert!(wait_until(|| m.is_paused()));
        m.stop();
        assert_eq!(m.state(), MiningState::Stopped);
    }

    #[test]
    fn concurrent_stop_waits_for_workers() {
        let m = slow_miner();
        m.start().unwrap();
        // Let the worker enter its slow fetch
        thread::sleep(Duration::from_millis(20));

        let first = {
            let m = m.clone();
            thread::spawn(move || m.stop())
        };
        assert!(wait_until(|| m.state() == MiningState::Stopping));

        m.stop();
        assert_eq!(m.state(), MiningState::Stopped);
        first.join().unwrap();
    }

    #[test]
    fn start_during_stop_restarts_after_it() {
        let m = slow_miner();
        let events = m.subscribe();
        m.start().unwrap();
        thread::sleep(Duration::from_millis(20));

        let stopper = {
            let m = m.clone();
            thread::spawn(move || m.stop())
        };
        assert!(wait_until(|| m.state() == MiningState::Stopping));

        m.start().unwrap();
        assert!(m.is_mining());
        stopper.join().unwrap();

        let states: Vec<MiningState> = events
            .try_iter()
            .filter_map(|e| match e {
                MinerEvent::State(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(
            &states[..4],
            &[
                MiningState::Starting,
                MiningState::Running,
                MiningState::Stopping,
                MiningState::Stopped,
            ]
        );
        m.stop();
        assert_eq!(m.state(), MiningState::Stopped);
    }
}
