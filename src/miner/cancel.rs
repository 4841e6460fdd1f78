// src/miner/cancel.rs
//! Broadcast cancellation for worker threads
//!
//! A [`CancelToken`] is cloned into every worker. Cancelling any clone is
//! observed by all of them: the hot loop polls an atomic flag, and threads
//! that are sleeping (backoff, pause, waiting for a job) are woken at once
//! because cancelling drops the only sender of a channel they all wait on.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared, cloneable cancellation signal
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    wake: Receiver<()>,
    wake_sender: Arc<Mutex<Option<Sender<()>>>>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        CancelToken {
            cancelled: Arc::new(AtomicBool::new(false)),
            wake: rx,
            wake_sender: Arc::new(Mutex::new(Some(tx))),
        }
    }

    /// Signals cancellation to every clone of this token
    ///
    /// Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Ok(mut sender) = self.wake_sender.lock() {
            sender.take();
        }
    }

    /// Whether cancellation has been requested
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Sleeps for up to `timeout`, returning early on cancellation
    ///
    /// # Returns
    /// `true` if the token was cancelled before or during the wait
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        match self.wake.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) => true,
            _ => self.is_cancelled(),
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn fresh_token_is_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(!token.wait_timeout(Duration::from_millis(5)));
    }

    #[test]
    fn cancel_is_seen_by_all_clones() {
        let token = CancelToken::new();
        let clones: Vec<_> = (0..4).map(|_| token.clone()).collect();
        clones[2].cancel();

        assert!(token.is_cancelled());
        assert!(clones.iter().all(CancelToken::is_cancelled));

        // Cancelling twice is harmless
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_wakes_sleeping_threads() {
        let token = CancelToken::new();
        let started = Instant::now();

        let sleepers: Vec<_> = (0..3)
            .map(|_| {
                let t = token.clone();
                std::thread::spawn(move || t.wait_timeout(Duration::from_secs(30)))
            })
            .collect();

        std::thread::sleep(Duration::from_millis(20));
        token.cancel();

        for sleeper in sleepers {
            assert!(sleeper.join().unwrap());
        }
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
