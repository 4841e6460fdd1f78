// src/events.rs
//! Miner event stream
//!
//! The orchestrator and distributor publish [`MinerEvent`]s on an
//! [`EventBus`]; any number of listeners (status reporter, console,
//! tests) subscribe and receive their own copy of every event.

use crate::types::{HashrateSnapshot, MiningState};
use crossbeam_channel::{Receiver, Sender};
use std::sync::Mutex;

/// Something a presentation layer may want to show
#[derive(Debug, Clone, PartialEq)]
pub enum MinerEvent {
    /// Periodic hashrate report
    Hashrate(HashrateSnapshot),
    /// Mining became active (`true`) or inactive (`false`)
    StatusChanged(bool),
    /// Human-readable status line
    Status(String),
    /// Orchestrator lifecycle transition
    State(MiningState),
}

/// Fan-out of events to every live subscriber
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<MinerEvent>>>,
}

impl EventBus {
    /// Creates a bus with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new listener
    ///
    /// Events emitted before this call are not replayed. Dropping the
    /// receiver unsubscribes.
    pub fn subscribe(&self) -> Receiver<MinerEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }

    /// Delivers `event` to every subscriber, pruning disconnected ones
    pub fn emit(&self, event: MinerEvent) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    /// Number of live subscribers as of the last emit
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_gets_every_event() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.emit(MinerEvent::StatusChanged(true));
        bus.emit(MinerEvent::Status("hello".into()));

        for rx in [&a, &b] {
            assert_eq!(rx.try_recv(), Ok(MinerEvent::StatusChanged(true)));
            assert_eq!(rx.try_recv(), Ok(MinerEvent::Status("hello".into())));
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = EventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(MinerEvent::State(MiningState::Running));
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(kept.try_recv(), Ok(MinerEvent::State(MiningState::Running)));
    }

    #[test]
    fn emitting_without_subscribers_is_fine() {
        EventBus::new().emit(MinerEvent::StatusChanged(false));
    }
}
