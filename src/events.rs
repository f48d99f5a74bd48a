//! Swing notifications for display and orchestration layers.
//!
//! The detector owns the authoritative state and publishes immutable
//! [`SwingEvent`]s to every subscriber. The latest [`PhaseSnapshot`] is also
//! kept for observers that only need to poll.

use crate::swing::{SwingAttempt, SwingState};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError, RwLock};

/// Immutable view of the detector's phase
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSnapshot {
    pub state: SwingState,
    pub status_message: String,
    /// Address confidence at the time of the snapshot
    pub confidence: u32,
    /// Most recent swing attempt, if any backswing has started
    pub attempt: Option<SwingAttempt>,
}

impl PhaseSnapshot {
    #[must_use]
    pub fn new(state: SwingState, confidence: u32, attempt: Option<SwingAttempt>) -> Self {
        Self {
            state,
            status_message: state.status_message().to_string(),
            confidence,
            attempt,
        }
    }
}

impl Default for PhaseSnapshot {
    fn default() -> Self {
        Self::new(SwingState::Idle, 0, None)
    }
}

/// Notification emitted by the swing detector
#[derive(Debug, Clone, PartialEq)]
pub enum SwingEvent {
    /// Fired on every phase transition
    StateChanged(PhaseSnapshot),

    /// Fired once per completed swing
    SwingDetected {
        attempt: SwingAttempt,
        /// Frames in the recording at detection time
        frames: usize,
        /// Finished by the safety timeout rather than wrist position
        timed_out: bool,
    },

    /// Throttled diagnostics; not authoritative
    DebugSample { jitter: f64, confidence: u32 },
}

/// Fan-out of swing events to any number of subscribers
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<SwingEvent>>>,
    latest: RwLock<PhaseSnapshot>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber; it sees events published from now on
    pub fn subscribe(&self) -> Receiver<SwingEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Deliver an event, dropping subscribers whose receiver is gone
    pub fn publish(&self, event: SwingEvent) {
        if let SwingEvent::StateChanged(snapshot) = &event {
            *self.latest.write().unwrap_or_else(PoisonError::into_inner) = snapshot.clone();
        }

        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Last published phase
    #[must_use]
    pub fn latest(&self) -> PhaseSnapshot {
        self.latest.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of live subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
