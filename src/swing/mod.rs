//! Swing phase detection.
//!
//! [`machine::SwingPhaseMachine`] is the deterministic per-frame classifier.
//! [`detector::SwingDetector`] wraps it with landmark smoothing, the
//! real-time safety timeout and event publication so it can be driven from a
//! capture thread and observed from any other.

/// Frames captured between backswing start and finish
pub mod recording;

/// Per-frame phase state machine
pub mod machine;

/// Attempt-keyed safety timer
pub mod timeout;

/// Thread-safe detector combining smoothing, the machine and notifications
pub mod detector;

use serde::Serialize;
use std::fmt;

/// Phase of the golf swing currently being tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SwingState {
    /// Waiting for a steady address stance
    Idle,
    /// Armed: baseline captured, waiting for the takeaway
    Address,
    /// Wrists rising from the baseline
    Backswing,
    /// Wrists returning toward the baseline
    Downswing,
    /// Swing complete; held until the caller resets
    Finish,
}

impl SwingState {
    /// Human-readable prompt for display layers
    #[must_use]
    pub fn status_message(self) -> &'static str {
        match self {
            Self::Idle => "Step into your address position",
            Self::Address => "Ready. Start your swing",
            Self::Backswing => "Backswing",
            Self::Downswing => "Downswing",
            Self::Finish => "Swing captured",
        }
    }

    /// Whether frames are being recorded in this state
    #[must_use]
    pub fn is_swinging(self) -> bool {
        matches!(self, Self::Backswing | Self::Downswing)
    }

    /// The only state this one may advance to
    #[must_use]
    pub fn successor(self) -> Self {
        match self {
            Self::Idle => Self::Address,
            Self::Address => Self::Backswing,
            Self::Backswing => Self::Downswing,
            Self::Downswing => Self::Finish,
            Self::Finish => Self::Idle,
        }
    }
}

impl fmt::Display for SwingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Address => "address",
            Self::Backswing => "backswing",
            Self::Downswing => "downswing",
            Self::Finish => "finish",
        };
        f.write_str(name)
    }
}

/// Identity of one swing, incremented on every backswing entry.
///
/// Timers carry the attempt they were armed for so a late firing can be
/// recognised and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SwingAttempt(pub u64);

impl fmt::Display for SwingAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_successor_cycle() {
        let mut state = SwingState::Idle;
        let mut seen = Vec::new();
        for _ in 0..5 {
            state = state.successor();
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![
                SwingState::Address,
                SwingState::Backswing,
                SwingState::Downswing,
                SwingState::Finish,
                SwingState::Idle
            ]
        );
    }

    #[test]
    fn test_swinging_states() {
        assert!(SwingState::Backswing.is_swinging());
        assert!(SwingState::Downswing.is_swinging());
        assert!(!SwingState::Address.is_swinging());
        assert!(!SwingState::Finish.is_swinging());
    }
}
