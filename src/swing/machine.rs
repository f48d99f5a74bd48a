//! Per-frame swing phase classifier.
//!
//! The machine is synchronous and deterministic: one landmark frame in, at
//! most one transition out. It never blocks and has no error path; poor input
//! only drains the address confidence counter. The real-time safety timeout is
//! driven from outside through [`SwingPhaseMachine::expire`].

use super::recording::SwingRecording;
use super::{SwingAttempt, SwingState};
use crate::config::DetectionConfig;
use crate::jitter::{JitterReading, SteadinessTracker};
use crate::landmarks::{LandmarkFrame, PoseJoint};
use crate::stance::is_valid_stance;
use log::{debug, info};
use std::time::Duration;

/// A single state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State before the frame
    pub from: SwingState,
    /// State after the frame
    pub to: SwingState,
}

/// Why a frame did not reach the phase logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Detector reported nothing for this frame
    NoDetection,
    /// Fewer landmarks than required
    TooFewLandmarks(usize),
    /// Shoulders or wrists below the visibility floor
    LowVisibility,
}

/// What happened while processing one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    /// Set when the frame changed the phase
    pub transition: Option<Transition>,
    /// Steadiness reading, absent for rejected frames
    pub jitter: Option<JitterReading>,
    /// Set when the frame was not processed
    pub rejection: Option<Rejection>,
    /// Address confidence after the frame
    pub confidence: u32,
    /// Set on backswing entry: the caller arms the safety timer for it
    pub armed: Option<SwingAttempt>,
    /// Set on the frame that completed a swing
    pub swing_detected: bool,
}

impl FrameOutcome {
    fn rejected(rejection: Rejection, confidence: u32) -> Self {
        Self {
            transition: None,
            jitter: None,
            rejection: Some(rejection),
            confidence,
            armed: None,
            swing_detected: false,
        }
    }
}

/// Swing phase state machine
pub struct SwingPhaseMachine {
    config: DetectionConfig,
    state: SwingState,
    confidence: u32,
    steadiness: SteadinessTracker,
    baseline_wrist_y: Option<f64>,
    recording: SwingRecording,
    backswing_started_at: Duration,
    attempt: u64,
}

impl SwingPhaseMachine {
    /// Create a machine in the idle state
    #[must_use]
    pub fn new(config: DetectionConfig) -> Self {
        let steadiness = SteadinessTracker::new(
            config.jitter_window_size,
            config.shoulder_jitter_weight,
            config.steady_threshold,
        );
        Self {
            config,
            state: SwingState::Idle,
            confidence: 0,
            steadiness,
            baseline_wrist_y: None,
            recording: SwingRecording::new(),
            backswing_started_at: Duration::ZERO,
            attempt: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> SwingState {
        self.state
    }

    /// Address confidence, always within `[0, address_threshold]`
    #[must_use]
    pub fn confidence(&self) -> u32 {
        self.confidence
    }

    /// Wrist height captured on the last address entry
    #[must_use]
    pub fn baseline_wrist_y(&self) -> Option<f64> {
        self.baseline_wrist_y
    }

    #[must_use]
    pub fn recording(&self) -> &SwingRecording {
        &self.recording
    }

    /// Attempt of the most recent backswing, if any
    #[must_use]
    pub fn current_attempt(&self) -> Option<SwingAttempt> {
        (self.attempt > 0).then_some(SwingAttempt(self.attempt))
    }

    #[must_use]
    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Account for a frame the detector produced no landmarks for
    pub fn process_missing(&mut self) -> FrameOutcome {
        self.decay(1);
        FrameOutcome::rejected(Rejection::NoDetection, self.confidence)
    }

    /// Advance the machine with one smoothed landmark frame
    pub fn process(&mut self, frame: &LandmarkFrame) -> FrameOutcome {
        if let Some(rejection) = self.screen(frame) {
            self.decay(1);
            return FrameOutcome::rejected(rejection, self.confidence);
        }

        // screen() guarantees both pairs exist
        let (Some(wrist_y), Some(shoulder_y)) = (frame.avg_wrist_y(), frame.avg_shoulder_y()) else {
            self.decay(1);
            return FrameOutcome::rejected(Rejection::TooFewLandmarks(frame.len()), self.confidence);
        };

        let reading = self.steadiness.update(wrist_y, shoulder_y);
        let next = self.next_state(frame, wrist_y, reading);

        let mut outcome = FrameOutcome {
            transition: None,
            jitter: Some(reading),
            rejection: None,
            confidence: self.confidence,
            armed: None,
            swing_detected: false,
        };

        let previous = self.state;
        if let Some(next) = next {
            self.enter(next, frame, wrist_y, &mut outcome);
            outcome.transition = Some(Transition {
                from: previous,
                to: next,
            });
        }

        let closing_frame = previous == SwingState::Downswing && self.state == SwingState::Finish;
        if self.state.is_swinging() || closing_frame {
            let relative = frame.timestamp.saturating_sub(self.backswing_started_at);
            self.recording.push(relative, frame.clone());
        }

        outcome.confidence = self.confidence;
        outcome
    }

    /// Force a stuck swing to finish.
    ///
    /// Returns `None` when `attempt` is stale: a newer backswing started, or the
    /// swing already left backswing/downswing.
    pub fn expire(&mut self, attempt: SwingAttempt) -> Option<Transition> {
        if attempt.0 != self.attempt || !self.state.is_swinging() {
            debug!("Ignoring stale swing timeout for attempt {attempt} in {}", self.state);
            return None;
        }

        let from = self.state;
        info!(
            "Swing attempt {attempt} timed out in {from}; finishing with {} frames",
            self.recording.len()
        );
        self.state = SwingState::Finish;
        Some(Transition {
            from,
            to: SwingState::Finish,
        })
    }

    /// Drop the recording and return to idle.
    ///
    /// Returns the transition when the machine was not already idle.
    pub fn reset_to_idle(&mut self) -> Option<Transition> {
        self.recording.clear();
        self.baseline_wrist_y = None;
        self.confidence = 0;

        let from = self.state;
        self.state = SwingState::Idle;
        (from != SwingState::Idle).then_some(Transition {
            from,
            to: SwingState::Idle,
        })
    }

    fn screen(&self, frame: &LandmarkFrame) -> Option<Rejection> {
        if frame.len() < self.config.min_landmarks {
            return Some(Rejection::TooFewLandmarks(frame.len()));
        }

        let shoulders = frame.pair_min_visibility(PoseJoint::LeftShoulder, PoseJoint::RightShoulder);
        let wrists = frame.pair_min_visibility(PoseJoint::LeftWrist, PoseJoint::RightWrist);
        match (shoulders, wrists) {
            (Some(s), Some(w)) if s >= self.config.min_visibility && w >= self.config.min_visibility => None,
            (Some(_), Some(_)) => Some(Rejection::LowVisibility),
            _ => Some(Rejection::TooFewLandmarks(frame.len())),
        }
    }

    fn next_state(&mut self, frame: &LandmarkFrame, wrist_y: f64, reading: JitterReading) -> Option<SwingState> {
        let baseline = self.baseline_wrist_y.unwrap_or(wrist_y);

        match self.state {
            SwingState::Idle => {
                let valid = is_valid_stance(frame);
                if reading.steady && valid {
                    self.confidence = (self.confidence + 1).min(self.config.address_threshold);
                } else if !reading.steady {
                    self.decay(2);
                } else {
                    self.decay(1);
                }

                (reading.steady && valid && self.confidence >= self.config.address_threshold)
                    .then_some(SwingState::Address)
            }
            SwingState::Address => {
                (baseline - wrist_y > self.config.backswing_trigger).then_some(SwingState::Backswing)
            }
            SwingState::Backswing => {
                (wrist_y > baseline - self.config.backswing_return_margin).then_some(SwingState::Downswing)
            }
            SwingState::Downswing => {
                // A pause mid-downswing also satisfies the steadiness branch
                (wrist_y > baseline - self.config.finish_margin || reading.steady).then_some(SwingState::Finish)
            }
            SwingState::Finish => None,
        }
    }

    fn enter(&mut self, next: SwingState, frame: &LandmarkFrame, wrist_y: f64, outcome: &mut FrameOutcome) {
        match next {
            SwingState::Address => {
                self.baseline_wrist_y = Some(wrist_y);
                self.confidence = 0;
                info!("Address detected, baseline wrist y = {wrist_y:.3}");
            }
            SwingState::Backswing => {
                self.recording.clear();
                self.backswing_started_at = frame.timestamp;
                self.attempt += 1;
                outcome.armed = Some(SwingAttempt(self.attempt));
                info!("Backswing started (attempt #{})", self.attempt);
            }
            SwingState::Downswing => {
                debug!("Downswing at wrist y = {wrist_y:.3}");
            }
            SwingState::Finish => {
                outcome.swing_detected = true;
                info!(
                    "Swing finished (attempt #{}), {} frames recorded",
                    self.attempt,
                    self.recording.len() + 1
                );
            }
            SwingState::Idle => {}
        }
        self.state = next;
    }

    fn decay(&mut self, amount: u32) {
        self.confidence = self.confidence.saturating_sub(amount);
    }
}
