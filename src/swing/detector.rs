use super::machine::{FrameOutcome, SwingPhaseMachine, Transition};
use super::recording::SwingRecording;
use super::timeout::TimeoutScheduler;
use super::{SwingAttempt, SwingState};
use crate::config::{positive_duration, DetectionConfig, SmoothingConfig};
use crate::events::{EventBus, PhaseSnapshot, SwingEvent};
use crate::filters::{create_filter, LandmarkFilter};
use crate::landmarks::LandmarkFrame;
use crate::{Error, Result};
use log::debug;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

struct DetectorCore {
    smoother: Box<dyn LandmarkFilter>,
    machine: SwingPhaseMachine,
    accepted_frames: u64,
}

/// Swing detector driven from the landmark delivery thread.
///
/// Each call smooths the landmarks, advances the phase machine and publishes
/// resulting events. Events are published while the internal lock is held,
/// so subscribers and the latest snapshot see transitions in machine order
/// even when the safety timeout fires concurrently. The safety timeout runs
/// on its own thread and is keyed by swing attempt.
pub struct SwingDetector {
    core: Arc<Mutex<DetectorCore>>,
    events: Arc<EventBus>,
    timer: TimeoutScheduler,
    swing_timeout: Duration,
    debug_interval: u64,
}

impl SwingDetector {
    /// Create a detector in the idle state
    pub fn new(smoothing: &SmoothingConfig, detection: &DetectionConfig) -> Result<Self> {
        let smoother = create_filter(&smoothing.filter_spec())?;
        let swing_timeout = positive_duration("Swing timeout", detection.swing_timeout_secs)?;
        if detection.jitter_window_size == 0 {
            return Err(Error::ConfigError(
                "Jitter window size must be greater than 0".to_string(),
            ));
        }

        let core = Arc::new(Mutex::new(DetectorCore {
            smoother,
            machine: SwingPhaseMachine::new(detection.clone()),
            accepted_frames: 0,
        }));
        let events = Arc::new(EventBus::new());

        let timer_core = Arc::clone(&core);
        let timer_events = Arc::clone(&events);
        let timer = TimeoutScheduler::spawn(move |attempt| {
            let core = &mut *lock(&timer_core);
            if let Some(transition) = core.machine.expire(attempt) {
                timer_events.publish(SwingEvent::StateChanged(snapshot_of(&core.machine, transition)));
                timer_events.publish(SwingEvent::SwingDetected {
                    attempt,
                    frames: core.machine.recording().len(),
                    timed_out: true,
                });
            }
        })?;

        Ok(Self {
            core,
            events,
            timer,
            swing_timeout,
            debug_interval: u64::from(detection.debug_sample_interval),
        })
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> Receiver<SwingEvent> {
        self.events.subscribe()
    }

    /// Last published phase snapshot
    #[must_use]
    pub fn snapshot(&self) -> PhaseSnapshot {
        self.events.latest()
    }

    /// Current phase
    #[must_use]
    pub fn state(&self) -> SwingState {
        lock(&self.core).machine.state()
    }

    /// Current address confidence
    #[must_use]
    pub fn confidence(&self) -> u32 {
        lock(&self.core).machine.confidence()
    }

    /// Copy of the recording of the current or last swing
    #[must_use]
    pub fn recording(&self) -> SwingRecording {
        lock(&self.core).machine.recording().clone()
    }

    /// Feed the landmarks detected for one frame
    pub fn on_landmarks(&self, raw: &LandmarkFrame) -> Option<Transition> {
        let mut core = lock(&self.core);
        let smoothed = core.smoother.apply(raw);
        let outcome = core.machine.process(&smoothed);

        if let Some(armed) = outcome.armed {
            self.timer.arm(armed, self.swing_timeout);
        }
        if let (true, Some(finished)) = (outcome.swing_detected, core.machine.current_attempt()) {
            self.timer.cancel(finished);
        }
        for event in self.collect_events(&mut core, &outcome) {
            self.events.publish(event);
        }

        outcome.transition
    }

    /// Record that the detector found no subject in a frame
    pub fn on_no_detection(&self) {
        let confidence = lock(&self.core).machine.process_missing().confidence;
        debug!("No detection, address confidence {confidence}");
    }

    /// Discard the recording and return to idle.
    ///
    /// Call after consuming the recording of a finished swing.
    pub fn reset_to_idle(&self) {
        let mut core = lock(&self.core);
        if let Some(attempt) = core.machine.current_attempt() {
            self.timer.cancel(attempt);
        }
        if let Some(transition) = core.machine.reset_to_idle() {
            debug!("Reset from {} to idle", transition.from);
            self.events
                .publish(SwingEvent::StateChanged(snapshot_of(&core.machine, transition)));
        }
    }

    fn collect_events(&self, core: &mut DetectorCore, outcome: &FrameOutcome) -> Vec<SwingEvent> {
        let mut events = Vec::new();

        if let Some(jitter) = outcome.jitter {
            core.accepted_frames += 1;
            if self.debug_interval > 0 && core.accepted_frames % self.debug_interval == 0 {
                events.push(SwingEvent::DebugSample {
                    jitter: jitter.combined,
                    confidence: outcome.confidence,
                });
            }
        }

        if let Some(transition) = outcome.transition {
            events.push(SwingEvent::StateChanged(snapshot_of(&core.machine, transition)));
        }

        if outcome.swing_detected {
            if let Some(attempt) = core.machine.current_attempt() {
                events.push(SwingEvent::SwingDetected {
                    attempt,
                    frames: core.machine.recording().len(),
                    timed_out: false,
                });
            }
        }

        events
    }
}

fn lock(core: &Mutex<DetectorCore>) -> MutexGuard<'_, DetectorCore> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

fn snapshot_of(machine: &SwingPhaseMachine, transition: Transition) -> PhaseSnapshot {
    let attempt: Option<SwingAttempt> = machine.current_attempt();
    PhaseSnapshot::new(transition.to, machine.confidence(), attempt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{LandmarkPoint, PoseJoint};
    use std::time::Instant;

    fn pose(wrist_y: f64, t: Duration) -> LandmarkFrame {
        let mut points = vec![LandmarkPoint::new(0.5, 0.5, 0.0, 0.9); 33];
        points[PoseJoint::LeftShoulder.index()] = LandmarkPoint::new(0.45, 0.3, 0.0, 0.9);
        points[PoseJoint::RightShoulder.index()] = LandmarkPoint::new(0.55, 0.3, 0.0, 0.9);
        points[PoseJoint::LeftWrist.index()] = LandmarkPoint::new(0.49, wrist_y, 0.0, 0.9);
        points[PoseJoint::RightWrist.index()] = LandmarkPoint::new(0.51, wrist_y, 0.0, 0.9);
        points[PoseJoint::LeftHip.index()] = LandmarkPoint::new(0.47, 0.6, 0.0, 0.9);
        points[PoseJoint::RightHip.index()] = LandmarkPoint::new(0.53, 0.6, 0.0, 0.9);
        LandmarkFrame::new(points, t)
    }

    fn detector(timeout_secs: f64) -> SwingDetector {
        let detection = DetectionConfig {
            address_threshold: 5,
            swing_timeout_secs: timeout_secs,
            debug_sample_interval: 0,
            ..DetectionConfig::default()
        };
        // alpha = 1 disables smoothing so wrist heights land exactly
        SwingDetector::new(&SmoothingConfig {
            alpha: 1.0,
            ..SmoothingConfig::default()
        }, &detection).unwrap()
    }

    #[test]
    fn test_rejects_invalid_alpha() {
        assert!(SwingDetector::new(
            &SmoothingConfig {
                alpha: 0.0,
                ..SmoothingConfig::default()
            },
            &DetectionConfig::default()
        )
        .is_err());
    }

    #[test]
    fn test_out_of_range_timeout_is_config_error() {
        for secs in [1e30, f64::INFINITY, 0.0, -1.0] {
            let detection = DetectionConfig {
                swing_timeout_secs: secs,
                ..DetectionConfig::default()
            };
            assert!(matches!(
                SwingDetector::new(&SmoothingConfig::default(), &detection),
                Err(Error::ConfigError(_))
            ));
        }
    }

    #[test]
    fn test_state_changes_are_published() {
        let detector = detector(4.0);
        let events = detector.subscribe();

        for i in 0..5 {
            detector.on_landmarks(&pose(0.70, Duration::from_millis(33 * i)));
        }
        assert_eq!(detector.state(), SwingState::Address);
        assert_eq!(detector.snapshot().state, SwingState::Address);

        match events.try_recv() {
            Ok(SwingEvent::StateChanged(snapshot)) => assert_eq!(snapshot.state, SwingState::Address),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_timeout_finishes_stuck_swing() {
        let detector = detector(0.05);
        let events = detector.subscribe();

        for i in 0..5 {
            detector.on_landmarks(&pose(0.70, Duration::from_millis(33 * i)));
        }
        detector.on_landmarks(&pose(0.40, Duration::from_millis(200)));
        assert_eq!(detector.state(), SwingState::Backswing);

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut detected = None;
        while Instant::now() < deadline && detected.is_none() {
            if let Ok(SwingEvent::SwingDetected { attempt, timed_out, .. }) =
                events.recv_timeout(Duration::from_millis(50))
            {
                detected = Some((attempt, timed_out));
            }
        }

        assert_eq!(detected, Some((SwingAttempt(1), true)));
        assert_eq!(detector.state(), SwingState::Finish);
        assert_eq!(detector.recording().len(), 1);
    }

    #[test]
    fn test_reset_publishes_idle() {
        let detector = detector(0.05);
        for i in 0..5 {
            detector.on_landmarks(&pose(0.70, Duration::from_millis(33 * i)));
        }
        let events = detector.subscribe();
        detector.reset_to_idle();

        assert_eq!(detector.state(), SwingState::Idle);
        match events.try_recv() {
            Ok(SwingEvent::StateChanged(snapshot)) => assert_eq!(snapshot.state, SwingState::Idle),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_snapshot_matches_machine_when_timeout_races_frames() {
        for trial in 0..100u64 {
            let detector = detector(0.002);
            for i in 0..5 {
                detector.on_landmarks(&pose(0.70, Duration::from_millis(33 * i)));
            }
            detector.on_landmarks(&pose(0.40, Duration::from_millis(200)));

            // Leave Backswing right around the deadline
            std::thread::sleep(Duration::from_micros(1500 + trial * 10));
            detector.on_landmarks(&pose(0.63, Duration::from_millis(233)));
            std::thread::sleep(Duration::from_millis(20));

            assert_eq!(
                detector.snapshot().state,
                detector.state(),
                "trial {trial} published a stale phase"
            );
        }
    }
}
