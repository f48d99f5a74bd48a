//! Post-swing feedback.
//!
//! Each heuristic inspects a completed [`SwingRecording`] and may flag one
//! fault with a score from 1 to 10. The highest score wins; on a tie the
//! heuristic checked first wins.

use crate::constants::{FEEDBACK_MIN_FRAMES, FRAME_CENTER_X};
use crate::landmarks::{LandmarkFrame, PoseJoint};
use crate::swing::recording::SwingRecording;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Hip midpoint travel along X that counts as sway
const HIP_SWAY_LIMIT: f64 = 0.05;

/// Nose travel limits from the first recorded frame
const HEAD_VERTICAL_LIMIT: f64 = 0.05;
const HEAD_HORIZONTAL_LIMIT: f64 = 0.08;

/// Minimum narrowing of the shoulder line, address to top
const MIN_SHOULDER_TURN: f64 = 0.05;

/// Backswing plus downswing duration considered well paced
const TEMPO_BAND: (Duration, Duration) = (Duration::from_millis(700), Duration::from_millis(2000));

/// Part of the body a feedback item is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BodySegment {
    Head,
    Shoulders,
    Hips,
    FullBody,
}

impl fmt::Display for BodySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Head => "head",
            Self::Shoulders => "shoulders",
            Self::Hips => "hips",
            Self::FullBody => "full body",
        };
        f.write_str(name)
    }
}

/// One coaching item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feedback {
    pub title: String,
    pub instruction: String,
    /// 1 (barely noticeable) to 10 (dominant fault)
    pub confidence: u8,
    pub segment: BodySegment,
}

impl Feedback {
    fn new(title: &str, instruction: &str, confidence: u8, segment: BodySegment) -> Self {
        Self {
            title: title.to_string(),
            instruction: instruction.to_string(),
            confidence,
            segment,
        }
    }

    fn good_tempo() -> Self {
        Self::new(
            "Good tempo",
            "Nothing stood out. Keep the same rhythm on the next swing",
            1,
            BodySegment::FullBody,
        )
    }
}

/// Pick the single most important feedback item for a swing.
///
/// Returns `None` when the recording is too short to judge.
#[must_use]
pub fn analyze(recording: &SwingRecording) -> Option<Feedback> {
    if recording.len() < FEEDBACK_MIN_FRAMES {
        return None;
    }

    let heuristics: [fn(&SwingRecording) -> Option<Feedback>; 4] =
        [hip_sway, head_movement, shoulder_turn, tempo];

    let mut best: Option<Feedback> = None;
    for candidate in heuristics.iter().filter_map(|check| check(recording)) {
        if best.as_ref().map_or(true, |b| candidate.confidence > b.confidence) {
            best = Some(candidate);
        }
    }

    Some(best.unwrap_or_else(Feedback::good_tempo))
}

/// Map how far past its limit a measurement is (1.0 = at the limit) to a score
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Clamped to 1..=10
fn severity(ratio: f64) -> u8 {
    (ratio * 3.0).round().clamp(1.0, 10.0) as u8
}

fn frames(recording: &SwingRecording) -> impl Iterator<Item = &LandmarkFrame> {
    recording.frames().iter().map(|r| &r.frame)
}

/// Largest offset of the hip midpoint from the centre of the frame
fn hip_sway(recording: &SwingRecording) -> Option<Feedback> {
    let sway = frames(recording)
        .filter_map(|f| f.pair_midpoint(PoseJoint::LeftHip, PoseJoint::RightHip))
        .map(|(x, _)| (x - FRAME_CENTER_X).abs())
        .reduce(f64::max)?;
    (sway > HIP_SWAY_LIMIT).then(|| {
        Feedback::new(
            "Hip sway",
            "Turn your hips around your spine instead of sliding them sideways",
            severity(sway / HIP_SWAY_LIMIT),
            BodySegment::Hips,
        )
    })
}

fn head_movement(recording: &SwingRecording) -> Option<Feedback> {
    let start = recording.first()?.frame.joint(PoseJoint::Nose)?;
    let (dx, dy) = frames(recording)
        .filter_map(|f| f.joint(PoseJoint::Nose))
        .fold((0.0_f64, 0.0_f64), |(dx, dy), nose| {
            (dx.max((nose.x - start.x).abs()), dy.max((nose.y - start.y).abs()))
        });

    let ratio = (dx / HEAD_HORIZONTAL_LIMIT).max(dy / HEAD_VERTICAL_LIMIT);
    (ratio > 1.0).then(|| {
        Feedback::new(
            "Head movement",
            "Keep your head still and your eyes on the ball until impact",
            severity(ratio),
            BodySegment::Head,
        )
    })
}

fn shoulder_width(frame: &LandmarkFrame) -> Option<f64> {
    let left = frame.joint(PoseJoint::LeftShoulder)?;
    let right = frame.joint(PoseJoint::RightShoulder)?;
    Some((left.x - right.x).abs())
}

fn shoulder_turn(recording: &SwingRecording) -> Option<Feedback> {
    let address = shoulder_width(&recording.first()?.frame)?;
    let (_, top) = recording.top_of_backswing()?;
    // Shoulders turning away from the camera shrink their projected X gap
    let turn = address - shoulder_width(&top.frame)?;

    (turn < MIN_SHOULDER_TURN).then(|| {
        Feedback::new(
            "Limited shoulder turn",
            "Turn your lead shoulder under your chin at the top of the backswing",
            severity(1.0 + (MIN_SHOULDER_TURN - turn) / MIN_SHOULDER_TURN),
            BodySegment::Shoulders,
        )
    })
}

fn tempo(recording: &SwingRecording) -> Option<Feedback> {
    let duration = recording.duration();
    let (fastest, slowest) = TEMPO_BAND;

    if duration < fastest {
        let ratio = fastest.as_secs_f64() / duration.as_secs_f64().max(f64::EPSILON);
        Some(Feedback::new(
            "Rushed swing",
            "Slow the takeaway down and let the backswing finish before starting down",
            severity(ratio),
            BodySegment::FullBody,
        ))
    } else if duration > slowest {
        Some(Feedback::new(
            "Slow swing",
            "Keep the club moving from the top without pausing",
            severity(duration.as_secs_f64() / slowest.as_secs_f64()),
            BodySegment::FullBody,
        ))
    } else {
        None
    }
}
