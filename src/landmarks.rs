//! Body pose landmark types.
//!
//! A [`LandmarkFrame`] holds the points reported by the upstream pose detector
//! for a single tracked subject. Index meaning is fixed by the detector's
//! 33-point topology; [`PoseJoint`] names the indices this crate reads.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One tracked anatomical point in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    /// Horizontal position, 0 = left edge, 1 = right edge
    pub x: f64,
    /// Vertical position, 0 = top edge, 1 = bottom edge
    pub y: f64,
    /// Relative depth
    pub z: f64,
    /// Detector confidence that the point is visible
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
}

impl LandmarkPoint {
    /// Create a point with a known visibility
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64, visibility: f64) -> Self {
        Self {
            x,
            y,
            z,
            visibility: Some(visibility),
        }
    }

    /// Visibility, with an absent value treated as invisible
    #[must_use]
    pub fn visibility_or_zero(&self) -> f64 {
        self.visibility.unwrap_or(0.0)
    }

    /// Euclidean distance in the image plane
    #[must_use]
    pub fn distance_2d(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Landmark indices used by the swing logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseJoint {
    Nose = 0,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftWrist = 15,
    RightWrist = 16,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
}

impl PoseJoint {
    /// Index into [`LandmarkFrame::points`]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// All landmarks reported for one captured frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    /// Points in detector order
    pub points: Vec<LandmarkPoint>,
    /// Monotonic capture time of the source frame
    pub timestamp: Duration,
}

impl LandmarkFrame {
    #[must_use]
    pub fn new(points: Vec<LandmarkPoint>, timestamp: Duration) -> Self {
        Self { points, timestamp }
    }

    /// Number of points
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point for a joint, `None` when the detector reported too few points
    #[must_use]
    pub fn joint(&self, joint: PoseJoint) -> Option<&LandmarkPoint> {
        self.points.get(joint.index())
    }

    /// Mean of a left/right joint pair
    #[must_use]
    pub fn pair_midpoint(&self, left: PoseJoint, right: PoseJoint) -> Option<(f64, f64)> {
        let l = self.joint(left)?;
        let r = self.joint(right)?;
        Some(((l.x + r.x) / 2.0, (l.y + r.y) / 2.0))
    }

    /// Average wrist height
    #[must_use]
    pub fn avg_wrist_y(&self) -> Option<f64> {
        self.pair_midpoint(PoseJoint::LeftWrist, PoseJoint::RightWrist)
            .map(|(_, y)| y)
    }

    /// Average shoulder height
    #[must_use]
    pub fn avg_shoulder_y(&self) -> Option<f64> {
        self.pair_midpoint(PoseJoint::LeftShoulder, PoseJoint::RightShoulder)
            .map(|(_, y)| y)
    }

    /// Average hip height
    #[must_use]
    pub fn avg_hip_y(&self) -> Option<f64> {
        self.pair_midpoint(PoseJoint::LeftHip, PoseJoint::RightHip)
            .map(|(_, y)| y)
    }

    /// Lower visibility of a left/right pair
    #[must_use]
    pub fn pair_min_visibility(&self, left: PoseJoint, right: PoseJoint) -> Option<f64> {
        let l = self.joint(left)?;
        let r = self.joint(right)?;
        Some(l.visibility_or_zero().min(r.visibility_or_zero()))
    }
}
