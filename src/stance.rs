//! Address stance geometry.

use crate::constants::{
    STANCE_MAX_TORSO, STANCE_MAX_WRIST_DISTANCE, STANCE_MIN_TORSO, STANCE_WRIST_BELOW_SHOULDER,
};
use crate::landmarks::{LandmarkFrame, PoseJoint};

/// Whether a frame looks like a golfer at address.
///
/// Requires hands together, arms hanging below the shoulders, and a torso
/// length that fits a standing adult in frame. Frames too short to contain
/// the hips are never a valid stance.
#[must_use]
pub fn is_valid_stance(frame: &LandmarkFrame) -> bool {
    check_stance(frame).unwrap_or(false)
}

fn check_stance(frame: &LandmarkFrame) -> Option<bool> {
    let left_wrist = frame.joint(PoseJoint::LeftWrist)?;
    let right_wrist = frame.joint(PoseJoint::RightWrist)?;
    let wrist_y = frame.avg_wrist_y()?;
    let shoulder_y = frame.avg_shoulder_y()?;
    let hip_y = frame.avg_hip_y()?;

    let hands_together = left_wrist.distance_2d(right_wrist) < STANCE_MAX_WRIST_DISTANCE;
    let arms_hanging = wrist_y > shoulder_y + STANCE_WRIST_BELOW_SHOULDER;
    let torso = hip_y - shoulder_y;
    let torso_plausible = torso > STANCE_MIN_TORSO && torso < STANCE_MAX_TORSO;

    Some(hands_together && arms_hanging && torso_plausible)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::LandmarkPoint;
    use std::time::Duration;

    fn stance(wrists: [(f64, f64); 2], shoulder_y: f64, hip_y: f64) -> LandmarkFrame {
        let mut points = vec![LandmarkPoint::new(0.5, 0.5, 0.0, 0.9); 33];
        points[PoseJoint::LeftShoulder.index()] = LandmarkPoint::new(0.45, shoulder_y, 0.0, 0.9);
        points[PoseJoint::RightShoulder.index()] = LandmarkPoint::new(0.55, shoulder_y, 0.0, 0.9);
        points[PoseJoint::LeftWrist.index()] = LandmarkPoint::new(wrists[0].0, wrists[0].1, 0.0, 0.9);
        points[PoseJoint::RightWrist.index()] = LandmarkPoint::new(wrists[1].0, wrists[1].1, 0.0, 0.9);
        points[PoseJoint::LeftHip.index()] = LandmarkPoint::new(0.47, hip_y, 0.0, 0.9);
        points[PoseJoint::RightHip.index()] = LandmarkPoint::new(0.53, hip_y, 0.0, 0.9);
        LandmarkFrame::new(points, Duration::ZERO)
    }

    #[test]
    fn test_address_stance_is_valid() {
        assert!(is_valid_stance(&stance([(0.48, 0.7), (0.52, 0.7)], 0.3, 0.6)));
    }

    #[test]
    fn test_hands_apart_is_invalid() {
        assert!(!is_valid_stance(&stance([(0.3, 0.7), (0.7, 0.7)], 0.3, 0.6)));
    }

    #[test]
    fn test_hands_at_shoulder_height_is_invalid() {
        // Crossed arms: wrists together but at chest height
        assert!(!is_valid_stance(&stance([(0.48, 0.33), (0.52, 0.33)], 0.3, 0.6)));
    }

    #[test]
    fn test_torso_bounds() {
        assert!(!is_valid_stance(&stance([(0.48, 0.7), (0.52, 0.7)], 0.3, 0.44)));
        assert!(!is_valid_stance(&stance([(0.48, 0.9), (0.52, 0.9)], 0.3, 0.85)));
        assert!(is_valid_stance(&stance([(0.48, 0.7), (0.52, 0.7)], 0.3, 0.46)));
    }

    #[test]
    fn test_truncated_frame_is_invalid() {
        let mut frame = stance([(0.48, 0.7), (0.52, 0.7)], 0.3, 0.6);
        frame.points.truncate(20);
        assert!(!is_valid_stance(&frame));
    }
}
