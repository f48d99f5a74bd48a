//! Tests for landmark smoothing and stance validation


use proptest::prelude::*;
use std::time::Duration;
use swing_capture::filters::exponential::ExponentialFilter;
use swing_capture::filters::{create_filter, LandmarkFilter};
use swing_capture::landmarks::{LandmarkFrame, LandmarkPoint, PoseJoint};
use swing_capture::stance::is_valid_stance;
use test_helpers::{stance_frame, FRAME};

#[test]
#[should_panic(expected = "Alpha must be in (0, 1]")]
fn test_exponential_zero_alpha() {
    let _ = ExponentialFilter::new(0.0);
}

#[test]
#[should_panic(expected = "Alpha must be in (0, 1]")]
fn test_exponential_too_large_alpha() {
    let _ = ExponentialFilter::new(1.5);
}

#[test]
fn test_filters_by_name() {
    assert_eq!(create_filter("none").unwrap().name(), "NoFilter");
    assert_eq!(create_filter("ema:0.5").unwrap().name(), "ExponentialFilter");
}

#[test]
fn test_step_response_reduces_noise() {
    let mut filter = ExponentialFilter::new(0.3);
    let mut last = 0.0;
    for i in 0..10u32 {
        // Alternating detector noise around 0.5
        let noisy = if i % 2 == 0 { 0.55 } else { 0.45 };
        let out = filter.smooth(&stance_frame(noisy, FRAME * i));
        last = out.avg_wrist_y().unwrap();
    }
    assert!((last - 0.5).abs() < 0.05);
}

#[test]
fn test_smoothed_frame_still_validates() {
    let mut filter = ExponentialFilter::new(0.3);
    for i in 0..5u32 {
        let out = filter.apply(&stance_frame(0.70, FRAME * i));
        assert!(is_valid_stance(&out));
    }
}

#[test]
fn test_truncated_frame_is_not_a_stance() {
    let mut frame = stance_frame(0.70, Duration::ZERO);
    frame.points.truncate(PoseJoint::RightHip.index());
    assert!(!is_valid_stance(&frame));
}

proptest! {
    #[test]
    fn prop_constant_input_converges(
        start in 0.0f64..1.0,
        target in 0.0f64..1.0,
        alpha in 0.05f64..=1.0,
    ) {
        let mut filter = ExponentialFilter::new(alpha);
        let point = |v: f64| LandmarkFrame::new(vec![LandmarkPoint::new(v, v, v, 1.0)], Duration::ZERO);

        filter.smooth(&point(start));
        // Error shrinks by (1 - alpha) per step
        let steps = (10.0 / alpha).ceil() as usize;
        let mut out = point(start);
        for _ in 0..steps {
            out = filter.smooth(&point(target));
        }
        let settled = (out.points[0].x - target).abs();
        prop_assert!(settled < 1e-4);

        // Further identical input stays put
        for _ in 0..20 {
            out = filter.smooth(&point(target));
            prop_assert!((out.points[0].x - target).abs() <= settled + 1e-12);
        }
    }

    #[test]
    fn prop_smoothing_stays_between_inputs(
        previous in 0.0f64..1.0,
        raw in 0.0f64..1.0,
        alpha in 0.01f64..=1.0,
    ) {
        let mut filter = ExponentialFilter::new(alpha);
        let point = |v: f64| LandmarkFrame::new(vec![LandmarkPoint::new(v, v, 0.0, 1.0)], Duration::ZERO);
        filter.smooth(&point(previous));
        let out = filter.smooth(&point(raw)).points[0].x;

        prop_assert!(out >= previous.min(raw) - 1e-12);
        prop_assert!(out <= previous.max(raw) + 1e-12);
    }
}
