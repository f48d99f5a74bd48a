//! End-to-end tests of the capture pipeline with an in-memory encoder


use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use swing_capture::app::{ClipOutcome, SwingCaptureApp};
use swing_capture::buffer::frame::FrameDimensions;
use swing_capture::config::Config;
use swing_capture::encoder::{EncodeSettings, EncodingSession, VideoEncoder};
use swing_capture::error::EncoderError;
use swing_capture::replay::{FrameSource, LandmarkReplay, ReplayEntry};
use swing_capture::swing::{SwingAttempt, SwingState};
use test_helpers::{stance_frame, MemoryEncoder, FRAME, SWING_WRISTS};

struct BrokenEncoder;

impl VideoEncoder for BrokenEncoder {
    fn name(&self) -> &str {
        "broken"
    }

    fn open_session(&self, _dest: &Path, _settings: &EncodeSettings) -> Result<Box<dyn EncodingSession>, EncoderError> {
        Err(EncoderError::Backend("no codec available".to_string()))
    }
}

fn config(output_dir: &Path) -> Config {
    let mut config = Config::default();
    config.smoothing.alpha = 1.0;
    config.detection.address_threshold = 10;
    config.buffer.output_dir = output_dir.to_path_buf();
    config.buffer.max_window_secs = 2.0;
    config
}

fn swing_session(address_frames: usize) -> LandmarkReplay {
    let wrists = std::iter::repeat(0.70).take(address_frames).chain(SWING_WRISTS);
    let entries = wrists
        .enumerate()
        .map(|(i, wrist_y)| {
            let t = FRAME * i as u32;
            ReplayEntry {
                timestamp: t,
                landmarks: Some(stance_frame(wrist_y, t)),
            }
        })
        .collect();
    LandmarkReplay::from_entries(entries)
}

#[test]
fn test_swing_clip_is_saved() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = Arc::new(MemoryEncoder::default());
    let mut app = SwingCaptureApp::with_encoder(config(dir.path()), encoder.clone(), true).unwrap();

    let (mut frames, mut detector) = swing_session(10).into_ports(FrameDimensions::new(8, 6));
    let summary = app.run(&mut frames, &mut detector).unwrap();

    assert_eq!(summary.swings.len(), 1);
    let report = &summary.swings[0];
    assert_eq!(report.attempt, SwingAttempt(1));
    assert!(report.feedback.is_some());

    let expected = dir.path().join("swing-001.mp4");
    assert_eq!(report.clip, ClipOutcome::Saved { path: expected.clone() });
    assert_eq!(std::fs::read(&expected).unwrap(), b"memory clip");

    // The whole 16 frame session fits the two second window
    assert_eq!(encoder.session_count(), 1);
    assert_eq!(encoder.last_session().unwrap().timestamps.len(), 16);
    assert_eq!(app.detector().state(), SwingState::Idle);
}

#[test]
fn test_consecutive_swings_get_numbered_clips() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = Arc::new(MemoryEncoder::default());
    let mut app = SwingCaptureApp::with_encoder(config(dir.path()), encoder.clone(), true).unwrap();

    let first = swing_session(10);
    let offset = FRAME * first.len() as u32;
    let mut entries = first.entries().to_vec();
    // Long enough hold for the first swing to leave the jitter window
    entries.extend(swing_session(30).entries().iter().map(|entry| {
        let t = entry.timestamp + offset;
        ReplayEntry {
            timestamp: t,
            landmarks: entry.landmarks.clone().map(|mut frame| {
                frame.timestamp = t;
                frame
            }),
        }
    }));

    let (mut frames, mut detector) = LandmarkReplay::from_entries(entries).into_ports(FrameDimensions::new(8, 6));
    let summary = app.run(&mut frames, &mut detector).unwrap();

    assert_eq!(summary.swings.len(), 2);
    assert_eq!(summary.swings[1].attempt, SwingAttempt(2));
    assert!(dir.path().join("swing-001.mp4").exists());
    assert!(dir.path().join("swing-002.mp4").exists());

    // The buffer is cleared after each clip
    let mut clip_lengths: Vec<usize> = encoder
        .sessions
        .lock()
        .unwrap()
        .iter()
        .map(|session| session.timestamps.len())
        .collect();
    clip_lengths.sort_unstable();
    assert_eq!(clip_lengths, vec![16, 36]);
}

#[test]
fn test_out_of_range_timeouts_are_rejected_up_front() {
    let dir = tempfile::tempdir().unwrap();
    let mut long_timeout = config(dir.path());
    long_timeout.detection.swing_timeout_secs = 1e30;
    assert!(SwingCaptureApp::with_encoder(long_timeout, Arc::new(MemoryEncoder::default()), false).is_err());

    let mut long_window = config(dir.path());
    long_window.buffer.max_window_secs = 1e30;
    assert!(SwingCaptureApp::with_encoder(long_window, Arc::new(MemoryEncoder::default()), false).is_err());
}

#[test]
fn test_failed_clip_keeps_feedback() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = SwingCaptureApp::with_encoder(config(dir.path()), Arc::new(BrokenEncoder), true).unwrap();

    let (mut frames, mut detector) = swing_session(10).into_ports(FrameDimensions::new(8, 6));
    let summary = app.run(&mut frames, &mut detector).unwrap();

    assert_eq!(summary.swings.len(), 1);
    let report = &summary.swings[0];
    assert!(report.feedback.is_some());
    match &report.clip {
        ClipOutcome::Failed { reason } => assert!(reason.contains("no codec available")),
        other => panic!("expected a failed clip, got {other:?}"),
    }
    assert!(!dir.path().join("swing-001.mp4").exists());
}

#[test]
fn test_stalled_swing_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.detection.swing_timeout_secs = 0.1;
    let mut app = SwingCaptureApp::with_encoder(config, Arc::new(MemoryEncoder::default()), false).unwrap();

    // Address, backswing, then the wrists hang at the top
    let wrists = std::iter::repeat(0.70).take(10).chain([0.50]).chain(std::iter::repeat(0.40).take(12));
    let entries = wrists
        .enumerate()
        .map(|(i, wrist_y)| {
            let t = FRAME * i as u32;
            ReplayEntry {
                timestamp: t,
                landmarks: Some(stance_frame(wrist_y, t)),
            }
        })
        .collect();
    let (mut frames, mut detector) = LandmarkReplay::from_entries(entries).into_ports(FrameDimensions::new(8, 6));

    let mut frame_index = 0;
    while let Some(frame) = frames.next_frame().unwrap() {
        app.process_frame(frame, &mut detector).unwrap();
        frame_index += 1;
        if frame_index > 10 {
            std::thread::sleep(Duration::from_millis(30));
        }
    }

    let summary = app.summary();
    assert_eq!(summary.swings.len(), 1);
    let report = &summary.swings[0];
    assert!(report.timed_out);
    assert!(report.recorded_frames >= 1);
    assert_eq!(report.clip, ClipOutcome::Skipped);
}

#[test]
fn test_slow_encoder_does_not_block_frames() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = Arc::new(MemoryEncoder {
        frame_delay: Duration::from_millis(50),
        ..MemoryEncoder::default()
    });
    let mut app = SwingCaptureApp::with_encoder(config(dir.path()), encoder, true).unwrap();

    // Swing completes on the last frame; the 16 frame clip takes about 800 ms
    let (mut frames, mut detector) = swing_session(10).into_ports(FrameDimensions::new(8, 6));
    let mut slowest = Duration::ZERO;
    while let Some(frame) = frames.next_frame().unwrap() {
        let started = Instant::now();
        app.process_frame(frame, &mut detector).unwrap();
        slowest = slowest.max(started.elapsed());
    }

    assert!(slowest < Duration::from_millis(400), "frame took {slowest:?}");
    assert_eq!(app.clips_in_flight(), 1);
    assert_eq!(app.summary().swings[0].clip, ClipOutcome::Pending);

    app.wait_for_clips();
    assert_eq!(app.clips_in_flight(), 0);
    assert_eq!(
        app.summary().swings[0].clip,
        ClipOutcome::Saved {
            path: dir.path().join("swing-001.mp4")
        }
    );
}
