//! Integration tests for the rolling frame buffer and clip encoding


use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use swing_capture::buffer::frame::{FrameDimensions, FrameView, PixelFormat};
use swing_capture::buffer::window::FrameWindow;
use swing_capture::buffer::{BufferSettings, RollingFrameBuffer};
use swing_capture::encoder::WriteOptions;
use swing_capture::Error;
use test_helpers::{raw_frame_at, MemoryEncoder};

fn settings(max_window: Duration) -> BufferSettings {
    BufferSettings {
        max_window,
        write: WriteOptions {
            codec: "memory".to_string(),
            ready_poll: Duration::from_millis(1),
            ready_timeout: Duration::from_secs(1),
        },
    }
}

#[test]
fn test_empty_save_never_invokes_encoder() {
    let encoder = Arc::new(MemoryEncoder::default());
    let buffer = RollingFrameBuffer::spawn(settings(Duration::from_secs(5)), encoder.clone()).unwrap();

    let result = buffer.save("never-written.mp4").unwrap().wait();
    assert!(matches!(result, Err(Error::EmptyBuffer)));
    assert_eq!(encoder.session_count(), 0);
}

#[test]
fn test_encoded_frame_count_matches_buffer() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = Arc::new(MemoryEncoder::default());
    let buffer = RollingFrameBuffer::spawn(settings(Duration::from_secs(1)), encoder.clone()).unwrap();

    // Three seconds at 30 fps, of which one second is kept
    for i in 0..90 {
        buffer.append_owned(raw_frame_at(i * 33)).unwrap();
    }
    let buffered = buffer.stats().unwrap().frames;
    let artifact = buffer.save(dir.path().join("clip.mp4")).unwrap().wait().unwrap();

    let session = encoder.last_session().unwrap();
    assert_eq!(artifact.frame_count, buffered);
    assert_eq!(session.timestamps.len(), buffered);
    assert!(session.finished);
    assert_eq!(session.timestamps[0], Duration::ZERO);
    assert!(session.timestamps.windows(2).all(|w| w[0] < w[1]));
    assert!(artifact.duration <= Duration::from_secs(1));
}

#[test]
fn test_encoding_runs_alongside_appends() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = Arc::new(MemoryEncoder {
        frame_delay: Duration::from_millis(5),
        busy_polls: 2,
        ..MemoryEncoder::default()
    });
    let buffer = RollingFrameBuffer::spawn(settings(Duration::from_secs(10)), encoder.clone()).unwrap();

    for i in 0..30 {
        buffer.append_owned(raw_frame_at(i * 33)).unwrap();
    }
    let handle = buffer.save(dir.path().join("clip.mp4")).unwrap();

    // Frames appended after the save request land in the buffer, not the clip
    for i in 30..60 {
        buffer.append_owned(raw_frame_at(i * 33)).unwrap();
    }
    assert_eq!(buffer.stats().unwrap().frames, 60);

    let artifact = handle.wait().unwrap();
    assert_eq!(artifact.frame_count, 30);
    assert_eq!(encoder.last_session().unwrap().timestamps.len(), 30);
}

#[test]
fn test_frame_rate_reflects_capture_timing() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = Arc::new(MemoryEncoder::default());
    let buffer = RollingFrameBuffer::spawn(settings(Duration::from_secs(5)), encoder.clone()).unwrap();

    // 60 fps capture
    for i in 0..61 {
        buffer.append_owned(raw_frame_at(i * 1000 / 60)).unwrap();
    }
    buffer.save(dir.path().join("clip.mp4")).unwrap().wait().unwrap();

    let rate = encoder.last_session().unwrap().settings.unwrap().frame_rate;
    assert!((rate - 60.0).abs() < 1.0, "rate was {rate}");
}

#[test]
fn test_padded_sensor_rows_are_packed() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = Arc::new(MemoryEncoder::default());
    let buffer = RollingFrameBuffer::spawn(settings(Duration::from_secs(5)), encoder.clone()).unwrap();

    let dims = FrameDimensions::new(3, 2);
    let stride = 16;
    let data = vec![128u8; stride * 2];
    for i in 0..3 {
        let view = FrameView {
            data: &data,
            dimensions: dims,
            format: PixelFormat::Bgra8,
            stride,
            pts: Duration::from_millis(i * 33),
        };
        buffer.append(&view).unwrap();
    }

    let artifact = buffer.save(dir.path().join("clip.mp4")).unwrap().wait().unwrap();
    assert_eq!(artifact.dimensions, dims);
    assert_eq!(artifact.frame_count, 3);
}

#[test]
fn test_malformed_view_is_rejected_before_enqueue() {
    let buffer = RollingFrameBuffer::spawn(settings(Duration::from_secs(5)), Arc::new(MemoryEncoder::default())).unwrap();
    let view = FrameView::packed(&[0u8; 4], FrameDimensions::new(4, 4), PixelFormat::Bgr8, Duration::ZERO);
    assert!(matches!(buffer.append(&view), Err(Error::InvalidInput(_))));
    assert_eq!(buffer.stats().unwrap().frames, 0);
}

proptest! {
    #[test]
    fn prop_window_invariant_holds(
        gaps in prop::collection::vec(0u64..200, 1..300),
        window_ms in 1u64..2000,
    ) {
        let max_window = Duration::from_millis(window_ms);
        let mut window = FrameWindow::new(max_window);
        let mut t = 0;
        let mut total = 0;
        let mut evicted = 0;

        for gap in gaps {
            t += gap;
            evicted += window.push(Arc::new(raw_frame_at(t)));
            total += 1;

            prop_assert!(window.span() <= max_window);
            prop_assert!(!window.is_empty());
            prop_assert_eq!(window.len() + evicted, total);

            let snapshot = window.snapshot();
            prop_assert!(snapshot.windows(2).all(|w| w[0].pts() <= w[1].pts()));
            prop_assert_eq!(snapshot.last().map(|f| f.pts()), Some(Duration::from_millis(t)));
        }
    }
}
