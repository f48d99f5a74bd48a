//! Golf swing capture library.
//!
//! Two engines sit at the core:
//! - a swing phase state machine that turns noisy per-frame body landmarks
//!   into `Idle -> Address -> Backswing -> Downswing -> Finish`, using
//!   exponential smoothing, jitter windows and a stance check to reject
//!   false triggers
//! - a rolling frame buffer that keeps the last few seconds of raw video and
//!   encodes them to a clip on request without stalling capture
//!
//! The pipeline for each sensor frame:
//! 1. The raw frame is copied into the [`buffer::RollingFrameBuffer`]
//! 2. The pose detector collaborator produces landmarks for it
//! 3. [`swing::detector::SwingDetector`] smooths them and advances the phase
//! 4. On swing completion the recording is scored by [`feedback::analyze`]
//!    and the buffer is encoded to a clip
//!
//! # Examples
//!
//! ## Detecting a swing
//!
//! ```no_run
//! use swing_capture::config::Config;
//! use swing_capture::events::SwingEvent;
//! use swing_capture::landmarks::LandmarkFrame;
//! use swing_capture::swing::detector::SwingDetector;
//!
//! # fn main() -> swing_capture::Result<()> {
//! let config = Config::default();
//! let detector = SwingDetector::new(&config.smoothing, &config.detection)?;
//! let events = detector.subscribe();
//!
//! # let landmark_stream: Vec<LandmarkFrame> = Vec::new();
//! for landmarks in &landmark_stream {
//!     detector.on_landmarks(landmarks);
//!     while let Ok(event) = events.try_recv() {
//!         if let SwingEvent::SwingDetected { attempt, frames, .. } = event {
//!             println!("Swing {attempt} captured with {frames} frames");
//!             detector.reset_to_idle();
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Saving the rolling buffer
//!
//! ```no_run
//! use std::sync::Arc;
//! use swing_capture::buffer::{BufferSettings, RollingFrameBuffer};
//! use swing_capture::buffer::frame::{FrameDimensions, FrameView, PixelFormat};
//! use swing_capture::encoder::ffmpeg::FfmpegEncoder;
//! use std::time::Duration;
//!
//! # fn main() -> swing_capture::Result<()> {
//! let buffer = RollingFrameBuffer::spawn(BufferSettings::default(), Arc::new(FfmpegEncoder::new()))?;
//!
//! let pixels = vec![0u8; 320 * 240 * 3];
//! for i in 0..90 {
//!     let view = FrameView::packed(&pixels, FrameDimensions::new(320, 240), PixelFormat::Bgr8, Duration::from_millis(33 * i));
//!     buffer.append(&view)?;
//! }
//!
//! let clip = buffer.save("/tmp/swing.mp4")?.wait()?;
//! clip.persist_to("clips/swing.mp4".as_ref())?;
//! # Ok(())
//! # }
//! ```

/// Error types and result handling
pub mod error;

/// Constants used throughout the library
pub mod constants;

/// Body pose landmark types
pub mod landmarks;

/// Landmark smoothing filters
pub mod filters;

/// Address stance validation
pub mod stance;

/// Rolling jitter windows and steadiness tracking
pub mod jitter;

/// Swing phase detection
pub mod swing;

/// Swing notifications
pub mod events;

/// Rolling raw frame buffer
pub mod buffer;

/// Clip encoding backends
pub mod encoder;

/// Post-swing feedback analysis
pub mod feedback;

/// Configuration management
pub mod config;

/// Upstream ports and landmark session replay
pub mod replay;

/// Capture orchestration
pub mod app;

pub use error::{Error, Result};
