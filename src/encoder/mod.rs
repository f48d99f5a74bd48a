//! Clip encoding.
//!
//! A [`VideoEncoder`] opens one [`EncodingSession`] per clip. [`write_clip`]
//! drives a session over a buffer snapshot: frames are written in order with
//! their presentation time relative to the first frame, a busy input is
//! polled rather than skipped, and every failure is mapped onto the crate
//! error the caller sees.

/// `ffmpeg` subprocess backend
pub mod ffmpeg;

/// `OpenCV` `VideoWriter` backend
#[cfg(feature = "opencv")]
pub mod opencv;

use crate::buffer::frame::{FrameDimensions, RawFrame};
use crate::config::BufferConfig;
use crate::constants::DEFAULT_FPS;
use crate::error::EncoderError;
use crate::{Error, Result};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Parameters a session is opened with
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSettings {
    pub dimensions: FrameDimensions,
    /// Constant output rate in frames per second. Sessions place frames on
    /// this grid by pts (see [`FramePacer`]).
    pub frame_rate: f64,
    pub codec: String,
}

/// How a session ended
#[derive(Debug)]
pub enum SessionStatus {
    Completed,
    Failed(EncoderError),
}

/// Factory for encoding sessions
pub trait VideoEncoder: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Create a session writing to `dest`
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot produce a writer for `dest`.
    fn open_session(&self, dest: &Path, settings: &EncodeSettings) -> std::result::Result<Box<dyn EncodingSession>, EncoderError>;
}

/// One in-progress clip
pub trait EncodingSession: Send {
    /// Connect the frame input; called once before the first append
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot accept frames.
    fn attach_input(&mut self) -> std::result::Result<(), EncoderError>;

    /// Whether the input can take another frame right now
    fn is_ready_for_more_data(&mut self) -> bool;

    /// Write one frame at `pts` relative to the start of the clip
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the frame.
    fn append(&mut self, frame: &RawFrame, pts: Duration) -> std::result::Result<(), EncoderError>;

    /// Flush and close the output
    fn finish(self: Box<Self>) -> SessionStatus;
}

/// Encoded clip waiting to be moved into permanent storage or deleted
#[derive(Debug, Clone, PartialEq)]
pub struct ClipArtifact {
    pub path: PathBuf,
    pub frame_count: usize,
    /// Presentation-time span of the encoded frames
    pub duration: Duration,
    pub dimensions: FrameDimensions,
}

impl ClipArtifact {
    /// Move the clip to `dest`, creating parent directories as needed.
    ///
    /// Falls back to copy and delete when a rename crosses filesystems.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the clip cannot be moved.
    pub fn persist_to(self, dest: &Path) -> Result<PathBuf> {
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        if fs::rename(&self.path, dest).is_err() {
            fs::copy(&self.path, dest)?;
            fs::remove_file(&self.path)?;
        }
        info!("Clip persisted to {}", dest.display());
        Ok(dest.to_path_buf())
    }

    /// Delete the clip
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file exists but cannot be removed.
    pub fn discard(self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Session tuning shared by every clip
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOptions {
    pub codec: String,
    /// Sleep between readiness polls
    pub ready_poll: Duration,
    /// Give up when the input stays busy this long for a single frame
    pub ready_timeout: Duration,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self::from(&BufferConfig::default())
    }
}

impl From<&BufferConfig> for WriteOptions {
    fn from(config: &BufferConfig) -> Self {
        Self {
            codec: config.codec.clone(),
            ready_poll: config.ready_poll(),
            ready_timeout: config.ready_timeout(),
        }
    }
}

/// Nominal capture rate of `frames`
///
/// Averages the inter-frame gaps up to twice the median gap, so a capture
/// stall does not slow the rate of the rest of the clip.
#[must_use]
#[allow(clippy::cast_precision_loss)] // Frame counts are far below 2^52
pub fn estimate_frame_rate(frames: &[Arc<RawFrame>]) -> f64 {
    let mut gaps: Vec<Duration> = frames
        .windows(2)
        .map(|pair| pair[1].pts().saturating_sub(pair[0].pts()))
        .filter(|gap| !gap.is_zero())
        .collect();
    if gaps.is_empty() {
        return DEFAULT_FPS;
    }
    gaps.sort_unstable();

    let limit = gaps[gaps.len() / 2].saturating_mul(2);
    let (count, total) = gaps
        .iter()
        .take_while(|gap| **gap <= limit)
        .fold((0usize, Duration::ZERO), |(count, total), gap| (count + 1, total.saturating_add(*gap)));
    count as f64 / total.as_secs_f64()
}

/// Places frames on the slots of a constant-rate output by their pts.
///
/// Each frame takes the slot nearest its pts. Empty slots before it are filled
/// by repeating the previous frame, and a frame whose slot is already written
/// is dropped. Backends that can only write at a fixed rate use this to keep
/// uneven capture timing in the clip.
#[derive(Debug, Clone)]
pub struct FramePacer {
    frame_rate: f64,
    next_slot: Option<u64>,
}

impl FramePacer {
    #[must_use]
    pub fn new(frame_rate: f64) -> Self {
        Self {
            frame_rate,
            next_slot: None,
        }
    }

    /// How many times to repeat the previous frame before writing the frame at
    /// `pts`, or `None` when the frame should be dropped
    pub fn place(&mut self, pts: Duration) -> Option<u64> {
        let slot = self.slot_of(pts);
        match self.next_slot {
            Some(next) if slot < next => None,
            Some(next) => {
                self.next_slot = Some(slot.saturating_add(1));
                Some(slot - next)
            }
            None => {
                self.next_slot = Some(slot.saturating_add(1));
                Some(0)
            }
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Saturating float to int cast
    fn slot_of(&self, pts: Duration) -> u64 {
        (pts.as_secs_f64() * self.frame_rate).round() as u64
    }
}

/// Encode `frames` into `dest`
///
/// # Errors
///
/// * `EmptyBuffer` when `frames` is empty; the encoder is never called
/// * `EncoderUnavailable` when no session can be opened or attached
/// * `EncodeFailed` when a frame cannot be written or the clip not finalized
pub fn write_clip(
    encoder: &dyn VideoEncoder,
    frames: &[Arc<RawFrame>],
    dest: &Path,
    options: &WriteOptions,
) -> Result<ClipArtifact> {
    let (Some(first), Some(last)) = (frames.first(), frames.last()) else {
        return Err(Error::EmptyBuffer);
    };

    let settings = EncodeSettings {
        dimensions: first.dimensions(),
        frame_rate: estimate_frame_rate(frames),
        codec: options.codec.clone(),
    };
    debug!(
        "Opening {} session for {} frames at {} ({:.2} fps)",
        encoder.name(),
        frames.len(),
        settings.dimensions,
        settings.frame_rate
    );

    let mut session = encoder
        .open_session(dest, &settings)
        .map_err(|e| Error::EncoderUnavailable(format!("{}: {e}", encoder.name())))?;
    if let Err(e) = session.attach_input() {
        drop(session);
        remove_partial(dest);
        return Err(Error::EncoderUnavailable(format!("{}: {e}", encoder.name())));
    }

    let started = Instant::now();
    for (index, frame) in frames.iter().enumerate() {
        if let Err(e) = append_frame(session.as_mut(), index, frame, first.pts(), &settings, options) {
            drop(session);
            remove_partial(dest);
            return Err(Error::EncodeFailed(e));
        }
    }

    match session.finish() {
        SessionStatus::Completed => {}
        SessionStatus::Failed(e) => {
            remove_partial(dest);
            return Err(Error::EncodeFailed(e));
        }
    }
    if !dest.exists() {
        return Err(Error::EncodeFailed(EncoderError::MissingOutput(dest.to_path_buf())));
    }

    let artifact = ClipArtifact {
        path: dest.to_path_buf(),
        frame_count: frames.len(),
        duration: last.pts().saturating_sub(first.pts()),
        dimensions: settings.dimensions,
    };
    info!(
        "Encoded {} frames ({:.2}s) to {} in {:?}",
        artifact.frame_count,
        artifact.duration.as_secs_f64(),
        dest.display(),
        started.elapsed()
    );
    Ok(artifact)
}

fn append_frame(
    session: &mut dyn EncodingSession,
    index: usize,
    frame: &RawFrame,
    origin: Duration,
    settings: &EncodeSettings,
    options: &WriteOptions,
) -> std::result::Result<(), EncoderError> {
    let actual = frame.dimensions();
    if actual != settings.dimensions {
        return Err(EncoderError::DimensionMismatch {
            index,
            width: settings.dimensions.width,
            height: settings.dimensions.height,
            actual_width: actual.width,
            actual_height: actual.height,
        });
    }

    let waiting_since = Instant::now();
    while !session.is_ready_for_more_data() {
        let waited = waiting_since.elapsed();
        if waited >= options.ready_timeout {
            return Err(EncoderError::Stalled {
                waited_ms: waited.as_millis(),
            });
        }
        thread::sleep(options.ready_poll);
    }

    session.append(frame, frame.pts().saturating_sub(origin))
}

fn remove_partial(dest: &Path) {
    if let Err(e) = fs::remove_file(dest) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove partial clip {}: {e}", dest.display());
        }
    }
}

/// Create an encoder backend by name
///
/// # Errors
///
/// Returns `ConfigError` for unknown names or for `opencv` when the crate was
/// built without the `opencv` feature.
pub fn create_encoder(name: &str) -> Result<Arc<dyn VideoEncoder>> {
    match name.to_lowercase().as_str() {
        "ffmpeg" => Ok(Arc::new(ffmpeg::FfmpegEncoder::new())),
        #[cfg(feature = "opencv")]
        "opencv" => Ok(Arc::new(opencv::OpenCvEncoder::new())),
        #[cfg(not(feature = "opencv"))]
        "opencv" => Err(Error::ConfigError(
            "The opencv encoder requires building with the `opencv` feature".to_string(),
        )),
        _ => Err(Error::ConfigError(format!("Unknown encoder: {name}"))),
    }
}
