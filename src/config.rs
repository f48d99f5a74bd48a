//! Configuration management for swing capture

use crate::constants::*;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Landmark smoothing configuration
    pub smoothing: SmoothingConfig,

    /// Swing phase detection configuration
    pub detection: DetectionConfig,

    /// Rolling frame buffer and clip encoding configuration
    pub buffer: BufferConfig,

    /// Offline replay configuration
    pub replay: ReplayConfig,
}

/// Landmark smoothing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Filter type: "exponential" or "none"
    pub filter: String,

    /// EMA weight of the newest sample (0.0-1.0]
    pub alpha: f64,
}

/// Swing phase state machine tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Steady valid-stance frames required before arming
    pub address_threshold: u32,

    /// Combined jitter range below which the golfer is steady
    pub steady_threshold: f64,

    /// Upward wrist travel from baseline that starts the backswing
    pub backswing_trigger: f64,

    /// Wrists below `baseline - margin` enter the downswing
    pub backswing_return_margin: f64,

    /// Wrists below `baseline - margin` finish the swing
    pub finish_margin: f64,

    /// Minimum shoulder and wrist visibility (0.0-1.0)
    pub min_visibility: f64,

    /// Frames with fewer landmarks are rejected
    pub min_landmarks: usize,

    /// Jitter window capacity in frames
    pub jitter_window_size: usize,

    /// Multiplier applied to the shoulder jitter range
    pub shoulder_jitter_weight: f64,

    /// Real-time bound from backswing start to forced finish
    pub swing_timeout_secs: f64,

    /// Emit a debug sample every N processed frames (0 disables)
    pub debug_sample_interval: u32,
}

/// Rolling frame buffer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Maximum span between oldest and newest buffered frame
    pub max_window_secs: f64,

    /// Encoder backend: "ffmpeg" or "opencv"
    pub encoder: String,

    /// Codec passed to the backend (ffmpeg codec name or OpenCV fourcc)
    pub codec: String,

    /// Sleep between encoder readiness polls
    pub ready_poll_ms: u64,

    /// Give up on an encoder that stays busy this long
    pub ready_timeout_secs: f64,

    /// Directory clips are written to
    pub output_dir: PathBuf,
}

/// Replay raster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Width of the blank frames generated for a replayed session
    pub width: u32,

    /// Height of the blank frames generated for a replayed session
    pub height: u32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            filter: "exponential".to_string(),
            alpha: DEFAULT_SMOOTHING_ALPHA,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            address_threshold: DEFAULT_ADDRESS_THRESHOLD,
            steady_threshold: DEFAULT_STEADY_THRESHOLD,
            backswing_trigger: DEFAULT_BACKSWING_TRIGGER,
            backswing_return_margin: DEFAULT_BACKSWING_RETURN_MARGIN,
            finish_margin: DEFAULT_FINISH_MARGIN,
            min_visibility: DEFAULT_MIN_VISIBILITY,
            min_landmarks: DEFAULT_MIN_LANDMARKS,
            jitter_window_size: DEFAULT_JITTER_WINDOW,
            shoulder_jitter_weight: DEFAULT_SHOULDER_JITTER_WEIGHT,
            swing_timeout_secs: DEFAULT_SWING_TIMEOUT_SECS,
            debug_sample_interval: DEFAULT_DEBUG_SAMPLE_INTERVAL,
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_window_secs: DEFAULT_MAX_WINDOW_SECS,
            encoder: "ffmpeg".to_string(),
            codec: "libx264".to_string(),
            ready_poll_ms: DEFAULT_READY_POLL_MS,
            ready_timeout_secs: DEFAULT_READY_TIMEOUT_SECS,
            output_dir: PathBuf::from("clips"),
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
        }
    }
}

impl SmoothingConfig {
    /// Filter spec understood by [`crate::filters::create_filter`]
    #[must_use]
    pub fn filter_spec(&self) -> String {
        match self.filter.as_str() {
            "exponential" | "ema" => format!("{}:{}", self.filter, self.alpha),
            other => other.to_string(),
        }
    }
}

impl DetectionConfig {
    /// Safety timeout as a duration
    #[must_use]
    pub fn swing_timeout(&self) -> Duration {
        saturating_secs(self.swing_timeout_secs)
    }
}

impl BufferConfig {
    /// Rolling window as a duration
    #[must_use]
    pub fn max_window(&self) -> Duration {
        saturating_secs(self.max_window_secs)
    }

    #[must_use]
    pub fn ready_poll(&self) -> Duration {
        Duration::from_millis(self.ready_poll_ms)
    }

    #[must_use]
    pub fn ready_timeout(&self) -> Duration {
        saturating_secs(self.ready_timeout_secs)
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let alpha = self.smoothing.alpha;
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(Error::ConfigError(
                "Smoothing alpha must be in (0.0, 1.0]".to_string(),
            ));
        }
        crate::filters::create_filter(&self.smoothing.filter_spec())
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        let d = &self.detection;
        if d.address_threshold == 0 {
            return Err(Error::ConfigError(
                "Address threshold must be greater than 0".to_string(),
            ));
        }
        if d.jitter_window_size == 0 {
            return Err(Error::ConfigError(
                "Jitter window size must be greater than 0".to_string(),
            ));
        }
        if d.steady_threshold <= 0.0 || d.backswing_trigger <= 0.0 {
            return Err(Error::ConfigError(
                "Steady threshold and backswing trigger must be positive".to_string(),
            ));
        }
        if !(d.finish_margin >= 0.0
            && d.finish_margin <= d.backswing_return_margin
            && d.backswing_return_margin < d.backswing_trigger)
        {
            return Err(Error::ConfigError(
                "Margins must satisfy 0 <= finish_margin <= backswing_return_margin < backswing_trigger".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&d.min_visibility) {
            return Err(Error::ConfigError(
                "Minimum visibility must be between 0.0 and 1.0".to_string(),
            ));
        }
        if d.min_landmarks == 0 || d.min_landmarks > NUM_POSE_LANDMARKS {
            return Err(Error::ConfigError(format!(
                "Minimum landmarks must be between 1 and {NUM_POSE_LANDMARKS}"
            )));
        }
        positive_duration("Swing timeout", d.swing_timeout_secs)?;

        let b = &self.buffer;
        positive_duration("Buffer window", b.max_window_secs)?;
        positive_duration("Encoder ready timeout", b.ready_timeout_secs)?;
        if !matches!(b.encoder.as_str(), "ffmpeg" | "opencv") {
            return Err(Error::ConfigError(format!("Unknown encoder: {}", b.encoder)));
        }

        if self.replay.width == 0 || self.replay.height == 0 {
            return Err(Error::ConfigError(
                "Replay frame size must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Convert seconds to a positive [`Duration`]
///
/// # Errors
///
/// Returns `ConfigError` for zero, negative, non-finite or out-of-range values.
pub fn positive_duration(name: &str, secs: f64) -> Result<Duration> {
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        _ => Err(Error::ConfigError(format!(
            "{name} must be a positive number of seconds, got {secs}"
        ))),
    }
}

/// Seconds as a [`Duration`], clamped to `[0, Duration::MAX]`
fn saturating_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(if secs > 0.0 { Duration::MAX } else { Duration::ZERO })
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Swing Capture Configuration

# Landmark smoothing
smoothing:
  filter: "exponential"
  alpha: 0.3

# Swing phase detection
detection:
  address_threshold: 45
  steady_threshold: 0.10
  backswing_trigger: 0.15
  backswing_return_margin: 0.10
  finish_margin: 0.05
  min_visibility: 0.6
  min_landmarks: 29
  jitter_window_size: 15
  shoulder_jitter_weight: 1.5
  swing_timeout_secs: 4.0
  debug_sample_interval: 10

# Rolling frame buffer and clip encoding
buffer:
  max_window_secs: 5.0
  encoder: "ffmpeg"
  codec: "libx264"
  ready_poll_ms: 5
  ready_timeout_secs: 5.0
  output_dir: "clips"

# Blank raster size for replayed sessions
replay:
  width: 320
  height: 240
"#;
