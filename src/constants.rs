//! Constants used throughout the library

/// Number of landmarks in a full body pose frame
pub const NUM_POSE_LANDMARKS: usize = 33;

/// Nominal sensor cadence
pub const DEFAULT_FPS: f64 = 30.0;

/// Default EMA weight of the newest landmark sample
pub const DEFAULT_SMOOTHING_ALPHA: f64 = 0.3;

/// Frames of steady, valid stance required to arm (about 1.5 s at 30 fps)
pub const DEFAULT_ADDRESS_THRESHOLD: u32 = 45;

/// Combined jitter range below which the golfer counts as steady
pub const DEFAULT_STEADY_THRESHOLD: f64 = 0.10;

/// Upward wrist travel from the address baseline that starts a backswing
pub const DEFAULT_BACKSWING_TRIGGER: f64 = 0.15;

/// Wrists back below `baseline - margin` mark the downswing
pub const DEFAULT_BACKSWING_RETURN_MARGIN: f64 = 0.10;

/// Wrists back below `baseline - margin` mark the finish
pub const DEFAULT_FINISH_MARGIN: f64 = 0.05;

/// Minimum shoulder and wrist visibility for a frame to be processed
pub const DEFAULT_MIN_VISIBILITY: f64 = 0.6;

/// Frames with fewer landmarks than this are rejected
pub const DEFAULT_MIN_LANDMARKS: usize = 29;

/// Jitter window capacity in frames
pub const DEFAULT_JITTER_WINDOW: usize = 15;

/// Shoulder range is weighted up since shoulders move less than wrists
pub const DEFAULT_SHOULDER_JITTER_WEIGHT: f64 = 1.5;

/// Real-time bound on backswing plus downswing
pub const DEFAULT_SWING_TIMEOUT_SECS: f64 = 4.0;

/// Emit a debug sample every N processed frames
pub const DEFAULT_DEBUG_SAMPLE_INTERVAL: u32 = 10;

/// Rolling buffer window
pub const DEFAULT_MAX_WINDOW_SECS: f64 = 5.0;

/// Encoder readiness polling
pub const DEFAULT_READY_POLL_MS: u64 = 5;
pub const DEFAULT_READY_TIMEOUT_SECS: f64 = 5.0;

/// Stance geometry
pub const STANCE_MAX_WRIST_DISTANCE: f64 = 0.25;
pub const STANCE_WRIST_BELOW_SHOULDER: f64 = 0.05;
pub const STANCE_MIN_TORSO: f64 = 0.15;
pub const STANCE_MAX_TORSO: f64 = 0.5;

/// Recordings shorter than this are not analyzed
pub const FEEDBACK_MIN_FRAMES: usize = 6;

/// Horizontal centre of the normalized frame
pub const FRAME_CENTER_X: f64 = 0.5;
