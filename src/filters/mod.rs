//! Landmark smoothing filters.
//!
//! Detector output jitters from frame to frame even when the golfer is
//! motionless. Every landmark frame passes through a filter before the swing
//! logic sees it.

/// Exponential moving average over every landmark coordinate
pub mod exponential;

use crate::landmarks::LandmarkFrame;
use crate::Result;

/// Trait for all landmark filters
pub trait LandmarkFilter: Send + Sync {
    /// Filter one frame, updating internal state
    fn apply(&mut self, frame: &LandmarkFrame) -> LandmarkFrame;

    /// Forget all previous frames
    fn reset(&mut self);

    /// Get filter name
    fn name(&self) -> &str;
}

/// No-op filter that passes frames through unchanged
pub struct NoFilter;

impl LandmarkFilter for NoFilter {
    fn apply(&mut self, frame: &LandmarkFrame) -> LandmarkFrame {
        frame.clone()
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "NoFilter"
    }
}

/// Create a landmark filter from a spec such as `"none"` or `"exponential:0.3"`
pub fn create_filter(spec: &str) -> Result<Box<dyn LandmarkFilter>> {
    let spec = spec.to_lowercase();
    let mut parts = spec.split(':');
    let kind = parts.next().unwrap_or_default();
    let param = parts.next();

    match kind {
        "none" | "nofilter" => Ok(Box::new(NoFilter)),
        "exponential" | "ema" => {
            let alpha = match param {
                Some(raw) => raw
                    .parse::<f64>()
                    .map_err(|e| crate::Error::FilterError(format!("Invalid alpha '{raw}': {e}")))?,
                None => crate::constants::DEFAULT_SMOOTHING_ALPHA,
            };
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(crate::Error::FilterError(format!(
                    "Alpha must be in (0, 1], got {alpha}"
                )));
            }
            Ok(Box::new(exponential::ExponentialFilter::new(alpha)))
        }
        _ => Err(crate::Error::FilterError(format!("Unknown filter type: {spec}"))),
    }
}
