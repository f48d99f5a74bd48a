use super::LandmarkFilter;
use crate::landmarks::{LandmarkFrame, LandmarkPoint};

/// Exponential smoothing over every landmark coordinate.
///
/// The first frame, and any frame whose point count differs from the retained
/// one, passes through unchanged. Visibility always comes from the raw point.
pub struct ExponentialFilter {
    alpha: f64,
    last: Option<LandmarkFrame>,
}

impl ExponentialFilter {
    pub fn new(alpha: f64) -> Self {
        assert!(alpha > 0.0 && alpha <= 1.0, "Alpha must be in (0, 1]");
        Self { alpha, last: None }
    }

    /// Smooth one frame and retain the result for the next call
    pub fn smooth(&mut self, raw: &LandmarkFrame) -> LandmarkFrame {
        let smoothed = match &self.last {
            Some(previous) if previous.len() == raw.len() => {
                let points = previous
                    .points
                    .iter()
                    .zip(&raw.points)
                    .map(|(prev, cur)| self.blend(prev, cur))
                    .collect();
                LandmarkFrame::new(points, raw.timestamp)
            }
            _ => raw.clone(),
        };

        self.last = Some(smoothed.clone());
        smoothed
    }

    fn blend(&self, previous: &LandmarkPoint, raw: &LandmarkPoint) -> LandmarkPoint {
        let keep = 1.0 - self.alpha;
        LandmarkPoint {
            x: previous.x * keep + raw.x * self.alpha,
            y: previous.y * keep + raw.y * self.alpha,
            z: previous.z * keep + raw.z * self.alpha,
            visibility: raw.visibility,
        }
    }
}

impl LandmarkFilter for ExponentialFilter {
    fn apply(&mut self, frame: &LandmarkFrame) -> LandmarkFrame {
        self.smooth(frame)
    }

    fn reset(&mut self) {
        self.last = None;
    }

    fn name(&self) -> &str {
        "ExponentialFilter"
    }
}
