//! Short-window steadiness tracking.
//!
//! The golfer counts as steady when both wrist height and shoulder height
//! barely move over the last few frames. Range (max - min) is used instead of
//! standard deviation so a single twitch is enough to break steadiness.

use std::collections::VecDeque;

/// Fixed-capacity FIFO of recent scalar samples
#[derive(Debug, Clone)]
pub struct JitterWindow {
    capacity: usize,
    samples: VecDeque<f64>,
}

impl JitterWindow {
    /// Create a window holding at most `capacity` samples
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Window size must be greater than 0");
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Add a sample, evicting the oldest once full
    pub fn push(&mut self, value: f64) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// `max - min` over the window, 0 when empty
    #[must_use]
    pub fn range(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let min = self.samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        max - min
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

}

/// Result of one steadiness update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JitterReading {
    /// Wrist height range over the window
    pub wrist_range: f64,
    /// Shoulder height range over the window
    pub shoulder_range: f64,
    /// `max(wrist_range, shoulder_range * weight)`
    pub combined: f64,
    /// `combined < threshold`
    pub steady: bool,
}

/// Wrist and shoulder jitter windows combined into one steadiness signal
#[derive(Debug, Clone)]
pub struct SteadinessTracker {
    wrist: JitterWindow,
    shoulder: JitterWindow,
    shoulder_weight: f64,
    threshold: f64,
}

impl SteadinessTracker {
    #[must_use]
    pub fn new(window_size: usize, shoulder_weight: f64, threshold: f64) -> Self {
        Self {
            wrist: JitterWindow::new(window_size),
            shoulder: JitterWindow::new(window_size),
            shoulder_weight,
            threshold,
        }
    }

    /// Push the current averages and report steadiness over the window
    pub fn update(&mut self, wrist_y: f64, shoulder_y: f64) -> JitterReading {
        self.wrist.push(wrist_y);
        self.shoulder.push(shoulder_y);

        let wrist_range = self.wrist.range();
        let shoulder_range = self.shoulder.range();
        let combined = wrist_range.max(shoulder_range * self.shoulder_weight);

        JitterReading {
            wrist_range,
            shoulder_range,
            combined,
            steady: combined < self.threshold,
        }
    }
}
