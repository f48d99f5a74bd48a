use super::frame::RawFrame;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Frames ordered by arrival, bounded by presentation-time span
#[derive(Debug)]
pub struct FrameWindow {
    frames: VecDeque<Arc<RawFrame>>,
    max_window: Duration,
}

impl FrameWindow {
    #[must_use]
    pub fn new(max_window: Duration) -> Self {
        Self {
            frames: VecDeque::new(),
            max_window,
        }
    }

    /// Append at the tail, then evict from the head until the span fits.
    ///
    /// Returns the number of evicted frames.
    pub fn push(&mut self, frame: Arc<RawFrame>) -> usize {
        self.frames.push_back(frame);

        let mut evicted = 0;
        while self.span() > self.max_window {
            self.frames.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Shared copy of the current contents
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<RawFrame>> {
        self.frames.iter().cloned().collect()
    }

    /// Presentation-time distance between oldest and newest frame
    #[must_use]
    pub fn span(&self) -> Duration {
        match (self.frames.front(), self.frames.back()) {
            (Some(first), Some(last)) => last.pts().saturating_sub(first.pts()),
            _ => Duration::ZERO,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[must_use]
    pub fn max_window(&self) -> Duration {
        self.max_window
    }
}
