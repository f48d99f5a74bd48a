use crate::landmarks::LandmarkFrame;
use serde::Serialize;
use std::time::Duration;

/// One smoothed frame with its offset from backswing start
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedFrame {
    /// Time since the frame that started the backswing
    pub relative_time: Duration,
    /// Smoothed landmarks
    pub frame: LandmarkFrame,
}

/// Landmark frames spanning backswing through finish
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SwingRecording {
    frames: Vec<RecordedFrame>,
}

impl SwingRecording {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, relative_time: Duration, frame: LandmarkFrame) {
        self.frames.push(RecordedFrame {
            relative_time,
            frame,
        });
    }

    pub fn clear(&mut self) {
        self.frames.clear();
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
    pub fn frames(&self) -> &[RecordedFrame] {
        &self.frames
    }

    #[must_use]
    pub fn first(&self) -> Option<&RecordedFrame> {
        self.frames.first()
    }

    #[must_use]
    pub fn last(&self) -> Option<&RecordedFrame> {
        self.frames.last()
    }

    /// Time between the first and last recorded frame
    #[must_use]
    pub fn duration(&self) -> Duration {
        match (self.first(), self.last()) {
            (Some(first), Some(last)) => last.relative_time.saturating_sub(first.relative_time),
            _ => Duration::ZERO,
        }
    }

    /// Frame with the highest wrist position (smallest average wrist Y).
    ///
    /// The earliest frame wins ties.
    #[must_use]
    pub fn top_of_backswing(&self) -> Option<(usize, &RecordedFrame)> {
        let mut best: Option<(usize, &RecordedFrame, f64)> = None;
        for (index, recorded) in self.frames.iter().enumerate() {
            let Some(wrist_y) = recorded.frame.avg_wrist_y() else {
                continue;
            };
            if best.map_or(true, |(_, _, y)| wrist_y < y) {
                best = Some((index, recorded, wrist_y));
            }
        }
        best.map(|(index, recorded, _)| (index, recorded))
    }
}
