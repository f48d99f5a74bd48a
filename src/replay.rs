//! Upstream ports and offline session replay.
//!
//! Live capture and pose inference sit outside this crate behind
//! [`FrameSource`] and [`PoseDetector`]. [`LandmarkReplay`] implements both
//! from a JSON-lines landmark session so the whole pipeline can run offline:
//!
//! ```text
//! {"t": 0.000, "landmarks": [[0.51, 0.22, -0.3, 0.99], ...]}
//! {"t": 0.033, "landmarks": null}
//! ```
//!
//! Each point is `[x, y, z]` or `[x, y, z, visibility]`; `null` marks a frame
//! where no person was detected.

use crate::buffer::frame::{FrameDimensions, PixelFormat, RawFrame};
use crate::landmarks::{LandmarkFrame, LandmarkPoint};
use crate::{Error, Result};
use log::debug;
use serde::Deserialize;
use std::collections::VecDeque;
use std::io::BufRead;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Producer of raw sensor frames
pub trait FrameSource: Send {
    /// Next frame, or `None` at end of stream
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails.
    fn next_frame(&mut self) -> Result<Option<RawFrame>>;
}

/// Body pose detector collaborator
pub trait PoseDetector: Send {
    /// Landmarks for `frame`, or `None` when no person is visible
    ///
    /// # Errors
    ///
    /// Returns `DetectorError` if inference fails for this frame.
    fn detect(&mut self, frame: &RawFrame) -> Result<Option<LandmarkFrame>>;
}

#[derive(Deserialize)]
struct ReplayLine {
    t: f64,
    landmarks: Option<Vec<Vec<f64>>>,
}

/// One frame of a recorded session
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayEntry {
    pub timestamp: Duration,
    pub landmarks: Option<LandmarkFrame>,
}

/// Recorded landmark session
#[derive(Debug, Clone, Default)]
pub struct LandmarkReplay {
    entries: Vec<ReplayEntry>,
}

impl LandmarkReplay {
    /// Load a JSON-lines session file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a line is malformed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let replay = Self::from_reader(std::io::BufReader::new(file))?;
        debug!("Loaded {} replay frames from {}", replay.len(), path.as_ref().display());
        Ok(replay)
    }

    /// Parse a JSON-lines session; blank lines are skipped
    ///
    /// # Errors
    ///
    /// Returns `Json` for unparsable lines and `InvalidInput` for bad points
    /// or timestamps.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut entries = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: ReplayLine = serde_json::from_str(&line)?;
            entries.push(parse_entry(index + 1, parsed)?);
        }
        Ok(Self { entries })
    }

    #[must_use]
    pub fn from_entries(entries: Vec<ReplayEntry>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[ReplayEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Split into a frame source of blank rasters and a detector answering
    /// with the recorded landmarks
    #[must_use]
    pub fn into_ports(self, dimensions: FrameDimensions) -> (ReplayFrames, ReplayDetector) {
        let pending = Arc::new(Mutex::new(VecDeque::new()));
        (
            ReplayFrames {
                dimensions,
                pending: Arc::clone(&pending),
                entries: self.entries.into(),
            },
            ReplayDetector { pending },
        )
    }
}

fn parse_entry(line: usize, parsed: ReplayLine) -> Result<ReplayEntry> {
    let timestamp = Duration::try_from_secs_f64(parsed.t)
        .map_err(|e| Error::InvalidInput(format!("Line {line}: invalid timestamp {}: {e}", parsed.t)))?;

    let landmarks = match parsed.landmarks {
        Some(raw) => {
            let points = raw
                .iter()
                .map(|p| match p.as_slice() {
                    [x, y, z] => Ok(LandmarkPoint {
                        x: *x,
                        y: *y,
                        z: *z,
                        visibility: None,
                    }),
                    [x, y, z, v] => Ok(LandmarkPoint::new(*x, *y, *z, *v)),
                    other => Err(Error::InvalidInput(format!(
                        "Line {line}: landmark has {} values, expected 3 or 4",
                        other.len()
                    ))),
                })
                .collect::<Result<Vec<_>>>()?;
            Some(LandmarkFrame::new(points, timestamp))
        }
        None => None,
    };

    Ok(ReplayEntry { timestamp, landmarks })
}

/// Blank frames at the recorded presentation times
pub struct ReplayFrames {
    entries: VecDeque<ReplayEntry>,
    dimensions: FrameDimensions,
    pending: Arc<Mutex<VecDeque<ReplayEntry>>>,
}

impl FrameSource for ReplayFrames {
    fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        let Some(entry) = self.entries.pop_front() else {
            return Ok(None);
        };
        let pts = entry.timestamp;
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(entry);
        Ok(Some(RawFrame::blank(self.dimensions, PixelFormat::Bgr8, pts)))
    }
}

/// Detector returning the landmarks recorded for each replayed frame
pub struct ReplayDetector {
    pending: Arc<Mutex<VecDeque<ReplayEntry>>>,
}

impl PoseDetector for ReplayDetector {
    fn detect(&mut self, frame: &RawFrame) -> Result<Option<LandmarkFrame>> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        while let Some(entry) = pending.pop_front() {
            if entry.timestamp == frame.pts() {
                return Ok(entry.landmarks);
            }
        }
        Err(Error::DetectorError(format!(
            "No recorded landmarks for frame at {:?}",
            frame.pts()
        )))
    }
}
