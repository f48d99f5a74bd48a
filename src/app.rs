//! Capture orchestration.
//!
//! Every sensor frame goes to the rolling buffer, then to the pose detector;
//! the landmarks drive the swing detector. When a swing completes the app
//! analyzes the recording, starts encoding a clip of the buffered video in the
//! background, clears the buffer and re-arms the detector. Finished clips are
//! picked up between frames.

use crate::buffer::frame::RawFrame;
use crate::buffer::{BufferSettings, RollingFrameBuffer, SaveHandle};
use crate::config::Config;
use crate::encoder::{create_encoder, ClipArtifact, VideoEncoder};
use crate::events::SwingEvent;
use crate::feedback::{analyze, Feedback};
use crate::replay::{FrameSource, PoseDetector};
use crate::swing::detector::SwingDetector;
use crate::swing::SwingAttempt;
use crate::Result;
use log::{debug, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Staging files are unique per process even with several apps running
static STAGED_CLIPS: AtomicU64 = AtomicU64::new(0);

/// What happened to the clip of a swing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClipOutcome {
    Saved { path: PathBuf },
    Failed { reason: String },
    /// Still encoding
    Pending,
    Skipped,
}

/// Result of one captured swing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwingReport {
    pub attempt: SwingAttempt,
    /// Finished by the safety timeout
    pub timed_out: bool,
    pub recorded_frames: usize,
    pub duration: Duration,
    pub feedback: Option<Feedback>,
    pub clip: ClipOutcome,
}

/// Totals for a capture session
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSummary {
    pub frames: u64,
    pub detections: u64,
    pub missed_detections: u64,
    pub detector_errors: u64,
    pub swings: Vec<SwingReport>,
}

/// Swing capture pipeline
pub struct SwingCaptureApp {
    config: Config,
    save_clips: bool,
    detector: SwingDetector,
    buffer: RollingFrameBuffer,
    events: Receiver<SwingEvent>,
    summary: SessionSummary,
    pending_clips: Vec<PendingClip>,
}

/// Clip still being encoded for the report at `report`
struct PendingClip {
    report: usize,
    attempt: SwingAttempt,
    handle: SaveHandle,
    dest: PathBuf,
}

impl SwingCaptureApp {
    /// Build the pipeline with the encoder named in the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a worker thread
    /// cannot be started.
    pub fn new(config: Config, save_clips: bool) -> Result<Self> {
        let encoder = create_encoder(&config.buffer.encoder)?;
        Self::with_encoder(config, encoder, save_clips)
    }

    /// Build the pipeline around a specific encoder
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a worker thread
    /// cannot be started.
    pub fn with_encoder(config: Config, encoder: Arc<dyn VideoEncoder>, save_clips: bool) -> Result<Self> {
        config.validate()?;
        info!("Initializing swing capture ({} encoder)", encoder.name());

        let detector = SwingDetector::new(&config.smoothing, &config.detection)?;
        let events = detector.subscribe();
        let buffer = RollingFrameBuffer::spawn(BufferSettings::from(&config.buffer), encoder)?;

        Ok(Self {
            config,
            save_clips,
            detector,
            buffer,
            events,
            summary: SessionSummary::default(),
            pending_clips: Vec::new(),
        })
    }

    #[must_use]
    pub fn detector(&self) -> &SwingDetector {
        &self.detector
    }

    #[must_use]
    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    /// Run until the source is exhausted
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails or the buffer worker stops.
    pub fn run(&mut self, source: &mut dyn FrameSource, pose: &mut dyn PoseDetector) -> Result<SessionSummary> {
        info!("Starting capture loop");
        let started = Instant::now();

        while let Some(frame) = source.next_frame()? {
            self.process_frame(frame, pose)?;
        }
        self.wait_for_clips();

        info!(
            "Capture finished: {} frames, {} swings in {:.1}s",
            self.summary.frames,
            self.summary.swings.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(self.summary.clone())
    }

    /// Feed one sensor frame through the pipeline
    ///
    /// Clip encoding runs in the background; finished clips are collected on
    /// later frames or by [`Self::wait_for_clips`].
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer worker has stopped.
    pub fn process_frame(&mut self, frame: RawFrame, pose: &mut dyn PoseDetector) -> Result<()> {
        self.summary.frames += 1;

        let frame = Arc::new(frame);
        self.buffer.append_shared(Arc::clone(&frame))?;

        let landmarks = match pose.detect(&frame) {
            Ok(landmarks) => landmarks,
            Err(e) => {
                warn!("Pose detection failed at {:?}: {e}", frame.pts());
                self.summary.detector_errors += 1;
                None
            }
        };

        match landmarks {
            Some(landmarks) => {
                self.summary.detections += 1;
                self.detector.on_landmarks(&landmarks);
            }
            None => {
                self.summary.missed_detections += 1;
                self.detector.on_no_detection();
            }
        }

        self.drain_events()?;
        self.collect_clips(Duration::ZERO);
        Ok(())
    }

    /// Block until every clip in flight is saved or has failed
    pub fn wait_for_clips(&mut self) {
        for pending in std::mem::take(&mut self.pending_clips) {
            let result = pending.handle.wait();
            self.resolve_clip(pending.report, pending.attempt, &pending.dest, result);
        }
    }

    /// Number of clips still encoding
    #[must_use]
    pub fn clips_in_flight(&self) -> usize {
        self.pending_clips.len()
    }

    fn drain_events(&mut self) -> Result<()> {
        while let Ok(event) = self.events.try_recv() {
            match event {
                SwingEvent::StateChanged(snapshot) => {
                    info!("[{}] {}", snapshot.state, snapshot.status_message);
                }
                SwingEvent::DebugSample { jitter, confidence } => {
                    debug!("jitter = {jitter:.4}, address confidence = {confidence}");
                }
                SwingEvent::SwingDetected { attempt, timed_out, .. } => {
                    self.complete_swing(attempt, timed_out)?;
                }
            }
        }
        Ok(())
    }

    fn complete_swing(&mut self, attempt: SwingAttempt, timed_out: bool) -> Result<()> {
        let recording = self.detector.recording();
        let feedback = analyze(&recording);
        if let Some(feedback) = &feedback {
            info!(
                "Swing {attempt}: {} ({}/10) - {}",
                feedback.title, feedback.confidence, feedback.instruction
            );
        }

        let report = self.summary.swings.len();
        let clip = if self.save_clips {
            self.start_clip(report, attempt)
        } else {
            ClipOutcome::Skipped
        };

        // The save request is queued ahead of the clear, so its snapshot is intact
        self.buffer.clear()?;
        self.detector.reset_to_idle();

        self.summary.swings.push(SwingReport {
            attempt,
            timed_out,
            recorded_frames: recording.len(),
            duration: recording.duration(),
            feedback,
            clip,
        });
        Ok(())
    }

    fn start_clip(&mut self, report: usize, attempt: SwingAttempt) -> ClipOutcome {
        let staging = std::env::temp_dir().join(format!(
            "swing-capture-{}-{}.mp4",
            std::process::id(),
            STAGED_CLIPS.fetch_add(1, Ordering::Relaxed)
        ));
        let dest = self.config.buffer.output_dir.join(format!("swing-{:03}.mp4", attempt.0));

        match self.buffer.save(staging) {
            Ok(handle) => {
                debug!("Swing {attempt} clip queued for {}", dest.display());
                self.pending_clips.push(PendingClip {
                    report,
                    attempt,
                    handle,
                    dest,
                });
                ClipOutcome::Pending
            }
            Err(e) => {
                warn!("Could not save clip for swing {attempt}: {e}");
                ClipOutcome::Failed { reason: e.to_string() }
            }
        }
    }

    /// Resolve finished clips, waiting at most `timeout` on each
    fn collect_clips(&mut self, timeout: Duration) {
        let mut still_pending = Vec::with_capacity(self.pending_clips.len());
        for pending in std::mem::take(&mut self.pending_clips) {
            match pending.handle.wait_timeout(timeout) {
                Some(result) => self.resolve_clip(pending.report, pending.attempt, &pending.dest, result),
                None => still_pending.push(pending),
            }
        }
        self.pending_clips = still_pending;
    }

    fn resolve_clip(&mut self, report: usize, attempt: SwingAttempt, dest: &Path, result: Result<ClipArtifact>) {
        let outcome = match result.and_then(|artifact| artifact.persist_to(dest)) {
            Ok(path) => {
                info!("Swing {attempt} clip saved to {}", path.display());
                ClipOutcome::Saved { path }
            }
            Err(e) => {
                warn!("Could not save clip for swing {attempt}: {e}");
                ClipOutcome::Failed { reason: e.to_string() }
            }
        };
        if let Some(swing) = self.summary.swings.get_mut(report) {
            swing.clip = outcome;
        }
    }
}
