//! Bounded rolling buffer of raw video frames.
//!
//! The producer pays for one copy and one channel send per frame. A single
//! worker thread owns the window and applies appends, clears and save
//! requests in arrival order. A save snapshots the window as shared frames and
//! encodes on its own thread, so ingestion continues while a clip is written.

/// Owned frames and borrowed sensor views
pub mod frame;

/// Time-bounded frame window
pub mod window;

use crate::config::BufferConfig;
use crate::encoder::{write_clip, ClipArtifact, VideoEncoder, WriteOptions};
use crate::{Error, Result};
use frame::{FrameView, RawFrame};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use window::FrameWindow;

/// Settings for the rolling buffer
#[derive(Debug, Clone, PartialEq)]
pub struct BufferSettings {
    /// Maximum presentation-time span kept
    pub max_window: Duration,
    pub write: WriteOptions,
}

impl From<&BufferConfig> for BufferSettings {
    fn from(config: &BufferConfig) -> Self {
        Self {
            max_window: config.max_window(),
            write: WriteOptions::from(config),
        }
    }
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self::from(&BufferConfig::default())
    }
}

/// Point-in-time view of the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferStats {
    pub frames: usize,
    /// Oldest to newest presentation time
    pub span: Duration,
    pub appended: u64,
    pub evicted: u64,
}

enum Command {
    Append(Arc<RawFrame>),
    Clear,
    Save {
        dest: PathBuf,
        reply: Sender<Result<ClipArtifact>>,
    },
    Stats(Sender<BufferStats>),
    Shutdown,
}

/// Pending result of [`RollingFrameBuffer::save`]
#[derive(Debug)]
pub struct SaveHandle {
    rx: Receiver<Result<ClipArtifact>>,
}

impl SaveHandle {
    /// Block until the clip is written
    ///
    /// # Errors
    ///
    /// Returns the save failure, or `BufferClosed` if the worker went away.
    pub fn wait(self) -> Result<ClipArtifact> {
        self.rx.recv().map_err(|_| Error::BufferClosed)?
    }

    /// Block for at most `timeout`; `None` if the clip is still encoding
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<ClipArtifact>> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(Error::BufferClosed)),
        }
    }
}

/// Rolling window of raw frames with asynchronous clip encoding
pub struct RollingFrameBuffer {
    tx: Sender<Command>,
    worker: Option<JoinHandle<()>>,
}

impl RollingFrameBuffer {
    /// Start the buffer worker
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the worker thread cannot be spawned.
    pub fn spawn(settings: BufferSettings, encoder: Arc<dyn VideoEncoder>) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("frame-buffer".to_string())
            .spawn(move || run_worker(&rx, &settings, &encoder))?;

        Ok(Self {
            tx,
            worker: Some(worker),
        })
    }

    /// Copy a sensor frame into the buffer
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a malformed frame or `BufferClosed` if the
    /// worker has stopped.
    pub fn append(&self, view: &FrameView<'_>) -> Result<()> {
        self.append_owned(RawFrame::copy_from(view)?)
    }

    /// Enqueue an already owned frame
    ///
    /// # Errors
    ///
    /// Returns `BufferClosed` if the worker has stopped.
    pub fn append_owned(&self, frame: RawFrame) -> Result<()> {
        self.append_shared(Arc::new(frame))
    }

    /// Enqueue a frame the caller keeps reading, e.g. for pose detection
    ///
    /// # Errors
    ///
    /// Returns `BufferClosed` if the worker has stopped.
    pub fn append_shared(&self, frame: Arc<RawFrame>) -> Result<()> {
        self.send(Command::Append(frame))
    }

    /// Drop every buffered frame
    ///
    /// # Errors
    ///
    /// Returns `BufferClosed` if the worker has stopped.
    pub fn clear(&self) -> Result<()> {
        self.send(Command::Clear)
    }

    /// Encode the current window to `dest`
    ///
    /// The window is captured when the worker reaches this request, so every
    /// frame appended before the call is included.
    ///
    /// # Errors
    ///
    /// Returns `BufferClosed` if the worker has stopped. Encoding failures are
    /// reported through the handle.
    pub fn save(&self, dest: impl Into<PathBuf>) -> Result<SaveHandle> {
        let (reply, rx) = mpsc::channel();
        self.send(Command::Save {
            dest: dest.into(),
            reply,
        })?;
        Ok(SaveHandle { rx })
    }

    /// Current buffer statistics
    ///
    /// # Errors
    ///
    /// Returns `BufferClosed` if the worker has stopped.
    pub fn stats(&self) -> Result<BufferStats> {
        let (reply, rx) = mpsc::channel();
        self.send(Command::Stats(reply))?;
        rx.recv().map_err(|_| Error::BufferClosed)
    }

    fn send(&self, command: Command) -> Result<()> {
        self.tx.send(command).map_err(|_| Error::BufferClosed)
    }
}

impl Drop for RollingFrameBuffer {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Frame buffer worker panicked");
            }
        }
    }
}

fn run_worker(rx: &Receiver<Command>, settings: &BufferSettings, encoder: &Arc<dyn VideoEncoder>) {
    let mut window = FrameWindow::new(settings.max_window);
    let mut stats = BufferStats::default();

    while let Ok(command) = rx.recv() {
        match command {
            Command::Append(frame) => {
                stats.appended += 1;
                stats.evicted += window.push(frame) as u64;
            }
            Command::Clear => {
                debug!("Clearing {} buffered frames", window.len());
                window.clear();
            }
            Command::Save { dest, reply } => start_save(&window, dest, reply, settings, encoder),
            Command::Stats(reply) => {
                stats.frames = window.len();
                stats.span = window.span();
                let _ = reply.send(stats);
            }
            Command::Shutdown => break,
        }
    }
    debug!("Frame buffer worker stopped");
}

fn start_save(
    window: &FrameWindow,
    dest: PathBuf,
    reply: Sender<Result<ClipArtifact>>,
    settings: &BufferSettings,
    encoder: &Arc<dyn VideoEncoder>,
) {
    if window.is_empty() {
        warn!("Save to {} requested with an empty buffer", dest.display());
        let _ = reply.send(Err(Error::EmptyBuffer));
        return;
    }

    let snapshot = window.snapshot();
    info!(
        "Saving {} frames ({:.2}s) to {}",
        snapshot.len(),
        window.span().as_secs_f64(),
        dest.display()
    );

    let encoder = Arc::clone(encoder);
    let options = settings.write.clone();
    let spawned = thread::Builder::new()
        .name("clip-encoder".to_string())
        .spawn(move || {
            let result = write_clip(encoder.as_ref(), &snapshot, &dest, &options);
            if let Err(e) = &result {
                warn!("Could not save clip to {}: {e}", dest.display());
            }
            let _ = reply.send(result);
        });

    if let Err(e) = spawned {
        // The reply sender moved into the closure and was dropped with it;
        // the handle observes a disconnect.
        warn!("Could not start clip encoder thread: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{EncodeSettings, EncodingSession, SessionStatus};
    use crate::error::EncoderError;
    use frame::{FrameDimensions, PixelFormat};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingEncoder {
        sessions: AtomicUsize,
        frames: Arc<AtomicUsize>,
    }

    struct CountingSession {
        dest: PathBuf,
        frames: Arc<AtomicUsize>,
    }

    impl VideoEncoder for CountingEncoder {
        fn name(&self) -> &str {
            "counting"
        }

        fn open_session(&self, dest: &Path, _settings: &EncodeSettings) -> std::result::Result<Box<dyn EncodingSession>, EncoderError> {
            self.sessions.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingSession {
                dest: dest.to_path_buf(),
                frames: Arc::clone(&self.frames),
            }))
        }
    }

    impl EncodingSession for CountingSession {
        fn attach_input(&mut self) -> std::result::Result<(), EncoderError> {
            Ok(())
        }

        fn is_ready_for_more_data(&mut self) -> bool {
            true
        }

        fn append(&mut self, _frame: &RawFrame, _pts: Duration) -> std::result::Result<(), EncoderError> {
            self.frames.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn finish(self: Box<Self>) -> SessionStatus {
            match std::fs::write(&self.dest, b"clip") {
                Ok(()) => SessionStatus::Completed,
                Err(e) => SessionStatus::Failed(e.into()),
            }
        }
    }

    fn frame_at(ms: u64) -> RawFrame {
        RawFrame::blank(FrameDimensions::new(4, 2), PixelFormat::Bgr8, Duration::from_millis(ms))
    }

    fn settings(max_window_ms: u64) -> BufferSettings {
        BufferSettings {
            max_window: Duration::from_millis(max_window_ms),
            ..BufferSettings::default()
        }
    }

    #[test]
    fn test_empty_save_never_opens_encoder() {
        let encoder = Arc::new(CountingEncoder::default());
        let buffer = RollingFrameBuffer::spawn(settings(1000), encoder.clone()).unwrap();

        let result = buffer.save("unused.mp4").unwrap().wait();
        assert!(matches!(result, Err(Error::EmptyBuffer)));
        assert_eq!(encoder.sessions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_save_encodes_every_buffered_frame() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = Arc::new(CountingEncoder::default());
        let buffer = RollingFrameBuffer::spawn(settings(1000), encoder.clone()).unwrap();

        for i in 0..20 {
            buffer.append_owned(frame_at(i * 33)).unwrap();
        }
        let artifact = buffer.save(dir.path().join("clip.mp4")).unwrap().wait().unwrap();

        assert_eq!(artifact.frame_count, 20);
        assert_eq!(encoder.frames.load(Ordering::SeqCst), 20);
        assert_eq!(artifact.duration, Duration::from_millis(19 * 33));
    }

    #[test]
    fn test_window_is_trimmed() {
        let buffer = RollingFrameBuffer::spawn(settings(100), Arc::new(CountingEncoder::default())).unwrap();
        for i in 0..10 {
            buffer.append_owned(frame_at(i * 40)).unwrap();
        }

        let stats = buffer.stats().unwrap();
        assert_eq!(stats.appended, 10);
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.evicted, 7);
        assert!(stats.span <= Duration::from_millis(100));
    }

    #[test]
    fn test_clear_then_save_is_empty() {
        let buffer = RollingFrameBuffer::spawn(settings(1000), Arc::new(CountingEncoder::default())).unwrap();
        buffer.append_owned(frame_at(0)).unwrap();
        buffer.clear().unwrap();
        assert!(matches!(buffer.save("unused.mp4").unwrap().wait(), Err(Error::EmptyBuffer)));
    }

    #[test]
    fn test_append_copies_view() {
        let buffer = RollingFrameBuffer::spawn(settings(1000), Arc::new(CountingEncoder::default())).unwrap();
        let mut data = vec![9u8; 4 * 2 * 3];
        let view = FrameView::packed(&data, FrameDimensions::new(4, 2), PixelFormat::Bgr8, Duration::ZERO);
        buffer.append(&view).unwrap();
        data.fill(0);

        assert_eq!(buffer.stats().unwrap().frames, 1);
    }
}
