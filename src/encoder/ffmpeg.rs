use super::{EncodeSettings, EncodingSession, FramePacer, SessionStatus, VideoEncoder};
use crate::buffer::frame::RawFrame;
use crate::error::EncoderError;
use log::{debug, warn};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Bytes of ffmpeg stderr kept for error reports
const STDERR_TAIL: usize = 2048;

/// Encoder piping raw BGR frames into an `ffmpeg` process
pub struct FfmpegEncoder {
    binary: Option<PathBuf>,
}

impl FfmpegEncoder {
    /// Locate `ffmpeg` on `PATH`
    #[must_use]
    pub fn new() -> Self {
        let binary = which::which("ffmpeg").ok();
        if binary.is_none() {
            warn!("ffmpeg not found on PATH; clips cannot be saved");
        }
        Self { binary }
    }

    /// Use a specific `ffmpeg` binary
    #[must_use]
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: Some(binary.into()),
        }
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn open_session(&self, dest: &Path, settings: &EncodeSettings) -> Result<Box<dyn EncodingSession>, EncoderError> {
        let binary = self
            .binary
            .clone()
            .ok_or_else(|| EncoderError::Backend("ffmpeg executable not found".to_string()))?;

        Ok(Box::new(FfmpegSession {
            binary,
            args: build_args(dest, settings),
            frame_rate: settings.frame_rate,
            child: None,
            input: None,
            stderr: None,
        }))
    }
}

fn build_args(dest: &Path, settings: &EncodeSettings) -> Vec<String> {
    let size = format!("{}x{}", settings.dimensions.width, settings.dimensions.height);
    let rate = format!("{:.3}", settings.frame_rate);
    let args = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-y",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "bgr24",
        "-s",
        size.as_str(),
        "-framerate",
        rate.as_str(),
        "-i",
        "-",
        "-an",
        // yuv420p needs even dimensions
        "-vf",
        "pad=ceil(iw/2)*2:ceil(ih/2)*2",
        "-c:v",
        settings.codec.as_str(),
        "-pix_fmt",
        "yuv420p",
    ];

    args.iter()
        .map(ToString::to_string)
        .chain(std::iter::once(dest.to_string_lossy().into_owned()))
        .collect()
}

/// Writes packed frames at a constant rate, repeating or dropping frames so
/// each one appears at its own pts
struct PacedWriter<W> {
    sink: W,
    pacer: FramePacer,
    previous: Vec<u8>,
    slots: u64,
}

impl<W: Write> PacedWriter<W> {
    fn new(sink: W, frame_rate: f64) -> Self {
        Self {
            sink,
            pacer: FramePacer::new(frame_rate),
            previous: Vec::new(),
            slots: 0,
        }
    }

    fn write_frame(&mut self, bytes: &[u8], pts: Duration) -> io::Result<()> {
        let Some(repeats) = self.pacer.place(pts) else {
            debug!("Dropping frame at {pts:?}: its output slot is already written");
            return Ok(());
        };
        for _ in 0..repeats {
            self.sink.write_all(&self.previous)?;
        }
        self.sink.write_all(bytes)?;
        self.previous.clear();
        self.previous.extend_from_slice(bytes);
        self.slots += repeats + 1;
        Ok(())
    }
}

struct FfmpegSession {
    binary: PathBuf,
    args: Vec<String>,
    frame_rate: f64,
    child: Option<Child>,
    input: Option<PacedWriter<ChildStdin>>,
    stderr: Option<JoinHandle<String>>,
}

impl EncodingSession for FfmpegSession {
    fn attach_input(&mut self) -> Result<(), EncoderError> {
        debug!("Running {} {}", self.binary.display(), self.args.join(" "));
        let mut child = Command::new(&self.binary)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        self.input = child.stdin.take().map(|stdin| PacedWriter::new(stdin, self.frame_rate));
        if let Some(mut stderr) = child.stderr.take() {
            // Drained on its own thread so a chatty ffmpeg never blocks the pipe
            self.stderr = Some(thread::spawn(move || {
                let mut output = String::new();
                let _ = stderr.read_to_string(&mut output);
                output
            }));
        }
        self.child = Some(child);

        if self.input.is_none() {
            return Err(EncoderError::Backend("ffmpeg stdin was not captured".to_string()));
        }
        Ok(())
    }

    fn is_ready_for_more_data(&mut self) -> bool {
        // Pipe writes block until ffmpeg catches up
        self.input.is_some()
    }

    fn append(&mut self, frame: &RawFrame, pts: Duration) -> Result<(), EncoderError> {
        let input = self
            .input
            .as_mut()
            .ok_or_else(|| EncoderError::Backend("ffmpeg input is closed".to_string()))?;
        input.write_frame(&frame.to_bgr24(), pts)?;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> SessionStatus {
        // Closing stdin signals end of stream
        if let Some(input) = self.input.take() {
            debug!("Wrote {} output frames at {:.3} fps", input.slots, self.frame_rate);
        }

        let Some(mut child) = self.child.take() else {
            return SessionStatus::Failed(EncoderError::Incomplete("never started".to_string()));
        };
        let status = match child.wait() {
            Ok(status) => status,
            Err(e) => return SessionStatus::Failed(e.into()),
        };
        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if status.success() {
            SessionStatus::Completed
        } else {
            let start = stderr.len().saturating_sub(STDERR_TAIL);
            let tail = stderr.get(start..).unwrap_or(&stderr).trim().to_string();
            SessionStatus::Failed(EncoderError::ProcessFailed {
                status: status.to_string(),
                stderr: tail,
            })
        }
    }
}

impl Drop for FfmpegSession {
    fn drop(&mut self) {
        drop(self.input.take());
        if let Some(mut child) = self.child.take() {
            if let Ok(None) = child.try_wait() {
                let _ = child.kill();
            }
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::frame::FrameDimensions;

    #[test]
    fn test_args_describe_raw_input() {
        let settings = EncodeSettings {
            dimensions: FrameDimensions::new(320, 240),
            frame_rate: 29.97,
            codec: "libx264".to_string(),
        };
        let args = build_args(Path::new("/tmp/out.mp4"), &settings);

        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo -pix_fmt bgr24 -s 320x240 -framerate 29.970 -i -"));
        assert!(joined.contains("-c:v libx264"));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out.mp4"));
    }

    #[test]
    fn test_uneven_capture_keeps_its_timing() {
        // One byte per frame; a one second stall after the third frame
        let mut writer = PacedWriter::new(Vec::new(), 1000.0 / 33.0);
        for (value, ms) in [(1u8, 0u64), (2, 33), (3, 66), (4, 1000)] {
            writer.write_frame(&[value], Duration::from_millis(ms)).unwrap();
        }

        let mut expected = vec![1, 2];
        expected.extend(std::iter::repeat(3).take(28));
        expected.push(4);
        assert_eq!(writer.sink, expected);
        assert_eq!(writer.slots, 31);
    }

    #[test]
    fn test_frames_sharing_a_slot_are_dropped() {
        let mut writer = PacedWriter::new(Vec::new(), 10.0);
        for (value, ms) in [(1u8, 0u64), (2, 20), (3, 100)] {
            writer.write_frame(&[value], Duration::from_millis(ms)).unwrap();
        }
        assert_eq!(writer.sink, vec![1, 3]);
    }

    #[test]
    fn test_missing_binary_cannot_open() {
        let encoder = FfmpegEncoder { binary: None };
        let settings = EncodeSettings {
            dimensions: FrameDimensions::new(2, 2),
            frame_rate: 30.0,
            codec: "libx264".to_string(),
        };
        assert!(encoder.open_session(Path::new("out.mp4"), &settings).is_err());
    }

    #[test]
    fn test_nonexistent_binary_fails_on_attach() {
        let encoder = FfmpegEncoder::with_binary("/nonexistent/ffmpeg");
        let settings = EncodeSettings {
            dimensions: FrameDimensions::new(2, 2),
            frame_rate: 30.0,
            codec: "libx264".to_string(),
        };
        let mut session = encoder.open_session(Path::new("out.mp4"), &settings).unwrap();
        assert!(matches!(session.attach_input(), Err(EncoderError::Io(_))));
    }
}
