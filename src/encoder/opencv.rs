use super::{EncodeSettings, EncodingSession, FramePacer, SessionStatus, VideoEncoder};
use crate::buffer::frame::RawFrame;
use crate::error::EncoderError;
use log::debug;
use opencv::core::{Mat, Scalar, Size, CV_8UC3};
use opencv::prelude::*;
use opencv::videoio::VideoWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fourcc used when the configured codec is not a four character code
const FALLBACK_FOURCC: [char; 4] = ['m', 'p', '4', 'v'];

/// Encoder backed by `OpenCV`'s `VideoWriter`
#[derive(Debug, Default)]
pub struct OpenCvEncoder;

impl OpenCvEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn fourcc(codec: &str) -> opencv::Result<i32> {
    let chars: Vec<char> = codec.chars().collect();
    let [a, b, c, d] = <[char; 4]>::try_from(chars).unwrap_or(FALLBACK_FOURCC);
    VideoWriter::fourcc(a, b, c, d)
}

fn to_i32(value: u32) -> Result<i32, EncoderError> {
    i32::try_from(value).map_err(|_| EncoderError::Backend(format!("Dimension {value} too large for OpenCV")))
}

impl VideoEncoder for OpenCvEncoder {
    fn name(&self) -> &str {
        "opencv"
    }

    fn open_session(&self, dest: &Path, settings: &EncodeSettings) -> Result<Box<dyn EncodingSession>, EncoderError> {
        let width = to_i32(settings.dimensions.width)?;
        let height = to_i32(settings.dimensions.height)?;
        let code = fourcc(&settings.codec)?;
        debug!(
            "Opening OpenCV writer {} ({}x{} @ {:.2} fps)",
            dest.display(),
            width,
            height,
            settings.frame_rate
        );

        Ok(Box::new(OpenCvSession {
            dest: dest.to_path_buf(),
            fourcc: code,
            frame_rate: settings.frame_rate,
            size: Size::new(width, height),
            writer: None,
            pacer: FramePacer::new(settings.frame_rate),
            scratch: Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::all(0.0))?,
        }))
    }
}

struct OpenCvSession {
    dest: PathBuf,
    fourcc: i32,
    frame_rate: f64,
    size: Size,
    writer: Option<VideoWriter>,
    pacer: FramePacer,
    scratch: Mat,
}

impl EncodingSession for OpenCvSession {
    fn attach_input(&mut self) -> Result<(), EncoderError> {
        let path = self.dest.to_string_lossy();
        let writer = VideoWriter::new(&path, self.fourcc, self.frame_rate, self.size, true)?;
        if !writer.is_opened()? {
            return Err(EncoderError::Backend(format!("VideoWriter could not open {path}")));
        }
        self.writer = Some(writer);
        Ok(())
    }

    fn is_ready_for_more_data(&mut self) -> bool {
        self.writer.is_some()
    }

    fn append(&mut self, frame: &RawFrame, pts: Duration) -> Result<(), EncoderError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| EncoderError::Backend("VideoWriter is not open".to_string()))?;
        let Some(repeats) = self.pacer.place(pts) else {
            debug!("Dropping frame at {pts:?}: its output slot is already written");
            return Ok(());
        };

        // The scratch Mat still holds the previous frame
        for _ in 0..repeats {
            writer.write(&self.scratch)?;
        }

        let bgr = frame.to_bgr24();
        let target = self.scratch.data_bytes_mut()?;
        if target.len() != bgr.len() {
            return Err(EncoderError::Backend(format!(
                "Frame holds {} bytes, writer expects {}",
                bgr.len(),
                target.len()
            )));
        }
        target.copy_from_slice(&bgr);
        writer.write(&self.scratch)?;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> SessionStatus {
        let Some(mut writer) = self.writer.take() else {
            return SessionStatus::Failed(EncoderError::Incomplete("writer never opened".to_string()));
        };
        match writer.release() {
            Ok(()) => SessionStatus::Completed,
            Err(e) => SessionStatus::Failed(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_falls_back_for_long_codec_names() {
        assert_eq!(fourcc("libx264").unwrap(), fourcc("mp4v").unwrap());
        assert_ne!(fourcc("MJPG").unwrap(), fourcc("mp4v").unwrap());
    }
}
