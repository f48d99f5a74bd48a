//! Owned raw video frames.
//!
//! Sensor memory is only borrowed for the duration of [`RawFrame::copy_from`];
//! everything the buffer keeps is a tightly packed copy.

use crate::{Error, Result};
use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

/// Pixel layout of a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Bgr8,
    Bgra8,
    Rgb8,
    Gray8,
}

impl PixelFormat {
    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Bgr8 | Self::Rgb8 => 3,
            Self::Bgra8 => 4,
            Self::Gray8 => 1,
        }
    }
}

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameDimensions {
    pub width: u32,
    pub height: u32,
}

impl FrameDimensions {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels
    #[must_use]
    pub fn area(self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for FrameDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Borrowed view of a sensor frame, valid only for the delivery callback
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub data: &'a [u8],
    pub dimensions: FrameDimensions,
    pub format: PixelFormat,
    /// Bytes per row including any padding
    pub stride: usize,
    /// Presentation time
    pub pts: Duration,
}

impl<'a> FrameView<'a> {
    /// View over tightly packed rows
    #[must_use]
    pub fn packed(data: &'a [u8], dimensions: FrameDimensions, format: PixelFormat, pts: Duration) -> Self {
        Self {
            data,
            dimensions,
            format,
            stride: dimensions.width as usize * format.bytes_per_pixel(),
            pts,
        }
    }
}

/// Owned, time-stamped raster
#[derive(Clone, PartialEq, Eq)]
pub struct RawFrame {
    data: Vec<u8>,
    dimensions: FrameDimensions,
    format: PixelFormat,
    pts: Duration,
}

impl fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawFrame")
            .field("dimensions", &self.dimensions)
            .field("format", &self.format)
            .field("pts", &self.pts)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl RawFrame {
    /// Copy a sensor frame, dropping any row padding
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the frame is empty, the stride is shorter
    /// than a row, or the buffer is too small for the declared size.
    pub fn copy_from(view: &FrameView<'_>) -> Result<Self> {
        let FrameDimensions { width, height } = view.dimensions;
        if width == 0 || height == 0 {
            return Err(Error::InvalidInput(format!(
                "Invalid frame dimensions: {}",
                view.dimensions
            )));
        }

        let row_bytes = width as usize * view.format.bytes_per_pixel();
        if view.stride < row_bytes {
            return Err(Error::InvalidInput(format!(
                "Stride {} is shorter than a {row_bytes} byte row",
                view.stride
            )));
        }

        let rows = height as usize;
        let required = view.stride * (rows - 1) + row_bytes;
        if view.data.len() < required {
            return Err(Error::InvalidInput(format!(
                "Frame buffer holds {} bytes, {} needs {required}",
                view.data.len(),
                view.dimensions
            )));
        }

        let data = if view.stride == row_bytes {
            view.data[..row_bytes * rows].to_vec()
        } else {
            let mut packed = Vec::with_capacity(row_bytes * rows);
            for row in view.data.chunks(view.stride).take(rows) {
                packed.extend_from_slice(&row[..row_bytes]);
            }
            packed
        };

        Ok(Self {
            data,
            dimensions: view.dimensions,
            format: view.format,
            pts: view.pts,
        })
    }

    /// Black frame of the given size
    #[must_use]
    pub fn blank(dimensions: FrameDimensions, format: PixelFormat, pts: Duration) -> Self {
        Self {
            data: vec![0; dimensions.area() * format.bytes_per_pixel()],
            dimensions,
            format,
            pts,
        }
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn dimensions(&self) -> FrameDimensions {
        self.dimensions
    }

    #[must_use]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Presentation time
    #[must_use]
    pub fn pts(&self) -> Duration {
        self.pts
    }

    /// Pixels as packed BGR24, borrowing when no conversion is needed
    #[must_use]
    pub fn to_bgr24(&self) -> Cow<'_, [u8]> {
        match self.format {
            PixelFormat::Bgr8 => Cow::Borrowed(&self.data),
            PixelFormat::Bgra8 => Cow::Owned(
                self.data
                    .chunks_exact(4)
                    .flat_map(|px| [px[0], px[1], px[2]])
                    .collect(),
            ),
            PixelFormat::Rgb8 => Cow::Owned(
                self.data
                    .chunks_exact(3)
                    .flat_map(|px| [px[2], px[1], px[0]])
                    .collect(),
            ),
            PixelFormat::Gray8 => Cow::Owned(self.data.iter().flat_map(|&v| [v, v, v]).collect()),
        }
    }
}
