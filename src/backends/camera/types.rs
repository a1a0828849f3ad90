// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for depth capture backends

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Which capture backend produces depth frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SourceKind {
    /// V4L2 device node exposing a 16-bit depth format
    #[default]
    V4l2,
    /// Deterministic generated scene, no hardware required
    Synthetic,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::V4l2 => write!(f, "V4L2"),
            SourceKind::Synthetic => write!(f, "Synthetic"),
        }
    }
}

/// 16-bit depth pixel formats understood by the capture backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthPixelFormat {
    /// `Z16 ` - 16-bit depth in device units (RealSense and most UVC depth cameras)
    Z16,
    /// `Y16 ` - 16-bit grayscale, used by some drivers for depth
    Y16,
}

impl DepthPixelFormat {
    /// Formats in order of preference
    pub const ALL: [DepthPixelFormat; 2] = [DepthPixelFormat::Z16, DepthPixelFormat::Y16];

    /// V4L2 FourCC code
    pub fn fourcc(&self) -> &'static [u8; 4] {
        match self {
            DepthPixelFormat::Z16 => b"Z16 ",
            DepthPixelFormat::Y16 => b"Y16 ",
        }
    }

    /// Match a FourCC code back to a depth format
    pub fn from_fourcc(code: &[u8; 4]) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.fourcc() == code)
    }
}

impl fmt::Display for DepthPixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepthPixelFormat::Z16 => write!(f, "Z16"),
            DepthPixelFormat::Y16 => write!(f, "Y16"),
        }
    }
}

/// Requested stream resolution and frame rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFormat {
    /// Resolution width
    pub width: u32,
    /// Resolution height
    pub height: u32,
    /// Frames per second
    pub fps: u32,
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}@{}fps", self.width, self.height, self.fps)
    }
}

/// A depth capture device found during enumeration
#[derive(Debug, Clone)]
pub struct DepthDevice {
    /// Human-readable device name
    pub name: String,
    /// Device node, e.g. `/dev/video2`
    pub path: String,
    /// Depth modes the device advertises
    pub modes: Vec<DepthMode>,
}

/// One advertised depth mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthMode {
    pub width: u32,
    pub height: u32,
    pub pixel_format: DepthPixelFormat,
}

/// Integer pixel position, `x` is the column and `y` the row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelCoordinate {
    pub x: u32,
    pub y: u32,
}

impl PixelCoordinate {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for PixelCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One capture cycle's grid of raw depth samples
///
/// Samples are row-major and unitless; multiply by the source's depth
/// scale to get meters.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Raw samples, `width * height` entries
    samples: Vec<u16>,
    /// Frame sequence number reported by the source
    pub sequence: u32,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
}

impl DepthFrame {
    /// Build a frame, rejecting sample buffers that don't match the dimensions
    pub fn new(width: u32, height: u32, samples: Vec<u16>, sequence: u32) -> BackendResult<Self> {
        let expected = width as usize * height as usize;
        if width == 0 || height == 0 || samples.len() != expected {
            return Err(BackendError::Other(format!(
                "Depth frame {}x{} needs {} samples, got {}",
                width,
                height,
                expected,
                samples.len()
            )));
        }
        Ok(Self {
            width,
            height,
            samples,
            sequence,
            captured_at: Instant::now(),
        })
    }

    /// Whether `point` lies inside the frame
    pub fn contains(&self, point: PixelCoordinate) -> bool {
        point.x < self.width && point.y < self.height
    }

    /// Geometric center, recomputed from the frame dimensions
    pub fn center(&self) -> PixelCoordinate {
        PixelCoordinate::new(self.width / 2, self.height / 2)
    }

    /// Raw sample at `point`, `None` when out of bounds
    pub fn sample_at(&self, point: PixelCoordinate) -> Option<u16> {
        if !self.contains(point) {
            return None;
        }
        let idx = point.y as usize * self.width as usize + point.x as usize;
        self.samples.get(idx).copied()
    }

    /// All raw samples, row-major
    pub fn samples(&self) -> &[u16] {
        &self.samples
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Backend errors
#[derive(Debug, Clone)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Failed to initialize backend
    InitializationFailed(String),
    /// Depth device not found
    DeviceNotFound(String),
    /// Format not supported
    FormatNotSupported(String),
    /// Device failed while streaming
    Crashed(String),
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::Crashed(msg) => write!(f, "Backend crashed: {}", msg),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rejects_wrong_sample_count() {
        assert!(DepthFrame::new(4, 2, vec![0; 7], 0).is_err());
        assert!(DepthFrame::new(0, 2, vec![], 0).is_err());
        assert!(DepthFrame::new(4, 2, vec![0; 8], 0).is_ok());
    }

    #[test]
    fn test_sample_lookup_is_row_major() {
        let samples: Vec<u16> = (0..12).collect();
        let frame = DepthFrame::new(4, 3, samples, 0).unwrap();
        assert_eq!(frame.sample_at(PixelCoordinate::new(0, 0)), Some(0));
        assert_eq!(frame.sample_at(PixelCoordinate::new(3, 0)), Some(3));
        assert_eq!(frame.sample_at(PixelCoordinate::new(1, 2)), Some(9));
    }

    #[test]
    fn test_sample_lookup_out_of_bounds() {
        let frame = DepthFrame::new(4, 3, vec![1; 12], 0).unwrap();
        assert_eq!(frame.sample_at(PixelCoordinate::new(4, 0)), None);
        assert_eq!(frame.sample_at(PixelCoordinate::new(0, 3)), None);
        assert_eq!(frame.sample_at(PixelCoordinate::new(u32::MAX, u32::MAX)), None);
    }

    #[test]
    fn test_center() {
        let frame = DepthFrame::new(640, 480, vec![0; 640 * 480], 0).unwrap();
        assert_eq!(frame.center(), PixelCoordinate::new(320, 240));
    }

    #[test]
    fn test_fourcc_round_trip() {
        assert_eq!(
            DepthPixelFormat::from_fourcc(b"Z16 "),
            Some(DepthPixelFormat::Z16)
        );
        assert_eq!(DepthPixelFormat::from_fourcc(b"YUYV"), None);
    }
}
