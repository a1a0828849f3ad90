// SPDX-License-Identifier: GPL-3.0-only

//! Direct V4L2 depth capture for 16-bit depth formats
//!
//! UVC depth cameras (Intel RealSense D4xx and similar) expose their depth
//! stream as a `Z16 ` (or `Y16 `) V4L2 node. We read the raw little-endian
//! samples with the v4l crate and leave unit conversion to the depth scale.

use super::types::*;
use super::DepthSource;
use std::io;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use v4l::buffer::{Metadata, Type};
use v4l::framesize::FrameSizeEnum;
use v4l::io::traits::{CaptureStream, Stream};
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::video::capture::Parameters;
use v4l::{Format, FourCC};

/// Number of memory-mapped capture buffers
const BUFFER_COUNT: u32 = 4;

/// Depth stream read from a V4L2 device node
pub struct V4l2DepthSource {
    path: String,
    requested: StreamFormat,
    depth_scale: f32,
    timeout: Duration,
    stream: Option<MmapStream<'static>>,
    // The stream keeps its own handle, but holding the device keeps the node open
    // for parameter queries while streaming.
    device: Option<Device>,
    active: Option<(u32, u32, DepthPixelFormat)>,
    buffer_state: BufferState,
    short_frames: u64,
}

/// Ownership of the buffer last returned by the stream
///
/// `CaptureStream::next` queues the previously returned buffer again before
/// dequeueing. When that dequeue times out the buffer stays queued, so the
/// next cycle must take it back with a plain dequeue instead of queueing it
/// a second time (which the driver rejects).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum BufferState {
    /// The last buffer is ours; `next` may queue it again
    #[default]
    Held,
    /// The last buffer is still queued in the driver after a timeout
    Queued,
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

/// Run one capture cycle, `Ok(None)` when no frame arrived in time
///
/// The first call queues every buffer and starts streaming. After a
/// timeout the still-queued buffer is dequeued first; its contents are
/// dropped since the stream only exposes buffers through `next`.
fn capture_next<'s, S>(
    stream: &'s mut S,
    state: &mut BufferState,
) -> io::Result<Option<(&'s [u8], &'s Metadata)>>
where
    S: CaptureStream<'s> + Stream<Item = [u8]>,
{
    if *state == BufferState::Queued {
        match stream.dequeue() {
            Ok(_) => *state = BufferState::Held,
            Err(e) if is_timeout(&e) => return Ok(None),
            Err(e) => return Err(e),
        }
    }

    match stream.next() {
        Ok(frame) => Ok(Some(frame)),
        Err(e) if is_timeout(&e) => {
            *state = BufferState::Queued;
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

impl V4l2DepthSource {
    /// Create a source for the device node at `path`
    ///
    /// # Arguments
    /// * `path` - Device node, e.g. `/dev/video2`
    /// * `format` - Requested resolution and frame rate
    /// * `depth_scale` - Meters per raw depth unit
    /// * `timeout` - Longest wait for one frame before the cycle counts as missing
    pub fn new(path: String, format: StreamFormat, depth_scale: f32, timeout: Duration) -> Self {
        Self {
            path,
            requested: format,
            depth_scale,
            timeout,
            stream: None,
            device: None,
            active: None,
            buffer_state: BufferState::Held,
            short_frames: 0,
        }
    }

    /// Try each depth format in order of preference
    fn negotiate_format(&self, dev: &Device) -> BackendResult<(u32, u32, DepthPixelFormat)> {
        let StreamFormat { width, height, .. } = self.requested;

        for pixel_format in DepthPixelFormat::ALL {
            let fourcc = FourCC::new(pixel_format.fourcc());
            match dev.set_format(&Format::new(width, height, fourcc)) {
                Ok(actual) if actual.fourcc == fourcc => {
                    if actual.width != width || actual.height != height {
                        warn!(
                            requested_width = width,
                            requested_height = height,
                            width = actual.width,
                            height = actual.height,
                            "Device adjusted depth resolution"
                        );
                    }
                    return Ok((actual.width, actual.height, pixel_format));
                }
                Ok(actual) => {
                    debug!(wanted = %pixel_format, got = ?actual.fourcc, "Depth format not accepted");
                }
                Err(e) => {
                    debug!(format = %pixel_format, error = %e, "Failed to set depth format");
                }
            }
        }

        Err(BackendError::FormatNotSupported(format!(
            "{} accepts neither Z16 nor Y16 at {}x{}",
            self.path, width, height
        )))
    }
}

impl DepthSource for V4l2DepthSource {
    fn name(&self) -> &str {
        &self.path
    }

    fn start(&mut self) -> BackendResult<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        info!(
            device_path = %self.path,
            format = %self.requested,
            "Opening V4L2 depth device"
        );

        let dev = Device::with_path(&self.path).map_err(|e| {
            BackendError::DeviceNotFound(format!("Failed to open {}: {}", self.path, e))
        })?;

        let (width, height, pixel_format) = self.negotiate_format(&dev)?;

        match dev.set_params(&Parameters::with_fps(self.requested.fps)) {
            Ok(params) => debug!(interval = %params.interval, "Set frame interval"),
            Err(e) => warn!(error = %e, fps = self.requested.fps, "Could not set frame rate"),
        }

        let mut stream = MmapStream::with_buffers(&dev, Type::VideoCapture, BUFFER_COUNT)
            .map_err(|e| {
                BackendError::InitializationFailed(format!("Failed to create buffer stream: {}", e))
            })?;
        stream.set_timeout(self.timeout);

        // Buffers are queued and streaming starts on the first capture
        info!(width, height, format = %pixel_format, "V4L2 depth stream ready");

        self.active = Some((width, height, pixel_format));
        self.stream = Some(stream);
        self.device = Some(dev);
        self.buffer_state = BufferState::Held;
        self.short_frames = 0;
        Ok(())
    }

    fn next_frame(&mut self) -> BackendResult<Option<DepthFrame>> {
        let (Some(stream), Some((width, height, _))) = (self.stream.as_mut(), self.active) else {
            return Err(BackendError::Other("V4L2 depth stream not started".to_string()));
        };

        let frame_start = Instant::now();
        let (buf, meta) = match capture_next(stream, &mut self.buffer_state) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!(timeout_ms = self.timeout.as_millis(), "Timed out waiting for depth frame");
                return Ok(None);
            }
            Err(e) => {
                return Err(BackendError::Crashed(format!(
                    "Failed to capture depth frame: {}",
                    e
                )));
            }
        };

        let Some(samples) = decode_z16(buf, width, height) else {
            self.short_frames += 1;
            if self.short_frames % 30 == 1 {
                warn!(
                    got = buf.len(),
                    expected = width as usize * height as usize * 2,
                    "Short depth buffer, skipping frame"
                );
            }
            return Ok(None);
        };

        let mut frame = DepthFrame::new(width, height, samples, meta.sequence)?;
        frame.captured_at = frame_start;
        Ok(Some(frame))
    }

    fn depth_scale(&self) -> f32 {
        self.depth_scale
    }

    fn stop(&mut self) -> BackendResult<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        info!(device_path = %self.path, "Stopping V4L2 depth stream");
        self.active = None;
        let result = stream.stop().map_err(BackendError::from);
        drop(stream);
        self.device = None;
        result
    }
}

impl Drop for V4l2DepthSource {
    fn drop(&mut self) {
        if self.stream.is_some() {
            debug!(device_path = %self.path, "Dropping V4L2 depth source");
            if let Err(e) = self.stop() {
                warn!(device_path = %self.path, error = %e, "Failed to stop V4L2 depth stream");
            }
        }
    }
}

/// Decode a little-endian 16-bit depth buffer
///
/// Returns `None` when the buffer holds fewer than `width * height` samples.
/// Trailing padding is ignored.
pub fn decode_z16(buf: &[u8], width: u32, height: u32) -> Option<Vec<u16>> {
    let pixel_count = width as usize * height as usize;
    let needed = pixel_count * 2;
    if buf.len() < needed {
        return None;
    }
    Some(
        buf[..needed]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect(),
    )
}

/// List V4L2 nodes that advertise a 16-bit depth format
pub fn enumerate_depth_devices() -> BackendResult<Vec<DepthDevice>> {
    let mut devices = Vec::new();

    for node in v4l::context::enum_devices() {
        let path = node.path().to_string_lossy().to_string();
        let dev = match Device::with_path(node.path()) {
            Ok(dev) => dev,
            Err(e) => {
                debug!(path = %path, error = %e, "Skipping unreadable video node");
                continue;
            }
        };

        let formats = match dev.enum_formats() {
            Ok(formats) => formats,
            Err(e) => {
                debug!(path = %path, error = %e, "Failed to enumerate formats");
                continue;
            }
        };

        let mut modes = Vec::new();
        for desc in formats {
            let Some(pixel_format) = DepthPixelFormat::from_fourcc(&desc.fourcc.repr) else {
                continue;
            };
            let sizes = dev.enum_framesizes(desc.fourcc).unwrap_or_default();
            for size in sizes {
                let (width, height) = match size.size {
                    FrameSizeEnum::Discrete(d) => (d.width, d.height),
                    FrameSizeEnum::Stepwise(s) => (s.max_width, s.max_height),
                };
                modes.push(DepthMode {
                    width,
                    height,
                    pixel_format,
                });
            }
        }

        if modes.is_empty() {
            continue;
        }

        let name = node.name().unwrap_or_else(|| path.clone());
        info!(path = %path, name = %name, modes = modes.len(), "Found depth device");
        devices.push(DepthDevice { name, path, modes });
    }

    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Driver queue model: rejects double queueing like VIDIOC_QBUF does
    /// and mirrors `MmapStream::next` (queue last, then dequeue).
    struct QueueModel {
        bufs: Vec<Vec<u8>>,
        meta: Metadata,
        queued: VecDeque<usize>,
        // `true` delivers a frame, `false` times out
        arrivals: VecDeque<bool>,
        index: usize,
        active: bool,
    }

    impl QueueModel {
        fn new(buffers: usize, arrivals: &[bool]) -> Self {
            Self {
                bufs: (0..buffers).map(|i| vec![i as u8; 4]).collect(),
                meta: Metadata::default(),
                queued: VecDeque::new(),
                arrivals: arrivals.iter().copied().collect(),
                index: 0,
                active: false,
            }
        }
    }

    impl Stream for QueueModel {
        type Item = [u8];

        fn start(&mut self) -> io::Result<()> {
            self.active = true;
            Ok(())
        }

        fn stop(&mut self) -> io::Result<()> {
            self.active = false;
            Ok(())
        }
    }

    impl<'a> CaptureStream<'a> for QueueModel {
        fn queue(&mut self, index: usize) -> io::Result<()> {
            if self.queued.contains(&index) {
                return Err(io::Error::from_raw_os_error(22)); // EINVAL
            }
            self.queued.push_back(index);
            Ok(())
        }

        fn dequeue(&mut self) -> io::Result<usize> {
            if !self.arrivals.pop_front().unwrap_or(false) {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "VIDIOC_DQBUF"));
            }
            self.index = self.queued.pop_front().expect("no buffer queued");
            Ok(self.index)
        }

        fn next(&'a mut self) -> io::Result<(&'a [u8], &'a Metadata)> {
            if !self.active {
                for index in 0..self.bufs.len() {
                    CaptureStream::queue(self, index)?;
                }
                self.start()?;
            } else {
                CaptureStream::queue(self, self.index)?;
            }
            self.index = CaptureStream::dequeue(self)?;
            Ok((&self.bufs[self.index], &self.meta))
        }
    }

    fn run_cycles(model: &mut QueueModel, cycles: usize) -> Vec<bool> {
        let mut state = BufferState::Held;
        (0..cycles)
            .map(|_| capture_next(model, &mut state).unwrap().is_some())
            .collect()
    }

    #[test]
    fn test_timeouts_do_not_requeue_buffers() {
        // Frame, two timeouts, then the held-back buffer and two more frames
        let mut model = QueueModel::new(2, &[true, false, false, true, true, true]);
        assert_eq!(run_cycles(&mut model, 5), vec![true, false, false, true, true]);
    }

    #[test]
    fn test_timeout_on_first_capture() {
        let mut model = QueueModel::new(4, &[false, true, true]);
        assert_eq!(run_cycles(&mut model, 2), vec![false, true]);
        assert!(model.active);
    }

    #[test]
    fn test_steady_stream_cycles_all_buffers() {
        let mut model = QueueModel::new(3, &[true; 8]);
        assert_eq!(run_cycles(&mut model, 8), vec![true; 8]);
        // All but the buffer last handed out are back with the driver
        assert_eq!(model.queued.len(), 2);
    }

    #[test]
    fn test_decode_little_endian() {
        // 2000 = 0x07D0, 0 = invalid, 65535 = max
        let buf = vec![0xD0, 0x07, 0x00, 0x00, 0xFF, 0xFF, 0x01, 0x00];
        let samples = decode_z16(&buf, 2, 2).unwrap();
        assert_eq!(samples, vec![2000, 0, 65535, 1]);
    }

    #[test]
    fn test_decode_short_buffer() {
        assert!(decode_z16(&[0u8; 7], 2, 2).is_none());
    }

    #[test]
    fn test_decode_ignores_padding() {
        let samples = decode_z16(&[1, 0, 2, 0, 0xAA], 2, 1).unwrap();
        assert_eq!(samples, vec![1, 2]);
    }

    #[test]
    fn test_next_frame_requires_start() {
        let mut source = V4l2DepthSource::new(
            "/dev/null-depth".to_string(),
            StreamFormat {
                width: 640,
                height: 480,
                fps: 30,
            },
            0.001,
            Duration::from_millis(100),
        );
        assert!(source.next_frame().is_err());
        // Stopping a source that never started is a no-op
        assert!(source.stop().is_ok());
    }
}
