// SPDX-License-Identifier: GPL-3.0-only

//! Depth capture backend abstraction
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  Viewer / Probe     │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │   CaptureSession    │  ← start on open, stop exactly once
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  DepthSource Trait  │  ← start / next_frame / distance_at / stop
//! └──────────┬──────────┘
//!            │
//!      ┌─────┴──────┐
//!      ▼            ▼
//!  ┌───────┐   ┌─────────┐
//!  │ V4L2  │   │Synthetic│
//!  └───────┘   └─────────┘
//! ```

pub mod frame_loop;
pub mod synthetic;
pub mod types;
pub mod v4l2_depth;

pub use frame_loop::{CaptureSession, CaptureState, FrameEvent, LoopAction, LoopSummary};
pub use synthetic::SyntheticDepthSource;
pub use types::*;
pub use v4l2_depth::{V4l2DepthSource, enumerate_depth_devices};

use crate::config::Config;
use crate::depth::Distance;
use std::time::Duration;
use tracing::info;

/// Capability interface over a depth capture device
///
/// Only the operations the viewer needs are exposed, so tests can swap in
/// a scripted double without a physical camera.
pub trait DepthSource {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Open the device and begin streaming
    fn start(&mut self) -> BackendResult<()>;

    /// Block until the next frame arrives
    ///
    /// # Returns
    /// * `Ok(Some(frame))` - A complete frame
    /// * `Ok(None)` - No frame this cycle (timeout, short buffer); try again
    /// * `Err(BackendError)` - The device failed and streaming cannot continue
    fn next_frame(&mut self) -> BackendResult<Option<DepthFrame>>;

    /// Meters per raw depth unit
    fn depth_scale(&self) -> f32;

    /// Distance at `point`, `None` when the point lies outside the frame
    fn distance_at(&self, frame: &DepthFrame, point: PixelCoordinate) -> Option<Distance> {
        frame
            .sample_at(point)
            .map(|raw| Distance::from_raw(raw, self.depth_scale()))
    }

    /// Stop streaming and release the device
    ///
    /// Calling this on a stopped source is a no-op.
    fn stop(&mut self) -> BackendResult<()>;
}

impl<S: DepthSource + ?Sized> DepthSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn start(&mut self) -> BackendResult<()> {
        (**self).start()
    }

    fn next_frame(&mut self) -> BackendResult<Option<DepthFrame>> {
        (**self).next_frame()
    }

    fn depth_scale(&self) -> f32 {
        (**self).depth_scale()
    }

    fn distance_at(&self, frame: &DepthFrame, point: PixelCoordinate) -> Option<Distance> {
        (**self).distance_at(frame, point)
    }

    fn stop(&mut self) -> BackendResult<()> {
        (**self).stop()
    }
}

/// Build the depth source selected by the configuration
///
/// For V4L2 without an explicit device, the first node advertising a
/// 16-bit depth format is used.
pub fn open_source(config: &Config) -> BackendResult<Box<dyn DepthSource>> {
    match config.source {
        SourceKind::Synthetic => {
            info!(format = %config.stream, "Using synthetic depth source");
            Ok(Box::new(SyntheticDepthSource::new(
                config.stream,
                config.depth_scale,
            )))
        }
        SourceKind::V4l2 => {
            let path = match &config.device {
                Some(path) => path.clone(),
                None => {
                    let devices = enumerate_depth_devices()?;
                    let first = devices.into_iter().next().ok_or_else(|| {
                        BackendError::NotAvailable("No V4L2 depth devices found".to_string())
                    })?;
                    info!(device = %first.name, path = %first.path, "Auto-selected depth device");
                    first.path
                }
            };
            Ok(Box::new(V4l2DepthSource::new(
                path,
                config.stream,
                config.depth_scale,
                Duration::from_millis(config.frame_timeout_ms),
            )))
        }
    }
}
