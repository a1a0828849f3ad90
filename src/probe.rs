// SPDX-License-Identifier: GPL-3.0-only

//! Headless distance probe
//!
//! Streams depth frames and writes one line per frame with the distance at
//! the center (or a fixed pixel) until stopped.

use crate::backends::camera::frame_loop::run_capture_loop;
use crate::backends::camera::{
    CaptureSession, DepthSource, FrameEvent, LoopAction, LoopSummary, PixelCoordinate,
};
use crate::errors::{AppError, AppResult};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// Probe settings
#[derive(Debug, Clone, Default)]
pub struct ProbeOptions {
    /// Pixel to measure; the frame center when unset
    pub point: Option<PixelCoordinate>,
    /// Stop after this many frames
    pub max_frames: Option<u64>,
}

/// Run the probe until `stop` is raised, `max_frames` is reached or the device fails
///
/// Each delivered frame produces a line `sequence x y distance`. A fixed
/// point outside the frame fails on the first frame without a lookup.
pub fn run<S: DepthSource>(
    source: S,
    options: &ProbeOptions,
    stop: Arc<AtomicBool>,
    out: &mut impl Write,
) -> AppResult<LoopSummary> {
    let session = CaptureSession::open(source)?;
    let mut written = 0u64;

    run_capture_loop(session, |source, event| {
        if stop.load(Ordering::SeqCst) {
            return Ok(LoopAction::Stop);
        }

        let FrameEvent::Ready(frame) = event else {
            return Ok(LoopAction::Continue);
        };

        let point = options.point.unwrap_or_else(|| frame.center());
        let Some(distance) = source.distance_at(frame, point) else {
            return Err(AppError::Config(format!(
                "Probe point {} is outside the {}x{} frame",
                point, frame.width, frame.height
            )));
        };

        if let Err(e) = writeln!(out, "{} {} {} {}", frame.sequence, point.x, point.y, distance) {
            // Closed pipe (e.g. `| head`) ends the probe quietly
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                return Ok(LoopAction::Stop);
            }
            warn!(error = %e, "Failed to write probe output");
            return Err(AppError::from(e));
        }
        written += 1;

        if options.max_frames.is_some_and(|max| written >= max) {
            return Ok(LoopAction::Stop);
        }
        Ok(LoopAction::Continue)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{StreamFormat, SyntheticDepthSource};

    fn synthetic() -> SyntheticDepthSource {
        SyntheticDepthSource::new(
            StreamFormat {
                width: 32,
                height: 24,
                fps: 30,
            },
            0.001,
        )
        .unpaced()
    }

    #[test]
    fn test_probe_writes_one_line_per_frame() {
        let mut out = Vec::new();
        let options = ProbeOptions {
            point: None,
            max_frames: Some(3),
        };
        let summary = run(synthetic(), &options, Arc::new(AtomicBool::new(false)), &mut out).unwrap();

        assert_eq!(summary.frames, 3);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("1 16 12 "));
        assert!(lines[0].ends_with(" m"));
    }

    #[test]
    fn test_probe_skips_missing_frames() {
        let mut out = Vec::new();
        let options = ProbeOptions {
            point: Some(PixelCoordinate::new(0, 0)),
            max_frames: Some(4),
        };
        let summary = run(
            synthetic().with_dropped_frames(2),
            &options,
            Arc::new(AtomicBool::new(false)),
            &mut out,
        )
        .unwrap();

        assert_eq!(summary, LoopSummary { frames: 4, missed: 3 });
        // (0, 0) is in the invalid band
        assert!(String::from_utf8(out).unwrap().lines().all(|l| l.ends_with("no depth")));
    }

    #[test]
    fn test_probe_rejects_point_outside_frame() {
        let mut out = Vec::new();
        let options = ProbeOptions {
            point: Some(PixelCoordinate::new(32, 0)),
            max_frames: None,
        };
        let result = run(synthetic(), &options, Arc::new(AtomicBool::new(false)), &mut out);
        assert!(matches!(result, Err(AppError::Config(_))));
        assert!(out.is_empty());
    }

    #[test]
    fn test_probe_honors_stop_flag() {
        let mut out = Vec::new();
        let summary = run(
            synthetic(),
            &ProbeOptions::default(),
            Arc::new(AtomicBool::new(true)),
            &mut out,
        )
        .unwrap();
        assert_eq!(summary.frames, 1);
        assert!(out.is_empty());
    }
}
