// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic depth source
//!
//! Generates a deterministic scene so the viewer and the probe can run
//! without hardware: a floor plane receding towards the top of the image,
//! a sphere sliding left and right, and an invalid (zero) band along the
//! left edge like the stereo shadow of a real depth camera.

use super::{BackendError, BackendResult, DepthFrame, DepthSource, StreamFormat};
use std::time::{Duration, Instant};
use tracing::debug;

/// Distance to the floor at the bottom row, in meters
const FLOOR_NEAR_M: f32 = 0.6;
/// Distance to the floor at the top row, in meters
const FLOOR_FAR_M: f32 = 3.0;
/// Distance to the front of the sphere, in meters
const SPHERE_NEAR_M: f32 = 0.35;
/// Sphere radius as a fraction of the frame height
const SPHERE_RADIUS_FRACTION: f32 = 0.18;
/// Width of the invalid band as a fraction of the frame width
const SHADOW_FRACTION: u32 = 16;
/// Frames for the sphere to cross the image and come back
const SWEEP_PERIOD: u32 = 240;

/// Deterministic generated depth stream
pub struct SyntheticDepthSource {
    format: StreamFormat,
    depth_scale: f32,
    sequence: u32,
    running: bool,
    drop_every: Option<u32>,
    pace: bool,
    last_frame_at: Option<Instant>,
}

impl SyntheticDepthSource {
    /// Create a source producing `format` frames with `depth_scale` meters per unit
    pub fn new(format: StreamFormat, depth_scale: f32) -> Self {
        Self {
            format,
            depth_scale,
            sequence: 0,
            running: false,
            drop_every: None,
            pace: true,
            last_frame_at: None,
        }
    }

    /// Report every `n`th cycle as missing
    pub fn with_dropped_frames(mut self, n: u32) -> Self {
        self.drop_every = (n > 0).then_some(n);
        self
    }

    /// Disable frame-rate pacing (frames are produced as fast as requested)
    pub fn unpaced(mut self) -> Self {
        self.pace = false;
        self
    }

    /// Raw samples of frame number `sequence`
    pub fn render(&self, sequence: u32) -> Vec<u16> {
        let StreamFormat { width, height, .. } = self.format;
        let w = width as f32;
        let h = height as f32;

        // Triangle wave so the sweep reverses instead of jumping
        let phase = (sequence % SWEEP_PERIOD) as f32 / SWEEP_PERIOD as f32;
        let sweep = 1.0 - (2.0 * phase - 1.0).abs();
        let radius = h * SPHERE_RADIUS_FRACTION;
        let cx = radius + sweep * (w - 2.0 * radius);
        let cy = h * 0.55;

        let shadow = width / SHADOW_FRACTION;
        let to_raw = |meters: f32| (meters / self.depth_scale).round().clamp(1.0, u16::MAX as f32) as u16;

        let mut samples = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            let row_t = if height > 1 {
                y as f32 / (h - 1.0)
            } else {
                1.0
            };
            let floor = FLOOR_FAR_M + (FLOOR_NEAR_M - FLOOR_FAR_M) * row_t;

            for x in 0..width {
                if x < shadow {
                    samples.push(0);
                    continue;
                }
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                let d2 = dx * dx + dy * dy;
                let meters = if d2 < radius * radius {
                    let bulge = (radius * radius - d2).sqrt() / radius;
                    (SPHERE_NEAR_M + (1.0 - bulge) * 0.1).min(floor)
                } else {
                    floor
                };
                samples.push(to_raw(meters));
            }
        }
        samples
    }

    fn wait_for_frame_slot(&mut self) {
        if !self.pace || self.format.fps == 0 {
            return;
        }
        let interval = Duration::from_secs_f64(1.0 / self.format.fps as f64);
        if let Some(last) = self.last_frame_at {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_frame_at = Some(Instant::now());
    }
}

impl DepthSource for SyntheticDepthSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn start(&mut self) -> BackendResult<()> {
        if self.format.width == 0 || self.format.height == 0 {
            return Err(BackendError::FormatNotSupported(format!(
                "Synthetic stream needs a non-empty resolution, got {}",
                self.format
            )));
        }
        self.running = true;
        self.sequence = 0;
        Ok(())
    }

    fn next_frame(&mut self) -> BackendResult<Option<DepthFrame>> {
        if !self.running {
            return Err(BackendError::Other("Synthetic stream not started".to_string()));
        }
        self.wait_for_frame_slot();
        self.sequence = self.sequence.wrapping_add(1);

        if let Some(n) = self.drop_every
            && self.sequence % n == 0
        {
            debug!(sequence = self.sequence, "Synthetic frame dropped");
            return Ok(None);
        }

        let samples = self.render(self.sequence);
        DepthFrame::new(self.format.width, self.format.height, samples, self.sequence).map(Some)
    }

    fn depth_scale(&self) -> f32 {
        self.depth_scale
    }

    fn stop(&mut self) -> BackendResult<()> {
        self.running = false;
        Ok(())
    }
}
