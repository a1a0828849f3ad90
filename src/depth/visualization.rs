// SPDX-License-Identifier: GPL-3.0-only

//! Depth visualization helpers
//!
//! Raw samples are scaled linearly into 0-255 (saturating, like a
//! `convertScaleAbs`) and then mapped through a palette:
//! - Jet (blue=near, red=far), the default
//! - Turbo (perceptually smoother rainbow)
//! - Grayscale (bright=far)
//!
//! The mapping is cosmetic; reported distances always come from the raw
//! samples.

use super::constants::COLORMAP_ALPHA;
use crate::backends::camera::DepthFrame;
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// Palette applied to the scaled depth intensity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Palette {
    #[default]
    Jet,
    Turbo,
    Grayscale,
}

/// Scale a raw sample into 0-255 with rounding and saturation
#[inline]
pub fn scale_to_u8(raw: u16, alpha: f32) -> u8 {
    (raw as f32 * alpha).abs().round().min(255.0) as u8
}

/// Classic Jet colormap on a 0-255 intensity
#[inline]
fn jet(v: u8) -> [u8; 3] {
    let t = v as f32 / 255.0;
    let channel = |center: f32| (1.5 - (4.0 * t - center).abs()).clamp(0.0, 1.0);
    [
        (channel(3.0) * 255.0).round() as u8,
        (channel(2.0) * 255.0).round() as u8,
        (channel(1.0) * 255.0).round() as u8,
    ]
}

/// Turbo colormap: perceptually uniform rainbow (blue=near, red=far)
///
/// Based on: https://ai.googleblog.com/2019/08/turbo-improved-rainbow-colormap-for.html
/// Simplified version with polynomial approximation.
#[inline]
fn turbo(v: u8) -> [u8; 3] {
    let t = v as f32 / 255.0;
    let r = (0.13572138
        + t * (4.6153926 + t * (-42.66032 + t * (132.13108 + t * (-152.54825 + t * 59.28144)))))
        .clamp(0.0, 1.0);
    let g = (0.09140261
        + t * (2.19418 + t * (4.84296 + t * (-14.18503 + t * (4.27805 + t * 2.53377)))))
        .clamp(0.0, 1.0);
    let b = (0.1066733
        + t * (12.64194 + t * (-60.58204 + t * (109.99648 + t * (-82.52904 + t * 20.43388)))))
        .clamp(0.0, 1.0);
    [(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8]
}

/// Precomputed palette lookup plus the linear scale in front of it
#[derive(Debug, Clone)]
pub struct Colorizer {
    alpha: f32,
    lut: [[u8; 3]; 256],
}

impl Colorizer {
    pub fn new(palette: Palette, alpha: f32) -> Self {
        let mut lut = [[0u8; 3]; 256];
        for (i, entry) in lut.iter_mut().enumerate() {
            let v = i as u8;
            *entry = match palette {
                Palette::Jet => jet(v),
                Palette::Turbo => turbo(v),
                Palette::Grayscale => [v, v, v],
            };
        }
        Self { alpha, lut }
    }

    /// Color of a single raw sample
    #[inline]
    pub fn color(&self, raw: u16) -> [u8; 3] {
        self.lut[scale_to_u8(raw, self.alpha) as usize]
    }

    /// Colorize a whole frame into an RGB image of the same dimensions
    pub fn colorize(&self, frame: &DepthFrame) -> RgbImage {
        let samples = frame.samples();
        let width = frame.width as usize;
        RgbImage::from_fn(frame.width, frame.height, |x, y| {
            Rgb(self.color(samples[y as usize * width + x as usize]))
        })
    }
}

impl Default for Colorizer {
    fn default() -> Self {
        Self::new(Palette::default(), COLORMAP_ALPHA)
    }
}
