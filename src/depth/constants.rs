// SPDX-License-Identifier: GPL-3.0-only

//! Depth annotation constants - Single source of truth
//!
//! Visualization and overlay constants used by the annotator and the
//! terminal viewer.

/// Linear factor applied to raw samples before the colormap
///
/// With millimeter units this maps ~3.2 m onto the full 0-255 range.
pub const COLORMAP_ALPHA: f32 = 0.08;

/// Meters per raw unit for most RealSense models (D435/D455 default)
pub const DEFAULT_DEPTH_SCALE: f32 = 0.001;

/// Raw sample value meaning "no depth data at this pixel"
pub const DEPTH_INVALID: u16 = 0;

/// Radius of the filled marker drawn at the selected pixel
pub const MARKER_RADIUS: i32 = 5;

/// Marker color (white)
pub const MARKER_COLOR: [u8; 3] = [255, 255, 255];

/// Label offset from the selected pixel, right and up
pub const LABEL_OFFSET_X: u32 = 10;
pub const LABEL_OFFSET_Y: u32 = 10;

/// Fixed anchor of the center-mode label
pub const CENTER_LABEL_ANCHOR: (u32, u32) = (10, 30);

/// Prefix of the center-mode label
pub const CENTER_LABEL_PREFIX: &str = "Center Distance: ";

/// Shown instead of a distance when the sample is invalid
pub const NO_DEPTH_LABEL: &str = "no depth";

/// Label text height in pixels when drawn into the image
pub const LABEL_FONT_SIZE: f32 = 16.0;

/// Label text and background colors
pub const LABEL_TEXT_COLOR: [u8; 3] = [255, 255, 255];
pub const LABEL_BACKGROUND_COLOR: [u8; 3] = [0, 0, 0];
