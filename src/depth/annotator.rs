// SPDX-License-Identifier: GPL-3.0-only

//! Frame annotation: colorize a depth frame and label the distance at a pixel

use super::constants::*;
use super::visualization::{Colorizer, Palette};
use crate::backends::camera::{DepthFrame, DepthSource, PixelCoordinate};
use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::fmt;
use tracing::{debug, warn};

/// Monospace font used to burn labels into the image
static LABEL_FONT: &[u8] = include_bytes!("../../resources/fonts/DejaVuSansMono.ttf");

/// Distance resolved from one raw sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distance {
    /// Valid measurement in meters
    Meters(f32),
    /// The device reported no depth for this pixel
    NoData,
}

impl Distance {
    /// Convert a raw sample with `scale` meters per unit
    pub fn from_raw(raw: u16, scale: f32) -> Self {
        if raw == DEPTH_INVALID {
            Distance::NoData
        } else {
            Distance::Meters(raw as f32 * scale)
        }
    }

    pub fn meters(&self) -> Option<f32> {
        match self {
            Distance::Meters(m) => Some(*m),
            Distance::NoData => None,
        }
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distance::Meters(m) => write!(f, "{:.3} m", m),
            Distance::NoData => write!(f, "{}", NO_DEPTH_LABEL),
        }
    }
}

/// How the viewer picks the pixel to measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    /// Measure at the last clicked pixel
    #[default]
    Click,
    /// Measure at the frame center
    Center,
}

impl ViewMode {
    /// Target for the current cycle
    pub fn target(&self, clicks: &ClickContext) -> Target {
        match self {
            ViewMode::Click => clicks.selected().map_or(Target::None, Target::Point),
            ViewMode::Center => Target::Center,
        }
    }
}

/// Pixel to annotate in one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Nothing selected: colorize only
    None,
    /// A selected pixel, marked and labelled next to it
    Point(PixelCoordinate),
    /// The frame center, labelled in the corner
    Center,
}

/// Last accepted click, carried across cycles
///
/// Updated by the input handler, read by the annotator. Clicks outside the
/// frame are rejected so the stored point is always a valid lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClickContext {
    selected: Option<PixelCoordinate>,
}

impl ClickContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `point` if it lies within a `width` x `height` frame
    ///
    /// Returns whether the click replaced the selection.
    pub fn select(&mut self, point: PixelCoordinate, width: u32, height: u32) -> bool {
        if point.x < width && point.y < height {
            self.selected = Some(point);
            true
        } else {
            debug!(%point, width, height, "Ignoring click outside frame");
            false
        }
    }

    pub fn selected(&self) -> Option<PixelCoordinate> {
        self.selected
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }
}

/// Distance text drawn on the frame
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub text: String,
    /// Top-left pixel of the text, inside the frame
    pub anchor: PixelCoordinate,
}

/// Colorized frame plus the overlay for one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedFrame {
    /// Colorized depth with the marker and label already drawn
    pub image: RgbImage,
    /// Pixel that was measured
    pub point: Option<PixelCoordinate>,
    /// Distance at `point`
    pub distance: Option<Distance>,
    /// Label drawn into `image`, kept as text for surfaces that redraw it
    pub label: Option<Label>,
    /// Sequence number of the source frame
    pub sequence: u32,
}

impl AnnotatedFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Turns depth frames into annotated color frames
#[derive(Debug, Clone)]
pub struct Annotator {
    colorizer: Colorizer,
    font: Option<FontArc>,
}

impl Annotator {
    /// # Arguments
    /// * `alpha` - Linear factor from raw units to palette intensity
    /// * `palette` - Colormap used for display
    pub fn new(alpha: f32, palette: Palette) -> Self {
        let font = match FontArc::try_from_slice(LABEL_FONT) {
            Ok(font) => Some(font),
            Err(e) => {
                warn!(error = %e, "Label font unusable, labels will not be drawn into frames");
                None
            }
        };
        Self {
            colorizer: Colorizer::new(palette, alpha),
            font,
        }
    }

    /// Colorize `frame` and annotate `target`
    ///
    /// The distance is resolved through `source`. A target outside the
    /// frame is treated like no target: the output is the plain colorized
    /// frame and no sample is read.
    pub fn annotate<S: DepthSource + ?Sized>(
        &self,
        source: &S,
        frame: &DepthFrame,
        target: Target,
    ) -> AnnotatedFrame {
        let mut image = self.colorizer.colorize(frame);

        let (point, label_for) = match target {
            Target::None => (None, None),
            Target::Center => (Some(frame.center()), Some(Target::Center)),
            Target::Point(p) if frame.contains(p) => (Some(p), Some(target)),
            Target::Point(p) => {
                debug!(point = %p, width = frame.width, height = frame.height, "Target outside frame");
                (None, None)
            }
        };

        let Some(point) = point else {
            return AnnotatedFrame {
                image,
                point: None,
                distance: None,
                label: None,
                sequence: frame.sequence,
            };
        };

        let distance = source.distance_at(frame, point);

        let label = match (label_for, distance) {
            (Some(Target::Center), Some(d)) => Some(Label {
                text: format!("{}{}", CENTER_LABEL_PREFIX, d),
                anchor: clamp_to_frame(
                    CENTER_LABEL_ANCHOR.0,
                    CENTER_LABEL_ANCHOR.1,
                    frame.width,
                    frame.height,
                ),
            }),
            (Some(Target::Point(_)), Some(d)) => {
                draw_filled_circle_mut(
                    &mut image,
                    (point.x as i32, point.y as i32),
                    MARKER_RADIUS,
                    Rgb(MARKER_COLOR),
                );
                Some(Label {
                    text: d.to_string(),
                    anchor: clamp_to_frame(
                        point.x.saturating_add(LABEL_OFFSET_X),
                        point.y.saturating_sub(LABEL_OFFSET_Y),
                        frame.width,
                        frame.height,
                    ),
                })
            }
            _ => None,
        };

        if let Some(label) = &label {
            self.draw_label(&mut image, label);
        }

        AnnotatedFrame {
            image,
            point: Some(point),
            distance,
            label,
            sequence: frame.sequence,
        }
    }

    /// White text on a black box, clipped at the image border
    fn draw_label(&self, image: &mut RgbImage, label: &Label) {
        let Some(font) = &self.font else {
            return;
        };
        let scale = PxScale::from(LABEL_FONT_SIZE);
        let (x, y) = (label.anchor.x as i32, label.anchor.y as i32);

        let (width, height) = text_size(scale, font, &label.text);
        if width > 0 && height > 0 {
            draw_filled_rect_mut(
                image,
                Rect::at(x, y).of_size(width, height),
                Rgb(LABEL_BACKGROUND_COLOR),
            );
        }
        draw_text_mut(image, Rgb(LABEL_TEXT_COLOR), x, y, scale, font, &label.text);
    }
}

fn clamp_to_frame(x: u32, y: u32, width: u32, height: u32) -> PixelCoordinate {
    PixelCoordinate::new(x.min(width.saturating_sub(1)), y.min(height.saturating_sub(1)))
}
