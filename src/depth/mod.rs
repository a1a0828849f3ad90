// SPDX-License-Identifier: GPL-3.0-only

//! Depth frame annotation
//!
//! Converts raw depth frames into colorized images with a distance readout
//! at a selected pixel or at the frame center.

mod annotator;
pub mod constants;
mod visualization;

pub use annotator::{
    AnnotatedFrame, Annotator, ClickContext, Distance, Label, Target, ViewMode,
};
pub use visualization::{Colorizer, Palette, scale_to_u8};
