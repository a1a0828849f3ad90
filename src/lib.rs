// SPDX-License-Identifier: GPL-3.0-only

//! Depth Probe - colorized depth viewer with on-frame distance readout
//!
//! Streams 16-bit depth frames from a depth camera, renders them with a
//! colormap and labels the distance in meters at a clicked pixel or at the
//! frame center.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Depth source abstraction, V4L2 and synthetic sources, frame loop
//! - [`depth`]: Colorization and distance annotation
//! - [`terminal`]: Interactive terminal viewer
//! - [`probe`]: Headless distance readout
//! - [`config`]: User configuration handling
//! - [`snapshot`]: Saving annotated frames
//!
//! # Example
//!
//! ```ignore
//! // Interactive viewer with a synthetic scene:
//! // depth-probe --synthetic
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod depth;
pub mod errors;
pub mod probe;
pub mod snapshot;
pub mod terminal;

// Re-export commonly used types
pub use backends::camera::{DepthFrame, DepthSource, PixelCoordinate};
pub use config::Config;
pub use depth::{Annotator, Distance, ViewMode};
pub use errors::{AppError, AppResult};
