// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for depth capture
//!
//! The backend layer hides the capture device behind a small capability
//! trait so the viewer and the headless probe work the same regardless of
//! where frames come from:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │        Terminal viewer / headless probe      │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │     CaptureSession (guaranteed release)      │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │            DepthSource trait                 │
//! │  ┌─────────────┐    ┌──────────────────┐   │
//! │  │    V4L2     │    │    Synthetic     │   │
//! │  └─────────────┘    └──────────────────┘   │
//! └─────────────────────────────────────────────┘
//! ```

pub mod camera;
