// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Application name, used for config and snapshot directories
pub const APP_NAME: &str = "depth-probe";

/// Config file name inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Default depth stream resolution and frame rate
pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;
pub const DEFAULT_FPS: u32 = 30;

/// Longest wait for one frame before the cycle counts as missing
pub const DEFAULT_FRAME_TIMEOUT_MS: u64 = 1000;

/// Input poll interval after each displayed frame
///
/// Kept short so the frame wait dominates the loop period.
pub const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Snapshot file name prefix
pub const SNAPSHOT_PREFIX: &str = "DEPTH_";

/// Version string including git metadata
pub fn app_version() -> &'static str {
    env!("GIT_VERSION")
}
