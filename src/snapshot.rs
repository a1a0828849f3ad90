// SPDX-License-Identifier: GPL-3.0-only

//! Saving annotated frames to disk

use crate::constants::SNAPSHOT_PREFIX;
use crate::depth::AnnotatedFrame;
use crate::errors::{AppError, AppResult};
use std::path::{Path, PathBuf};
use tracing::info;

/// Save the annotated image as a timestamped PNG in `dir`
///
/// The marker and the distance label are part of the image.
pub fn save_png(frame: &AnnotatedFrame, dir: &Path) -> AppResult<PathBuf> {
    std::fs::create_dir_all(dir)
        .map_err(|e| AppError::Storage(format!("Failed to create {}: {}", dir.display(), e)))?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let filename = format!("{}{}_{}.png", SNAPSHOT_PREFIX, timestamp, frame.sequence);
    let filepath = dir.join(&filename);

    frame.image.save(&filepath)?;
    info!(
        path = %filepath.display(),
        label = frame.label.as_ref().map(|l| l.text.as_str()).unwrap_or(""),
        "Snapshot saved"
    );

    Ok(filepath)
}
