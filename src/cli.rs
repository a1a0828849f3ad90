// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands that run without the interactive viewer
//!
//! This module provides command-line functionality for:
//! - Listing depth-capable devices
//! - Printing distances to stdout

use depth_probe::backends::camera::{DepthMode, PixelCoordinate, enumerate_depth_devices, open_source};
use depth_probe::probe::{self, ProbeOptions};
use depth_probe::{AppResult, Config};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// List all depth-capable V4L2 devices
pub fn list_devices() -> AppResult<()> {
    let devices = enumerate_depth_devices()?;

    if devices.is_empty() {
        println!("No depth cameras found.");
        return Ok(());
    }

    println!("Available depth cameras:");
    println!();
    for (index, device) in devices.iter().enumerate() {
        println!("  [{}] {} ({})", index, device.name, device.path);

        if !device.modes.is_empty() {
            // Sort by resolution (highest first)
            let mut modes: Vec<&DepthMode> = device.modes.iter().collect();
            modes.sort_by(|a, b| (b.width * b.height).cmp(&(a.width * a.height)));
            modes.dedup();

            let mode_strs: Vec<String> = modes
                .iter()
                .map(|m| format!("{}x{} {}", m.width, m.height, m.pixel_format))
                .collect();
            println!("      Modes: {}", mode_strs.join(", "));
        }
        println!();
    }

    Ok(())
}

/// Print `sequence x y distance` lines until Ctrl+C or `frames` is reached
pub fn run_probe(config: &Config, point: Option<(u32, u32)>, frames: Option<u64>) -> AppResult<()> {
    let source = open_source(config)?;

    let stop = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })?;

    let options = ProbeOptions {
        point: point.map(|(x, y)| PixelCoordinate::new(x, y)),
        max_frames: frames,
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let summary = probe::run(source, &options, stop, &mut out)?;

    info!(
        frames = summary.frames,
        missed = summary.missed,
        "Probe finished"
    );
    Ok(())
}
