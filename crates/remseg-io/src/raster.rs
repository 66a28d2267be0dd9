//! PNG encoding of diagnostic pixel buffers.
//!
//! The core crate only produces pixel buffers and coordinates; this module
//! owns the act of encoding and writing them.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{GrayImage, RgbImage};
use remseg_core::OverlapMap;

/// Write a row-major Luma8 buffer as a PNG.
pub fn save_gray_png(path: &Path, width: usize, height: usize, pixels: Vec<u8>) -> Result<()> {
    let image = GrayImage::from_raw(width as u32, height as u32, pixels)
        .context("grayscale buffer does not match the declared dimensions")?;
    image
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Write a row-major RGB8 buffer as a PNG.
pub fn save_rgb_png(path: &Path, width: usize, height: usize, pixels: Vec<u8>) -> Result<()> {
    let image = RgbImage::from_raw(width as u32, height as u32, pixels)
        .context("RGB buffer does not match the declared dimensions")?;
    image
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Persist an overlap-density map under the given output directory.
///
/// The file name is fixed to `merged_ov_map.png`; the caller selects the
/// directory (typically per job).
pub fn save_overlap_map(map: &OverlapMap, out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    let path = out_dir.join("merged_ov_map.png");
    save_rgb_png(&path, map.width, map.height, map.pixels.clone())?;
    Ok(path)
}
