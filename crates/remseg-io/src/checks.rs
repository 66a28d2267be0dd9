//! Tiling spot-checks written as preview rasters.
//!
//! Renders a handful of tiles and their grid-merged mosaics so a tiling
//! configuration can be inspected by eye before a long training run.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rayon::prelude::*;
use tracing::{debug, info};

use remseg_core::stack::{luma_scale, to_f32_vec};
use remseg_core::{GridMerger, TileGeometry};

use crate::raster::{save_gray_png, save_rgb_png};

/// Options for [`check_tiles`].
pub struct CheckOptions {
    /// Mosaics to reconstruct. Clamped when the tile stack cannot fill
    /// that many.
    pub num_examples: usize,
    /// Also write the individual tiles feeding the mosaics.
    pub include_tiles: bool,
    /// Draw grid borders on the mosaics.
    pub draw_grid: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            num_examples: 2,
            include_tiles: true,
            draw_grid: true,
        }
    }
}

/// Write tile previews (`c_<suffix><i>.png`) and reconstructed mosaics
/// (`f<suffix><i>.png`) under `out_dir/<job_id>/`.
///
/// Normalized `[0, 1]` stacks are scaled to the raster range; `[0, 255]`
/// stacks are written as-is. Returns the paths written.
pub fn check_tiles<B: Backend>(
    tiles: &Tensor<B, 4>,
    geometry: TileGeometry,
    options: &CheckOptions,
    out_dir: &Path,
    job_id: &str,
    suffix: &str,
) -> Result<Vec<PathBuf>> {
    let [tile_count, tile_h, tile_w, channels] = tiles.dims();
    let target = out_dir.join(job_id);
    fs::create_dir_all(&target)
        .with_context(|| format!("Failed to create {}", target.display()))?;

    let per_mosaic = geometry.tiles_per_image();
    let mut examples = options.num_examples;
    if per_mosaic * examples > tile_count {
        examples = (tile_count + per_mosaic - 1) / per_mosaic;
        debug!(
            "tile stack holds only {} tiles; clamping example count to {}",
            tile_count, examples
        );
    }
    let scale = luma_scale(tiles);
    let mut written = Vec::new();

    if options.include_tiles {
        let save_count = (per_mosaic * examples).min(tile_count);
        let values = to_f32_vec(tiles.clone().slice([
            0..save_count,
            0..tile_h,
            0..tile_w,
            0..channels,
        ]));
        let stride = tile_h * tile_w * channels;
        let paths: Result<Vec<PathBuf>> = values
            .par_chunks(stride)
            .enumerate()
            .map(|(index, chunk)| {
                let path = target.join(format!("c_{}{}.png", suffix, index));
                write_buffer(&path, chunk, tile_h, tile_w, channels, scale)?;
                Ok(path)
            })
            .collect();
        written.extend(paths?);
    }

    let mut merger = GridMerger::new(geometry.grid_shape);
    if !options.draw_grid {
        merger = merger.without_grid();
    }
    let mosaics = merger.merge(tiles, examples);
    let [_, mosaic_h, mosaic_w, _] = mosaics.dims();
    let values = to_f32_vec(mosaics);
    for (index, chunk) in values.chunks(mosaic_h * mosaic_w * channels).enumerate() {
        let path = target.join(format!("f{}{}.png", suffix, index));
        write_buffer(&path, chunk, mosaic_h, mosaic_w, channels, scale)?;
        written.push(path);
    }

    info!(
        "wrote {} check rasters under {}",
        written.len(),
        target.display()
    );
    Ok(written)
}

/// Encode one image worth of `f32` samples.
///
/// Single-channel data becomes Luma8, three-channel data RGB8; any other
/// channel count falls back to its first channel.
fn write_buffer(
    path: &Path,
    values: &[f32],
    height: usize,
    width: usize,
    channels: usize,
    scale: f32,
) -> Result<()> {
    let quantize = |v: f32| (v * scale).clamp(0.0, 255.0) as u8;
    match channels {
        1 => save_gray_png(path, width, height, values.iter().map(|&v| quantize(v)).collect()),
        3 => save_rgb_png(path, width, height, values.iter().map(|&v| quantize(v)).collect()),
        _ => {
            let first_channel: Vec<u8> = values
                .iter()
                .step_by(channels)
                .map(|&v| quantize(v))
                .collect();
            save_gray_png(path, width, height, first_channel)
        }
    }
}
