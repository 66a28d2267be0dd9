//! Foreground-content filter for grid tiles.

use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Int, Tensor};
use tracing::info;

use crate::error::{Result, TilingError};

/// Discards tile pairs whose mask carries too little foreground.
///
/// A pure post-hoc filter over a tiled stack: the tilers decide how to cut,
/// this type decides what to keep. Relative order of retained tiles is
/// preserved.
pub struct ForegroundFilter {
    min_percent: f32,
    positive_label: f32,
}

impl ForegroundFilter {
    /// Create a filter.
    ///
    /// # Arguments
    /// * `min_percent` - Threshold in `[0, 100]`; a tile survives only if
    ///   its foreground percentage is strictly greater.
    /// * `positive_label` - Mask value counted as foreground.
    pub fn new(min_percent: f32, positive_label: f32) -> Self {
        Self {
            min_percent,
            positive_label,
        }
    }

    /// Percentage of voxels in one mask tile equal to the positive label.
    fn foreground_percent<B: Backend>(&self, mask_tile: Tensor<B, 4>) -> f32 {
        let voxels = mask_tile.dims().iter().product::<usize>();
        let hits: f32 = mask_tile
            .equal_elem(self.positive_label)
            .float()
            .sum()
            .into_scalar()
            .elem();
        hits * 100.0 / voxels as f32
    }

    /// Retain the tile pairs whose mask clears the threshold.
    ///
    /// Returns the surviving image and mask tiles, in their original order.
    /// The discard count is reported via tracing.
    ///
    /// # Errors
    /// `Config` when the two stacks hold different tile counts or differ
    /// in spatial extent.
    pub fn retain<B: Backend>(
        &self,
        tiles: &Tensor<B, 4>,
        mask_tiles: &Tensor<B, 4>,
    ) -> Result<(Tensor<B, 4>, Tensor<B, 4>)> {
        let [tile_count, tile_h, tile_w, channels] = tiles.dims();
        let [mask_count, mask_h, mask_w, mask_channels] = mask_tiles.dims();
        if tile_count != mask_count || tile_h != mask_h || tile_w != mask_w {
            return Err(TilingError::config(format!(
                "tile stack {:?} and mask stack {:?} do not pair up",
                tiles.dims(),
                mask_tiles.dims()
            )));
        }

        let mut keep: Vec<i32> = Vec::with_capacity(tile_count);
        for index in 0..tile_count {
            let mask_tile = mask_tiles.clone().slice([
                index..index + 1,
                0..mask_h,
                0..mask_w,
                0..mask_channels,
            ]);
            if self.foreground_percent(mask_tile) > self.min_percent {
                keep.push(index as i32);
            }
        }

        let discarded = tile_count - keep.len();
        if discarded > 0 {
            info!(
                "{} of {} tiles discarded below {}% foreground",
                discarded, tile_count, self.min_percent
            );
        }
        if keep.len() == tile_count {
            return Ok((tiles.clone(), mask_tiles.clone()));
        }

        let device = tiles.device();
        if keep.is_empty() {
            return Ok((
                Tensor::empty([0, tile_h, tile_w, channels], &device),
                Tensor::empty([0, mask_h, mask_w, mask_channels], &device),
            ));
        }
        let indices = Tensor::<B, 1, Int>::from_ints(keep.as_slice(), &device);
        Ok((
            tiles.clone().select(0, indices.clone()),
            mask_tiles.clone().select(0, indices),
        ))
    }
}
