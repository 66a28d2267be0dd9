//! Regular grid tiler.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use tracing::debug;

use super::GridIndices;
use crate::error::{Result, TilingError};
use crate::plan::TileGeometry;

/// Splits a stack into a regular, non-overlapping grid of fixed-size tiles.
///
/// The source is zero-padded up to a tile-divisible extent before slicing,
/// so every tile has exactly the requested shape. Tiles are emitted in
/// row-major order per image; [`super::GridMerger`] replays the same order
/// to reassemble them.
pub struct GridTiler {
    tile_shape: [usize; 2],
    forced_grid: Option<[usize; 2]>,
}

impl GridTiler {
    /// Create a tiler that derives its grid from each stack's extents.
    ///
    /// # Arguments
    /// * `tile_shape` - Per-axis tile extents `[height, width]`.
    pub fn new(tile_shape: [usize; 2]) -> Self {
        Self {
            tile_shape,
            forced_grid: None,
        }
    }

    /// Create a tiler with a caller-forced grid shape.
    ///
    /// Forcing the grid lets several stacks (e.g. images and masks from
    /// separate calls) tile identically regardless of their extents.
    pub fn with_grid_shape(tile_shape: [usize; 2], grid_shape: [usize; 2]) -> Self {
        Self {
            tile_shape,
            forced_grid: Some(grid_shape),
        }
    }

    /// Create a tiler that reproduces a previously derived geometry.
    pub fn from_geometry(geometry: TileGeometry) -> Self {
        Self::with_grid_shape(geometry.tile_shape, geometry.grid_shape)
    }

    /// Cut the stack into tiles.
    ///
    /// Returns the tile stack `[image_count * rows * cols, tile_h, tile_w,
    /// channels]` together with the geometry that produced it, for reuse on
    /// paired stacks.
    ///
    /// # Errors
    /// `Config` when a tile extent is zero or a forced grid cannot contain
    /// the source extents.
    pub fn tile<B: Backend>(&self, data: &Tensor<B, 4>) -> Result<(Tensor<B, 4>, TileGeometry)> {
        let [count, height, width, channels] = data.dims();
        let geometry = match self.forced_grid {
            Some(grid) => TileGeometry::forced(self.tile_shape, grid)?,
            None => TileGeometry::derive([height, width], self.tile_shape)?,
        };
        let [padded_h, padded_w] = geometry.padded_extent();
        if padded_h < height || padded_w < width {
            return Err(TilingError::config(format!(
                "forced grid {:?} with tile shape {:?} cannot contain a {}x{} stack",
                geometry.grid_shape, geometry.tile_shape, height, width
            )));
        }

        let device = data.device();
        let padded = if padded_h != height || padded_w != width {
            debug!(
                "zero-padding stack from {}x{} to {}x{} to fit the tile grid",
                height, width, padded_h, padded_w
            );
            Tensor::zeros([count, padded_h, padded_w, channels], &device).slice_assign(
                [0..count, 0..height, 0..width, 0..channels],
                data.clone(),
            )
        } else {
            data.clone()
        };

        let [tile_h, tile_w] = geometry.tile_shape;
        let mut tiles = Vec::with_capacity(count * geometry.tiles_per_image());
        for (image, row, col) in GridIndices::new(count, geometry.grid_shape) {
            tiles.push(padded.clone().slice([
                image..image + 1,
                row * tile_h..(row + 1) * tile_h,
                col * tile_w..(col + 1) * tile_w,
                0..channels,
            ]));
        }
        debug!(
            "grid-tiled {} images of {}x{} into {} tiles of {}x{}",
            count,
            height,
            width,
            tiles.len(),
            tile_h,
            tile_w
        );
        Ok((Tensor::cat(tiles, 0), geometry))
    }

    /// Cut an image stack and its mask stack with one shared geometry.
    ///
    /// The mask stack may carry a different channel count, but must match
    /// the image stack's image count and spatial extents.
    ///
    /// # Errors
    /// `Shape` when the stacks' image counts or spatial extents differ.
    pub fn tile_pair<B: Backend>(
        &self,
        data: &Tensor<B, 4>,
        masks: &Tensor<B, 4>,
    ) -> Result<(Tensor<B, 4>, Tensor<B, 4>, TileGeometry)> {
        let [dc, dh, dw, _] = data.dims();
        let [mc, mh, mw, _] = masks.dims();
        if [dc, dh, dw] != [mc, mh, mw] {
            return Err(TilingError::shape(vec![dc, dh, dw], vec![mc, mh, mw]));
        }
        let (tiles, geometry) = self.tile(data)?;
        let (mask_tiles, _) = GridTiler::from_geometry(geometry).tile(masks)?;
        Ok((tiles, mask_tiles, geometry))
    }
}
