//! Mosaic reassembly for grid tiles.

use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};
use tracing::debug;

use super::GridIndices;

/// Reassembles grid tiles into full mosaics, undoing [`super::GridTiler`].
///
/// Tiles are consumed in the same row-major `(image, row, col)` order the
/// tiler emitted them. If the tile stream runs out before every requested
/// mosaic is filled, the partial result is returned as-is; callers working
/// with a reduced example set rely on this.
pub struct GridMerger {
    grid_shape: [usize; 2],
    draw_grid: bool,
}

impl GridMerger {
    /// Create a merger for the given grid shape `[rows, columns]`.
    ///
    /// Grid borders are drawn by default.
    pub fn new(grid_shape: [usize; 2]) -> Self {
        Self {
            grid_shape,
            draw_grid: true,
        }
    }

    /// Disable the 1-voxel tile borders.
    pub fn without_grid(mut self) -> Self {
        self.draw_grid = false;
        self
    }

    /// Lay the tile stack out as `image_count` mosaics.
    ///
    /// Tile extents are taken from the stack itself; each mosaic has shape
    /// `[rows * tile_h, cols * tile_w]`. When borders are enabled, each
    /// tile footprint is outlined with value `255` for `[0, 255]` data or
    /// `1` for normalized `[0, 1]` data, selected by inspecting the stack's
    /// maximum.
    pub fn merge<B: Backend>(&self, tiles: &Tensor<B, 4>, image_count: usize) -> Tensor<B, 4> {
        let [tile_count, tile_h, tile_w, channels] = tiles.dims();
        let [rows, cols] = self.grid_shape;
        let device = tiles.device();

        let border_value = if self.draw_grid {
            let max: f32 = tiles.clone().max().into_scalar().elem();
            if max > 1.0 {
                255.0
            } else {
                1.0
            }
        } else {
            0.0
        };

        let mut mosaic = Tensor::zeros(
            [image_count, rows * tile_h, cols * tile_w, channels],
            &device,
        );
        for (consumed, (image, row, col)) in GridIndices::new(image_count, self.grid_shape).enumerate()
        {
            if consumed == tile_count {
                debug!(
                    "tile stream exhausted after {} tiles; returning partial mosaic",
                    consumed
                );
                break;
            }
            let y = row * tile_h;
            let x = col * tile_w;
            let tile = tiles
                .clone()
                .slice([consumed..consumed + 1, 0..tile_h, 0..tile_w, 0..channels]);
            mosaic = mosaic.slice_assign(
                [image..image + 1, y..y + tile_h, x..x + tile_w, 0..channels],
                tile,
            );
            if self.draw_grid {
                let horizontal = Tensor::full([1, 1, tile_w, channels], border_value, &device);
                let vertical = Tensor::full([1, tile_h, 1, channels], border_value, &device);
                mosaic = mosaic
                    .slice_assign(
                        [image..image + 1, y..y + 1, x..x + tile_w, 0..channels],
                        horizontal.clone(),
                    )
                    .slice_assign(
                        [
                            image..image + 1,
                            y + tile_h - 1..y + tile_h,
                            x..x + tile_w,
                            0..channels,
                        ],
                        horizontal,
                    )
                    .slice_assign(
                        [image..image + 1, y..y + tile_h, x..x + 1, 0..channels],
                        vertical.clone(),
                    )
                    .slice_assign(
                        [
                            image..image + 1,
                            y..y + tile_h,
                            x + tile_w - 1..x + tile_w,
                            0..channels,
                        ],
                        vertical,
                    );
            }
        }
        mosaic
    }
}
