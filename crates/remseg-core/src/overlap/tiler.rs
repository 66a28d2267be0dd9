//! Minimum-overlap tiler.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use tracing::debug;

use crate::error::{Result, TilingError};
use crate::plan::OverlapPlan;

/// Splits a stack into exactly `subdivisions` square tiles per image with
/// the minimum overlap that still covers every voxel.
///
/// The factorization of `subdivisions` into rows and columns, the per-axis
/// overlap and the window placements all come from [`OverlapPlan`], which
/// [`super::OverlapMerger`] re-derives from the same parameters.
pub struct OverlapTiler {
    tile_size: usize,
    subdivisions: usize,
}

impl OverlapTiler {
    /// Create a tiler.
    ///
    /// # Arguments
    /// * `tile_size` - Edge length of the square tiles.
    /// * `subdivisions` - Tiles to cut per image; must be 1 or even.
    pub fn new(tile_size: usize, subdivisions: usize) -> Self {
        Self {
            tile_size,
            subdivisions,
        }
    }

    /// Cut the stack into overlapping tiles.
    ///
    /// Emits `image_count * subdivisions` tiles, row-major per image
    /// (height outer, width inner).
    ///
    /// # Errors
    /// `Config` when the subdivision count is neither 1 nor even, the tile
    /// size exceeds a spatial extent, or the factorized grid cannot cover
    /// the stack.
    pub fn tile<B: Backend>(&self, data: &Tensor<B, 4>) -> Result<Tensor<B, 4>> {
        let [count, height, width, channels] = data.dims();
        let plan = OverlapPlan::new([height, width], self.tile_size, self.subdivisions)?;
        let placements = plan.placements();

        let mut tiles = Vec::with_capacity(count * placements.len());
        for image in 0..count {
            for &[y, x] in &placements {
                tiles.push(data.clone().slice([
                    image..image + 1,
                    y..y + self.tile_size,
                    x..x + self.tile_size,
                    0..channels,
                ]));
            }
        }
        debug!(
            "overlap-tiled {} images of {}x{} into {} tiles of edge {} (rows={}, columns={})",
            count,
            height,
            width,
            tiles.len(),
            self.tile_size,
            plan.rows,
            plan.columns
        );
        Ok(Tensor::cat(tiles, 0))
    }

    /// Cut an image stack and its mask stack with the identical plan.
    ///
    /// # Errors
    /// `Shape` when the stacks' image counts or spatial extents differ,
    /// plus every error [`Self::tile`] can produce.
    pub fn tile_pair<B: Backend>(
        &self,
        data: &Tensor<B, 4>,
        masks: &Tensor<B, 4>,
    ) -> Result<(Tensor<B, 4>, Tensor<B, 4>)> {
        let [dc, dh, dw, _] = data.dims();
        let [mc, mh, mw, _] = masks.dims();
        if [dc, dh, dw] != [mc, mh, mw] {
            return Err(TilingError::shape(vec![dc, dh, dw], vec![mc, mh, mw]));
        }
        Ok((self.tile(data)?, self.tile(masks)?))
    }
}
