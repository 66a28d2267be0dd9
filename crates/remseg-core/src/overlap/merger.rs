//! Averaging reassembly for overlapping tiles.

use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};
use tracing::debug;

use super::density::{render_overlap_map, OverlapMap};
use crate::error::{Result, TilingError};
use crate::plan::OverlapPlan;

/// Reassembles overlapping tiles into full volumes, undoing
/// [`super::OverlapTiler`].
///
/// Each voxel accumulates the sum of every tile covering it plus a
/// contribution count; the merged value is `sum / count`. The placement
/// plan is re-derived from `(original extents, tile_size, subdivisions)`,
/// never passed in, so merging is self-contained given the parameters used
/// for tiling.
pub struct OverlapMerger {
    tile_size: usize,
    subdivisions: usize,
}

impl OverlapMerger {
    /// Create a merger with the same parameters the tiler used.
    pub fn new(tile_size: usize, subdivisions: usize) -> Self {
        Self {
            tile_size,
            subdivisions,
        }
    }

    /// Merge the tile stack back into `[height, width]` volumes.
    ///
    /// # Errors
    /// * `Shape` when tile extents differ from the configured tile size.
    /// * `Config` when the tile count is not a multiple of the subdivision
    ///   count, or the re-derived plan is infeasible.
    /// * `AccumulatorIntegrity` when any in-bounds voxel would receive no
    ///   contribution; the merge refuses to divide by zero.
    pub fn merge<B: Backend>(
        &self,
        tiles: &Tensor<B, 4>,
        original_spatial: [usize; 2],
    ) -> Result<Tensor<B, 4>> {
        let (merged, _) = self.merge_inner(tiles, original_spatial)?;
        Ok(merged)
    }

    /// Merge paired prediction and mask tile stacks with the identical
    /// re-derived plan.
    pub fn merge_pair<B: Backend>(
        &self,
        tiles: &Tensor<B, 4>,
        mask_tiles: &Tensor<B, 4>,
        original_spatial: [usize; 2],
    ) -> Result<(Tensor<B, 4>, Tensor<B, 4>)> {
        Ok((
            self.merge(tiles, original_spatial)?,
            self.merge(mask_tiles, original_spatial)?,
        ))
    }

    /// Merge and additionally render the overlap-density map for one image
    /// of the merged stack.
    pub fn merge_with_map<B: Backend>(
        &self,
        tiles: &Tensor<B, 4>,
        original_spatial: [usize; 2],
        map_image: usize,
    ) -> Result<(Tensor<B, 4>, OverlapMap)> {
        let (merged, plan) = self.merge_inner(tiles, original_spatial)?;
        let image_count = merged.dims()[0];
        if map_image >= image_count {
            return Err(TilingError::config(format!(
                "overlap map requested for image {} of a {}-image stack",
                map_image, image_count
            )));
        }
        let map = render_overlap_map(&merged, &plan, map_image);
        Ok((merged, map))
    }

    fn merge_inner<B: Backend>(
        &self,
        tiles: &Tensor<B, 4>,
        original_spatial: [usize; 2],
    ) -> Result<(Tensor<B, 4>, OverlapPlan)> {
        let [tile_count, tile_h, tile_w, channels] = tiles.dims();
        if tile_h != self.tile_size || tile_w != self.tile_size {
            return Err(TilingError::shape(
                vec![self.tile_size, self.tile_size],
                vec![tile_h, tile_w],
            ));
        }
        let plan = OverlapPlan::new(original_spatial, self.tile_size, self.subdivisions)?;
        if tile_count % self.subdivisions != 0 {
            return Err(TilingError::config(format!(
                "tile count {} is not a multiple of the subdivision count {}",
                tile_count, self.subdivisions
            )));
        }
        let [height, width] = original_spatial;
        let image_count = tile_count / self.subdivisions;
        let placements = plan.placements();
        let device = tiles.device();

        // Per-voxel contribution counts, shared by every image of the stack.
        let counts = plan.coverage_counts();
        if let Some(voxel) = counts.iter().position(|&c| c == 0) {
            return Err(TilingError::accumulator(format!(
                "voxel ({}, {}) is covered by no tile under tile size {} and {} subdivisions",
                voxel / width,
                voxel % width,
                self.tile_size,
                self.subdivisions
            )));
        }
        let mut count_values = Vec::with_capacity(height * width * channels);
        for &c in &counts {
            count_values.extend(std::iter::repeat(c as f32).take(channels));
        }
        let count_tensor = Tensor::<B, 1>::from_data(
            TensorData::new(count_values, Shape::new([height * width * channels])),
            &device,
        )
        .reshape([1, height, width, channels]);

        let mut merged = Tensor::zeros([image_count, height, width, channels], &device);
        let mut consumed = 0;
        for image in 0..image_count {
            let mut accumulator: Tensor<B, 4> =
                Tensor::zeros([1, height, width, channels], &device);
            for &[y, x] in &placements {
                let tile = tiles.clone().slice([
                    consumed..consumed + 1,
                    0..tile_h,
                    0..tile_w,
                    0..channels,
                ]);
                let ranges = [0..1, y..y + tile_h, x..x + tile_w, 0..channels];
                let region = accumulator.clone().slice(ranges.clone());
                accumulator = accumulator.slice_assign(ranges, region + tile);
                consumed += 1;
            }
            merged = merged.slice_assign(
                [image..image + 1, 0..height, 0..width, 0..channels],
                accumulator / count_tensor.clone(),
            );
        }
        debug!(
            "merged {} tiles into {} volumes of {}x{}",
            tile_count, image_count, height, width
        );
        Ok((merged, plan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlap::OverlapTiler;
    use burn::tensor::{Shape, TensorData};
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn gradient_stack(count: usize, size: usize) -> Tensor<TestBackend, 4> {
        let mut values = Vec::with_capacity(count * size * size);
        for n in 0..count {
            for y in 0..size {
                for x in 0..size {
                    values.push((n * size * size + y * size + x) as f32);
                }
            }
        }
        let device = Default::default();
        Tensor::from_data(
            TensorData::new(values, Shape::new([count, size, size, 1])),
            &device,
        )
    }

    fn assert_close(a: &[f32], b: &[f32]) {
        assert_eq!(a.len(), b.len());
        for (left, right) in a.iter().zip(b) {
            assert!((left - right).abs() < 1e-4, "{} != {}", left, right);
        }
    }

    #[test]
    fn test_round_trip() {
        let data = gradient_stack(2, 16);
        let tiles = OverlapTiler::new(8, 8).tile(&data).unwrap();
        let merged = OverlapMerger::new(8, 8).merge(&tiles, [16, 16]).unwrap();
        assert_eq!(merged.dims(), [2, 16, 16, 1]);
        let expected = data.into_data().to_vec::<f32>().unwrap();
        let actual = merged.into_data().to_vec::<f32>().unwrap();
        assert_close(&expected, &actual);
    }

    #[test]
    fn test_round_trip_with_remainder_shift() {
        let data = gradient_stack(1, 10);
        let tiles = OverlapTiler::new(6, 4).tile(&data).unwrap();
        let merged = OverlapMerger::new(6, 4).merge(&tiles, [10, 10]).unwrap();
        let expected = data.into_data().to_vec::<f32>().unwrap();
        let actual = merged.into_data().to_vec::<f32>().unwrap();
        assert_close(&expected, &actual);
    }

    #[test]
    fn test_rejects_wrong_tile_extent() {
        let tiles = gradient_stack(4, 8);
        let err = OverlapMerger::new(6, 4).merge(&tiles, [10, 10]).unwrap_err();
        assert!(matches!(err, TilingError::Shape { .. }));
    }

    #[test]
    fn test_rejects_non_multiple_tile_count() {
        let tiles = gradient_stack(3, 8);
        let err = OverlapMerger::new(8, 4).merge(&tiles, [12, 12]).unwrap_err();
        assert!(matches!(err, TilingError::Config(_)));
    }

    #[test]
    fn test_uncovered_voxels_are_an_integrity_error() {
        // A single subdivision with a tile smaller than the volume leaves
        // voxels without any contribution.
        let tiles = gradient_stack(1, 8);
        let err = OverlapMerger::new(8, 1).merge(&tiles, [12, 12]).unwrap_err();
        assert!(matches!(err, TilingError::AccumulatorIntegrity(_)));
    }

    #[test]
    fn test_map_dimensions_match_merged_volume() {
        let data = gradient_stack(1, 16);
        let tiles = OverlapTiler::new(8, 8).tile(&data).unwrap();
        let (merged, map) = OverlapMerger::new(8, 8)
            .merge_with_map(&tiles, [16, 16], 0)
            .unwrap();
        assert_eq!(merged.dims(), [1, 16, 16, 1]);
        assert_eq!((map.height, map.width), (16, 16));
        assert_eq!(map.pixels.len(), 16 * 16 * 3);
    }

    #[test]
    fn test_map_image_out_of_range() {
        let data = gradient_stack(1, 16);
        let tiles = OverlapTiler::new(8, 8).tile(&data).unwrap();
        let err = OverlapMerger::new(8, 8)
            .merge_with_map(&tiles, [16, 16], 3)
            .unwrap_err();
        assert!(matches!(err, TilingError::Config(_)));
    }
}
