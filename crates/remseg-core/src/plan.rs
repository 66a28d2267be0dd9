//! Tiling geometry: grid layouts and minimum-overlap window plans.
//!
//! Both tilers and both mergers derive their placement coordinates from the
//! types in this module. A merge call never receives a plan from its caller;
//! it recomputes the plan from the same parameters used for tiling, so the
//! two sides can only ever disagree if the parameters disagree.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TilingError};

/// Layout of a regular, non-overlapping tile grid over one image.
///
/// `grid_shape` is either derived from the source extents (ceil division)
/// or forced by the caller so that paired stacks (images and masks) tile
/// identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileGeometry {
    /// Per-axis tile extents `[height, width]`.
    pub tile_shape: [usize; 2],
    /// Per-axis tile counts `[rows, columns]`.
    pub grid_shape: [usize; 2],
}

impl TileGeometry {
    /// Derive the grid for the given source extents.
    ///
    /// Per-axis tile count is `ceil(extent / tile_extent)`; the source is
    /// expected to be zero-padded up to [`Self::padded_extent`] before
    /// slicing.
    pub fn derive(spatial: [usize; 2], tile_shape: [usize; 2]) -> Result<Self> {
        let [tile_h, tile_w] = tile_shape;
        if tile_h == 0 || tile_w == 0 {
            return Err(TilingError::config(format!(
                "tile shape {:?} has a zero extent",
                tile_shape
            )));
        }
        let grid_shape = [
            (spatial[0] + tile_h - 1) / tile_h,
            (spatial[1] + tile_w - 1) / tile_w,
        ];
        Ok(Self {
            tile_shape,
            grid_shape,
        })
    }

    /// Build a geometry with a caller-forced grid shape.
    pub fn forced(tile_shape: [usize; 2], grid_shape: [usize; 2]) -> Result<Self> {
        if tile_shape[0] == 0 || tile_shape[1] == 0 {
            return Err(TilingError::config(format!(
                "tile shape {:?} has a zero extent",
                tile_shape
            )));
        }
        if grid_shape[0] == 0 || grid_shape[1] == 0 {
            return Err(TilingError::config(format!(
                "grid shape {:?} has a zero extent",
                grid_shape
            )));
        }
        Ok(Self {
            tile_shape,
            grid_shape,
        })
    }

    /// Number of tiles cut from one image.
    pub fn tiles_per_image(&self) -> usize {
        self.grid_shape[0] * self.grid_shape[1]
    }

    /// Spatial extents after padding, `grid_shape * tile_shape`.
    pub fn padded_extent(&self) -> [usize; 2] {
        [
            self.grid_shape[0] * self.tile_shape[0],
            self.grid_shape[1] * self.tile_shape[1],
        ]
    }
}

/// Factor a subdivision count into the divisor pair closest to square.
///
/// Scans `rows` from 1 upward; among all pairs with `rows * columns ==
/// subdivisions`, the one minimizing `|columns - rows|` wins, and ties go
/// to the smaller `rows` found first. Both the overlap tiler and the
/// overlap merger call this same function, so their factorizations can
/// never drift apart.
pub fn closest_to_square_factors(subdivisions: usize) -> (usize, usize) {
    let mut rows = 1;
    let mut columns = subdivisions.max(1);
    let mut min_diff = usize::MAX;
    for candidate in 1..=subdivisions / 2 {
        if subdivisions % candidate == 0 {
            let partner = subdivisions / candidate;
            let diff = partner.abs_diff(candidate);
            if diff < min_diff {
                min_diff = diff;
                rows = candidate;
                columns = partner;
            }
        }
    }
    (rows, columns)
}

/// Sliding-window bookkeeping for one spatial axis of an [`OverlapPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisPlan {
    /// Source extent along this axis.
    pub extent: usize,
    /// Number of tiles along this axis.
    pub tiles: usize,
    /// Overlap between neighbouring tiles, in voxels.
    pub overlap: usize,
    /// Leftover voxels absorbed by shifting the final tile backward.
    pub remainder: usize,
    /// Distance between consecutive window origins.
    pub step: usize,
}

impl AxisPlan {
    fn new(extent: usize, tile_size: usize, tiles: usize) -> Self {
        if tiles == 1 {
            return Self {
                extent,
                tiles,
                overlap: 0,
                remainder: 0,
                step: extent,
            };
        }
        let excess = (tile_size * tiles).abs_diff(extent);
        let overlap = excess / (tiles - 1);
        Self {
            extent,
            tiles,
            overlap,
            remainder: excess % (tiles - 1),
            step: tile_size - overlap,
        }
    }

    /// Window start positions along this axis.
    ///
    /// The window slides from 0 in steps of `step` while the position stays
    /// below `extent - overlap`. A window that would run past the extent is
    /// shifted back by `remainder` so the last tile stays in-bounds and
    /// coverage is exact.
    pub fn starts(&self, tile_size: usize) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.tiles);
        let mut position = 0;
        while position < self.extent - self.overlap {
            let start = if position + tile_size < self.extent {
                position
            } else {
                position.saturating_sub(self.remainder)
            };
            out.push(start);
            position += self.step;
        }
        out
    }
}

/// Minimum-overlap plan for cutting one image into exactly `subdivisions`
/// square tiles of edge `tile_size`.
///
/// A pure function of `(spatial extents, tile_size, subdivisions)`. The
/// same plan drives tiling, merging and the overlap-density map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlapPlan {
    /// Edge length of the square tiles.
    pub tile_size: usize,
    /// Total number of tiles per image.
    pub subdivisions: usize,
    /// Tiles along the height axis.
    pub rows: usize,
    /// Tiles along the width axis.
    pub columns: usize,
    /// Height-axis window bookkeeping.
    pub vertical: AxisPlan,
    /// Width-axis window bookkeeping.
    pub horizontal: AxisPlan,
}

impl OverlapPlan {
    /// Build the plan for the given spatial extents `[height, width]`.
    ///
    /// # Errors
    /// `Config` when `subdivisions` is neither 1 nor even, when `tile_size`
    /// exceeds either extent, when the factorized rows/columns cannot cover
    /// the extents, or when the resulting windows would not produce exactly
    /// `subdivisions` in-bounds tiles.
    pub fn new(spatial: [usize; 2], tile_size: usize, subdivisions: usize) -> Result<Self> {
        let [height, width] = spatial;
        if subdivisions == 0 || subdivisions != 1 && subdivisions % 2 != 0 {
            return Err(TilingError::config(format!(
                "subdivision count must be 1 or an even number, got {}",
                subdivisions
            )));
        }
        if tile_size > height {
            return Err(TilingError::config(format!(
                "tile size {} exceeds stack height {}",
                tile_size, height
            )));
        }
        if tile_size > width {
            return Err(TilingError::config(format!(
                "tile size {} exceeds stack width {}",
                tile_size, width
            )));
        }

        let (rows, columns) = closest_to_square_factors(subdivisions);
        debug!(rows, columns, "minimum-overlap factorization selected");

        if subdivisions != 1 {
            if tile_size * rows < height {
                return Err(TilingError::config(format!(
                    "total height of all tiles per column must reach {}, but {} rows of {} give only {}",
                    height,
                    rows,
                    tile_size,
                    tile_size * rows
                )));
            }
            if tile_size * columns < width {
                return Err(TilingError::config(format!(
                    "total width of all tiles per row must reach {}, but {} columns of {} give only {}",
                    width,
                    columns,
                    tile_size,
                    tile_size * columns
                )));
            }
        }

        let plan = Self {
            tile_size,
            subdivisions,
            rows,
            columns,
            vertical: AxisPlan::new(height, tile_size, rows),
            horizontal: AxisPlan::new(width, tile_size, columns),
        };

        for (axis, line) in [("height", &plan.vertical), ("width", &plan.horizontal)] {
            if line.step == 0 {
                return Err(TilingError::config(format!(
                    "overlap equals the tile size on the {} axis; the window step must be at least 1",
                    axis
                )));
            }
            let starts = line.starts(tile_size);
            if starts.len() != line.tiles
                || starts.iter().any(|&s| s + tile_size > line.extent)
            {
                return Err(TilingError::config(format!(
                    "subdivision count {} cannot tile {} axis of extent {} with tile size {}",
                    subdivisions, axis, line.extent, tile_size
                )));
            }
        }

        Ok(plan)
    }

    /// Spatial extents `[height, width]` the plan was built for.
    pub fn spatial(&self) -> [usize; 2] {
        [self.vertical.extent, self.horizontal.extent]
    }

    /// Window origins `[y, x]` in emission order: height outer, width
    /// inner, mirroring the grid tiler's row-major convention.
    pub fn placements(&self) -> Vec<[usize; 2]> {
        let ys = self.vertical.starts(self.tile_size);
        let xs = self.horizontal.starts(self.tile_size);
        let mut out = Vec::with_capacity(ys.len() * xs.len());
        for &y in &ys {
            for &x in &xs {
                out.push([y, x]);
            }
        }
        out
    }

    /// Per-voxel tile coverage counts, row-major over `[height, width]`.
    pub fn coverage_counts(&self) -> Vec<u32> {
        let [height, width] = self.spatial();
        let mut counts = vec![0u32; height * width];
        for [y, x] in self.placements() {
            for row in y..y + self.tile_size {
                let base = row * width;
                for col in x..x + self.tile_size {
                    counts[base + col] += 1;
                }
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factors_prefer_square() {
        assert_eq!(closest_to_square_factors(1), (1, 1));
        assert_eq!(closest_to_square_factors(2), (1, 2));
        assert_eq!(closest_to_square_factors(4), (2, 2));
        assert_eq!(closest_to_square_factors(8), (2, 4));
        assert_eq!(closest_to_square_factors(16), (4, 4));
        assert_eq!(closest_to_square_factors(36), (6, 6));
    }

    #[test]
    fn test_geometry_ceil_division() {
        let geometry = TileGeometry::derive([10, 10], [4, 4]).unwrap();
        assert_eq!(geometry.grid_shape, [3, 3]);
        assert_eq!(geometry.tiles_per_image(), 9);
        assert_eq!(geometry.padded_extent(), [12, 12]);
    }

    #[test]
    fn test_geometry_rejects_zero_tile() {
        assert!(TileGeometry::derive([10, 10], [0, 4]).is_err());
    }

    #[test]
    fn test_plan_512_subdivision_8() {
        let plan = OverlapPlan::new([512, 512], 256, 8).unwrap();
        assert_eq!((plan.rows, plan.columns), (2, 4));
        assert_eq!(plan.vertical.overlap, 0);
        assert_eq!(plan.horizontal.overlap, 170);
        assert_eq!(plan.horizontal.remainder, 2);
        assert_eq!(plan.horizontal.step, 86);
        assert_eq!(plan.placements().len(), 8);
    }

    #[test]
    fn test_plan_rejects_odd_subdivision() {
        let err = OverlapPlan::new([512, 512], 256, 3).unwrap_err();
        assert!(matches!(err, TilingError::Config(_)));
    }

    #[test]
    fn test_plan_rejects_oversized_tile() {
        assert!(OverlapPlan::new([128, 512], 256, 4).is_err());
        assert!(OverlapPlan::new([512, 128], 256, 4).is_err());
    }

    #[test]
    fn test_plan_rejects_insufficient_coverage() {
        // 2 rows x 2 columns of 96 cannot span 512 in height.
        assert!(OverlapPlan::new([512, 128], 96, 4).is_err());
    }

    #[test]
    fn test_placements_stay_in_bounds() {
        let plan = OverlapPlan::new([500, 500], 256, 4).unwrap();
        for [y, x] in plan.placements() {
            assert!(y + 256 <= 500);
            assert!(x + 256 <= 500);
        }
    }

    #[test]
    fn test_coverage_counts_all_nonzero() {
        let plan = OverlapPlan::new([512, 512], 256, 8).unwrap();
        assert!(plan.coverage_counts().iter().all(|&c| c >= 1));
    }

    #[test]
    fn test_plan_rejects_zero_step() {
        // Two rows of full-height tiles would need a zero step.
        let err = OverlapPlan::new([256, 512], 256, 4).unwrap_err();
        assert!(matches!(err, TilingError::Config(_)));
    }

    #[test]
    fn test_single_subdivision_plan() {
        let plan = OverlapPlan::new([256, 256], 256, 1).unwrap();
        assert_eq!((plan.rows, plan.columns), (1, 1));
        assert_eq!(plan.placements(), vec![[0, 0]]);
    }
}
