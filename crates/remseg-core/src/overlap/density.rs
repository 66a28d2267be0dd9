//! Overlap-density rendering.
//!
//! Renders how many tiles contributed to each voxel of a merged volume as
//! an RGB buffer: tile borders in white, then green / yellow / red for
//! increasingly crowded voxels, composited against the merged binary
//! image. Encoding the buffer to a file is `remseg-io`'s job.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::plan::OverlapPlan;
use crate::stack::to_f32_vec;

/// Density classification of one voxel of the overlap map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapBucket {
    /// Covered by at most one tile; keeps the grayscale base value.
    Base,
    /// On a 1-voxel tile outline.
    Border,
    /// Covered by exactly two tiles.
    Two,
    /// Covered by three to seven tiles.
    ThreeToSeven,
    /// Covered by eight or more tiles.
    EightPlus,
}

impl OverlapBucket {
    /// Classify a raw coverage count (border voxels are classified
    /// separately, from the tile outlines).
    pub fn from_count(count: u32) -> Self {
        match count {
            0 | 1 => Self::Base,
            2 => Self::Two,
            3..=7 => Self::ThreeToSeven,
            _ => Self::EightPlus,
        }
    }
}

/// Color of one overlap-map voxel.
///
/// `foreground` selects the brighter variant used over foreground voxels
/// of the merged binary image; `base` is the grayscale value carried
/// through for voxels outside every overlap region.
pub fn voxel_color(bucket: OverlapBucket, foreground: bool, base: u8) -> [u8; 3] {
    match (bucket, foreground) {
        (OverlapBucket::Base, _) => [base, base, base],
        (OverlapBucket::Border, _) => [255, 255, 255],
        (OverlapBucket::Two, true) => [73, 100, 73],
        (OverlapBucket::Two, false) => [0, 74, 0],
        (OverlapBucket::ThreeToSeven, true) => [100, 100, 73],
        (OverlapBucket::ThreeToSeven, false) => [74, 74, 0],
        (OverlapBucket::EightPlus, true) => [100, 73, 73],
        (OverlapBucket::EightPlus, false) => [74, 0, 0],
    }
}

/// RGB overlap-density map for one merged image.
#[derive(Debug, Clone)]
pub struct OverlapMap {
    /// Map width in voxels.
    pub width: usize,
    /// Map height in voxels.
    pub height: usize,
    /// Row-major RGB8 pixel data, `width * height * 3` bytes.
    pub pixels: Vec<u8>,
}

/// Render the density map for `image_index` of a merged stack.
pub(crate) fn render_overlap_map<B: Backend>(
    merged: &Tensor<B, 4>,
    plan: &OverlapPlan,
    image_index: usize,
) -> OverlapMap {
    let [height, width] = plan.spatial();
    let tile_size = plan.tile_size;
    let counts = plan.coverage_counts();

    let mut border = vec![false; height * width];
    for [y, x] in plan.placements() {
        for col in x..x + tile_size {
            border[y * width + col] = true;
            border[(y + tile_size - 1) * width + col] = true;
        }
        for row in y..y + tile_size {
            border[row * width + x] = true;
            border[row * width + x + tile_size - 1] = true;
        }
    }

    let base = to_f32_vec(merged.clone().slice([
        image_index..image_index + 1,
        0..height,
        0..width,
        0..1,
    ]));

    let mut pixels = Vec::with_capacity(height * width * 3);
    for index in 0..height * width {
        let bucket = if border[index] {
            OverlapBucket::Border
        } else {
            OverlapBucket::from_count(counts[index])
        };
        let value = base[index];
        let gray = (value * 255.0).clamp(0.0, 255.0) as u8;
        pixels.extend_from_slice(&voxel_color(bucket, value == 1.0, gray));
    }

    OverlapMap {
        width,
        height,
        pixels,
    }
}
