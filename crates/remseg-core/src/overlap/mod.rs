//! Minimum-overlap tiling: cutting, averaging reassembly and the
//! overlap-density visualization.

mod density;
mod merger;
mod tiler;

pub use density::{voxel_color, OverlapBucket, OverlapMap};
pub use merger::OverlapMerger;
pub use tiler::OverlapTiler;
