pub mod checks;
pub mod error;
pub mod grid;
pub mod overlap;
pub mod plan;
pub mod stack;
pub mod subvolume;

pub use error::{Result, TilingError};
pub use grid::{ForegroundFilter, GridMerger, GridTiler};
pub use overlap::{OverlapMap, OverlapMerger, OverlapTiler};
pub use plan::{closest_to_square_factors, AxisPlan, OverlapPlan, TileGeometry};
pub use subvolume::SubvolumeAssembler;
