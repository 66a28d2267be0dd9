pub mod checks;
pub mod raster;

pub use checks::{check_tiles, CheckOptions};
pub use raster::{save_gray_png, save_overlap_map, save_rgb_png};
