use burn::tensor::{Shape, Tensor, TensorData};
use burn_ndarray::NdArray;
use tempfile::tempdir;

use remseg_core::{GridTiler, OverlapMerger, OverlapTiler};
use remseg_io::{check_tiles, save_overlap_map, CheckOptions};

type Backend = NdArray<f32>;

fn stack(count: usize, height: usize, width: usize) -> Tensor<Backend, 4> {
    let mut values = Vec::with_capacity(count * height * width);
    for n in 0..count {
        for y in 0..height {
            for x in 0..width {
                values.push(((n * 37 + y * 11 + x * 3) % 256) as f32);
            }
        }
    }
    let device = Default::default();
    Tensor::from_data(
        TensorData::new(values, Shape::new([count, height, width, 1])),
        &device,
    )
}

#[test]
fn test_check_tiles_writes_previews_and_mosaics() {
    let data = stack(2, 8, 8);
    let (tiles, geometry) = GridTiler::new([4, 4]).tile(&data).unwrap();

    let dir = tempdir().unwrap();
    let options = CheckOptions {
        num_examples: 2,
        include_tiles: true,
        draw_grid: true,
    };
    let written = check_tiles(&tiles, geometry, &options, dir.path(), "job42", "_x_").unwrap();

    // 4 tiles per mosaic, 2 mosaics: 8 previews plus 2 mosaics.
    assert_eq!(written.len(), 10);
    let job_dir = dir.path().join("job42");
    assert!(job_dir.join("c__x_0.png").exists());
    assert!(job_dir.join("c__x_7.png").exists());
    assert!(job_dir.join("f_x_0.png").exists());
    assert!(job_dir.join("f_x_1.png").exists());

    let mosaic = image::open(job_dir.join("f_x_0.png")).unwrap();
    assert_eq!(mosaic.width(), 8);
    assert_eq!(mosaic.height(), 8);
}

#[test]
fn test_check_tiles_clamps_example_count() {
    let data = stack(1, 8, 8);
    let (tiles, geometry) = GridTiler::new([4, 4]).tile(&data).unwrap();

    let dir = tempdir().unwrap();
    let options = CheckOptions {
        num_examples: 5,
        include_tiles: false,
        draw_grid: false,
    };
    let written = check_tiles(&tiles, geometry, &options, dir.path(), "job", "_y_").unwrap();
    // Only one mosaic can be filled from a single image's tiles.
    assert_eq!(written.len(), 1);
}

#[test]
fn test_overlap_map_persists() {
    let data = stack(1, 16, 16);
    let tiles = OverlapTiler::new(8, 8).tile(&data).unwrap();
    let (_, map) = OverlapMerger::new(8, 8)
        .merge_with_map(&tiles, [16, 16], 0)
        .unwrap();

    let dir = tempdir().unwrap();
    let path = save_overlap_map(&map, dir.path()).unwrap();
    assert!(path.exists());

    let reloaded = image::open(&path).unwrap();
    assert_eq!(reloaded.width(), 16);
    assert_eq!(reloaded.height(), 16);
}
