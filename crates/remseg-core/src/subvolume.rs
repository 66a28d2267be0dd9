//! Regrouping of 2D-tiled frames into fixed-size 3D subvolumes.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use tracing::warn;

use crate::error::{Result, TilingError};

/// Packs a stack of 2D frames into 3D subvolumes for volumetric models.
///
/// Frames are consumed in depth-blocks: within one block, every spatial
/// tile position feeds its own subvolume, so subvolume `b * P + p` holds
/// tile position `p` of frames `b * depth .. (b + 1) * depth`. Downstream
/// training relies on this ordering to get spatially-local depth stacks.
pub struct SubvolumeAssembler {
    shape: [usize; 4],
}

impl SubvolumeAssembler {
    /// Create an assembler.
    ///
    /// # Arguments
    /// * `shape` - Subvolume shape `[depth, height, width, channels]`.
    pub fn new(shape: [usize; 4]) -> Self {
        Self { shape }
    }

    /// Regroup paired image and mask stacks into subvolumes.
    ///
    /// Trailing frames that cannot fill a whole depth-block are dropped
    /// and reported, not an error.
    ///
    /// # Errors
    /// * `Shape` when the stacks differ, the spatial extents are not
    ///   divisible by the subvolume extents, or channel counts mismatch.
    /// * `Config` when the subvolume shape has a zero extent.
    pub fn assemble<B: Backend>(
        &self,
        x: &Tensor<B, 4>,
        y: &Tensor<B, 4>,
    ) -> Result<(Tensor<B, 5>, Tensor<B, 5>)> {
        if x.dims() != y.dims() {
            return Err(TilingError::shape(x.dims().to_vec(), y.dims().to_vec()));
        }
        let [depth, sub_h, sub_w, sub_c] = self.shape;
        if depth == 0 || sub_h == 0 || sub_w == 0 || sub_c == 0 {
            return Err(TilingError::config(format!(
                "subvolume shape {:?} has a zero extent",
                self.shape
            )));
        }
        let [frames, height, width, channels] = x.dims();
        if height % sub_h != 0 || width % sub_w != 0 {
            return Err(TilingError::shape(
                vec![sub_h, sub_w],
                vec![height, width],
            ));
        }
        if channels != sub_c {
            return Err(TilingError::shape(vec![sub_c], vec![channels]));
        }

        let leftover = frames % depth;
        if leftover != 0 {
            warn!(
                "{} trailing frame(s) cannot fill a {}-deep subvolume and will be unused",
                leftover, depth
            );
        }

        let blocks = frames / depth;
        let rows = height / sub_h;
        let cols = width / sub_w;
        let per_frame = rows * cols;
        let total = blocks * per_frame;
        let device = x.device();

        let mut x_sub: Tensor<B, 5> = Tensor::zeros([total, depth, sub_h, sub_w, channels], &device);
        let mut y_sub: Tensor<B, 5> = Tensor::zeros([total, depth, sub_h, sub_w, channels], &device);

        for frame in 0..blocks * depth {
            let block = frame / depth;
            let slice = frame % depth;
            for row in 0..rows {
                for col in 0..cols {
                    let subvolume = block * per_frame + row * cols + col;
                    let ranges = [
                        frame..frame + 1,
                        row * sub_h..(row + 1) * sub_h,
                        col * sub_w..(col + 1) * sub_w,
                        0..channels,
                    ];
                    let target = [
                        subvolume..subvolume + 1,
                        slice..slice + 1,
                        0..sub_h,
                        0..sub_w,
                        0..channels,
                    ];
                    let x_tile = x
                        .clone()
                        .slice(ranges.clone())
                        .reshape([1, 1, sub_h, sub_w, channels]);
                    x_sub = x_sub.slice_assign(target.clone(), x_tile);
                    let y_tile = y
                        .clone()
                        .slice(ranges)
                        .reshape([1, 1, sub_h, sub_w, channels]);
                    y_sub = y_sub.slice_assign(target, y_tile);
                }
            }
        }
        Ok((x_sub, y_sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::{Shape, TensorData};
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    /// Frames of 4x4 where each pixel encodes `frame * 100 + row_tile * 10
    /// + col_tile` for 2x2 subvolume tiles.
    fn coded_stack(frames: usize) -> Tensor<TestBackend, 4> {
        let mut values = Vec::with_capacity(frames * 16);
        for f in 0..frames {
            for y in 0..4 {
                for x in 0..4 {
                    values.push((f * 100 + (y / 2) * 10 + (x / 2)) as f32);
                }
            }
        }
        let device = Default::default();
        Tensor::from_data(
            TensorData::new(values, Shape::new([frames, 4, 4, 1])),
            &device,
        )
    }

    fn subvolume_values(stack: &Tensor<TestBackend, 5>, index: usize) -> Vec<f32> {
        stack
            .clone()
            .slice([index..index + 1, 0..2, 0..2, 0..2, 0..1])
            .into_data()
            .to_vec::<f32>()
            .unwrap()
    }

    #[test]
    fn test_depth_first_interleaving() {
        let x = coded_stack(4);
        let y = coded_stack(4);
        let (x_sub, _) = SubvolumeAssembler::new([2, 2, 2, 1]).assemble(&x, &y).unwrap();
        assert_eq!(x_sub.dims(), [8, 2, 2, 2, 1]);

        // Subvolume 0: tile (0, 0) of frames 0 and 1.
        let values = subvolume_values(&x_sub, 0);
        assert_eq!(&values[..4], &[0.0, 0.0, 0.0, 0.0]);
        assert_eq!(&values[4..], &[100.0, 100.0, 100.0, 100.0]);

        // Subvolume 5: block 1, tile (0, 1) of frames 2 and 3.
        let values = subvolume_values(&x_sub, 5);
        assert_eq!(&values[..4], &[201.0, 201.0, 201.0, 201.0]);
        assert_eq!(&values[4..], &[301.0, 301.0, 301.0, 301.0]);
    }

    #[test]
    fn test_trailing_frames_dropped() {
        let x = coded_stack(5);
        let y = coded_stack(5);
        let (x_sub, y_sub) = SubvolumeAssembler::new([2, 2, 2, 1]).assemble(&x, &y).unwrap();
        // Frame 4 is dropped; two full depth-blocks remain.
        assert_eq!(x_sub.dims()[0], 8);
        assert_eq!(y_sub.dims()[0], 8);
    }

    #[test]
    fn test_rejects_mismatched_stacks() {
        let x = coded_stack(4);
        let y = coded_stack(3);
        let err = SubvolumeAssembler::new([2, 2, 2, 1]).assemble(&x, &y).unwrap_err();
        assert!(matches!(err, TilingError::Shape { .. }));
    }

    #[test]
    fn test_rejects_indivisible_extents() {
        let x = coded_stack(4);
        let y = coded_stack(4);
        let err = SubvolumeAssembler::new([2, 3, 3, 1]).assemble(&x, &y).unwrap_err();
        assert!(matches!(err, TilingError::Shape { .. }));
    }

    #[test]
    fn test_rejects_zero_extent_shape() {
        let x = coded_stack(4);
        let y = coded_stack(4);
        let err = SubvolumeAssembler::new([0, 2, 2, 1]).assemble(&x, &y).unwrap_err();
        assert!(matches!(err, TilingError::Config(_)));
    }
}
