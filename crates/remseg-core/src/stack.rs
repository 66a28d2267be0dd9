//! CPU-side helpers for tensor stacks.

use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};

/// Pull a tensor's contents into a row-major `f32` vector.
pub fn to_f32_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Vec<f32> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .expect("stack data converts to f32")
}

/// Scale factor mapping a stack's values onto the `[0, 255]` raster range.
///
/// Normalized `[0, 1]` data is scaled by 255; data already spanning
/// `[0, 255]` is written as-is. Selected by inspecting the stack's
/// maximum, not by an explicit flag.
pub fn luma_scale<B: Backend>(stack: &Tensor<B, 4>) -> f32 {
    let max: f32 = stack.clone().max().into_scalar().elem();
    if max > 1.0 {
        1.0
    } else {
        255.0
    }
}
