//! Sanity checks on mask stacks.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::error::{Result, TilingError};
use crate::stack::to_f32_vec;

/// Verify that a mask stack is binary.
///
/// Samples up to four evenly spaced images and confirms each holds at most
/// two distinct values. A mask failing this check would silently corrupt
/// foreground statistics and overlap-map compositing downstream.
///
/// # Errors
/// `Config` naming the first offending image.
pub fn ensure_binary_masks<B: Backend>(masks: &Tensor<B, 4>) -> Result<()> {
    let [count, height, width, channels] = masks.dims();
    if count == 0 {
        return Ok(());
    }
    let samples = count.min(4);
    for sample in 0..samples {
        let index = sample * count / samples;
        let values = to_f32_vec(masks.clone().slice([
            index..index + 1,
            0..height,
            0..width,
            0..channels,
        ]));
        let mut distinct: Vec<u32> = values.iter().map(|v| v.to_bits()).collect();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() > 2 {
            return Err(TilingError::config(format!(
                "mask image {} holds {} distinct values; a binary mask may hold at most 2",
                index,
                distinct.len()
            )));
        }
    }
    Ok(())
}
