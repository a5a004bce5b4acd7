//! # Bilinear Resize
//!
//! Bilinear resizing of `[batch, channels, height, width]` tensors with
//! `align_corners = false` semantics (half-pixel centers, source coordinates clamped at
//! zero), matching the resize used by PyTorch segmentation heads.
//!
//! Bilinear interpolation is separable, so the resize is computed as two products with
//! dense interpolation matrices built on the host. Only `matmul`, `reshape` and
//! `swap_dims` touch the input, which keeps the operation differentiable on every
//! backend, including those without a bilinear interpolation backward kernel.

use burn::prelude::*;

/// Row-major `[out_size, in_size]` matrix of linear interpolation weights.
fn interpolation_weights(in_size: usize, out_size: usize) -> Vec<f32> {
    let mut weights = vec![0.0f32; out_size * in_size];
    let scale = in_size as f32 / out_size as f32;

    for out in 0..out_size {
        let src = ((out as f32 + 0.5) * scale - 0.5).max(0.0);
        let i0 = (src.floor() as usize).min(in_size - 1);
        let i1 = (i0 + 1).min(in_size - 1);
        let lambda1 = src - i0 as f32;
        let lambda0 = 1.0 - lambda1;

        let row = out * in_size;
        weights[row + i0] += lambda0;
        weights[row + i1] += lambda1;
    }

    weights
}

/// Returns the transposed interpolation matrix, shape `[in_size, out_size]`.
fn interpolation_matrix<B: Backend>(
    in_size: usize,
    out_size: usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    let weights = interpolation_weights(in_size, out_size);
    Tensor::<B, 2>::from_data(TensorData::new(weights, [out_size, in_size]), device).transpose()
}

/// Resizes the spatial dimensions of `tensor` to `size = [height, width]`.
///
/// Returns the input unchanged when it already has the requested size.
///
/// # Shapes
/// - input: `[batch, channels, height, width]`
/// - output: `[batch, channels, size[0], size[1]]`
///
/// # Panics
///
/// Panics if the input or the requested size has an empty spatial dimension.
pub fn resize_bilinear<B: Backend>(tensor: Tensor<B, 4>, size: [usize; 2]) -> Tensor<B, 4> {
    let [batch, channels, height, width] = tensor.dims();
    let [out_height, out_width] = size;

    if height == out_height && width == out_width {
        return tensor;
    }

    assert!(
        height > 0 && width > 0 && out_height > 0 && out_width > 0,
        "bilinear resize requires non-empty spatial dimensions, got {height}x{width} -> {out_height}x{out_width}"
    );

    let device = tensor.device();

    let x = if width == out_width {
        tensor
    } else {
        tensor
            .reshape([batch * channels * height, width])
            .matmul(interpolation_matrix(width, out_width, &device))
            .reshape([batch, channels, height, out_width])
    };

    if height == out_height {
        return x;
    }

    x.swap_dims(2, 3)
        .reshape([batch * channels * out_width, height])
        .matmul(interpolation_matrix(height, out_height, &device))
        .reshape([batch, channels, out_width, out_height])
        .swap_dims(2, 3)
}

/// Resizes `tensor` to the spatial size of `target`.
pub fn resize_bilinear_like<B: Backend>(tensor: Tensor<B, 4>, target: &Tensor<B, 4>) -> Tensor<B, 4> {
    let [_, _, height, width] = target.dims();
    resize_bilinear(tensor, [height, width])
}
