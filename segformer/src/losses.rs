//! Segmentation loss and accuracy with an ignored label value.
//!
//! Burn's `CrossEntropyLoss` gathers the target logit before masking, so a label such as
//! 255 on a 19-class head would index out of bounds; and its padding mask still averages
//! over masked entries. The loss here replaces ignored labels with class 0 before the
//! gather and averages over the remaining pixels only.

use std::collections::BTreeMap;

use burn::{prelude::*, tensor::activation::log_softmax, tensor::ElementConversion};
use burn_extra_ops::resize_bilinear;

/// Named scalar values reported alongside a loss.
pub type LogVars = BTreeMap<String, f64>;

/// Mean cross-entropy over the entries whose target differs from `ignore_index`.
///
/// Returns zero when every entry is ignored.
///
/// # Shapes
/// - logits: `[n, classes]`
/// - targets: `[n]`
/// - output: `[1]`
pub fn cross_entropy_with_ignore<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
    ignore_index: usize,
) -> Tensor<B, 1> {
    let [n, _] = logits.dims();
    let ignored = targets.clone().equal_elem(ignore_index as i64);
    let safe_targets = targets.mask_fill(ignored.clone(), 0);

    let log_probs = log_softmax(logits, 1)
        .gather(1, safe_targets.reshape([n, 1]))
        .reshape([n]);
    let valid = ignored.bool_not().float();
    let count = valid.clone().sum().clamp_min(1.0);

    (log_probs * valid).sum().neg() / count
}

/// Flattens `[batch, classes, height, width]` logits and `[batch, height, width]` labels
/// into per-pixel rows.
fn per_pixel<B: Backend>(
    logits: Tensor<B, 4>,
    labels: Tensor<B, 3, Int>,
) -> (Tensor<B, 2>, Tensor<B, 1, Int>) {
    let [batch, classes, height, width] = logits.dims();
    let pixels = batch * height * width;

    (
        logits.permute([0, 2, 3, 1]).reshape([pixels, classes]),
        labels.reshape([pixels]),
    )
}

/// Per-pixel segmentation cross-entropy.
///
/// Logits are resized to the label resolution first (bilinear, no corner alignment).
///
/// # Shapes
/// - seg_logits: `[batch, classes, h, w]`
/// - seg_label: `[batch, height, width]`
/// - output: `[1]`
pub fn seg_cross_entropy<B: Backend>(
    seg_logits: Tensor<B, 4>,
    seg_label: Tensor<B, 3, Int>,
    ignore_index: usize,
) -> Tensor<B, 1> {
    let [_, height, width] = seg_label.dims();
    let seg_logits = resize_bilinear(seg_logits, [height, width]);
    let (logits, targets) = per_pixel(seg_logits, seg_label);

    cross_entropy_with_ignore(logits, targets, ignore_index)
}

/// Percentage of non-ignored pixels whose arg-max class equals the label.
///
/// Returns zero when every pixel is ignored.
pub fn seg_accuracy<B: Backend>(
    seg_logits: Tensor<B, 4>,
    seg_label: Tensor<B, 3, Int>,
    ignore_index: usize,
) -> f64 {
    let [_, height, width] = seg_label.dims();
    let seg_logits = resize_bilinear(seg_logits, [height, width]);
    let (logits, targets) = per_pixel(seg_logits, seg_label);
    let [pixels, _] = logits.dims();

    let predicted = logits.argmax(1).reshape([pixels]);
    let valid = targets.clone().equal_elem(ignore_index as i64).bool_not();
    let correct = predicted.equal(targets).float() * valid.clone().float();

    let total = valid.float().sum().into_scalar().elem::<f64>();
    if total == 0.0 {
        return 0.0;
    }

    100.0 * correct.sum().into_scalar().elem::<f64>() / total
}
