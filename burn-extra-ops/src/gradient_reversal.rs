//! # Gradient Reversal
//!
//! An operation that is the identity in the forward pass and multiplies the upstream
//! gradient by `-alpha` in the backward pass. Placed between a shared feature extractor
//! and an auxiliary classifier, it turns the classifier's loss minimization into loss
//! maximization for everything upstream, so `alpha` effectively becomes the weight of
//! the adversarial loss.
//!
//! Burn has no generic "custom gradient" hook, so the operation is exposed as a backend
//! extension: inference backends implement [`GradientReversalBackend`] with the identity
//! default, and `Autodiff<B, C>` registers a dedicated [`Backward`] rule.

use burn::{
    backend::autodiff::{
        checkpoint::{base::Checkpointer, strategy::CheckpointStrategy},
        grads::Gradients,
        ops::{Backward, Ops, OpsKind},
        Autodiff,
    },
    prelude::*,
    tensor::{ops::FloatTensor, ElementConversion, TensorPrimitive},
};

/// Backend extension providing the gradient reversal primitive.
pub trait GradientReversalBackend: Backend {
    /// Returns `tensor` unchanged. Backends that track gradients negate and scale the
    /// gradient flowing back through the result by `alpha`.
    fn float_gradient_reversal(tensor: FloatTensor<Self>, _alpha: f32) -> FloatTensor<Self> {
        tensor
    }
}

#[cfg(feature = "ndarray")]
impl GradientReversalBackend for burn::backend::NdArray {}

#[cfg(feature = "wgpu")]
impl GradientReversalBackend for burn::backend::Wgpu {}

impl<B: Backend, C: CheckpointStrategy> GradientReversalBackend for Autodiff<B, C> {
    fn float_gradient_reversal(tensor: FloatTensor<Self>, alpha: f32) -> FloatTensor<Self> {
        #[derive(Debug)]
        struct GradientReversalBackward;

        impl<B: Backend> Backward<B, 1> for GradientReversalBackward {
            type State = f32;

            fn backward(
                self,
                ops: Ops<Self::State, 1>,
                grads: &mut Gradients,
                _checkpointer: &mut Checkpointer,
            ) {
                let [node_input] = ops.parents;
                let grad = grads.consume::<B>(&ops.node);

                // Untracked input: nothing to compute.
                if let Some(node) = node_input {
                    let alpha = ops.state;
                    let grad_input = B::float_mul_scalar(grad, (-alpha).elem());
                    grads.register::<B>(node.id, grad_input);
                }
            }
        }

        match GradientReversalBackward
            .prepare::<C>([tensor.node.clone()])
            .compute_bound()
            .stateful()
        {
            OpsKind::Tracked(prep) => prep.finish(alpha, tensor.primitive),
            OpsKind::UnTracked(prep) => prep.finish(tensor.primitive),
        }
    }
}

/// Applies gradient reversal with scale `alpha` to a float tensor of any rank.
pub fn gradient_reversal<B: GradientReversalBackend, const D: usize>(
    tensor: Tensor<B, D>,
    alpha: f32,
) -> Tensor<B, D> {
    let output = B::float_gradient_reversal(tensor.into_primitive().tensor(), alpha);
    Tensor::from_primitive(TensorPrimitive::Float(output))
}

/// Configuration for the [`GradientReversal`] layer.
#[derive(Config, Debug)]
pub struct GradientReversalConfig {
    /// Scale applied to the reversed gradient.
    #[config(default = 1.0)]
    pub alpha: f64,
}

impl GradientReversalConfig {
    /// Initializes a new [`GradientReversal`] layer.
    pub fn init(&self) -> GradientReversal {
        GradientReversal::new(self.alpha)
    }
}

/// Gradient reversal layer.
///
/// `alpha` is a constant of the module, not a parameter: optimizers never see it and
/// it is only read when the backward pass runs.
#[derive(Module, Clone, Debug)]
pub struct GradientReversal {
    alpha: f32,
}

impl GradientReversal {
    /// Creates a layer from a raw scale.
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha as f32,
        }
    }

    /// Creates a layer from a single-element tensor holding the scale.
    ///
    /// # Panics
    ///
    /// Panics if `alpha` does not contain exactly one element.
    pub fn from_tensor<B: Backend>(alpha: Tensor<B, 1>) -> Self {
        Self {
            alpha: alpha.into_scalar().elem::<f32>(),
        }
    }

    /// The gradient scale.
    pub const fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Identity in the forward pass; reverses and scales gradients in the backward pass.
    ///
    /// # Shapes
    /// - input: `[..]`
    /// - output: same as input
    pub fn forward<B: GradientReversalBackend, const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        gradient_reversal(input, self.alpha)
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::Distribution;

    use super::*;
    use crate::tests::{TestAutodiffBackend, TestBackend};

    fn values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Vec<f32> {
        tensor.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn forward_is_identity() {
        let device = Default::default();
        let x = Tensor::<TestAutodiffBackend, 2>::from_floats(
            [[1.0, -2.0, 3.5], [0.0, 4.25, -0.5]],
            &device,
        )
        .require_grad();

        let y = gradient_reversal(x.clone(), 0.7);

        assert_eq!(y.dims(), x.dims());
        assert_eq!(values(y), values(x));
    }

    #[test]
    fn forward_is_identity_on_inference_backend() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::random([2, 3, 4, 4], Distribution::Default, &device);

        let y = GradientReversalConfig::new().init().forward(x.clone());

        assert_eq!(values(y), values(x));
    }

    #[test]
    fn backward_negates_and_scales_unit_gradient() {
        let device = Default::default();

        for alpha in [0.0f32, 0.5, 1.0, 2.5] {
            let x = Tensor::<TestAutodiffBackend, 3>::random(
                [2, 3, 4],
                Distribution::Normal(0.0, 1.0),
                &device,
            )
            .require_grad();

            let grads = gradient_reversal(x.clone(), alpha).sum().backward();
            let grad = x.grad(&grads).expect("input should receive a gradient");

            for value in values(grad) {
                assert!(
                    (value + alpha).abs() < 1e-6,
                    "expected gradient {} for alpha {alpha}, got {value}",
                    -alpha
                );
            }
        }
    }

    #[test]
    fn backward_composes_with_upstream_ops() {
        let device = Default::default();
        let x = Tensor::<TestAutodiffBackend, 1>::from_floats([1.0, 2.0, 3.0], &device)
            .require_grad();

        // d/dx sum(rev(3x) * 2) = -alpha * 2 * 3
        let y = gradient_reversal(x.clone() * 3.0, 0.5) * 2.0;
        let grads = y.sum().backward();
        let grad = x.grad(&grads).expect("input should receive a gradient");

        for value in values(grad) {
            assert!((value + 3.0).abs() < 1e-6, "unexpected gradient {value}");
        }
    }

    #[test]
    fn untracked_input_gets_no_gradient() {
        let device = Default::default();
        let x = Tensor::<TestAutodiffBackend, 1>::from_floats([1.0, -1.0, 2.0], &device);
        let w = Tensor::<TestAutodiffBackend, 1>::from_floats([0.5, 0.5, 0.5], &device)
            .require_grad();

        let grads = (gradient_reversal(x.clone(), 1.0) * w.clone())
            .sum()
            .backward();

        assert!(x.grad(&grads).is_none());
        // The reversal sits on the other branch, so `w` sees the plain forward values.
        let grad_w = w.grad(&grads).expect("weight should receive a gradient");
        assert_eq!(values(grad_w), vec![1.0, -1.0, 2.0]);
    }

    #[test]
    fn layer_scale_from_config_and_tensor() {
        let device = Default::default();

        assert_eq!(GradientReversalConfig::new().init().alpha(), 1.0);
        assert_eq!(
            GradientReversalConfig::new().with_alpha(0.25).init().alpha(),
            0.25
        );

        let alpha = Tensor::<TestBackend, 1>::from_floats([0.75], &device);
        assert_eq!(GradientReversal::from_tensor(alpha).alpha(), 0.75);
    }

    #[test]
    fn layer_has_no_parameters() {
        let layer = GradientReversal::new(1.0);

        assert_eq!(
            <GradientReversal as Module<TestAutodiffBackend>>::num_params(&layer),
            0
        );
    }
}
