//! # Domain Discriminator
//!
//! A small classifier that predicts which domain a sample's features came from. Its
//! input passes through a gradient reversal layer first, so while the discriminator
//! learns to tell the domains apart, everything upstream of it receives the negated
//! (and `alpha`-scaled) gradient and learns to make the domains indistinguishable.

use burn::{
    nn::{
        loss::{CrossEntropyLoss, CrossEntropyLossConfig},
        Linear, LinearConfig, Relu,
    },
    prelude::*,
    tensor::ElementConversion,
};
use burn_extra_ops::{GradientReversal, GradientReversalBackend, GradientReversalConfig};

use crate::{config::DomainDiscriminatorConfig, losses::LogVars};

impl DomainDiscriminatorConfig {
    /// Initializes a new [`DomainDiscriminator`].
    pub fn init<B: Backend>(&self, device: &B::Device) -> DomainDiscriminator<B> {
        if self.classes != 2 {
            tracing::warn!(
                classes = self.classes,
                "domain labels only span {{0, 1}}; a discriminator with other than 2 outputs cannot match them one to one"
            );
        }

        let linear = |d_input: usize, d_output: usize| {
            let config = LinearConfig::new(d_input, d_output);
            match &self.init_cfg {
                Some(initializer) => config.with_initializer(initializer.clone()),
                None => config,
            }
            .init(device)
        };

        DomainDiscriminator {
            grad_rev: GradientReversalConfig::new().with_alpha(self.alpha).init(),
            lin1: linear(self.in_features, self.hidden_features),
            act: Relu::new(),
            lin2: linear(self.hidden_features, self.classes),
            loss: CrossEntropyLossConfig::new().init(device),
        }
    }
}

/// Binary domain classifier trained through gradient reversal.
#[derive(Module, Debug)]
pub struct DomainDiscriminator<B: Backend> {
    grad_rev: GradientReversal,
    lin1: Linear<B>,
    act: Relu,
    lin2: Linear<B>,
    loss: CrossEntropyLoss<B>,
}

impl<B: Backend> DomainDiscriminator<B> {
    /// The gradient reversal scale.
    pub const fn alpha(&self) -> f32 {
        self.grad_rev.alpha()
    }

    /// Replaces the gradient reversal scale, e.g. to follow an annealing schedule.
    pub fn set_alpha(&mut self, alpha: f64) {
        self.grad_rev = GradientReversal::new(alpha);
    }

    /// Percentage of samples whose predicted domain matches `labels`.
    pub fn accuracy(logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> f64 {
        let [batch_size, _] = logits.dims();
        if batch_size == 0 {
            return 0.0;
        }
        let predicted = logits.argmax(1).reshape([batch_size]);
        let correct = predicted.equal(labels).float().sum().into_scalar().elem::<f64>();

        100.0 * correct / batch_size as f64
    }
}

impl<B: GradientReversalBackend> DomainDiscriminator<B> {
    /// Predicts domain logits.
    ///
    /// The forward values are untouched by the reversal layer; only gradients flowing
    /// back into `x` are negated and scaled.
    ///
    /// # Shapes
    /// - input: `[batch, ..]`, rank at least 2, trailing dimensions totalling `in_features`
    /// - output: `[batch, classes]`
    pub fn classify<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, 2> {
        let x = self.grad_rev.forward(x);
        let x: Tensor<B, 2> = x.flatten(1, D - 1);
        let x = self.lin1.forward(x);
        let x = self.act.forward(x);
        self.lin2.forward(x)
    }

    /// Classifies `input` and computes the cross-entropy against `domain_labels`.
    ///
    /// Labels must be valid class indices and match the batch size of `input`; neither
    /// is checked here, Burn fails on violations.
    ///
    /// # Returns
    /// The scalar loss and auxiliary log values (empty).
    pub fn train_step<const D: usize>(
        &self,
        input: Tensor<B, D>,
        domain_labels: Tensor<B, 1, Int>,
    ) -> (Tensor<B, 1>, LogVars) {
        let logits = self.classify(input);
        let loss = self.loss.forward(logits, domain_labels);

        (loss, LogVars::new())
    }
}

#[cfg(test)]
mod tests {
    use burn::{nn::Initializer, tensor::Distribution};

    use super::*;
    use crate::tests::{TestAutodiffBackend, TestBackend};

    #[test]
    fn classify_flattens_trailing_dimensions() {
        let device = Default::default();
        let discriminator =
            DomainDiscriminatorConfig::new(4 * 3 * 3, 16).init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::random([5, 4, 3, 3], Distribution::Default, &device);

        assert_eq!(discriminator.classify(x).dims(), [5, 2]);
    }

    #[test]
    fn extra_classes_still_construct() {
        let device = Default::default();
        let discriminator = DomainDiscriminatorConfig::new(6, 4)
            .with_classes(3)
            .init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 2>::random([2, 6], Distribution::Default, &device);

        assert_eq!(discriminator.classify(x).dims(), [2, 3]);
    }

    #[test]
    fn train_step_loss_is_ln2_for_uniform_logits() {
        let device = Default::default();
        let discriminator = DomainDiscriminatorConfig::new(8, 4)
            .with_init_cfg(Some(Initializer::Zeros))
            .init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 3>::random([4, 2, 4], Distribution::Default, &device);
        let labels = Tensor::<TestBackend, 1, Int>::from_ints([0, 1, 1, 0], &device);

        let (loss, log_vars) = discriminator.train_step(x, labels);

        let loss = loss.into_scalar();
        assert!((loss - std::f32::consts::LN_2).abs() < 1e-5, "loss {loss}");
        assert!(log_vars.is_empty());
    }

    #[test]
    fn train_step_loss_is_nonnegative() {
        let device = Default::default();
        let discriminator = DomainDiscriminatorConfig::new(12, 8).init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 2>::random([6, 12], Distribution::Normal(0.0, 3.0), &device);
        let labels = Tensor::<TestBackend, 1, Int>::from_ints([0, 0, 1, 1, 0, 1], &device);

        let (loss, _) = discriminator.train_step(x, labels);

        assert!(loss.into_scalar() >= 0.0);
    }

    #[test]
    fn features_receive_reversed_scaled_gradient() {
        let device = Default::default();
        let adversarial = DomainDiscriminatorConfig::new(10, 6)
            .with_alpha(0.5)
            .init::<TestAutodiffBackend>(&device);
        // Same weights, but alpha = -1 turns the reversal into a plain identity.
        let mut plain = adversarial.clone();
        plain.set_alpha(-1.0);
        assert_eq!(plain.alpha(), -1.0);
        assert_eq!(adversarial.alpha(), 0.5);

        let x = Tensor::<TestAutodiffBackend, 2>::random(
            [3, 10],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let labels = Tensor::<TestAutodiffBackend, 1, Int>::from_ints([0, 1, 0], &device);

        let input = x.clone().require_grad();
        let (loss, _) = adversarial.train_step(input.clone(), labels.clone());
        let reversed = input.grad(&loss.backward()).expect("input gradient");

        let input = x.require_grad();
        let (loss, _) = plain.train_step(input.clone(), labels);
        let reference = input.grad(&loss.backward()).expect("input gradient");

        let reversed = reversed.into_data().to_vec::<f32>().unwrap();
        let reference = reference.into_data().to_vec::<f32>().unwrap();
        for (r, p) in reversed.iter().zip(&reference) {
            assert!((r + 0.5 * p).abs() < 1e-6, "expected {}, got {r}", -0.5 * p);
        }
    }

    #[test]
    fn accuracy_counts_matching_predictions() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_floats(
            [[2.0, 0.0], [0.0, 1.0], [3.0, -1.0], [0.5, 0.7]],
            &device,
        );
        let labels = Tensor::<TestBackend, 1, Int>::from_ints([0, 1, 1, 1], &device);

        let accuracy = DomainDiscriminator::accuracy(logits, labels);

        assert!((accuracy - 75.0).abs() < 1e-9);
    }
}
