use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, GroupNorm, GroupNormConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
};

use crate::config::NormLayer;

/// The normalization layer of a [`ConvModule`].
#[derive(Module, Debug)]
pub enum NormModule<B: Backend> {
    BatchNorm(BatchNorm<B, 2>),
    GroupNorm(GroupNorm<B>),
}

impl<B: Backend> NormModule<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Self::BatchNorm(norm) => norm.forward(x),
            Self::GroupNorm(norm) => norm.forward(x),
        }
    }
}

/// Convolution followed by optional normalization and ReLU.
#[derive(Config, Debug)]
pub struct ConvModuleConfig {
    in_channels: usize,
    out_channels: usize,
    #[config(default = "1")]
    kernel_size: usize,
    #[config(default = "NormLayer::BatchNorm")]
    norm: NormLayer,
}

impl ConvModuleConfig {
    /// Initializes a `ConvModule`.
    ///
    /// Odd kernels are padded by `kernel_size / 2` so the output keeps the input's
    /// spatial size. The convolution only carries a bias when there is no norm layer.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ConvModule<B> {
        let padding = if self.kernel_size == 1 {
            0
        } else {
            self.kernel_size / 2
        };

        let conv = Conv2dConfig::new(
            [self.in_channels, self.out_channels],
            [self.kernel_size, self.kernel_size],
        )
        .with_padding(PaddingConfig2d::Explicit(padding, padding))
        .with_bias(self.norm == NormLayer::None)
        .init(device);

        let norm = match self.norm {
            NormLayer::None => None,
            NormLayer::BatchNorm => Some(NormModule::BatchNorm(
                BatchNormConfig::new(self.out_channels).init(device),
            )),
            NormLayer::GroupNorm(groups) => Some(NormModule::GroupNorm(
                GroupNormConfig::new(groups, self.out_channels).init(device),
            )),
        };

        ConvModule {
            conv,
            norm,
            relu: Relu::new(),
        }
    }
}

/// Convolution, normalization and activation in one module.
#[derive(Module, Debug)]
pub struct ConvModule<B: Backend> {
    conv: Conv2d<B>,
    norm: Option<NormModule<B>>,
    relu: Relu,
}

impl<B: Backend> ConvModule<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = match &self.norm {
            Some(norm) => norm.forward(x),
            None => x,
        };
        self.relu.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::Distribution;

    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn odd_kernels_preserve_spatial_size() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::random([2, 12, 9, 7], Distribution::Default, &device);

        for kernel_size in [1, 3, 5] {
            let module = ConvModuleConfig::new(12, 4)
                .with_kernel_size(kernel_size)
                .init::<TestBackend>(&device);
            assert_eq!(module.forward(x.clone()).dims(), [2, 4, 9, 7]);
        }
    }

    #[test]
    fn bias_only_without_norm() {
        let device = Default::default();

        let with_norm = ConvModuleConfig::new(4, 4).init::<TestBackend>(&device);
        assert!(with_norm.conv.bias.is_none());
        assert!(matches!(with_norm.norm, Some(NormModule::BatchNorm(_))));

        let without_norm = ConvModuleConfig::new(4, 4)
            .with_norm(NormLayer::None)
            .init::<TestBackend>(&device);
        assert!(without_norm.conv.bias.is_some());
        assert!(without_norm.norm.is_none());
    }

    #[test]
    fn output_is_rectified() {
        let device = Default::default();
        let module = ConvModuleConfig::new(6, 8)
            .with_kernel_size(3)
            .with_norm(NormLayer::GroupNorm(2))
            .init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::random([1, 6, 5, 5], Distribution::Normal(0.0, 1.0), &device);

        let min = module.forward(x).min().into_scalar();

        assert!(min >= 0.0);
    }
}
