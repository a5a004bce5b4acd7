use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
};

/// Linear embedding of one backbone scale.
#[derive(Config, Debug)]
pub struct MlpConfig {
    #[config(default = "2048")]
    input_dim: usize,
    #[config(default = "768")]
    embed_dim: usize,
}

impl MlpConfig {
    /// Initializes a `Mlp` module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> Mlp<B> {
        Mlp {
            input_dim: self.input_dim,
            proj: LinearConfig::new(self.input_dim, self.embed_dim).init(device),
        }
    }
}

/// Projects every spatial position of a feature map from the scale's channel depth to
/// the shared embedding width.
#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    input_dim: usize,
    proj: Linear<B>,
}

impl<B: Backend> Mlp<B> {
    /// Channel depth this projection accepts.
    pub const fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// # Shapes
    /// - input: `[batch, input_dim, height, width]`
    /// - output: `[batch, height * width, embed_dim]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 3> {
        let x = x.flatten::<3>(2, 3).swap_dims(1, 2);
        self.proj.forward(x)
    }
}
