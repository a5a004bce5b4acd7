//! SegFormer Head Demo
//!
//! Builds a SegFormer head with a domain discriminator, feeds it random multi-scale
//! backbone features and reports output shapes, losses and gradient statistics.
//!
//! ## Usage
//!
//! ```bash
//! # Four scales (64, 128, 256, 512 channels) at 64, 32, 16 and 8 pixels
//! cargo run --bin segformer-demo
//!
//! # Load a head configuration saved with `Config::save`
//! cargo run --bin segformer-demo -- --config head.json --image-size 128
//!
//! # Write the summary to a file and show debug logs
//! RUST_LOG=debug cargo run --bin segformer-demo -- --output summary.json
//! ```

use std::{fs, path::PathBuf, time::Instant};

use anyhow::{Context, Result};
use burn::{
    backend::Autodiff,
    prelude::*,
    tensor::{Distribution, ElementConversion},
};
use clap::Parser;
use segformer_burn::{
    AdversarialInput, DecoderParams, DomainDiscriminatorConfig, LogVars, SegFormerHeadConfig,
};
use segformer_demos::{create_device, get_backend_name, SelectedBackend, SelectedDevice};
use serde::Serialize;

type DemoBackend = Autodiff<SelectedBackend>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Head configuration file (JSON); the four-scale scenario is used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of samples per batch
    #[arg(short, long, default_value = "2")]
    batch_size: usize,

    /// Height and width of the finest backbone scale
    #[arg(long, default_value = "64")]
    image_size: usize,

    /// Number of segmentation classes for the built-in scenario
    #[arg(long, default_value = "19")]
    num_classes: usize,

    /// Override the gradient reversal scale
    #[arg(long)]
    alpha: Option<f64>,

    /// Random seed for weights and inputs
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Write the JSON summary to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Serialize, Debug)]
struct DemoSummary {
    backend: &'static str,
    in_index: Vec<usize>,
    feature_shapes: Vec<[usize; 4]>,
    seg_logits_shape: [usize; 4],
    domain_logits_shape: [usize; 2],
    alpha: f32,
    log_vars: LogVars,
    total_loss: f64,
    /// Mean gradient per backbone scale after backpropagating the domain loss alone.
    adversarial_grad_mean: Vec<Option<f64>>,
    elapsed_ms: u128,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if args.batch_size == 0 {
        anyhow::bail!("Batch size must be positive");
    }
    if args.image_size < 8 || args.image_size % 8 != 0 {
        anyhow::bail!(
            "Image size must be a positive multiple of 8, got {}",
            args.image_size
        );
    }

    let mut config = match &args.config {
        Some(path) => SegFormerHeadConfig::load(path)
            .with_context(|| format!("Failed to load head config: {}", path.display()))?,
        None => default_config(&args),
    };
    if let Some(alpha) = args.alpha {
        config.adv_discriminator.alpha = alpha;
    }

    let device = create_device();
    tracing::info!(backend = get_backend_name(), seed = args.seed, "starting demo");
    DemoBackend::seed(args.seed);

    let head = config
        .init::<DemoBackend>(&device)
        .context("Failed to build SegFormer head")?;

    let start = Instant::now();
    let features = random_features(&config, &args, &device);
    let feature_shapes = features.iter().map(Tensor::dims).collect::<Vec<_>>();
    tracing::info!(?feature_shapes, "generated backbone features");

    let output = head.forward(&features)?;
    let seg_logits_shape = output.seg_logits.dims();
    let domain_logits_shape = output.domain_logits.dims();
    tracing::info!(?seg_logits_shape, ?domain_logits_shape, "forward pass done");

    let [batch, _, height, width] = seg_logits_shape;
    let seg_label = Tensor::<DemoBackend, 3, Int>::random(
        [batch, height, width],
        Distribution::Uniform(0.0, config.num_classes as f64),
        &device,
    );
    // First half source domain, second half target domain.
    let domain_labels = Tensor::<DemoBackend, 1, Int>::from_data(
        TensorData::new(
            (0..batch)
                .map(|i| i64::from(i >= batch / 2))
                .collect::<Vec<_>>(),
            [batch],
        ),
        &device,
    );

    let losses = head.forward_train(&features, seg_label, domain_labels)?;
    for (name, value) in &losses.log_vars {
        tracing::info!(name = name.as_str(), value, "training statistic");
    }
    let total_loss = losses.total().into_scalar().elem::<f64>();

    let grads = losses.loss_adv.backward();
    let adversarial_grad_mean = features
        .iter()
        .map(|feature| {
            feature
                .grad(&grads)
                .map(|grad| grad.mean().into_scalar().elem::<f64>())
        })
        .collect();

    let summary = DemoSummary {
        backend: get_backend_name(),
        in_index: head.in_index().to_vec(),
        feature_shapes,
        seg_logits_shape,
        domain_logits_shape,
        alpha: head.discriminator().alpha(),
        log_vars: losses.log_vars,
        total_loss,
        adversarial_grad_mean,
        elapsed_ms: start.elapsed().as_millis(),
    };

    let json = serde_json::to_string_pretty(&summary)?;
    match &args.output {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("Failed to write summary: {}", path.display()))?;
            tracing::info!(path = %path.display(), "summary written");
        }
        None => println!("{json}"),
    }

    Ok(())
}

/// Four scales at 1/1, 1/2, 1/4 and 1/8 of `image_size`, discriminator on the coarsest.
fn default_config(args: &Args) -> SegFormerHeadConfig {
    let coarsest = args.image_size / 8;

    SegFormerHeadConfig::new(
        vec![64, 128, 256, 512],
        vec![0, 1, 2, 3],
        args.num_classes,
        DomainDiscriminatorConfig::new(512 * coarsest * coarsest, 256),
    )
    .with_decoder_params(DecoderParams::new().with_embed_dim(256))
    .with_adversarial_input(AdversarialInput::Scale(3))
}

/// One random feature map per backbone scale up to the largest configured index.
///
/// Scale `i` has `image_size / 2^i` pixels per side. Scales the head does not consume get
/// a single channel.
fn random_features(
    config: &SegFormerHeadConfig,
    args: &Args,
    device: &SelectedDevice,
) -> Vec<Tensor<DemoBackend, 4>> {
    let num_scales = config.in_index.iter().max().map_or(0, |&max| max + 1);

    (0..num_scales)
        .map(|scale| {
            let channels = config
                .in_index
                .iter()
                .position(|&index| index == scale)
                .map_or(1, |position| config.in_channels[position]);
            let size = (args.image_size >> scale).max(1);

            Tensor::random(
                [args.batch_size, channels, size, size],
                Distribution::Normal(0.0, 1.0),
                device,
            )
            .require_grad()
        })
        .collect()
}
