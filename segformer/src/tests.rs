use burn::backend::{Autodiff, NdArray};

use crate::{
    config::{DecoderParams, DomainDiscriminatorConfig, NormLayer, SegFormerHeadConfig},
    error::SegFormerError,
};

pub type TestBackend = NdArray<f32>;

pub type TestAutodiffBackend = Autodiff<TestBackend>;

fn four_scale_config() -> SegFormerHeadConfig {
    SegFormerHeadConfig::new(
        vec![64, 128, 256, 512],
        vec![0, 1, 2, 3],
        19,
        DomainDiscriminatorConfig::new(256 * 64 * 64, 64),
    )
}

fn expect_invalid(config: &SegFormerHeadConfig, needle: &str) {
    match config.validate() {
        Err(SegFormerError::InvalidConfiguration { reason }) => {
            assert!(reason.contains(needle), "unexpected reason: {reason}");
        }
        other => panic!("Expected InvalidConfiguration error, got {other:?}"),
    }
}

#[test]
fn test_valid_configuration() {
    let config = four_scale_config();

    assert!(config.validate().is_ok());
    assert_eq!(config.fused_channels(), 1024);
    assert_eq!(config.decoder_params.padding(), 0);
}

#[test]
fn test_empty_in_index() {
    let mut config = four_scale_config();
    config.in_index = vec![];
    config.in_channels = vec![];

    expect_invalid(&config, "at least one backbone scale");
}

#[test]
fn test_channel_count_mismatch() {
    let mut config = four_scale_config();
    config.in_channels = vec![64, 128, 256];

    expect_invalid(&config, "in_channels has 3 entries");
}

#[test]
fn test_duplicate_scale_index() {
    let mut config = four_scale_config();
    config.in_index = vec![0, 1, 1, 3];

    expect_invalid(&config, "Scale index 1 is selected more than once");
}

#[test]
fn test_zero_channels() {
    let mut config = four_scale_config();
    config.in_channels = vec![64, 0, 256, 512];

    expect_invalid(&config, "Scale 1 has zero input channels");
}

#[test]
fn test_zero_classes() {
    let mut config = four_scale_config();
    config.num_classes = 0;

    expect_invalid(&config, "num_classes");
}

#[test]
fn test_dropout_out_of_range() {
    expect_invalid(&four_scale_config().with_dropout_ratio(1.0), "dropout_ratio");
    expect_invalid(&four_scale_config().with_dropout_ratio(-0.1), "dropout_ratio");
    assert!(four_scale_config().with_dropout_ratio(0.0).validate().is_ok());
}

#[test]
fn test_even_kernel_rejected() {
    let config = four_scale_config()
        .with_decoder_params(DecoderParams::new().with_conv_kernel_size(2));

    expect_invalid(&config, "conv_kernel_size must be odd");
}

#[test]
fn test_kernel_padding() {
    assert_eq!(DecoderParams::new().with_conv_kernel_size(3).padding(), 1);
    assert_eq!(DecoderParams::new().with_conv_kernel_size(7).padding(), 3);
}

#[test]
fn test_group_norm_divisibility() {
    expect_invalid(
        &four_scale_config().with_norm_cfg(NormLayer::GroupNorm(3)),
        "must divide embed_dim",
    );
    assert!(four_scale_config()
        .with_norm_cfg(NormLayer::GroupNorm(32))
        .validate()
        .is_ok());
}

#[test]
fn test_discriminator_validation() {
    let mut config = four_scale_config();
    config.adv_discriminator = DomainDiscriminatorConfig::new(16, 8).with_classes(0);
    expect_invalid(&config, "at least one class");

    config.adv_discriminator = DomainDiscriminatorConfig::new(0, 8);
    expect_invalid(&config, "non-empty");
}

#[test]
fn test_discriminator_class_count_is_not_enforced() {
    let device = Default::default();

    for classes in [1, 3] {
        let mut config = four_scale_config();
        config.adv_discriminator = DomainDiscriminatorConfig::new(16, 8).with_classes(classes);

        assert!(config.validate().is_ok());
        assert!(config.init::<TestBackend>(&device).is_ok());
    }
}

#[test]
fn test_init_rejects_invalid_configuration() {
    let device = Default::default();
    let mut config = four_scale_config();
    config.num_classes = 0;
    let result = config.init::<TestBackend>(&device);

    assert!(matches!(
        result,
        Err(SegFormerError::InvalidConfiguration { .. })
    ));
}

#[test]
fn test_config_json_round_trip() {
    use burn::config::Config;

    let config = four_scale_config()
        .with_norm_cfg(NormLayer::GroupNorm(16))
        .with_adversarial_input(crate::AdversarialInput::Scale(3));
    let restored = SegFormerHeadConfig::load_binary(config.to_string().as_bytes())
        .expect("config should deserialize");

    assert_eq!(restored.in_index, config.in_index);
    assert_eq!(restored.norm_cfg, NormLayer::GroupNorm(16));
    assert_eq!(restored.adversarial_input, crate::AdversarialInput::Scale(3));
    assert_eq!(restored.adv_discriminator.alpha, 1.0);
}
