//! # Segmentation Model Wrapper
//!
//! [`SegmentationModelConfig`] and [`SegmentationModel`] unify the
//! model families behind one config and one module, so callers
//! (and saved config files) can pick the family at runtime.

use crate::models::unet::{UNet, UNetConfig, UNetMeta};
use crate::models::uresnet::{UResNet, UResNetConfig, UResNetMeta};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`SegmentationModel`] Configuration.
#[derive(Config, Debug)]
pub enum SegmentationModelConfig {
    /// [`UNet`] model.
    UNet(UNetConfig),

    /// [`UResNet`] model.
    UResNet(UResNetConfig),
}

impl From<UNetConfig> for SegmentationModelConfig {
    fn from(config: UNetConfig) -> Self {
        Self::UNet(config)
    }
}

impl From<UResNetConfig> for SegmentationModelConfig {
    fn from(config: UResNetConfig) -> Self {
        Self::UResNet(config)
    }
}

impl SegmentationModelConfig {
    /// The model family name.
    pub fn family(&self) -> &'static str {
        match self {
            Self::UNet(_) => "unet",
            Self::UResNet(_) => "uresnet",
        }
    }

    /// Number of input channels.
    pub fn input_channels(&self) -> usize {
        match self {
            Self::UNet(config) => config.n_channels(),
            Self::UResNet(config) => config.input_channels(),
        }
    }

    /// Number of output classes.
    pub fn num_classes(&self) -> usize {
        match self {
            Self::UNet(config) => config.n_classes(),
            Self::UResNet(config) => config.num_classes(),
        }
    }

    /// Override the number of input channels.
    pub fn with_input_channels(
        self,
        input_channels: usize,
    ) -> Self {
        match self {
            Self::UNet(config) => Self::UNet(UNetConfig {
                n_channels: input_channels,
                ..config
            }),
            Self::UResNet(config) => Self::UResNet(config.with_input_channels(input_channels)),
        }
    }

    /// Override the number of output classes.
    pub fn with_num_classes(
        self,
        num_classes: usize,
    ) -> Self {
        match self {
            Self::UNet(config) => Self::UNet(UNetConfig {
                n_classes: num_classes,
                ..config
            }),
            Self::UResNet(config) => Self::UResNet(config.with_num_classes(num_classes)),
        }
    }

    /// Initialize a wrapped model.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> SegmentationModel<B> {
        match self {
            Self::UNet(config) => SegmentationModel::UNet(config.clone().init(device)),
            Self::UResNet(config) => SegmentationModel::UResNet(config.clone().init(device)),
        }
    }
}

/// Segmentation Model Wrapper.
#[derive(Module, Debug)]
pub enum SegmentationModel<B: Backend> {
    /// [`UNet`] model.
    UNet(UNet<B>),

    /// [`UResNet`] model.
    UResNet(UResNet<B>),
}

impl<B: Backend> SegmentationModel<B> {
    /// Number of input channels.
    pub fn input_channels(&self) -> usize {
        match self {
            Self::UNet(model) => model.n_channels(),
            Self::UResNet(model) => model.input_channels(),
        }
    }

    /// Number of output classes.
    pub fn num_classes(&self) -> usize {
        match self {
            Self::UNet(model) => model.n_classes(),
            Self::UResNet(model) => model.num_classes(),
        }
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, input_channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, num_classes, height, width]`` logits.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        match self {
            Self::UNet(model) => model.forward(input),
            Self::UResNet(model) => model.forward(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    #[test]
    fn test_config_overrides() {
        let config: SegmentationModelConfig = UNetConfig::new(3, 5).into();
        assert_eq!(config.family(), "unet");
        assert_eq!(config.input_channels(), 3);
        assert_eq!(config.num_classes(), 5);

        let config = config.with_input_channels(1).with_num_classes(2);
        assert_eq!(config.input_channels(), 1);
        assert_eq!(config.num_classes(), 2);

        let config: SegmentationModelConfig = UNetConfig::new(3, 5)
            .with_bilinear(false)
            .with_base_width(8)
            .into();
        match config.with_input_channels(4).with_num_classes(6) {
            SegmentationModelConfig::UNet(inner) => {
                assert_eq!(inner.n_channels, 4);
                assert_eq!(inner.n_classes, 6);
                assert!(!inner.bilinear);
                assert_eq!(inner.base_width, 8);
            }
            other => panic!("unexpected family: {other:?}"),
        }

        let config: SegmentationModelConfig = UResNetConfig::new().into();
        assert_eq!(config.family(), "uresnet");
        let config = config.with_input_channels(4).with_num_classes(7);
        match &config {
            SegmentationModelConfig::UResNet(inner) => {
                assert_eq!(inner.input_channels, 4);
                assert_eq!(inner.num_classes, 7);
                assert_eq!(inner.inplanes, 16);
            }
            _ => panic!("unexpected family: {config:?}"),
        }
    }

    #[test]
    fn test_wrapped_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let configs: Vec<SegmentationModelConfig> = vec![
            UNetConfig::new(2, 3).with_base_width(2).into(),
            UResNetConfig::new()
                .with_input_channels(2)
                .with_num_classes(3)
                .with_inplanes(2)
                .with_head_width(2)
                .into(),
        ];

        for config in configs {
            let model: SegmentationModel<B> = config.init(&device);
            assert_eq!(model.input_channels(), 2);
            assert_eq!(model.num_classes(), 3);

            let input = Tensor::random([1, 2, 20, 17], Distribution::Default, &device);
            let output = model.forward(input);
            assert_eq!(output.dims(), [1, 3, 20, 17]);
        }
    }
}
