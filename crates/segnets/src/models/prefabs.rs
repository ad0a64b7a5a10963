//! # Well-Known Segmentation Model Configs
//!
//! ```rust,no_run
//! use segnets::models::prefabs::PREFAB_SEGMENTATION_MAP;
//!
//! let config = PREFAB_SEGMENTATION_MAP
//!     .expect_lookup_prefab("uresnet16")
//!     .new_config()
//!     .with_num_classes(2);
//! ```

use crate::models::segmentation::SegmentationModelConfig;
use crate::models::unet::UNetConfig;
use crate::models::uresnet::UResNetConfig;
use crate::utility::prefabs::{PreFabConfig, StaticPreFabConfig, StaticPreFabMap};

/// Static builder for [`SegmentationPreFabConfig`].
pub type StaticSegmentationPreFabConfig = StaticPreFabConfig<SegmentationModelConfig>;

/// A [`SegmentationModelConfig`] Well-Known Pre-Fab.
pub type SegmentationPreFabConfig = PreFabConfig<SegmentationModelConfig>;

/// Well-known [`SegmentationModelConfig`]s.
pub static PREFAB_SEGMENTATION_MAP: StaticPreFabMap<SegmentationModelConfig> = StaticPreFabMap {
    name: "segmentation",
    description: "Well-Known UNet and UResNet configs",

    items: &[
        &StaticPreFabConfig {
            name: "unet",
            description: "UNet, RGB in, 2 classes, width 64, bilinear upsampling",
            builder: || UNetConfig::new(3, 2).into(),
        },
        &StaticPreFabConfig {
            name: "unet-transposed",
            description: "UNet, RGB in, 2 classes, width 64, transposed conv upsampling",
            builder: || UNetConfig::new(3, 2).with_bilinear(false).into(),
        },
        &StaticPreFabConfig {
            name: "unet-small",
            description: "UNet, RGB in, 2 classes, width 16, bilinear upsampling",
            builder: || UNetConfig::new(3, 2).with_base_width(16).into(),
        },
        &StaticPreFabConfig {
            name: "uresnet16",
            description: "UResNet, RGB in, 3 classes, inplanes 16",
            builder: || UResNetConfig::new().into(),
        },
        &StaticPreFabConfig {
            name: "uresnet16-mono",
            description: "UResNet, 1 channel in, 2 classes, inplanes 16",
            builder: || {
                UResNetConfig::new()
                    .with_input_channels(1)
                    .with_num_classes(2)
                    .into()
            },
        },
        &StaticPreFabConfig {
            name: "uresnet32",
            description: "UResNet, RGB in, 3 classes, inplanes 32",
            builder: || UResNetConfig::new().with_inplanes(32).into(),
        },
    ],
};

#[cfg(test)]
mod tests {
    use super::*;
    use burn::config::Config;
    use std::collections::HashSet;

    #[test]
    fn test_prefab_names_unique() {
        let names = PREFAB_SEGMENTATION_MAP.names();
        assert_eq!(
            names,
            vec![
                "unet",
                "unet-transposed",
                "unet-small",
                "uresnet16",
                "uresnet16-mono",
                "uresnet32"
            ]
        );
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn test_lookup_prefab() {
        let prefab = PREFAB_SEGMENTATION_MAP.expect_lookup_prefab("uresnet16-mono");
        let config = prefab.new_config();
        assert_eq!(config.family(), "uresnet");
        assert_eq!(config.input_channels(), 1);
        assert_eq!(config.num_classes(), 2);

        let prefab: SegmentationPreFabConfig = prefab.into();
        assert_eq!(prefab.name, "uresnet16-mono");
        assert_eq!(prefab.new_config().num_classes(), 2);

        match PREFAB_SEGMENTATION_MAP
            .expect_lookup_prefab("unet-transposed")
            .new_config()
        {
            SegmentationModelConfig::UNet(config) => {
                assert!(!config.bilinear);
                assert_eq!(config.base_width, 64);
            }
            other => panic!("unexpected config: {other:?}"),
        }

        assert!(PREFAB_SEGMENTATION_MAP.lookup_prefab("resnet18").is_none());
    }

    #[test]
    fn test_try_lookup_prefab_error() {
        let err = PREFAB_SEGMENTATION_MAP
            .try_lookup_prefab("segformer")
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("\"segformer\""), "{msg}");
        assert!(msg.contains("uresnet32"), "{msg}");
    }

    #[test]
    #[should_panic(expected = "No segmentation prefab named")]
    fn test_expect_lookup_prefab_panics() {
        PREFAB_SEGMENTATION_MAP.expect_lookup_prefab("nope");
    }

    #[test]
    fn test_prefab_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();

        for prefab in PREFAB_SEGMENTATION_MAP.items {
            let config = prefab.new_config();
            let path = dir.path().join(format!("{}.json", prefab.name));
            config.save(&path).unwrap();

            let loaded = SegmentationModelConfig::load(&path).unwrap();
            assert_eq!(loaded.family(), config.family());
            assert_eq!(loaded.input_channels(), config.input_channels());
            assert_eq!(loaded.num_classes(), config.num_classes());
            assert_eq!(format!("{loaded:?}"), format!("{config:?}"));
        }
    }
}
