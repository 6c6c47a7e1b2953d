//! Static table from config key to transform constructor.

use crate::transforms::augmentation::{Augmentation, Op};
use crate::transforms::config::{AugmentationConfig, Params};
use crate::transforms::vision::{
    Blur, CentralCrop, GaussNoise, Normalize, RandomBrightness, RandomContrast, RandomCrop,
    RandomRotate, Resize, SaltPepperNoise,
};
use anyhow::Result;
use tracing::debug;

/// Builds an [`Op`] from the parameter object of its config entry.
pub type Constructor = fn(&Params<'_>) -> Result<Op>;

#[derive(Debug, Clone, Copy)]
pub struct Entry {
    pub key: &'static str,
    pub build: Constructor,
}

/// Every transform a config may name, keyed as it appears in config files.
pub static REGISTRY: &[Entry] = &[
    Entry { key: "hflip", build: hflip },
    Entry { key: "vflip", build: vflip },
    Entry { key: "gauss_noise", build: gauss_noise },
    Entry { key: "snp_noise", build: snp_noise },
    Entry { key: "blur", build: blur },
    Entry { key: "resize", build: resize },
    Entry { key: "ccrop", build: ccrop },
    Entry { key: "rcrop", build: rcrop },
    Entry { key: "rrotate", build: rrotate },
    Entry { key: "rbrightness", build: rbrightness },
    Entry { key: "rcontrast", build: rcontrast },
    Entry { key: "normalize", build: normalize },
    Entry { key: "to_pytorch", build: to_pytorch },
];

pub fn lookup(key: &str) -> Option<&'static Entry> {
    REGISTRY.iter().find(|entry| entry.key == key)
}

pub fn keys() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|entry| entry.key)
}

/// Builds one transform per config key, in declaration order.
///
/// Fails on the first key that is not registered or whose parameters are
/// missing or malformed; nothing is skipped.
pub fn build_pipeline(config: &AugmentationConfig) -> Result<Vec<Augmentation>> {
    config
        .keys()
        .map(|key| {
            let augmentation = Augmentation::from_config(config, key)?;
            debug!(
                transform = key,
                percentage = augmentation.percentage(),
                "built transform"
            );
            Ok(augmentation)
        })
        .collect()
}

fn hflip(_: &Params<'_>) -> Result<Op> {
    Ok(Op::HorizontalFlip)
}

fn vflip(_: &Params<'_>) -> Result<Op> {
    Ok(Op::VerticalFlip)
}

fn gauss_noise(params: &Params<'_>) -> Result<Op> {
    GaussNoise::from_params(params).map(Op::GaussNoise)
}

fn snp_noise(params: &Params<'_>) -> Result<Op> {
    SaltPepperNoise::from_params(params).map(Op::SaltPepperNoise)
}

fn blur(params: &Params<'_>) -> Result<Op> {
    Blur::from_params(params).map(Op::Blur)
}

fn resize(params: &Params<'_>) -> Result<Op> {
    Resize::from_params(params).map(Op::Resize)
}

fn ccrop(params: &Params<'_>) -> Result<Op> {
    CentralCrop::from_params(params).map(Op::CentralCrop)
}

fn rcrop(params: &Params<'_>) -> Result<Op> {
    RandomCrop::from_params(params).map(Op::RandomCrop)
}

fn rrotate(params: &Params<'_>) -> Result<Op> {
    RandomRotate::from_params(params).map(Op::RandomRotate)
}

fn rbrightness(params: &Params<'_>) -> Result<Op> {
    RandomBrightness::from_params(params).map(Op::RandomBrightness)
}

fn rcontrast(params: &Params<'_>) -> Result<Op> {
    RandomContrast::from_params(params).map(Op::RandomContrast)
}

fn normalize(_: &Params<'_>) -> Result<Op> {
    Ok(Op::Normalize(Normalize::imagenet()))
}

fn to_pytorch(_: &Params<'_>) -> Result<Op> {
    Ok(Op::ToTensor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use serde_json::{json, Map, Value};
    use std::collections::HashSet;

    /// Smallest valid parameter object for each key.
    fn sample_params(key: &str) -> Value {
        match key {
            "gauss_noise" => json!({"percentage": 10, "mean": 0.0, "var": 4.0, "interval": 25.0}),
            "snp_noise" => json!({"percentage": 10, "s_vs_p": 0.5, "amount": 0.01}),
            "blur" => json!({"percentage": 10, "ksize": [3, 3]}),
            "resize" | "ccrop" | "rcrop" => json!({"percentage": 10, "size": [32, 32]}),
            "rrotate" | "rbrightness" | "rcontrast" => {
                json!({"percentage": 10, "interval": [-5, 5]})
            }
            _ => json!({"percentage": 10}),
        }
    }

    #[test]
    fn test_keys_are_unique_and_match_ops() -> Result<()> {
        let unique: HashSet<_> = keys().collect();
        assert_eq!(unique.len(), REGISTRY.len());

        for entry in REGISTRY {
            let values = match sample_params(entry.key) {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            let op = (entry.build)(&Params::new(entry.key, &values))?;
            assert_eq!(op.key(), entry.key);
        }
        Ok(())
    }

    #[test]
    fn test_build_preserves_order() -> Result<()> {
        let mut config = AugmentationConfig::new();
        for key in ["to_pytorch", "rcrop", "hflip", "blur"] {
            config.insert(key, sample_params(key));
        }
        let names: Vec<_> = build_pipeline(&config)?.iter().map(|a| a.name()).collect();
        assert_eq!(names, ["to_pytorch", "rcrop", "hflip", "blur"]);
        Ok(())
    }

    #[test]
    fn test_tensor_conversion_registered_as_to_pytorch() -> Result<()> {
        let config = AugmentationConfig::from_value(json!({"to_pytorch": {"percentage": 100}}))?;
        let steps = build_pipeline(&config)?;
        assert_eq!(steps[0].op(), &Op::ToTensor);
        assert_eq!(steps[0].config_fragment()?, config);
        assert!(lookup("to_tensor").is_none());
        Ok(())
    }

    #[test]
    fn test_unknown_key_fails_fast() {
        let config = AugmentationConfig::from_value(json!({
            "hflip": {"percentage": 50},
            "sharpen": {"percentage": 50},
        }))
        .unwrap();
        let err = build_pipeline(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::UnknownTransform { key }) if key == "sharpen"
        ));
    }

    #[test]
    fn test_missing_parameter_fails() {
        let config =
            AugmentationConfig::from_value(json!({"gauss_noise": {"percentage": 50, "mean": 0}}))
                .unwrap();
        let err = build_pipeline(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingParameter { parameter, .. }) if parameter == "var"
        ));
    }
}
