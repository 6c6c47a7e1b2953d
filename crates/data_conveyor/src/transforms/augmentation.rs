//! Percentage-gated augmentation steps.
//!
//! An [`Augmentation`] pairs an [`Op`] (what to do, with its parameters)
//! with the percentage of items it should touch. Every variant goes through
//! the same gate and the same config serializer, so adding a variant means
//! adding an `Op` arm and a registry entry.

use crate::error::ConfigError;
use crate::transforms::config::AugmentationConfig;
use crate::transforms::vision::{
    geometric, Blur, CentralCrop, GaussNoise, Normalize, RandomBrightness, RandomContrast,
    RandomCrop, RandomRotate, Resize, SaltPepperNoise, ToTensor,
};
use crate::transforms::{registry, Item, Transform};
use anyhow::{Context, Result};
use image::DynamicImage;
use rand::Rng;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::trace;

/// One image operation and its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    HorizontalFlip,
    VerticalFlip,
    GaussNoise(GaussNoise),
    SaltPepperNoise(SaltPepperNoise),
    Blur(Blur),
    Resize(Resize),
    CentralCrop(CentralCrop),
    RandomCrop(RandomCrop),
    RandomRotate(RandomRotate),
    RandomBrightness(RandomBrightness),
    RandomContrast(RandomContrast),
    Normalize(Normalize),
    ToTensor,
}

impl Op {
    /// Registry key of this operation.
    pub fn key(&self) -> &'static str {
        match self {
            Op::HorizontalFlip => "hflip",
            Op::VerticalFlip => "vflip",
            Op::GaussNoise(_) => "gauss_noise",
            Op::SaltPepperNoise(_) => "snp_noise",
            Op::Blur(_) => "blur",
            Op::Resize(_) => "resize",
            Op::CentralCrop(_) => "ccrop",
            Op::RandomCrop(_) => "rcrop",
            Op::RandomRotate(_) => "rrotate",
            Op::RandomBrightness(_) => "rbrightness",
            Op::RandomContrast(_) => "rcontrast",
            Op::Normalize(_) => "normalize",
            Op::ToTensor => "to_pytorch",
        }
    }

    /// Deterministic operations ignore the configured percentage.
    pub fn is_always_applied(&self) -> bool {
        matches!(self, Op::Resize(_) | Op::Normalize(_) | Op::ToTensor)
    }

    /// Runs the operation unconditionally.
    pub fn process<R: Rng>(&self, item: Item, rng: &mut R) -> Result<Item> {
        match self {
            Op::Normalize(norm) => norm.process(item),
            Op::ToTensor => ToTensor.process(item),
            _ => {
                let img = item
                    .into_image()
                    .with_context(|| format!("`{}` needs an image", self.key()))?;
                self.process_image(img, rng).map(Item::Image)
            }
        }
    }

    fn process_image<R: Rng>(&self, img: DynamicImage, rng: &mut R) -> Result<DynamicImage> {
        Ok(match self {
            Op::HorizontalFlip => geometric::horizontal_flip(img),
            Op::VerticalFlip => geometric::vertical_flip(img),
            Op::GaussNoise(noise) => noise.process(img, rng),
            Op::SaltPepperNoise(noise) => noise.process(img, rng),
            Op::Blur(blur) => blur.process(img),
            Op::Resize(resize) => resize.process(img)?,
            Op::CentralCrop(crop) => crop.process(img),
            Op::RandomCrop(crop) => crop.process(img, rng),
            Op::RandomRotate(rotate) => rotate.process(img, rng),
            Op::RandomBrightness(brightness) => brightness.process(img, rng),
            Op::RandomContrast(contrast) => contrast.process(img, rng),
            // Dispatched on the item in `process`.
            Op::Normalize(_) | Op::ToTensor => img,
        })
    }

    /// Variant parameters in config form (without `percentage`).
    pub fn params(&self) -> Result<Map<String, Value>> {
        match self {
            Op::GaussNoise(p) => to_map(p),
            Op::SaltPepperNoise(p) => to_map(p),
            Op::Blur(p) => to_map(p),
            Op::Resize(p) => to_map(p),
            Op::CentralCrop(p) => to_map(p),
            Op::RandomCrop(p) => to_map(p),
            Op::RandomRotate(p) => to_map(p),
            Op::RandomBrightness(p) => to_map(p),
            Op::RandomContrast(p) => to_map(p),
            Op::HorizontalFlip | Op::VerticalFlip | Op::Normalize(_) | Op::ToTensor => {
                Ok(Map::new())
            }
        }
    }
}

fn to_map<T: Serialize>(params: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(params).context("Failed to serialize transform parameters")? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("Transform parameters serialized to a non-object: {other}"),
    }
}

/// An [`Op`] behind a percentage gate.
///
/// Each call draws an integer uniformly from `[1, 100]`; the op runs when
/// the draw is at most `percentage`, otherwise the item passes through
/// untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Augmentation {
    percentage: u8,
    op: Op,
}

impl Augmentation {
    /// Percentages above 100 are rejected. Resize, Normalize and ToTensor
    /// always run, whatever percentage is given.
    pub fn new(op: Op, percentage: u8) -> Result<Self, ConfigError> {
        if percentage > 100 {
            return Err(ConfigError::InvalidParameter {
                transform: op.key().to_string(),
                parameter: "percentage".to_string(),
                reason: format!("{percentage} is outside 0..=100"),
            });
        }
        let percentage = if op.is_always_applied() { 100 } else { percentage };
        Ok(Self { percentage, op })
    }

    /// Builds the transform registered under `key` from `config[key]`.
    pub fn from_config(config: &AugmentationConfig, key: &str) -> Result<Self> {
        let entry = registry::lookup(key).ok_or_else(|| ConfigError::UnknownTransform {
            key: key.to_string(),
        })?;
        let params = config.params(key)?;
        let percentage = params.percentage()?;
        let op = (entry.build)(&params)
            .with_context(|| format!("Failed to build transform `{key}`"))?;
        Ok(Self::new(op, percentage)?)
    }

    pub fn name(&self) -> &'static str {
        self.op.key()
    }

    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    pub fn op(&self) -> &Op {
        &self.op
    }

    /// Runs the op without consulting the gate.
    pub fn process<R: Rng>(&self, item: Item, rng: &mut R) -> Result<Item> {
        self.op.process(item, rng)
    }

    /// `{name: {"percentage": p, ...params}}`, the inverse of [`Augmentation::from_config`].
    pub fn config_fragment(&self) -> Result<AugmentationConfig> {
        let mut params = Map::new();
        params.insert("percentage".to_string(), Value::from(self.percentage));
        params.extend(self.op.params()?);

        let mut fragment = AugmentationConfig::new();
        fragment.insert(self.name(), Value::Object(params));
        Ok(fragment)
    }
}

impl Transform<Item, Item> for Augmentation {
    fn apply<R: Rng>(&self, item: Item, rng: &mut R) -> Result<Item> {
        let draw: u8 = rng.random_range(1..=100);
        if draw <= self.percentage {
            trace!(transform = self.name(), draw, "applying");
            self.process(item, rng)
        } else {
            Ok(item)
        }
    }
}
