use super::{is_float, map_float_samples, map_samples};
use crate::transforms::config::Params;
use crate::transforms::Item;
use anyhow::{ensure, Context, Result};
use image::{DynamicImage, Rgb32FImage};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tch::Tensor;

fn ordered_interval(params: &Params<'_>) -> Result<[i32; 2]> {
    let interval: [i32; 2] = params.get("interval")?;
    if interval[0] > interval[1] {
        return Err(params.invalid("interval", "min must not exceed max").into());
    }
    Ok(interval)
}

// ============================================================================
// RandomBrightness
// ============================================================================

/// Adds one random integer offset from `interval` (inclusive) to every
/// sample. 8-bit samples are clamped to `[0, 255]`; float samples are
/// shifted without clamping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomBrightness {
    pub interval: [i32; 2],
}

impl RandomBrightness {
    pub fn new(interval: [i32; 2]) -> Result<Self> {
        ensure!(
            interval[0] <= interval[1],
            "Brightness interval must be ordered (got {:?})",
            interval
        );
        Ok(Self { interval })
    }

    pub fn from_params(params: &Params<'_>) -> Result<Self> {
        Self::new(ordered_interval(params)?)
    }

    pub fn process<R: Rng>(&self, img: DynamicImage, rng: &mut R) -> DynamicImage {
        let offset = rng.random_range(self.interval[0]..=self.interval[1]);
        if is_float(&img) {
            let shift = offset as f32;
            return map_float_samples(img, |samples, _| {
                samples.iter_mut().for_each(|sample| *sample += shift);
            });
        }
        map_samples(img, |samples, _| {
            for sample in samples {
                *sample = (i32::from(*sample) + offset).clamp(0, 255) as u8;
            }
        })
    }
}

// ============================================================================
// RandomContrast
// ============================================================================

/// Scales every sample by `n / 100` for a random integer `n` from
/// `interval` (inclusive), clamped to `[0, 255]` and truncated to 8 bits.
/// Float images are quantized to RGB8 first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomContrast {
    pub interval: [i32; 2],
}

impl RandomContrast {
    pub fn new(interval: [i32; 2]) -> Result<Self> {
        ensure!(
            interval[0] <= interval[1],
            "Contrast interval must be ordered (got {:?})",
            interval
        );
        Ok(Self { interval })
    }

    pub fn from_params(params: &Params<'_>) -> Result<Self> {
        Self::new(ordered_interval(params)?)
    }

    pub fn process<R: Rng>(&self, img: DynamicImage, rng: &mut R) -> DynamicImage {
        let factor = f64::from(rng.random_range(self.interval[0]..=self.interval[1])) / 100.0;
        map_samples(img, |samples, _| {
            for sample in samples {
                *sample = (f64::from(*sample) * factor).clamp(0.0, 255.0) as u8;
            }
        })
    }
}

// ============================================================================
// Normalize
// ============================================================================

/// Normalizes using channel-wise statistics.
///
/// # Mathematical Operation:
/// ```text
/// output[c, h, w] = (input[c, h, w] - mean[c]) / std[c]
/// ```
///
/// Tensors are expected as `[C, H, W]`. Images are first converted to RGB
/// float samples in `[0, 1]` and stay in HWC layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalize {
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl Normalize {
    /// Creates new normalization parameters.
    pub fn new(mean: &[f32], std: &[f32]) -> Result<Self> {
        ensure!(!mean.is_empty(), "Normalization mean cannot be empty");
        ensure!(
            mean.len() == std.len(),
            "The mean and standard deviation for normalization must match in dimension. \
             The dimension of mean is {} but the dimension of std is {}.",
            mean.len(),
            std.len()
        );
        ensure!(
            std.iter().all(|s| *s != 0.0),
            "Normalization std must be non-zero"
        );
        Ok(Self {
            mean: mean.to_vec(),
            std: std.to_vec(),
        })
    }

    /// ImageNet standard normalization (RGB)
    pub fn imagenet() -> Self {
        Self {
            mean: vec![0.485, 0.456, 0.406],
            std: vec![0.229, 0.224, 0.225],
        }
    }

    pub fn process(&self, item: Item) -> Result<Item> {
        Ok(match item {
            Item::Tensor(tensor) => Item::Tensor(self.normalize_tensor(tensor)?),
            Item::Image(img) => Item::Image(self.normalize_image(img)?),
        })
    }

    fn normalize_tensor(&self, tensor: Tensor) -> Result<Tensor> {
        let (num_channels, _height, _width) = tensor
            .size3()
            .context("Input must be 3D tensor [C, H, W]")?;

        ensure!(
            num_channels as usize == self.mean.len(),
            "Channel count mismatch: input has {} channels but normalization expects {} ",
            num_channels,
            self.mean.len()
        );

        let mean_t = Tensor::from_slice(&self.mean)
            .reshape(&[num_channels, 1, 1])
            .to_kind(tensor.kind());

        let std_t = Tensor::from_slice(&self.std)
            .reshape(&[num_channels, 1, 1])
            .to_kind(tensor.kind());

        Ok((tensor - mean_t) / std_t)
    }

    fn normalize_image(&self, img: DynamicImage) -> Result<DynamicImage> {
        ensure!(
            self.mean.len() == 3,
            "Image normalization works on RGB; statistics have {} channels",
            self.mean.len()
        );
        let mut rgb: Rgb32FImage = img.to_rgb32f();
        for pixel in rgb.pixels_mut() {
            for (c, value) in pixel.0.iter_mut().enumerate() {
                *value = (*value - self.mean[c]) / self.std[c];
            }
        }
        Ok(DynamicImage::ImageRgb32F(rgb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::vision::test_utils::uniform_image;
    use image::{GrayImage, Luma, Rgb};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tch::{Device, Kind};

    #[test]
    fn test_brightness_clips_at_255() -> Result<()> {
        let img = uniform_image(4, 4, 240);
        let mut rng = StdRng::seed_from_u64(0);
        let out = RandomBrightness::new([30, 30])?.process(img, &mut rng);
        assert!(out.as_bytes().iter().all(|&v| v == 255));
        Ok(())
    }

    #[test]
    fn test_brightness_negative_clamps_at_zero() -> Result<()> {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, Luma([10])));
        let mut rng = StdRng::seed_from_u64(0);
        let out = RandomBrightness::new([-20, -20])?.process(img, &mut rng);
        assert_eq!(out.as_bytes(), &[0; 4]);
        Ok(())
    }

    #[test]
    fn test_brightness_shifts_float_samples_unclamped() -> Result<()> {
        let img = DynamicImage::ImageRgb32F(Rgb32FImage::from_pixel(2, 2, Rgb([-0.5, 0.5, 1.5])));
        let mut rng = StdRng::seed_from_u64(0);
        let out = RandomBrightness::new([-2, -2])?.process(img, &mut rng);
        let rgb = out.as_rgb32f().context("expected float image")?;
        assert_eq!(rgb.get_pixel(1, 1).0, [-2.5, -1.5, -0.5]);
        Ok(())
    }

    #[test]
    fn test_contrast_scales_and_truncates() -> Result<()> {
        let img = uniform_image(3, 3, 101);
        let mut rng = StdRng::seed_from_u64(0);
        let halved = RandomContrast::new([50, 50])?.process(img.clone(), &mut rng);
        assert!(halved.as_bytes().iter().all(|&v| v == 50));

        let tripled = RandomContrast::new([300, 300])?.process(img, &mut rng);
        assert!(tripled.as_bytes().iter().all(|&v| v == 255));
        Ok(())
    }

    #[test]
    fn test_normalize_tensor() -> Result<()> {
        let tensor = Tensor::ones(&[3, 32, 32], (Kind::Float, Device::Cpu));
        let norm = Normalize::new(&[1.0; 3], &[1.0; 3])?;

        let normalized = norm.process(Item::Tensor(tensor))?.into_tensor()?;

        // Check each channel's mean separately
        for c in 0..3 {
            let channel_mean = normalized.select(0, c).mean(Kind::Float);
            assert!(channel_mean.double_value(&[]).abs() < 1e-5);
        }
        Ok(())
    }

    #[test]
    fn test_normalize_tensor_channel_mismatch() {
        let tensor = Tensor::ones(&[1, 4, 4], (Kind::Float, Device::Cpu));
        assert!(Normalize::imagenet().process(Item::Tensor(tensor)).is_err());
    }

    #[test]
    fn test_normalize_image_produces_float_samples() -> Result<()> {
        let img = uniform_image(2, 2, 255);
        let out = Normalize::imagenet().process(Item::Image(img))?.into_image()?;
        let rgb = out.as_rgb32f().context("expected float image")?;
        let expected = (1.0 - 0.485) / 0.229;
        assert!((rgb.get_pixel(0, 0).0[0] - expected).abs() < 1e-5);
        Ok(())
    }
}
