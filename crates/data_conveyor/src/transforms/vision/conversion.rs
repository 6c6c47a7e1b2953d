use crate::transforms::Item;
use anyhow::{ensure, Context, Result};
use image::{DynamicImage, GenericImageView};
use tch::{Kind, Tensor};

// ============================================================================
// ToTensor
// ============================================================================

/// Converts an HWC image to a channel-first `[C, H, W]` f32 tensor.
///
/// 8-bit images are scaled into `[0.0, 1.0]`; float images keep their
/// values. A tensor input is only cast to f32.
///
/// Channel Handling
/// | Input Format        | Output Shape |
/// |---------------------|--------------|
/// | Grayscale (L)       | `[1, H, W]`  |
/// | Grayscale + alpha   | `[2, H, W]`  |
/// | RGB / RGB f32       | `[3, H, W]`  |
/// | RGBA / RGBA f32     | `[4, H, W]`  |
/// | Other               | `[3, H, W]`  |
/// Note: 16-bit and other formats are converted to RGB8 first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToTensor;

impl ToTensor {
    pub fn process(&self, item: Item) -> Result<Item> {
        let img = match item {
            Item::Tensor(tensor) => return Ok(Item::Tensor(tensor.to_kind(Kind::Float))),
            Item::Image(img) => img,
        };

        let (width, height) = img.dimensions();
        ensure!(
            width > 0 && height > 0,
            "Image dimensions must be positive (got {}x{})",
            width,
            height
        );
        let hwc = |channels: i64| [height as i64, width as i64, channels];

        let tensor = match img {
            DynamicImage::ImageLuma8(img) => scale_u8(Tensor::from_slice(img.as_raw()).reshape(&hwc(1)))?,
            DynamicImage::ImageLumaA8(img) => scale_u8(Tensor::from_slice(img.as_raw()).reshape(&hwc(2)))?,
            DynamicImage::ImageRgb8(img) => scale_u8(Tensor::from_slice(img.as_raw()).reshape(&hwc(3)))?,
            DynamicImage::ImageRgba8(img) => scale_u8(Tensor::from_slice(img.as_raw()).reshape(&hwc(4)))?,
            DynamicImage::ImageRgb32F(img) => Tensor::from_slice(img.as_raw()).reshape(&hwc(3)),
            DynamicImage::ImageRgba32F(img) => Tensor::from_slice(img.as_raw()).reshape(&hwc(4)),
            // Handle all other cases via conversion to RGB
            other => {
                let rgb = other.to_rgb8();
                scale_u8(Tensor::from_slice(rgb.as_raw()).reshape(&hwc(3)))?
            }
        };

        Ok(Item::Tensor(tensor.permute(&[2, 0, 1]).contiguous()))
    }
}

/// Casts 8-bit samples to f32 and scales them into `[0, 1]`.
fn scale_u8(tensor: Tensor) -> Result<Tensor> {
    tensor
        .to_kind(Kind::Float)
        .f_div_scalar(255.0)
        .context("Failed to normalize tensor values")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgb32FImage, RgbImage};

    fn test_rgb_image() -> DynamicImage {
        let mut img = RgbImage::new(4, 2);
        for x in 0..4 {
            for y in 0..2 {
                img.put_pixel(x, y, Rgb([(x * 85) as u8, (y * 255) as u8, 128]));
            }
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_to_tensor() -> Result<()> {
        let tensor = ToTensor.process(Item::Image(test_rgb_image()))?.into_tensor()?;
        assert_eq!(tensor.size(), vec![3, 2, 4]); // CHW format
        assert_eq!(tensor.kind(), Kind::Float);

        // Verify normalization to [0,1]
        let min = tensor.f_min()?.double_value(&[]);
        let max = tensor.f_max()?.double_value(&[]);
        assert!(min >= 0.0 && max <= 1.0);
        Ok(())
    }

    #[test]
    fn test_to_tensor_is_channel_first() -> Result<()> {
        let tensor = ToTensor.process(Item::Image(test_rgb_image()))?.into_tensor()?;
        // Red of pixel (x=3, y=0) is 255; green of row 1 is 255; blue is constant.
        assert!((tensor.double_value(&[0, 0, 3]) - 1.0).abs() < 1e-6);
        assert!((tensor.double_value(&[1, 1, 0]) - 1.0).abs() < 1e-6);
        assert!((tensor.double_value(&[2, 1, 2]) - 128.0 / 255.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_float_image_is_not_rescaled() -> Result<()> {
        let img = Rgb32FImage::from_pixel(2, 2, Rgb([2.5, -1.0, 0.5]));
        let tensor = ToTensor
            .process(Item::Image(DynamicImage::ImageRgb32F(img)))?
            .into_tensor()?;
        assert!((tensor.double_value(&[0, 1, 1]) - 2.5).abs() < 1e-6);
        assert!((tensor.double_value(&[1, 0, 0]) + 1.0).abs() < 1e-6);
        Ok(())
    }
}
