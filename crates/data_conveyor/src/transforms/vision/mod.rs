//! src/transforms/vision/mod.rs
//!
//! Image operations behind each augmentation variant.
//!
//! # Module Organization
//!
//! ```text
//! transforms/vision/
//! ├── geometric.rs     → Spatial transformations (flip, resize, crop, rotate)
//! ├── photometric.rs   → Color and appearance (brightness, contrast, normalize)
//! ├── noise.rs         → Gaussian and salt-and-pepper noise, box blur
//! └── conversion.rs    → Format conversions (image → tensor)
//! ```
//!
//! Every operation takes its image by value and returns a new one. Pixel
//! level work happens on interleaved samples in HWC order. Float images
//! (for example after `normalize`) keep their f32 samples through rotation
//! and brightness; the noise, blur and contrast operations work on 8 bits
//! and quantize any other image to RGB8 first.

pub mod conversion;
pub mod geometric;
pub mod noise;
pub mod photometric;

pub use conversion::ToTensor;
pub use geometric::{CentralCrop, RandomCrop, RandomRotate, Resize, Size};
pub use noise::{Blur, GaussNoise, SaltPepperNoise};
pub use photometric::{Normalize, RandomBrightness, RandomContrast};

use image::DynamicImage;

/// Height, width and channel count of an interleaved sample buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Shape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl Shape {
    fn of(width: u32, height: u32, channels: usize) -> Self {
        Self {
            height: height as usize,
            width: width as usize,
            channels,
        }
    }

    /// Index of `(row, col, channel)` in the interleaved buffer.
    #[inline]
    pub fn index(&self, row: usize, col: usize, channel: usize) -> usize {
        (row * self.width + col) * self.channels + channel
    }
}

/// A sample type that pixel loops can read and write through `f64`.
pub(crate) trait Sample: Copy {
    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
}

impl Sample for u8 {
    #[inline]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    /// Rounds and saturates into `0..=255`.
    #[inline]
    fn from_f64(value: f64) -> Self {
        value.round().clamp(0.0, 255.0) as u8
    }
}

impl Sample for f32 {
    #[inline]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

/// `true` for images whose samples are `f32`.
pub(crate) fn is_float(img: &DynamicImage) -> bool {
    matches!(
        img,
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_)
    )
}

/// Runs `f` over the f32 samples of `img` and returns the updated image.
///
/// RGB and RGBA float images keep their layout; anything else is converted
/// to RGB f32 in `[0, 1]` first.
pub(crate) fn map_float_samples<F>(img: DynamicImage, f: F) -> DynamicImage
where
    F: FnOnce(&mut [f32], Shape),
{
    match img {
        DynamicImage::ImageRgb32F(mut buf) => {
            let shape = Shape::of(buf.width(), buf.height(), 3);
            f(&mut *buf, shape);
            DynamicImage::ImageRgb32F(buf)
        }
        DynamicImage::ImageRgba32F(mut buf) => {
            let shape = Shape::of(buf.width(), buf.height(), 4);
            f(&mut *buf, shape);
            DynamicImage::ImageRgba32F(buf)
        }
        other => map_float_samples(DynamicImage::ImageRgb32F(other.to_rgb32f()), f),
    }
}

/// Runs `f` over the 8-bit samples of `img` and returns the updated image.
///
/// Luma, LumaA, RGB and RGBA 8-bit images keep their layout; anything else
/// is converted to RGB8 first.
pub(crate) fn map_samples<F>(img: DynamicImage, f: F) -> DynamicImage
where
    F: FnOnce(&mut [u8], Shape),
{
    match img {
        DynamicImage::ImageLuma8(mut buf) => {
            let shape = Shape::of(buf.width(), buf.height(), 1);
            f(&mut *buf, shape);
            DynamicImage::ImageLuma8(buf)
        }
        DynamicImage::ImageLumaA8(mut buf) => {
            let shape = Shape::of(buf.width(), buf.height(), 2);
            f(&mut *buf, shape);
            DynamicImage::ImageLumaA8(buf)
        }
        DynamicImage::ImageRgb8(mut buf) => {
            let shape = Shape::of(buf.width(), buf.height(), 3);
            f(&mut *buf, shape);
            DynamicImage::ImageRgb8(buf)
        }
        DynamicImage::ImageRgba8(mut buf) => {
            let shape = Shape::of(buf.width(), buf.height(), 4);
            f(&mut *buf, shape);
            DynamicImage::ImageRgba8(buf)
        }
        other => map_samples(DynamicImage::ImageRgb8(other.to_rgb8()), f),
    }
}
