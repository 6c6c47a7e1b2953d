use super::{is_float, map_float_samples, map_samples, Sample, Shape};
use crate::transforms::config::Params;
use anyhow::{ensure, Result};
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Bilinear, the usual default for training-time resizing.
const FILTER: FilterType = FilterType::Triangle;

// ============================================================================
// Size
// ============================================================================

/// Target size as written in the config: `[w, h]` or a single number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Size {
    Exact([u32; 2]),
    Edge(u32),
}

impl Size {
    /// `(width, height)`; a scalar means a square.
    pub fn dims(&self) -> (u32, u32) {
        match *self {
            Size::Exact([w, h]) => (w, h),
            Size::Edge(s) => (s, s),
        }
    }

    fn from_params(params: &Params<'_>) -> Result<Self> {
        let size: Size = params.get("size")?;
        let (w, h) = size.dims();
        if w == 0 || h == 0 {
            return Err(params.invalid("size", "dimensions must be positive").into());
        }
        Ok(size)
    }
}

// ============================================================================
// Flips
// ============================================================================

/// Mirrors the image across its vertical axis.
pub fn horizontal_flip(img: DynamicImage) -> DynamicImage {
    img.fliph()
}

/// Mirrors the image across its horizontal axis.
pub fn vertical_flip(img: DynamicImage) -> DynamicImage {
    img.flipv()
}

// ============================================================================
// Resize
// ============================================================================

/// Deterministic resize.
///
/// - `Size::Exact([w, h])` resizes to exactly `w × h`.
/// - `Size::Edge(s)` scales the shorter edge to `s` and the longer one to
///   `s * long / short` (integer division), keeping the aspect ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resize {
    pub size: Size,
}

impl Resize {
    pub fn new(size: Size) -> Self {
        Self { size }
    }

    pub fn from_params(params: &Params<'_>) -> Result<Self> {
        Ok(Self::new(Size::from_params(params)?))
    }

    pub fn target_dims(&self, width: u32, height: u32) -> (u32, u32) {
        match self.size {
            Size::Exact([w, h]) => (w, h),
            Size::Edge(edge) if height <= width => {
                let long = (u64::from(edge) * u64::from(width) / u64::from(height)) as u32;
                (long, edge)
            }
            Size::Edge(edge) => {
                let long = (u64::from(edge) * u64::from(height) / u64::from(width)) as u32;
                (edge, long)
            }
        }
    }

    pub fn process(&self, img: DynamicImage) -> Result<DynamicImage> {
        let (width, height) = img.dimensions();
        ensure!(
            width > 0 && height > 0,
            "Cannot resize an empty image ({}x{})",
            width,
            height
        );
        let (w, h) = self.target_dims(width, height);
        ensure!(
            w > 0 && h > 0,
            "Image dimensions must be positive after resizing (got {}x{})",
            w,
            h
        );
        Ok(img.resize_exact(w, h, FILTER))
    }
}

// ============================================================================
// CentralCrop
// ============================================================================

/// Crops the centered `w × h` window. An axis whose requested length is at
/// least the image length is kept whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentralCrop {
    pub size: Size,
}

impl CentralCrop {
    pub fn new(size: Size) -> Self {
        Self { size }
    }

    pub fn from_params(params: &Params<'_>) -> Result<Self> {
        Ok(Self::new(Size::from_params(params)?))
    }

    pub fn process(&self, img: DynamicImage) -> DynamicImage {
        let (width, height) = img.dimensions();
        let (crop_w, crop_h) = self.size.dims();
        let (x, w) = centered(width, crop_w);
        let (y, h) = centered(height, crop_h);
        img.crop_imm(x, y, w, h)
    }
}

fn centered(len: u32, crop: u32) -> (u32, u32) {
    if crop >= len {
        (0, len)
    } else {
        ((len - crop) / 2, crop)
    }
}

// ============================================================================
// RandomCrop
// ============================================================================

/// Crops a `w × h` window at a uniformly random offset. On an axis where the
/// requested length is at least the image length the offset is 0 and the
/// axis is kept whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomCrop {
    pub size: Size,
}

impl RandomCrop {
    pub fn new(size: Size) -> Self {
        Self { size }
    }

    pub fn from_params(params: &Params<'_>) -> Result<Self> {
        Ok(Self::new(Size::from_params(params)?))
    }

    pub fn process<R: Rng>(&self, img: DynamicImage, rng: &mut R) -> DynamicImage {
        let (width, height) = img.dimensions();
        let (crop_w, crop_h) = self.size.dims();
        let (x, w) = random_window(width, crop_w, rng);
        let (y, h) = random_window(height, crop_h, rng);
        img.crop_imm(x, y, w, h)
    }
}

fn random_window<R: Rng>(len: u32, crop: u32, rng: &mut R) -> (u32, u32) {
    if len > crop {
        (rng.random_range(0..=len - crop), crop)
    } else {
        (0, len)
    }
}

// ============================================================================
// RandomRotate
// ============================================================================

/// Rotates by a random whole-degree angle from `interval` (inclusive),
/// counter-clockwise about the image center, then trims the black corners
/// and scales back to the original size. Float images stay float and keep
/// values outside `[0, 1]`.
///
/// The trim is `|floor(rows / (2 + 1 / tan(angle)))|` pixels from every
/// side. An angle of 0 returns the image untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomRotate {
    pub interval: [i32; 2],
}

impl RandomRotate {
    pub fn new(interval: [i32; 2]) -> Result<Self> {
        ensure!(
            interval[0] <= interval[1],
            "Rotation interval must be ordered (got {:?})",
            interval
        );
        Ok(Self { interval })
    }

    pub fn from_params(params: &Params<'_>) -> Result<Self> {
        let interval: [i32; 2] = params.get("interval")?;
        if interval[0] > interval[1] {
            return Err(params.invalid("interval", "min must not exceed max").into());
        }
        Self::new(interval)
    }

    pub fn process<R: Rng>(&self, img: DynamicImage, rng: &mut R) -> DynamicImage {
        let angle = rng.random_range(self.interval[0]..=self.interval[1]);
        if angle == 0 {
            return img;
        }
        rotate_and_trim(img, angle)
    }
}

/// Trim applied on each side after rotating an image with `rows` rows.
pub(crate) fn trim_offset(rows: u32, angle: i32) -> u32 {
    let denom = 2.0 + 1.0 / f64::from(angle).to_radians().tan();
    (f64::from(rows) / denom).floor().abs() as u32
}

fn rotate_and_trim(img: DynamicImage, angle: i32) -> DynamicImage {
    let degrees = f64::from(angle);
    let (cols, rows) = img.dimensions();
    let offset = trim_offset(rows, angle);

    // A trim that would swallow the whole image is skipped.
    let offset = if offset.saturating_mul(2) < rows && offset.saturating_mul(2) < cols {
        offset
    } else {
        0
    };

    if is_float(&img) {
        map_float_samples(img, |samples, shape| {
            rotate_samples(samples, shape, degrees, offset)
        })
    } else {
        map_samples(img, |samples, shape| {
            rotate_samples(samples, shape, degrees, offset)
        })
    }
}

/// Counter-clockwise rotation about `(cols / 2, rows / 2)`, trimmed by
/// `offset` pixels on every side and stretched back to the full size, in a
/// single bilinear inverse mapping. Pixels that map outside the source are 0.
fn rotate_samples<S: Sample>(samples: &mut [S], shape: Shape, degrees: f64, offset: u32) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let source = samples.to_vec();
    let cx = shape.width as f64 / 2.0;
    let cy = shape.height as f64 / 2.0;

    let offset = f64::from(offset);
    let scale_x = (shape.width as f64 - 2.0 * offset) / shape.width as f64;
    let scale_y = (shape.height as f64 - 2.0 * offset) / shape.height as f64;

    let sample_at = |row: isize, col: isize, channel: usize| -> f64 {
        if row < 0 || col < 0 || row as usize >= shape.height || col as usize >= shape.width {
            0.0
        } else {
            source[shape.index(row as usize, col as usize, channel)].to_f64()
        }
    };

    for row in 0..shape.height {
        for col in 0..shape.width {
            // Position in the rotated (untrimmed) frame.
            let rx = (col as f64 + 0.5) * scale_x - 0.5 + offset;
            let ry = (row as f64 + 0.5) * scale_y - 0.5 + offset;

            let dx = rx - cx;
            let dy = ry - cy;
            let sx = cos * dx - sin * dy + cx;
            let sy = sin * dx + cos * dy + cy;

            let x0 = sx.floor();
            let y0 = sy.floor();
            let fx = sx - x0;
            let fy = sy - y0;
            let (x0, y0) = (x0 as isize, y0 as isize);

            for channel in 0..shape.channels {
                let top = sample_at(y0, x0, channel) * (1.0 - fx)
                    + sample_at(y0, x0 + 1, channel) * fx;
                let bottom = sample_at(y0 + 1, x0, channel) * (1.0 - fx)
                    + sample_at(y0 + 1, x0 + 1, channel) * fx;
                samples[shape.index(row, col, channel)] = S::from_f64(top * (1.0 - fy) + bottom * fy);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::vision::test_utils::gradient_image;
    use image::{Rgb, Rgb32FImage};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_flips_are_self_inverse() {
        let img = gradient_image(5, 4);
        assert_eq!(horizontal_flip(horizontal_flip(img.clone())), img);
        assert_eq!(vertical_flip(vertical_flip(img.clone())), img);
        assert_ne!(horizontal_flip(img.clone()), img);
    }

    #[test]
    fn test_resize_exact() -> Result<()> {
        let img = gradient_image(100, 50);
        let resized = Resize::new(Size::Exact([64, 32])).process(img)?;
        assert_eq!(resized.dimensions(), (64, 32));
        Ok(())
    }

    #[test]
    fn test_resize_by_shorter_edge() -> Result<()> {
        let landscape = Resize::new(Size::Edge(20)).process(gradient_image(100, 50))?;
        assert_eq!(landscape.dimensions(), (40, 20));

        let portrait = Resize::new(Size::Edge(30)).process(gradient_image(45, 90))?;
        assert_eq!(portrait.dimensions(), (30, 60));
        Ok(())
    }

    #[test]
    fn test_central_crop_full_size_is_identity() {
        let img = gradient_image(8, 6);
        let crop = CentralCrop::new(Size::Exact([8, 6]));
        assert_eq!(crop.process(img.clone()), img);
    }

    #[test]
    fn test_central_crop_window() {
        let img = gradient_image(10, 10);
        let cropped = CentralCrop::new(Size::Edge(4)).process(img.clone());
        assert_eq!(cropped.dimensions(), (4, 4));
        assert_eq!(cropped.get_pixel(0, 0), img.get_pixel(3, 3));
    }

    #[test]
    fn test_random_crop_oversized_axis_starts_at_zero() {
        let img = gradient_image(10, 6);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            // Width is cropped, height is larger than the image.
            let cropped = RandomCrop::new(Size::Exact([4, 50])).process(img.clone(), &mut rng);
            assert_eq!(cropped.dimensions(), (4, 6));
        }
        let whole = RandomCrop::new(Size::Edge(64)).process(img.clone(), &mut rng);
        assert_eq!(whole, img);
    }

    #[test]
    fn test_random_crop_stays_inside_image() {
        let img = gradient_image(12, 9);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let cropped = RandomCrop::new(Size::Exact([5, 3])).process(img.clone(), &mut rng);
            assert_eq!(cropped.dimensions(), (5, 3));
        }
    }

    #[test]
    fn test_rotate_zero_interval_is_identity() -> Result<()> {
        let img = gradient_image(7, 7);
        let mut rng = StdRng::seed_from_u64(0);
        let out = RandomRotate::new([0, 0])?.process(img.clone(), &mut rng);
        assert_eq!(out, img);
        Ok(())
    }

    #[test]
    fn test_rotate_keeps_dimensions() -> Result<()> {
        let img = gradient_image(40, 30);
        let mut rng = StdRng::seed_from_u64(5);
        let out = RandomRotate::new([10, 30])?.process(img, &mut rng);
        assert_eq!(out.dimensions(), (40, 30));
        Ok(())
    }

    #[test]
    fn test_rotate_keeps_float_samples() -> Result<()> {
        let img = DynamicImage::ImageRgb32F(Rgb32FImage::from_pixel(16, 16, Rgb([-1.5, 0.25, 2.0])));
        let mut rng = StdRng::seed_from_u64(0);
        let out = RandomRotate::new([10, 10])?.process(img, &mut rng);

        let rgb = out.as_rgb32f().expect("rotation must keep f32 samples");
        assert_eq!(rgb.dimensions(), (16, 16));
        let center = rgb.get_pixel(8, 8).0;
        assert!((center[0] + 1.5).abs() < 1e-4, "got {center:?}");
        assert!((center[2] - 2.0).abs() < 1e-4, "got {center:?}");
        Ok(())
    }

    #[test]
    fn test_trim_offset() {
        // 45°: rows / (2 + 1) = 33.3 → 33
        assert_eq!(trim_offset(100, 45), 33);
        // -10°: 100 / (2 - 5.67) = -27.2 → floor -28 → 28
        assert_eq!(trim_offset(100, -10), 28);
        assert_eq!(trim_offset(100, 10), 13);
    }

    #[test]
    fn test_rotate_rejects_reversed_interval() {
        assert!(RandomRotate::new([10, -10]).is_err());
    }
}
