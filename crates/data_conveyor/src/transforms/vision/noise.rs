use super::{map_samples, Shape};
use crate::transforms::config::{Params, Scalar};
use anyhow::{ensure, Result};
use image::DynamicImage;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

// ============================================================================
// GaussNoise
// ============================================================================

/// Adds Gaussian noise rescaled into `[0, interval]`.
///
/// One N(`mean`, sqrt(`var`)) draw per sample is min-max normalized to
/// `[0, interval]` and added to the image; sums above 255 saturate and the
/// rest are truncated to 8 bits. Constant noise adds nothing. Float images
/// are quantized to RGB8 first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussNoise {
    pub mean: Scalar,
    pub var: Scalar,
    pub interval: Scalar,
}

impl GaussNoise {
    pub fn new(
        mean: impl Into<Scalar>,
        var: impl Into<Scalar>,
        interval: impl Into<Scalar>,
    ) -> Result<Self> {
        let (mean, var, interval) = (mean.into(), var.into(), interval.into());
        ensure!(
            var.get() >= 0.0,
            "Noise variance must be non-negative (got {})",
            var.get()
        );
        ensure!(
            interval.get() >= 0.0,
            "Noise interval must be non-negative (got {})",
            interval.get()
        );
        Ok(Self {
            mean,
            var,
            interval,
        })
    }

    pub fn from_params(params: &Params<'_>) -> Result<Self> {
        let var: Scalar = params.get("var")?;
        if var.get() < 0.0 {
            return Err(params.invalid("var", "must be non-negative").into());
        }
        Self::new(params.get::<Scalar>("mean")?, var, params.get::<Scalar>("interval")?)
    }

    pub fn process<R: Rng>(&self, img: DynamicImage, rng: &mut R) -> DynamicImage {
        let mean = self.mean.get();
        let sigma = self.var.get().sqrt();
        let interval = self.interval.get();
        map_samples(img, |samples, _| {
            let noise: Vec<f64> = (0..samples.len())
                .map(|_| mean + sigma * rng.sample::<f64, _>(StandardNormal))
                .collect();
            let (lo, hi) = noise
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &n| {
                    (lo.min(n), hi.max(n))
                });
            let range = hi - lo;

            for (sample, n) in samples.iter_mut().zip(noise) {
                let scaled = if range > 0.0 {
                    (n - lo) / range * interval
                } else {
                    0.0
                };
                let value = f64::from(*sample) + scaled;
                *sample = if value > 255.0 { 255 } else { value as u8 };
            }
        })
    }
}

// ============================================================================
// SaltPepperNoise
// ============================================================================

/// Sets `ceil(amount * size * s_vs_p)` positions to 255 ("salt") and then
/// `ceil(amount * size * (1 - s_vs_p))` positions to 0 ("pepper"), where
/// `size` counts every sample (`h * w * c`).
///
/// Row, column and channel of each position come from three independent
/// index vectors, one per axis, each drawn uniformly from `[0, len - 1)`.
/// The last row, column and channel are therefore never touched, and an
/// axis of length 1 always uses index 0. Float images are quantized to
/// RGB8 first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaltPepperNoise {
    pub s_vs_p: Scalar,
    pub amount: Scalar,
}

impl SaltPepperNoise {
    pub fn new(s_vs_p: impl Into<Scalar>, amount: impl Into<Scalar>) -> Result<Self> {
        let (s_vs_p, amount) = (s_vs_p.into(), amount.into());
        ensure!(
            (0.0..=1.0).contains(&s_vs_p.get()),
            "Salt-vs-pepper ratio must be in [0.0, 1.0] range (got {})",
            s_vs_p.get()
        );
        ensure!(
            amount.get() >= 0.0,
            "Noise amount must be non-negative (got {})",
            amount.get()
        );
        Ok(Self { s_vs_p, amount })
    }

    pub fn from_params(params: &Params<'_>) -> Result<Self> {
        let s_vs_p: Scalar = params.get("s_vs_p")?;
        if !(0.0..=1.0).contains(&s_vs_p.get()) {
            return Err(params.invalid("s_vs_p", "must be in [0.0, 1.0]").into());
        }
        Self::new(s_vs_p, params.get::<Scalar>("amount")?)
    }

    pub fn process<R: Rng>(&self, img: DynamicImage, rng: &mut R) -> DynamicImage {
        let (s_vs_p, amount) = (self.s_vs_p.get(), self.amount.get());
        map_samples(img, |samples, shape| {
            if samples.is_empty() {
                return;
            }
            let size = samples.len() as f64;
            let salt = (amount * size * s_vs_p).ceil() as usize;
            scatter(samples, shape, salt, u8::MAX, rng);

            let pepper = (amount * size * (1.0 - s_vs_p)).ceil() as usize;
            scatter(samples, shape, pepper, 0, rng);
        })
    }
}

fn scatter<R: Rng>(samples: &mut [u8], shape: Shape, count: usize, value: u8, rng: &mut R) {
    let rows = axis_indices(shape.height, count, rng);
    let cols = axis_indices(shape.width, count, rng);
    let channels = axis_indices(shape.channels, count, rng);

    for ((row, col), channel) in rows.into_iter().zip(cols).zip(channels) {
        samples[shape.index(row, col, channel)] = value;
    }
}

fn axis_indices<R: Rng>(len: usize, count: usize, rng: &mut R) -> Vec<usize> {
    let upper = len.saturating_sub(1);
    (0..count)
        .map(|_| if upper == 0 { 0 } else { rng.random_range(0..upper) })
        .collect()
}

// ============================================================================
// Blur
// ============================================================================

/// Normalized box filter with a `[w, h]` kernel anchored at its center.
/// Borders are reflected without repeating the edge sample. Float images
/// are quantized to RGB8 first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blur {
    pub ksize: [u32; 2],
}

impl Blur {
    pub fn new(ksize: [u32; 2]) -> Result<Self> {
        ensure!(
            ksize[0] > 0 && ksize[1] > 0,
            "Blur kernel must be positive (got {:?})",
            ksize
        );
        Ok(Self { ksize })
    }

    pub fn from_params(params: &Params<'_>) -> Result<Self> {
        let ksize: [u32; 2] = params.get("ksize")?;
        if ksize.contains(&0) {
            return Err(params.invalid("ksize", "kernel dimensions must be positive").into());
        }
        Self::new(ksize)
    }

    pub fn process(&self, img: DynamicImage) -> DynamicImage {
        let [kw, kh] = self.ksize.map(|k| k as usize);
        map_samples(img, |samples, shape| {
            if samples.is_empty() {
                return;
            }
            let Shape {
                height,
                width,
                channels,
            } = shape;

            // Horizontal pass: window sums along each row.
            let mut row_sums = vec![0u64; samples.len()];
            for row in 0..height {
                for col in 0..width {
                    for channel in 0..channels {
                        row_sums[shape.index(row, col, channel)] = (0..kw)
                            .map(|k| {
                                let c = reflect_101(col as isize + k as isize - (kw / 2) as isize, width);
                                u64::from(samples[shape.index(row, c, channel)])
                            })
                            .sum();
                    }
                }
            }

            // Vertical pass over the row sums, then average.
            let area = (kw * kh) as u64;
            for row in 0..height {
                for col in 0..width {
                    for channel in 0..channels {
                        let total: u64 = (0..kh)
                            .map(|k| {
                                let r = reflect_101(row as isize + k as isize - (kh / 2) as isize, height);
                                row_sums[shape.index(r, col, channel)]
                            })
                            .sum();
                        samples[shape.index(row, col, channel)] =
                            ((total + area / 2) / area).min(255) as u8;
                    }
                }
            }
        })
    }
}

/// Maps an out-of-range index back inside `0..len` as `gfedcb|abcdefgh|gfedcba`.
fn reflect_101(i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let i = i.rem_euclid(period);
    if i >= len as isize {
        (period - i) as usize
    } else {
        i as usize
    }
}
