#![allow(dead_code)]

use data_conveyor::checkpoint::WeightsLayout;
use image::{DynamicImage, Rgb, RgbImage};
use std::fs;
use std::path::Path;

/// Creates an image where red encodes the column and green the row,
/// so flips and crops are detectable from pixel values.
pub fn gradient_image(width: u32, height: u32) -> DynamicImage {
    let mut img = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let r = (x * 255 / width) as u8;
            let g = (y * 255 / height) as u8;
            img.put_pixel(x, y, Rgb([r, g, 64]));
        }
    }
    DynamicImage::ImageRgb8(img)
}

/// Writes distinguishable weights/state payloads into `dir` and returns them.
pub fn write_artifacts(dir: &Path, tag: u8) -> (Vec<u8>, Vec<u8>) {
    let weights: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8 ^ tag).collect();
    let state: Vec<u8> = format!("optimizer-state-{tag}").into_bytes();
    fs::write(dir.join(WeightsLayout::WEIGHTS_FILE_NAME), &weights).unwrap();
    fs::write(dir.join(WeightsLayout::STATE_FILE_NAME), &state).unwrap();
    (weights, state)
}
