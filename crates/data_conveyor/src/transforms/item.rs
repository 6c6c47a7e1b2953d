use anyhow::{bail, Result};
use image::DynamicImage;
use tch::Tensor;

/// The value that flows through an augmentation pipeline.
///
/// Everything before `to_pytorch` works on an HWC image (8-bit or float
/// samples). `to_pytorch` turns it into a channel-first `[C, H, W]` float
/// tensor, after which only tensor-aware steps such as `normalize` apply.
#[derive(Debug)]
pub enum Item {
    Image(DynamicImage),
    Tensor(Tensor),
}

/// Creates a deep copy of the image or a shallow clone of the tensor,
/// matching how `Sample` clones its features.
impl Clone for Item {
    fn clone(&self) -> Self {
        match self {
            Item::Image(img) => Item::Image(img.clone()),
            Item::Tensor(tensor) => Item::Tensor(tensor.shallow_clone()),
        }
    }
}

impl Item {
    pub fn as_image(&self) -> Option<&DynamicImage> {
        match self {
            Item::Image(img) => Some(img),
            Item::Tensor(_) => None,
        }
    }

    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Item::Tensor(tensor) => Some(tensor),
            Item::Image(_) => None,
        }
    }

    /// Unwraps the image, failing if the item was already converted.
    pub fn into_image(self) -> Result<DynamicImage> {
        match self {
            Item::Image(img) => Ok(img),
            Item::Tensor(tensor) => bail!(
                "Expected an HWC image but got a tensor of shape {:?}; \
                 image transforms must run before `to_pytorch`",
                tensor.size()
            ),
        }
    }

    pub fn into_tensor(self) -> Result<Tensor> {
        match self {
            Item::Tensor(tensor) => Ok(tensor),
            Item::Image(_) => bail!("Expected a tensor but got an image; add `to_pytorch` first"),
        }
    }
}

impl From<DynamicImage> for Item {
    fn from(img: DynamicImage) -> Self {
        Item::Image(img)
    }
}

impl From<Tensor> for Item {
    fn from(tensor: Tensor) -> Self {
        Item::Tensor(tensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use tch::{Device, Kind};

    #[test]
    fn test_into_image_rejects_tensor() {
        let item = Item::from(Tensor::zeros(&[3, 2, 2], (Kind::Float, Device::Cpu)));
        let err = item.into_image().unwrap_err();
        assert!(err.to_string().contains("to_pytorch"));
    }

    #[test]
    fn test_image_round_trip() -> Result<()> {
        let img = DynamicImage::ImageRgb8(RgbImage::new(2, 3));
        let item = Item::from(img.clone());
        assert!(item.as_tensor().is_none());
        assert_eq!(item.into_image()?, img);
        Ok(())
    }
}
