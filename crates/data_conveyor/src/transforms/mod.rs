pub mod augmentation;
pub mod config;
pub mod core;
pub mod item;
pub mod pipeline;
pub mod registry;
pub mod vision;

pub use augmentation::{Augmentation, Op};
pub use config::{AugmentationConfig, Params, Scalar};
pub use core::Transform;
pub use item::Item;
pub use pipeline::Pipeline;
