pub mod checkpoint;
pub mod error;
pub mod transforms;

pub use checkpoint::{FileStructure, StatePacker, WeightsLayout};
pub use error::{CheckpointError, ConfigError};
pub use transforms::{Augmentation, AugmentationConfig, Item, Op, Pipeline, Transform};
