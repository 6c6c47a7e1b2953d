//! Packing of model weights and optimizer state into one archive.
//!
//! ```ignore
//! let layout = WeightsLayout::new("runs/exp1/weights");
//! let mut packer = StatePacker::new(layout, None)?;
//! // ... training writes weights.pth and state.pth ...
//! packer.pack()?;
//! // ... later, to resume ...
//! packer.unpack()?;
//! let weights = &packer.get_files()[WEIGHTS_FILE];
//! ```

mod layout;
mod packer;

pub use layout::{FileStructure, WeightsLayout};
pub use packer::{StatePacker, PREV_START_PREFIX, STATE_FILE, WEIGHTS_FILE};
