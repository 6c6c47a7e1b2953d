use std::path::{Path, PathBuf};

/// Canonical locations of the training artifacts.
///
/// Implemented by whatever owns the run's directory structure; the packer
/// only asks it for paths and assumes the weights directory exists.
pub trait FileStructure {
    fn weights_dir(&self) -> PathBuf;
    fn weights_file(&self) -> PathBuf;
    fn optimizer_state_file(&self) -> PathBuf;
}

/// `weights.pth` and `state.pth` side by side in one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightsLayout {
    dir: PathBuf,
}

impl WeightsLayout {
    pub const WEIGHTS_FILE_NAME: &'static str = "weights.pth";
    pub const STATE_FILE_NAME: &'static str = "state.pth";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FileStructure for WeightsLayout {
    fn weights_dir(&self) -> PathBuf {
        self.dir.clone()
    }

    fn weights_file(&self) -> PathBuf {
        self.dir.join(Self::WEIGHTS_FILE_NAME)
    }

    fn optimizer_state_file(&self) -> PathBuf {
        self.dir.join(Self::STATE_FILE_NAME)
    }
}

impl<T: FileStructure + ?Sized> FileStructure for &T {
    fn weights_dir(&self) -> PathBuf {
        (**self).weights_dir()
    }

    fn weights_file(&self) -> PathBuf {
        (**self).weights_file()
    }

    fn optimizer_state_file(&self) -> PathBuf {
        (**self).optimizer_state_file()
    }
}
