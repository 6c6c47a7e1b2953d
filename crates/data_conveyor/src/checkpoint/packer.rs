use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::checkpoint::layout::FileStructure;
use crate::error::CheckpointError;

/// Logical name of the unpacked weights file in [`StatePacker::get_files`].
pub const WEIGHTS_FILE: &str = "weights_file";
/// Logical name of the unpacked optimizer-state file.
pub const STATE_FILE: &str = "state_file";

/// Prefix of the archive written when a run starts on top of raw artifacts.
pub const PREV_START_PREFIX: &str = "prev_start";

const ARCHIVE_NAME: &str = "state.zip";

/// Bundles the weights and optimizer-state files into one zip archive and
/// restores them from it.
///
/// The archive lives in the weights directory as `[<prefix>_]state.zip`.
/// Packing over an existing archive keeps exactly one backup, `<archive>.old`.
///
/// Access is not synchronized: only one trainer may use a weights directory
/// at a time.
#[derive(Debug)]
pub struct StatePacker<F: FileStructure> {
    files: F,
    prefix: Option<String>,
    unpacked: HashMap<&'static str, PathBuf>,
}

impl<F: FileStructure> StatePacker<F> {
    /// Creates a packer. If raw weights and optimizer-state files are already
    /// on disk, they are first packed into `prev_start_state.zip` so a new
    /// run cannot overwrite them.
    pub fn new(files: F, prefix: Option<&str>) -> Result<Self> {
        let mut packer = Self {
            files,
            prefix: None,
            unpacked: HashMap::new(),
        };

        if packer.files.weights_file().is_file() && packer.files.optimizer_state_file().is_file() {
            packer.prefix = Some(PREV_START_PREFIX.to_string());
            let archive = packer
                .pack()
                .context("Failed to back up artifacts left by a previous run")?;
            info!(archive = %archive.display(), "backed up previous run artifacts");
        }

        packer.prefix = prefix.map(str::to_owned);
        Ok(packer)
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn set_prefix(&mut self, prefix: Option<&str>) {
        self.prefix = prefix.map(str::to_owned);
    }

    /// `<weights_dir>/[<prefix>_]state.zip`
    pub fn archive_path(&self) -> PathBuf {
        let name = match &self.prefix {
            Some(prefix) => format!("{prefix}_{ARCHIVE_NAME}"),
            None => ARCHIVE_NAME.to_string(),
        };
        self.files.weights_dir().join(name)
    }

    /// Archives both artifacts and removes the raw files.
    ///
    /// The archive is written to a `.tmp` sibling first; if either artifact
    /// cannot be read, the temporary file is removed, the previous archive is
    /// left as it was and the error is returned.
    pub fn pack(&self) -> Result<PathBuf> {
        let weights = self.files.weights_file();
        let state = self.files.optimizer_state_file();
        let archive = self.archive_path();
        let staging = with_suffix(&archive, ".tmp");

        if let Err(err) = write_archive(&staging, &[&weights, &state]) {
            discard_staging(&staging);
            return Err(err);
        }

        rotate_backup(&archive)?;
        fs::rename(&staging, &archive).with_context(|| {
            format!(
                "Failed to move {} to {}",
                staging.display(),
                archive.display()
            )
        })?;

        remove_if_file(&weights)?;
        remove_if_file(&state)?;

        info!(archive = %archive.display(), "packed training state");
        Ok(archive)
    }

    /// Extracts the archive into the weights directory, overwriting files of
    /// the same name, and tracks the expected outputs for [`Self::clear_files`].
    ///
    /// The expected paths are tracked even when the archive turns out to lack
    /// one of them; that case is reported as [`CheckpointError::MissingMember`]
    /// after extraction.
    pub fn unpack(&mut self) -> Result<&HashMap<&'static str, PathBuf>> {
        let dir = self.files.weights_dir();
        let expected = [
            (WEIGHTS_FILE, base_name(&self.files.weights_file())?),
            (STATE_FILE, base_name(&self.files.optimizer_state_file())?),
        ];
        self.unpacked = expected
            .iter()
            .map(|(key, name)| (*key, dir.join(name)))
            .collect();

        let archive_path = self.archive_path();
        let extracted = extract_archive(&archive_path, &dir)?;

        for (_, name) in &expected {
            if !extracted.iter().any(|member| member == name) {
                warn!(archive = %archive_path.display(), member = %name, "archive member missing");
                return Err(CheckpointError::MissingMember {
                    archive: archive_path,
                    member: name.clone(),
                }
                .into());
            }
        }

        info!(archive = %archive_path.display(), dir = %dir.display(), "unpacked training state");
        Ok(&self.unpacked)
    }

    /// Deletes the files produced by the last unpack and stops tracking them.
    pub fn clear_files(&mut self) -> Result<()> {
        for path in self.unpacked.values() {
            remove_if_file(path)?;
        }
        self.unpacked.clear();
        Ok(())
    }

    /// Logical name → path of the files produced by the last unpack.
    pub fn get_files(&self) -> &HashMap<&'static str, PathBuf> {
        &self.unpacked
    }

    pub fn files(&self) -> &F {
        &self.files
    }
}

fn base_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| CheckpointError::NoFileName(path.to_path_buf()).into())
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn remove_if_file(path: &Path) -> Result<()> {
    if path.is_file() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Best-effort removal of a half-written archive; the caller reports the
/// write error instead.
fn discard_staging(staging: &Path) {
    if let Err(err) = remove_if_file(staging) {
        warn!(staging = %staging.display(), error = %err, "failed to remove staging archive");
    }
}

/// Moves an existing archive to `<archive>.old`, replacing any older backup.
fn rotate_backup(archive: &Path) -> Result<()> {
    let backup = with_suffix(archive, ".old");
    remove_if_file(&backup)?;
    if archive.is_file() {
        fs::rename(archive, &backup)
            .with_context(|| format!("Failed to back up {}", archive.display()))?;
        debug!(backup = %backup.display(), "rotated previous archive");
    }
    Ok(())
}

/// Writes `sources` into a new zip at `target`, each under its base name.
fn write_archive(target: &Path, sources: &[&Path]) -> Result<()> {
    let file = File::create(target)
        .with_context(|| format!("Failed to create archive {}", target.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for source in sources {
        let name = base_name(source)?;
        let mut input = File::open(source)
            .with_context(|| format!("Failed to open artifact {}", source.display()))?;
        zip.start_file(name.as_str(), options)
            .with_context(|| format!("Failed to add {name} to {}", target.display()))?;
        io::copy(&mut input, &mut zip)
            .with_context(|| format!("Failed to write {name} into {}", target.display()))?;
    }

    let file = zip
        .finish()
        .with_context(|| format!("Failed to finalize archive {}", target.display()))?;
    file.sync_all()
        .with_context(|| format!("Failed to flush archive {}", target.display()))?;
    Ok(())
}

/// Extracts every file member of `archive` into `dir`, returning the member names.
fn extract_archive(archive: &Path, dir: &Path) -> Result<Vec<String>> {
    let file = File::open(archive)
        .with_context(|| format!("Failed to open archive {}", archive.display()))?;
    let mut zip = ZipArchive::new(file)
        .with_context(|| format!("Failed to read archive {}", archive.display()))?;

    let mut extracted = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let mut member = zip.by_index(i)?;
        if member.is_dir() {
            continue;
        }
        let Some(relative) = member.enclosed_name() else {
            warn!(member = member.name(), "skipping archive member with unsafe path");
            continue;
        };

        let out_path = dir.join(relative);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)
            .with_context(|| format!("Failed to create {}", out_path.display()))?;
        io::copy(&mut member, &mut out)
            .with_context(|| format!("Failed to extract {}", out_path.display()))?;
        extracted.push(member.name().to_string());
    }
    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::WeightsLayout;

    #[test]
    fn test_archive_path_prefix() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut packer = StatePacker::new(WeightsLayout::new(dir.path()), None)?;
        assert_eq!(packer.archive_path(), dir.path().join("state.zip"));

        packer.set_prefix(Some("best"));
        assert_eq!(packer.archive_path(), dir.path().join("best_state.zip"));
        Ok(())
    }

    #[test]
    fn test_with_suffix() {
        assert_eq!(
            with_suffix(Path::new("/w/state.zip"), ".old"),
            PathBuf::from("/w/state.zip.old")
        );
    }

    #[test]
    fn test_pack_reports_write_error_when_staging_blocked() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let packer = StatePacker::new(WeightsLayout::new(dir.path()), None)?;
        // A directory at the staging path cannot be opened as a file and is
        // left alone by the cleanup.
        let staging = with_suffix(&packer.archive_path(), ".tmp");
        fs::create_dir(&staging)?;

        let err = packer.pack().unwrap_err();
        assert!(
            err.to_string().contains("Failed to create archive"),
            "unexpected error: {err:#}"
        );
        assert!(staging.is_dir());
        Ok(())
    }

    #[test]
    fn test_clear_files_without_unpack_is_noop() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut packer = StatePacker::new(WeightsLayout::new(dir.path()), None)?;
        packer.clear_files()?;
        assert!(packer.get_files().is_empty());
        Ok(())
    }
}
