//! Intermediate diagram files.
//!
//! Each extracted block is written to `<dir>/<prefix>-<index>.mmd` so the
//! Mermaid CLI can read it. The directory only lives for the duration of a
//! run and is removed by [`IntermediateDir::cleanup`].

use std::fs;
use std::path::{Path, PathBuf};

use crate::block::DiagramBlock;
use crate::consts::INTERMEDIATE_EXTENSION;
use crate::error::PipelineError;

/// Temporary directory holding intermediate diagram sources.
#[derive(Debug)]
pub struct IntermediateDir {
    dir: PathBuf,
}

impl IntermediateDir {
    /// Create a handle for `dir`. Nothing is created on disk until the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Write `block` to its intermediate file and return the file path.
    ///
    /// Creates the directory (and parents) if absent.
    pub fn write(&self, block: &DiagramBlock) -> Result<PathBuf, PipelineError> {
        fs::create_dir_all(&self.dir).map_err(|e| PipelineError::io(&self.dir, e))?;

        let path = self.dir.join(block.intermediate_file_name());
        fs::write(&path, &block.source).map_err(|e| PipelineError::io(&path, e))?;
        tracing::debug!(path = %path.display(), "Wrote intermediate diagram");
        Ok(path)
    }

    /// Every intermediate file in the directory, sorted by file name.
    ///
    /// Files left over from an earlier interrupted run are included.
    /// Returns an empty list if the directory does not exist.
    pub fn files(&self) -> Result<Vec<PathBuf>, PipelineError> {
        list_by_extension(&self.dir, INTERMEDIATE_EXTENSION)
    }

    /// Delete `files`, then the directory itself if nothing else is in it.
    ///
    /// A directory that was never created, or that still holds files other
    /// than intermediates, is left alone.
    pub fn cleanup(&self, files: &[PathBuf]) -> Result<(), PipelineError> {
        for file in files {
            fs::remove_file(file).map_err(|e| PipelineError::io(file, e))?;
        }
        if self.is_empty_dir()? {
            fs::remove_dir(&self.dir).map_err(|e| PipelineError::io(&self.dir, e))?;
        } else if self.dir.is_dir() {
            tracing::debug!(dir = %self.dir.display(), "Keeping non-empty intermediate directory");
        }
        tracing::debug!(
            dir = %self.dir.display(),
            removed = files.len(),
            "Removed intermediate diagrams"
        );
        Ok(())
    }

    fn is_empty_dir(&self) -> Result<bool, PipelineError> {
        if !self.dir.is_dir() {
            return Ok(false);
        }
        let mut entries = fs::read_dir(&self.dir).map_err(|e| PipelineError::io(&self.dir, e))?;
        Ok(entries.next().is_none())
    }
}

/// List files in `dir` with the given extension, sorted by file name.
pub(crate) fn list_by_extension(
    dir: &Path,
    extension: &str,
) -> Result<Vec<PathBuf>, PipelineError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let pattern = format!(
        "{}/*.{extension}",
        glob::Pattern::escape(&dir.to_string_lossy())
    );
    let entries = glob::glob(&pattern).map_err(|e| PipelineError::Pattern(e.to_string()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            PipelineError::io(&path, e.into_error())
        })?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
