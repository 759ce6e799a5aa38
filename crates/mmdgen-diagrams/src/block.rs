//! Source documents and the diagram blocks extracted from them.

use std::path::PathBuf;

use crate::consts::INTERMEDIATE_EXTENSION;

/// A document to scan, paired with the prefix naming its diagrams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Path to the Markdown file.
    pub path: PathBuf,
    /// Prefix for generated names (`<prefix>-<index>`).
    pub prefix: String,
}

impl SourceDocument {
    /// Create a new source document.
    pub fn new(path: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            prefix: prefix.into(),
        }
    }

    /// File name for display, falling back to the full path.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.path.file_name().map_or_else(
            || self.path.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        )
    }
}

/// A diagram block extracted from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramBlock {
    /// Prefix of the originating document.
    pub prefix: String,
    /// One-based position of the block within its document.
    pub index: usize,
    /// Trimmed diagram source.
    pub source: String,
}

impl DiagramBlock {
    /// Generated name shared by the intermediate file and the image.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}-{}", self.prefix, self.index)
    }

    /// File name of the intermediate diagram source.
    #[must_use]
    pub fn intermediate_file_name(&self) -> String {
        format!("{}.{INTERMEDIATE_EXTENSION}", self.name())
    }
}
