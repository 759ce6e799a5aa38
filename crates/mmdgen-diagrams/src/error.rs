//! Pipeline error types.

use std::path::{Path, PathBuf};

/// Fatal pipeline error.
///
/// Missing documents and renderer failures are reported through
/// [`Progress`](crate::Progress) instead; only environment-level problems
/// end up here.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Filesystem read, write or delete failure.
    #[error("{}: {source}", .path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The fence pattern for the configured language could not be compiled.
    #[error("invalid fence language: {0}")]
    Language(#[from] regex::Error),

    /// The renderer command line could not be split into words.
    #[error("invalid renderer command '{command}': {source}")]
    Command {
        /// Command line as configured.
        command: String,
        /// Underlying parse error.
        #[source]
        source: shell_words::ParseError,
    },

    /// The file listing pattern was rejected.
    #[error("invalid file pattern: {0}")]
    Pattern(String),
}

impl PipelineError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
