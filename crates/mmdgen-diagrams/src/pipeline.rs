//! Extraction and rendering pipeline.
//!
//! A run is strictly sequential:
//!
//! ```text
//! extract (per document) -> report extraction -> convert (per file)
//!     -> cleanup -> report summary
//! ```
//!
//! Missing documents and failed renders are reported through [`Progress`]
//! and never stop the run. Filesystem failures while writing or deleting
//! intermediates are fatal and returned as [`PipelineError`].

use std::path::{Path, PathBuf};

use crate::block::{DiagramBlock, SourceDocument};
use crate::error::PipelineError;
use crate::extract::BlockExtractor;
use crate::render::{
    DiagramRenderer, RenderError, RenderOutcome, RenderStyle, render_with_fallback,
};
use crate::workspace::{IntermediateDir, list_by_extension};

/// Receives pipeline events as they happen.
///
/// Every method has an empty default so implementors only override what
/// they display.
pub trait Progress {
    /// A document is about to be scanned.
    fn document_started(&mut self, _document: &SourceDocument) {}
    /// A document does not exist and is skipped.
    fn document_missing(&mut self, _document: &SourceDocument) {}
    /// A block was written to its intermediate file.
    fn block_extracted(&mut self, _block: &DiagramBlock, _path: &Path) {}
    /// Extraction finished with `total` blocks; `files` are about to be rendered.
    fn extraction_finished(&mut self, _total: usize, _files: &[PathBuf]) {}
    /// No intermediate files exist, nothing will be rendered.
    fn no_diagrams(&mut self) {}
    /// Rendering of `output` is starting.
    fn render_started(&mut self, _output: &Path) {}
    /// The primary style failed for `input`; the fallback style is next.
    fn fallback_attempted(&mut self, _input: &Path, _error: &RenderError) {}
    /// Both styles failed for `input`.
    fn render_failed(&mut self, _input: &Path, _error: &RenderError) {}
    /// Intermediate files are about to be removed.
    fn cleanup_started(&mut self) {}
}

/// [`Progress`] that ignores every event.
#[derive(Debug, Default)]
pub struct NoProgress;

impl Progress for NoProgress {}

/// Pipeline inputs.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Documents to scan, in processing order.
    pub documents: Vec<SourceDocument>,
    /// Fence language marking diagram blocks.
    pub language: String,
    /// Directory for intermediate files; removed at the end of the run.
    pub temp_dir: PathBuf,
    /// Directory receiving images.
    pub output_dir: PathBuf,
    /// Image file extension, which also selects the renderer output format.
    pub image_extension: String,
    /// Style for the first render attempt.
    pub primary_style: RenderStyle,
    /// Style for the single retry.
    pub fallback_style: RenderStyle,
}

/// An image found in the output directory after the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    /// File name.
    pub name: String,
    /// Size on disk.
    pub size_bytes: u64,
}

impl ImageInfo {
    /// Size in kibibytes.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn size_kib(&self) -> f64 {
        self.size_bytes as f64 / 1024.0
    }
}

/// Result of a completed run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Blocks extracted from all documents.
    pub diagrams_found: usize,
    /// Intermediate files rendered (may include leftovers from earlier runs).
    pub intermediate_files: usize,
    /// Files rendered successfully, with either style.
    pub images_generated: usize,
    /// Names of intermediate files whose render failed.
    pub failed: Vec<String>,
    /// Directory holding the images.
    pub output_dir: PathBuf,
    /// Every image in the output directory, sorted by name.
    pub images: Vec<ImageInfo>,
}

/// Drives extraction, rendering and cleanup for a fixed document list.
pub struct Pipeline {
    settings: PipelineSettings,
    renderer: Box<dyn DiagramRenderer>,
}

impl Pipeline {
    /// Create a pipeline rendering with `renderer`.
    pub fn new(settings: PipelineSettings, renderer: impl DiagramRenderer + 'static) -> Self {
        Self {
            settings,
            renderer: Box::new(renderer),
        }
    }

    /// Run the whole pipeline once.
    pub fn run(&self, progress: &mut dyn Progress) -> Result<RunSummary, PipelineError> {
        let extractor = BlockExtractor::new(&self.settings.language)?;
        let workspace = IntermediateDir::new(&self.settings.temp_dir);

        let diagrams_found = self.extract_all(&extractor, &workspace, progress)?;

        let files = workspace.files()?;
        progress.extraction_finished(diagrams_found, &files);

        let mut summary = RunSummary {
            diagrams_found,
            intermediate_files: files.len(),
            output_dir: self.settings.output_dir.clone(),
            ..RunSummary::default()
        };

        if files.is_empty() {
            progress.no_diagrams();
            workspace.cleanup(&[])?;
            return Ok(summary);
        }

        std::fs::create_dir_all(&self.settings.output_dir)
            .map_err(|e| PipelineError::io(&self.settings.output_dir, e))?;

        for input in &files {
            if self.convert(input, progress) {
                summary.images_generated += 1;
            } else {
                summary.failed.push(file_stem(input));
            }
        }

        progress.cleanup_started();
        workspace.cleanup(&files)?;

        summary.images = self.collect_images()?;
        tracing::info!(
            diagrams = summary.diagrams_found,
            images = summary.images_generated,
            failed = summary.failed.len(),
            "Pipeline finished"
        );
        Ok(summary)
    }

    /// Extract every configured document into the intermediate directory.
    ///
    /// Returns the total number of blocks extracted.
    fn extract_all(
        &self,
        extractor: &BlockExtractor,
        workspace: &IntermediateDir,
        progress: &mut dyn Progress,
    ) -> Result<usize, PipelineError> {
        let mut total = 0;

        for document in &self.settings.documents {
            progress.document_started(document);

            let blocks = extractor
                .extract_document(document)
                .map_err(|e| PipelineError::io(&document.path, e))?;
            let Some(blocks) = blocks else {
                tracing::warn!(path = %document.path.display(), "Document not found");
                progress.document_missing(document);
                continue;
            };

            for block in &blocks {
                let path = workspace.write(block)?;
                progress.block_extracted(block, &path);
            }
            tracing::debug!(
                path = %document.path.display(),
                blocks = blocks.len(),
                "Extracted diagrams"
            );
            total += blocks.len();
        }

        Ok(total)
    }

    /// Render one intermediate file. Returns whether an image was produced.
    fn convert(&self, input: &Path, progress: &mut dyn Progress) -> bool {
        let output = self.output_path(input);
        progress.render_started(&output);

        let outcome = render_with_fallback(
            self.renderer.as_ref(),
            input,
            &output,
            &self.settings.primary_style,
            &self.settings.fallback_style,
            |err| progress.fallback_attempted(input, err),
        );

        match outcome {
            RenderOutcome::Failed(err) => {
                progress.render_failed(input, &err);
                false
            }
            _ => true,
        }
    }

    /// Image path for an intermediate file: same stem, image extension.
    fn output_path(&self, input: &Path) -> PathBuf {
        self.settings.output_dir.join(format!(
            "{}.{}",
            file_stem(input),
            self.settings.image_extension
        ))
    }

    /// List images in the output directory with their sizes.
    fn collect_images(&self) -> Result<Vec<ImageInfo>, PipelineError> {
        list_by_extension(&self.settings.output_dir, &self.settings.image_extension)?
            .into_iter()
            .map(|path| {
                let metadata =
                    std::fs::metadata(&path).map_err(|e| PipelineError::io(&path, e))?;
                Ok::<_, PipelineError>(ImageInfo {
                    name: path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    size_bytes: metadata.len(),
                })
            })
            .collect()
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
