//! Mermaid diagram extraction and rendering for mmdgen.
//!
//! This crate turns fenced ```` ```mermaid ```` blocks in Markdown documents
//! into image files using the Mermaid CLI:
//! - `BlockExtractor` finds fenced blocks and numbers them per document
//! - `IntermediateDir` persists each block as a `.mmd` file for the renderer
//! - `MermaidCli` invokes `mmdc`, with one fallback attempt per file
//! - `Pipeline` drives extraction, rendering and cleanup in order
//!
//! # Architecture
//!
//! The crate is organized into modules:
//! - [`block`]: Data types (`SourceDocument`, `DiagramBlock`)
//! - [`extract`]: Fenced block extraction
//! - [`workspace`]: Intermediate file lifecycle
//! - [`render`]: `DiagramRenderer` trait and the `mmdc` process renderer
//! - [`pipeline`]: Sequential orchestration and progress reporting
//!
//! # Example
//!
//! ```ignore
//! use mmdgen_diagrams::{
//!     MermaidCli, NoProgress, Pipeline, PipelineSettings, RenderStyle, SourceDocument,
//! };
//!
//! let settings = PipelineSettings {
//!     documents: vec![SourceDocument::new("docs/architecture.md", "architecture")],
//!     language: "mermaid".to_owned(),
//!     temp_dir: "docs/temp_mermaid".into(),
//!     output_dir: "docs".into(),
//!     image_extension: "png".to_owned(),
//!     primary_style: RenderStyle::dark_transparent(),
//!     fallback_style: RenderStyle::default_transparent(),
//! };
//!
//! let summary = Pipeline::new(settings, MermaidCli::default()).run(&mut NoProgress)?;
//! ```

mod block;
mod consts;
mod error;
mod extract;
mod pipeline;
mod render;
mod workspace;

pub use block::{DiagramBlock, SourceDocument};
pub use error::PipelineError;
pub use extract::{BlockExtractor, extract_blocks};
pub use pipeline::{
    ImageInfo, NoProgress, Pipeline, PipelineSettings, Progress, RunSummary,
};
pub use render::{
    DiagramRenderer, MermaidCli, RenderError, RenderOutcome, RenderStyle, render_with_fallback,
};
pub use workspace::IntermediateDir;
