//! Diagram generation run.

use std::path::{Path, PathBuf};

use clap::Args;
use mmdgen_config::{CliSettings, Config};
use mmdgen_diagrams::{
    DiagramBlock, MermaidCli, Pipeline, PipelineSettings, Progress, RenderError, RenderStyle,
    RunSummary, SourceDocument,
};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for a generation run. All are optional.
#[derive(Args)]
pub(crate) struct RunArgs {
    /// Path to configuration file (default: auto-discover mmdgen.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory containing the documents (overrides config).
    #[arg(short, long)]
    source_dir: Option<PathBuf>,

    /// Directory for generated images (overrides config).
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Mermaid CLI command (overrides config).
    #[arg(long, env = "MMDGEN_MMDC")]
    mmdc: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub(crate) verbose: bool,
}

impl RunArgs {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            source_dir: self.source_dir,
            output_dir: self.output_dir,
            renderer_command: self.mmdc,
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        if let Some(path) = &config.config_path {
            tracing::info!(path = %path.display(), "Loaded configuration");
        }

        let renderer = MermaidCli::from_command_line(&config.renderer.command)?;
        let pipeline = Pipeline::new(pipeline_settings(&config), renderer);

        output.highlight("Generating Mermaid diagram images...");
        output.blank();
        output.separator();

        let mut progress = TerminalProgress { output: &output };
        let summary = pipeline.run(&mut progress)?;

        if summary.intermediate_files > 0 {
            for line in summary_lines(&summary) {
                line.print(&output);
            }
        }
        Ok(())
    }
}

/// Map configuration onto pipeline settings.
fn pipeline_settings(config: &Config) -> PipelineSettings {
    let docs = &config.docs_resolved;
    let renderer = &config.renderer;

    let style = |theme: Option<&String>| {
        let style = RenderStyle::new(renderer.background.clone());
        match theme {
            Some(theme) => style.with_theme(theme.clone()),
            None => style,
        }
    };

    PipelineSettings {
        documents: config
            .documents
            .iter()
            .map(|entry| SourceDocument::new(docs.source_dir.join(&entry.file), &entry.prefix))
            .collect(),
        language: docs.language.clone(),
        temp_dir: docs.temp_dir.clone(),
        output_dir: docs.output_dir.clone(),
        image_extension: renderer.format.extension().to_owned(),
        primary_style: style(renderer.theme.as_ref()),
        fallback_style: style(renderer.fallback_theme.as_ref()),
    }
}

/// Prints pipeline events as they happen.
struct TerminalProgress<'a> {
    output: &'a Output,
}

impl Progress for TerminalProgress<'_> {
    fn document_started(&mut self, document: &SourceDocument) {
        self.output
            .info(&format!("Processing: {}", document.display_name()));
    }

    fn document_missing(&mut self, document: &SourceDocument) {
        self.output
            .warning(&format!("File not found: {}", document.display_name()));
    }

    fn block_extracted(&mut self, block: &DiagramBlock, _path: &Path) {
        self.output
            .success(&format!("  Extracted diagram {}", block.index));
    }

    fn extraction_finished(&mut self, total: usize, files: &[PathBuf]) {
        self.output.separator();
        self.output.blank();
        self.output
            .info(&format!("Total diagrams extracted: {total}"));
        if files.is_empty() {
            return;
        }
        self.output
            .info(&format!("Intermediate files created: {}", files.len()));
        for file in files {
            self.output.info(&format!("   - {}", file_name(file)));
        }
        self.output.blank();
        self.output.highlight("Converting diagrams...");
        self.output.blank();
    }

    fn no_diagrams(&mut self) {
        self.output.warning("No Mermaid diagrams found");
    }

    fn render_started(&mut self, output: &Path) {
        self.output
            .info(&format!("  -> Generating: {}", file_name(output)));
    }

    fn fallback_attempted(&mut self, _input: &Path, _error: &RenderError) {
        self.output
            .warning("    Primary theme failed, retrying with fallback theme...");
    }

    fn render_failed(&mut self, input: &Path, error: &RenderError) {
        let (message, details) = failure_report(input, error);
        self.output.error(&message);
        self.output.detail(&details);
    }

    fn cleanup_started(&mut self) {
        self.output.blank();
        self.output.info("Cleaning up intermediate files...");
    }
}

/// Failure message and renderer diagnostics for a file that failed twice.
fn failure_report(input: &Path, error: &RenderError) -> (String, String) {
    (
        format!("    Failed to convert {}", file_name(input)),
        error.details(),
    )
}

/// One styled line of the final report.
#[derive(Debug, PartialEq, Eq)]
enum Line {
    Blank,
    Info(String),
    Success(String),
    Warning(String),
    Highlight(String),
}

impl Line {
    fn info(text: impl Into<String>) -> Self {
        Self::Info(text.into())
    }

    fn print(&self, output: &Output) {
        match self {
            Self::Blank => output.blank(),
            Self::Info(text) => output.info(text),
            Self::Success(text) => output.success(text),
            Self::Warning(text) => output.warning(text),
            Self::Highlight(text) => output.highlight(text),
        }
    }
}

/// Final statistics and the image listing.
fn summary_lines(summary: &RunSummary) -> Vec<Line> {
    let mut lines = vec![
        Line::Blank,
        Line::Success("Done!".to_owned()),
        Line::Blank,
        Line::info("Statistics:"),
        Line::info(format!("   - Diagrams found: {}", summary.diagrams_found)),
        Line::info(format!("   - Images generated: {}", summary.images_generated)),
    ];
    if !summary.failed.is_empty() {
        lines.push(Line::Warning(format!(
            "   - Failed: {}",
            summary.failed.join(", ")
        )));
    }
    lines.extend([
        Line::Blank,
        Line::info("Images written to:"),
        Line::info(format!("   {}/", summary.output_dir.display())),
        Line::Blank,
    ]);

    if summary.images.is_empty() {
        lines.push(Line::Warning("No images were generated".to_owned()));
    } else {
        lines.push(Line::Highlight("Images:".to_owned()));
        lines.extend(summary.images.iter().map(|image| {
            Line::info(format!(
                "   - {} ({:.1} KB)",
                image.name,
                image.size_kib()
            ))
        }));
    }
    lines.push(Line::Blank);
    lines
}

fn file_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}
