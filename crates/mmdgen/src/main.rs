//! mmdgen CLI - render Mermaid diagrams embedded in Markdown documents.
//!
//! Running `mmdgen` without arguments scans the configured documents,
//! renders every ```` ```mermaid ```` block to an image with the Mermaid CLI,
//! and removes the intermediate files afterwards.

mod error;
mod output;
mod run;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use output::Output;
use run::RunArgs;

/// mmdgen - Mermaid diagram image generator.
#[derive(Parser)]
#[command(name = "mmdgen", version, about)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.run.verbose, rust_log.as_deref()))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = cli.run.execute() {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}

/// `--verbose` enables INFO level, otherwise use `RUST_LOG` or default to WARN.
fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    if verbose {
        return EnvFilter::new("info");
    }
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"))
}
