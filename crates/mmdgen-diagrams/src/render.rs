//! Diagram rendering through an external renderer process.
//!
//! [`MermaidCli`] drives the Mermaid CLI (`mmdc`):
//!
//! ```text
//! mmdc -i <input> -o <output> -b <background> [-t <theme>]
//! ```
//!
//! Exit status 0 is success. Any other status, or a failure to start the
//! process at all, is a [`RenderError`]. [`render_with_fallback`] retries a
//! failed render exactly once with a second style.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::consts::DEFAULT_PROGRAM;
use crate::error::PipelineError;

/// Theme and background passed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderStyle {
    /// Theme name; `None` leaves the renderer's default theme.
    pub theme: Option<String>,
    /// Background color (e.g. `transparent`).
    pub background: String,
}

impl RenderStyle {
    /// Style with the renderer's default theme.
    pub fn new(background: impl Into<String>) -> Self {
        Self {
            theme: None,
            background: background.into(),
        }
    }

    /// Set the theme.
    #[must_use]
    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    /// Dark theme on a transparent background.
    #[must_use]
    pub fn dark_transparent() -> Self {
        Self::new("transparent").with_theme("dark")
    }

    /// Default theme on a transparent background.
    #[must_use]
    pub fn default_transparent() -> Self {
        Self::new("transparent")
    }
}

/// Single render attempt failure.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The renderer process could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The renderer exited unsuccessfully.
    #[error("renderer exited with {}: {stderr}", status_text(.status.as_ref()))]
    Failed {
        /// Exit code, or `None` if terminated by a signal.
        status: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },
}

fn status_text(status: Option<&i32>) -> String {
    status.map_or_else(|| "signal".to_owned(), |code| format!("status {code}"))
}

impl RenderError {
    /// Diagnostic output to show the user: the renderer's stderr, or the
    /// spawn error when the process never ran.
    #[must_use]
    pub fn details(&self) -> String {
        match self {
            Self::Spawn { .. } => self.to_string(),
            Self::Failed { stderr, .. } => stderr.clone(),
        }
    }
}

/// Renders one diagram source file to one image file.
pub trait DiagramRenderer {
    /// Render `input` to `output` with `style`.
    fn render(&self, input: &Path, output: &Path, style: &RenderStyle) -> Result<(), RenderError>;
}

/// Mermaid CLI (`mmdc`) renderer.
#[derive(Debug, Clone)]
pub struct MermaidCli {
    program: PathBuf,
    /// Arguments placed before the generated ones (e.g. `mmdc` for `npx mmdc`).
    leading_args: Vec<OsString>,
}

impl Default for MermaidCli {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl MermaidCli {
    /// Renderer running `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Renderer from a shell-style command line such as `npx mmdc` or
    /// `"/opt/my tools/mmdc"`.
    ///
    /// The first word is the program, the rest are passed before the
    /// generated arguments. An empty command falls back to `mmdc`.
    pub fn from_command_line(command: &str) -> Result<Self, PipelineError> {
        let words = shell_words::split(command).map_err(|e| PipelineError::Command {
            command: command.to_owned(),
            source: e,
        })?;
        let mut words = words.into_iter();
        let Some(program) = words.next() else {
            return Ok(Self::default());
        };
        Ok(Self {
            program: PathBuf::from(program),
            leading_args: words.map(OsString::from).collect(),
        })
    }

    /// Program that will be executed.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Full argument list for one invocation.
    #[must_use]
    pub fn args(&self, input: &Path, output: &Path, style: &RenderStyle) -> Vec<OsString> {
        let mut args = self.leading_args.clone();
        args.extend([
            OsString::from("-i"),
            input.into(),
            OsString::from("-o"),
            output.into(),
            OsString::from("-b"),
            OsString::from(&style.background),
        ]);
        if let Some(theme) = &style.theme {
            args.extend([OsString::from("-t"), OsString::from(theme)]);
        }
        args
    }
}

impl DiagramRenderer for MermaidCli {
    fn render(&self, input: &Path, output: &Path, style: &RenderStyle) -> Result<(), RenderError> {
        let args = self.args(input, output, style);
        tracing::debug!(
            program = %self.program.display(),
            ?args,
            "Running renderer"
        );

        let result = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| RenderError::Spawn {
                program: self.program.display().to_string(),
                source: e,
            })?;

        if result.status.success() {
            return Ok(());
        }

        Err(RenderError::Failed {
            status: result.status.code(),
            stderr: String::from_utf8_lossy(&result.stderr).trim().to_owned(),
        })
    }
}

/// How a diagram ended up rendered.
#[derive(Debug)]
pub enum RenderOutcome {
    /// Rendered with the primary style.
    Primary,
    /// Primary style failed; rendered with the fallback style.
    Fallback,
    /// Both attempts failed. Holds the fallback attempt's error.
    Failed(RenderError),
}

impl RenderOutcome {
    /// Whether an image was produced.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// Render with `primary`, retrying once with `fallback` if that fails.
///
/// `on_fallback` is called with the primary error right before the retry.
pub fn render_with_fallback(
    renderer: &dyn DiagramRenderer,
    input: &Path,
    output: &Path,
    primary: &RenderStyle,
    fallback: &RenderStyle,
    on_fallback: impl FnOnce(&RenderError),
) -> RenderOutcome {
    let Err(primary_err) = renderer.render(input, output, primary) else {
        return RenderOutcome::Primary;
    };
    tracing::debug!(input = %input.display(), error = %primary_err, "Primary render failed");
    on_fallback(&primary_err);

    match renderer.render(input, output, fallback) {
        Ok(()) => RenderOutcome::Fallback,
        Err(e) => {
            tracing::warn!(input = %input.display(), error = %e, "Fallback render failed");
            RenderOutcome::Failed(e)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;

    use pretty_assertions::assert_eq;

    use super::*;

    /// Records invocations and fails for themes listed in `failing_themes`.
    #[derive(Default)]
    pub(crate) struct RecordingRenderer {
        pub(crate) calls: RefCell<Vec<(PathBuf, PathBuf, RenderStyle)>>,
        pub(crate) failing_themes: Vec<Option<String>>,
        /// Inputs whose file stem contains this string always fail.
        pub(crate) failing_input: Option<String>,
    }

    impl RecordingRenderer {
        pub(crate) fn failing(themes: &[Option<&str>]) -> Self {
            Self {
                failing_themes: themes.iter().map(|t| t.map(str::to_owned)).collect(),
                ..Self::default()
            }
        }
    }

    impl DiagramRenderer for RecordingRenderer {
        fn render(
            &self,
            input: &Path,
            output: &Path,
            style: &RenderStyle,
        ) -> Result<(), RenderError> {
            self.calls
                .borrow_mut()
                .push((input.to_path_buf(), output.to_path_buf(), style.clone()));

            let input_fails = self.failing_input.as_deref().is_some_and(|needle| {
                input
                    .file_stem()
                    .is_some_and(|stem| stem.to_string_lossy().contains(needle))
            });
            if input_fails || self.failing_themes.contains(&style.theme) {
                return Err(RenderError::Failed {
                    status: Some(1),
                    stderr: format!("cannot render {}", input.display()),
                });
            }

            std::fs::write(output, b"image").map_err(|e| RenderError::Spawn {
                program: "recording".to_owned(),
                source: e,
            })
        }
    }

    #[test]
    fn test_args_with_theme() {
        let cli = MermaidCli::default();
        let args = cli.args(
            Path::new("tmp/a-1.mmd"),
            Path::new("out/a-1.png"),
            &RenderStyle::dark_transparent(),
        );
        assert_eq!(
            args,
            ["-i", "tmp/a-1.mmd", "-o", "out/a-1.png", "-b", "transparent", "-t", "dark"]
                .map(OsString::from)
                .to_vec()
        );
    }

    #[test]
    fn test_args_without_theme() {
        let cli = MermaidCli::default();
        let args = cli.args(
            Path::new("a.mmd"),
            Path::new("a.png"),
            &RenderStyle::default_transparent(),
        );
        assert_eq!(
            args,
            ["-i", "a.mmd", "-o", "a.png", "-b", "transparent"]
                .map(OsString::from)
                .to_vec()
        );
    }

    #[test]
    fn test_from_command_line() {
        let cli = MermaidCli::from_command_line("npx -y mmdc").unwrap();
        assert_eq!(cli.program(), Path::new("npx"));
        let args = cli.args(Path::new("a.mmd"), Path::new("a.png"), &RenderStyle::new("white"));
        assert_eq!(
            args,
            ["-y", "mmdc", "-i", "a.mmd", "-o", "a.png", "-b", "white"]
                .map(OsString::from)
                .to_vec()
        );

        let cli = MermaidCli::from_command_line("  ").unwrap();
        assert_eq!(cli.program(), Path::new("mmdc"));
    }

    #[test]
    fn test_from_command_line_quoted_path_with_space() {
        let cli = MermaidCli::from_command_line(r#""/opt/my tools/mmdc" --quiet"#).unwrap();
        assert_eq!(cli.program(), Path::new("/opt/my tools/mmdc"));
        let args = cli.args(Path::new("a.mmd"), Path::new("a.png"), &RenderStyle::new("white"));
        assert_eq!(args[0], OsString::from("--quiet"));

        let cli = MermaidCli::from_command_line(r"/opt/my\ tools/mmdc").unwrap();
        assert_eq!(cli.program(), Path::new("/opt/my tools/mmdc"));
    }

    #[test]
    fn test_from_command_line_unbalanced_quote() {
        let err = MermaidCli::from_command_line(r#""/opt/my tools/mmdc"#).unwrap_err();
        assert!(matches!(err, PipelineError::Command { .. }));
        assert!(err.to_string().contains("/opt/my tools/mmdc"));
    }

    #[test]
    fn test_primary_success_skips_fallback() {
        let temp_dir = tempfile::tempdir().unwrap();
        let renderer = RecordingRenderer::default();
        let mut fallback_called = false;

        let outcome = render_with_fallback(
            &renderer,
            Path::new("a.mmd"),
            &temp_dir.path().join("a.png"),
            &RenderStyle::dark_transparent(),
            &RenderStyle::default_transparent(),
            |_| fallback_called = true,
        );

        assert!(matches!(outcome, RenderOutcome::Primary));
        assert!(!fallback_called);
        assert_eq!(renderer.calls.borrow().len(), 1);
    }

    #[test]
    fn test_fallback_success() {
        let temp_dir = tempfile::tempdir().unwrap();
        let renderer = RecordingRenderer::failing(&[Some("dark")]);
        let mut fallback_called = false;

        let outcome = render_with_fallback(
            &renderer,
            Path::new("a.mmd"),
            &temp_dir.path().join("a.png"),
            &RenderStyle::dark_transparent(),
            &RenderStyle::default_transparent(),
            |_| fallback_called = true,
        );

        assert!(matches!(outcome, RenderOutcome::Fallback));
        assert!(outcome.is_success());
        assert!(fallback_called);

        let themes: Vec<_> = renderer
            .calls
            .borrow()
            .iter()
            .map(|(_, _, style)| style.theme.clone())
            .collect();
        assert_eq!(themes, vec![Some("dark".to_owned()), None]);
    }

    #[test]
    fn test_both_attempts_fail_exactly_twice() {
        let temp_dir = tempfile::tempdir().unwrap();
        let renderer = RecordingRenderer::failing(&[Some("dark"), None]);

        let outcome = render_with_fallback(
            &renderer,
            Path::new("broken.mmd"),
            &temp_dir.path().join("broken.png"),
            &RenderStyle::dark_transparent(),
            &RenderStyle::default_transparent(),
            |_| {},
        );

        match outcome {
            RenderOutcome::Failed(err) => assert_eq!(err.details(), "cannot render broken.mmd"),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(renderer.calls.borrow().len(), 2);
    }

    #[test]
    fn test_spawn_failure_is_render_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cli = MermaidCli::new(temp_dir.path().join("no-such-mmdc"));

        let err = cli
            .render(
                &temp_dir.path().join("a.mmd"),
                &temp_dir.path().join("a.png"),
                &RenderStyle::dark_transparent(),
            )
            .unwrap_err();

        assert!(matches!(err, RenderError::Spawn { .. }));
        assert!(err.details().contains("no-such-mmdc"));
    }

    /// Shell stand-in for `mmdc`: copies input to output, rejects any theme.
    #[cfg(unix)]
    const FAKE_MMDC: &str = r#"
in=""; out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -i) in="$2"; shift 2 ;;
    -o) out="$2"; shift 2 ;;
    -t) echo "unsupported theme: $2" >&2; exit 3 ;;
    *) shift ;;
  esac
done
cp "$in" "$out"
"#;

    #[cfg(unix)]
    fn fake_mmdc(dir: &Path) -> MermaidCli {
        let script = dir.join("fake-mmdc.sh");
        std::fs::write(&script, FAKE_MMDC).unwrap();
        MermaidCli {
            program: PathBuf::from("sh"),
            leading_args: vec![script.into_os_string()],
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_process_failure_captures_stderr() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cli = fake_mmdc(temp_dir.path());
        let input = temp_dir.path().join("a-1.mmd");
        std::fs::write(&input, "graph TD").unwrap();

        let err = cli
            .render(
                &input,
                &temp_dir.path().join("a-1.png"),
                &RenderStyle::dark_transparent(),
            )
            .unwrap_err();

        match err {
            RenderError::Failed { status, stderr } => {
                assert_eq!(status, Some(3));
                assert_eq!(stderr, "unsupported theme: dark");
            }
            other => panic!("expected process failure, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_process_fallback_produces_image() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cli = fake_mmdc(temp_dir.path());
        let input = temp_dir.path().join("a-1.mmd");
        let output = temp_dir.path().join("a-1.png");
        std::fs::write(&input, "graph TD").unwrap();

        let outcome = render_with_fallback(
            &cli,
            &input,
            &output,
            &RenderStyle::dark_transparent(),
            &RenderStyle::default_transparent(),
            |_| {},
        );

        assert!(matches!(outcome, RenderOutcome::Fallback));
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "graph TD");
    }
}
