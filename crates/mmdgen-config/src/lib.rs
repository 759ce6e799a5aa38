//! Configuration management for mmdgen.
//!
//! Parses `mmdgen.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories. Without a config
//! file every setting falls back to the defaults documented on each type,
//! which reproduce the classic four-document analysis layout.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `docs.source_dir`
//! - `docs.output_dir`
//! - `docs.temp_dir`
//! - `renderer.command`

mod expand;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override documents directory.
    pub source_dir: Option<PathBuf>,
    /// Override image output directory.
    pub output_dir: Option<PathBuf>,
    /// Override renderer program.
    pub renderer_command: Option<String>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "mmdgen.toml";

/// Default name of the intermediate directory inside the source directory.
const DEFAULT_TEMP_DIR: &str = "temp_mermaid";

/// Documents processed when the config does not list any.
const DEFAULT_DOCUMENTS: [(&str, &str); 4] = [
    ("architecture-phase-2.md", "architecture"),
    ("data-model-phase-2.md", "data-model"),
    ("process-diagram-phase-2.md", "process"),
    ("readme-phase-2.md", "readme"),
];

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory configuration (paths are relative strings from TOML).
    docs: DocsConfigRaw,
    /// Documents to scan, in processing order.
    pub documents: Vec<DocumentEntry>,
    /// External renderer configuration.
    pub renderer: RendererConfig,

    /// Resolved directory configuration (set after loading).
    #[serde(skip)]
    pub docs_resolved: DocsConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// A document to scan and the prefix used to name its diagrams.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DocumentEntry {
    /// File name, relative to the source directory.
    pub file: String,
    /// Prefix for intermediate and image names (`<prefix>-<index>`).
    pub prefix: String,
}

impl DocumentEntry {
    fn new(file: &str, prefix: &str) -> Self {
        Self {
            file: file.to_owned(),
            prefix: prefix.to_owned(),
        }
    }
}

fn default_documents() -> Vec<DocumentEntry> {
    DEFAULT_DOCUMENTS
        .iter()
        .map(|(file, prefix)| DocumentEntry::new(file, prefix))
        .collect()
}

/// Raw docs configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct DocsConfigRaw {
    source_dir: Option<String>,
    output_dir: Option<String>,
    temp_dir: Option<String>,
    language: Option<String>,
}

/// Resolved directory configuration with absolute paths.
#[derive(Debug, Default)]
pub struct DocsConfig {
    /// Directory containing the documents.
    pub source_dir: PathBuf,
    /// Directory receiving rendered images.
    pub output_dir: PathBuf,
    /// Directory holding intermediate diagram files during a run.
    pub temp_dir: PathBuf,
    /// Fence language tag marking diagram blocks.
    pub language: String,
}

impl DocsConfig {
    fn with_source_dir(source_dir: PathBuf) -> Self {
        Self {
            output_dir: source_dir.clone(),
            temp_dir: source_dir.join(DEFAULT_TEMP_DIR),
            source_dir,
            language: "mermaid".to_owned(),
        }
    }
}

/// Image format produced by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Svg,
    Pdf,
}

impl OutputFormat {
    /// File extension for images of this format.
    ///
    /// The Mermaid CLI picks the output format from this extension.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
            Self::Pdf => "pdf",
        }
    }
}

/// External renderer configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Renderer program name or path.
    pub command: String,
    /// Output image format.
    pub format: OutputFormat,
    /// Background color passed to every invocation.
    pub background: String,
    /// Theme for the first attempt.
    pub theme: Option<String>,
    /// Theme for the retry; `None` leaves the renderer's default theme.
    pub fallback_theme: Option<String>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            command: "mmdc".to_owned(),
            format: OutputFormat::default(),
            background: "transparent".to_owned(),
            theme: Some("dark".to_owned()),
            fallback_theme: None,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`renderer.command`").
        field: String,
        /// Error message (e.g., "${`MMDC`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Treat an empty theme string as "use the renderer default".
fn normalize_theme(theme: Option<String>) -> Option<String> {
    theme.filter(|t| !t.trim().is_empty())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `mmdgen.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    ///
    /// Overriding the source directory moves the intermediate directory
    /// along with it, and the output directory too unless it was set
    /// explicitly.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(source_dir) = &settings.source_dir {
            let old_source =
                std::mem::replace(&mut self.docs_resolved.source_dir, source_dir.clone());
            if self.docs_resolved.output_dir == old_source {
                self.docs_resolved.output_dir.clone_from(source_dir);
            }
            self.docs_resolved.temp_dir =
                source_dir.join(self.docs.temp_dir.as_deref().unwrap_or(DEFAULT_TEMP_DIR));
        }
        if let Some(output_dir) = &settings.output_dir {
            self.docs_resolved.output_dir.clone_from(output_dir);
        }
        if let Some(command) = &settings.renderer_command {
            self.renderer.command.clone_from(command);
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            docs: DocsConfigRaw::default(),
            documents: default_documents(),
            renderer: RendererConfig::default(),
            docs_resolved: DocsConfig::with_source_dir(base.to_path_buf()),
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file and after CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_documents()?;
        self.validate_renderer()?;
        Ok(())
    }

    /// Validate the document list.
    ///
    /// Prefixes become file names, so they must be unique and must not
    /// contain path separators.
    fn validate_documents(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.docs_resolved.language, "docs.language")?;

        if self.documents.is_empty() {
            return Err(ConfigError::Validation(
                "at least one [[documents]] entry is required".to_owned(),
            ));
        }

        let mut seen = HashSet::new();
        for entry in &self.documents {
            require_non_empty(&entry.file, "documents.file")?;
            require_non_empty(&entry.prefix, "documents.prefix")?;
            if entry.prefix.contains(['/', '\\']) {
                return Err(ConfigError::Validation(format!(
                    "documents.prefix '{}' cannot contain path separators",
                    entry.prefix
                )));
            }
            if !seen.insert(entry.prefix.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "documents.prefix '{}' is used more than once",
                    entry.prefix
                )));
            }
        }

        Ok(())
    }

    /// Validate renderer configuration.
    ///
    /// The command is split with shell quoting rules, so a program path
    /// containing spaces must be quoted.
    fn validate_renderer(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.renderer.command, "renderer.command")?;
        shell_words::split(&self.renderer.command).map_err(|e| {
            ConfigError::Validation(format!(
                "renderer.command '{}' cannot be parsed: {e}",
                self.renderer.command
            ))
        })?;
        require_non_empty(&self.renderer.background, "renderer.background")?;
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.renderer.command = expand::expand_env(&self.renderer.command, "renderer.command")?;

        let docs = &mut self.docs;
        for (value, field) in [
            (&mut docs.source_dir, "docs.source_dir"),
            (&mut docs.output_dir, "docs.output_dir"),
            (&mut docs.temp_dir, "docs.temp_dir"),
        ] {
            if let Some(raw) = value.as_deref() {
                *value = Some(expand::expand_env(raw, field)?);
            }
        }

        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    ///
    /// `output_dir` defaults to the source directory and `temp_dir` is
    /// resolved inside the source directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let source_dir = config_dir.join(self.docs.source_dir.as_deref().unwrap_or("."));
        let output_dir = self
            .docs
            .output_dir
            .as_deref()
            .map_or_else(|| source_dir.clone(), |dir| config_dir.join(dir));
        let temp_dir = source_dir.join(self.docs.temp_dir.as_deref().unwrap_or(DEFAULT_TEMP_DIR));

        self.docs_resolved = DocsConfig {
            source_dir,
            output_dir,
            temp_dir,
            language: self
                .docs
                .language
                .clone()
                .unwrap_or_else(|| "mermaid".to_owned()),
        };

        self.renderer.theme = normalize_theme(self.renderer.theme.take());
        self.renderer.fallback_theme = normalize_theme(self.renderer.fallback_theme.take());
    }
}
