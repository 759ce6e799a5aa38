//! Internal constants for diagram extraction and rendering.

/// Extension of intermediate diagram source files.
pub const INTERMEDIATE_EXTENSION: &str = "mmd";

/// Fence language tag used when none is configured.
pub const DEFAULT_LANGUAGE: &str = "mermaid";

/// Default Mermaid CLI program name.
pub const DEFAULT_PROGRAM: &str = "mmdc";
