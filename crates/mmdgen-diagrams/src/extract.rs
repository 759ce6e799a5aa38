//! Fenced diagram block extraction.
//!
//! A block starts at a line opening with three backticks followed directly by
//! the language tag and a line break, and ends at the next three backticks.
//! Everything in between is the diagram source.

use std::io;
use std::sync::LazyLock;

use regex::Regex;

use crate::block::{DiagramBlock, SourceDocument};
use crate::consts::DEFAULT_LANGUAGE;

static MERMAID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&fence_pattern(DEFAULT_LANGUAGE)).unwrap());

fn fence_pattern(language: &str) -> String {
    format!(r"(?s)```{}\r?\n(.*?)```", regex::escape(language))
}

/// Extracts fenced blocks for a single fence language.
#[derive(Debug, Clone)]
pub struct BlockExtractor {
    pattern: Regex,
}

impl Default for BlockExtractor {
    fn default() -> Self {
        Self {
            pattern: MERMAID_PATTERN.clone(),
        }
    }
}

impl BlockExtractor {
    /// Create an extractor for blocks fenced with ```` ```<language> ````.
    ///
    /// # Errors
    ///
    /// Returns an error if the compiled pattern exceeds the regex size limit.
    pub fn new(language: &str) -> Result<Self, regex::Error> {
        if language == DEFAULT_LANGUAGE {
            return Ok(Self::default());
        }
        Ok(Self {
            pattern: Regex::new(&fence_pattern(language))?,
        })
    }

    /// Extract trimmed block sources from `content` in document order.
    ///
    /// Returns an empty vector when the document has no blocks.
    #[must_use]
    pub fn extract(&self, content: &str) -> Vec<String> {
        self.pattern
            .captures_iter(content)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_owned())
            .collect()
    }

    /// Read `document` and extract its blocks, numbered from 1.
    ///
    /// Returns `Ok(None)` when the document does not exist.
    pub fn extract_document(
        &self,
        document: &SourceDocument,
    ) -> io::Result<Option<Vec<DiagramBlock>>> {
        let content = match std::fs::read_to_string(&document.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let blocks = self
            .extract(&content)
            .into_iter()
            .enumerate()
            .map(|(i, source)| DiagramBlock {
                prefix: document.prefix.clone(),
                index: i + 1,
                source,
            })
            .collect();

        Ok(Some(blocks))
    }
}

/// Extract trimmed ```` ```mermaid ```` block sources from `content`.
#[must_use]
pub fn extract_blocks(content: &str) -> Vec<String> {
    BlockExtractor::default().extract(content)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_extract_multiple_blocks_in_order() {
        let content = "# Architecture\n\n```mermaid\ngraph TD\n  A --> B\n```\n\nText.\n\n```mermaid\nsequenceDiagram\n  A->>B: hi\n```\n";
        let blocks = extract_blocks(content);
        assert_eq!(
            blocks,
            vec![
                "graph TD\n  A --> B".to_owned(),
                "sequenceDiagram\n  A->>B: hi".to_owned(),
            ]
        );
    }

    #[test]
    fn test_extract_trims_edges() {
        let content = "```mermaid\n\n   graph LR\n   A --> B   \n\n```";
        assert_eq!(extract_blocks(content), vec!["graph LR\n   A --> B".to_owned()]);
    }

    #[test]
    fn test_extract_no_blocks() {
        assert!(extract_blocks("# Title\n\nNo diagrams here.\n").is_empty());
        assert!(extract_blocks("").is_empty());
    }

    #[test]
    fn test_extract_ignores_other_languages() {
        let content = "```rust\nfn main() {}\n```\n```mermaid\npie\n```\n```plantuml\n@startuml\n@enduml\n```";
        assert_eq!(extract_blocks(content), vec!["pie".to_owned()]);
    }

    #[test]
    fn test_extract_requires_line_break_after_tag() {
        // `mermaidjs` is a different tag, not a mermaid block
        let content = "```mermaidjs\ngraph TD\n```";
        assert!(extract_blocks(content).is_empty());
    }

    #[test]
    fn test_extract_crlf_line_endings() {
        let content = "```mermaid\r\ngraph TD\r\n  A --> B\r\n```\r\n";
        assert_eq!(extract_blocks(content), vec!["graph TD\r\n  A --> B".to_owned()]);
    }

    #[test]
    fn test_extract_empty_block() {
        let content = "```mermaid\n```";
        assert_eq!(extract_blocks(content), vec![String::new()]);
    }

    #[test]
    fn test_custom_language() {
        let extractor = BlockExtractor::new("kroki-mermaid").unwrap();
        let content = "```kroki-mermaid\ngraph TD\n```\n```mermaid\npie\n```";
        assert_eq!(extractor.extract(content), vec!["graph TD".to_owned()]);
    }

    #[test]
    fn test_language_is_escaped() {
        let extractor = BlockExtractor::new("c++").unwrap();
        assert_eq!(extractor.extract("```c++\nx\n```"), vec!["x".to_owned()]);
        assert!(extractor.extract("```cc\nx\n```").is_empty());
    }

    #[test]
    fn test_extract_document_numbers_from_one() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("a.md");
        std::fs::write(&path, "```mermaid\none\n```\n```mermaid\ntwo\n```\n").unwrap();

        let document = SourceDocument::new(&path, "a");
        let blocks = BlockExtractor::default()
            .extract_document(&document)
            .unwrap()
            .unwrap();

        assert_eq!(
            blocks,
            vec![
                DiagramBlock {
                    prefix: "a".to_owned(),
                    index: 1,
                    source: "one".to_owned(),
                },
                DiagramBlock {
                    prefix: "a".to_owned(),
                    index: 2,
                    source: "two".to_owned(),
                },
            ]
        );
    }

    #[test]
    fn test_extract_document_missing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let document = SourceDocument::new(temp_dir.path().join("missing.md"), "m");

        let result = BlockExtractor::default().extract_document(&document).unwrap();
        assert!(result.is_none());
    }
}
