//! Fact extraction from tool output and assistant text
//!
//! Extractors are keyed by source identifier. Adding a heuristic means
//! registering another [`Extractor`], not editing a shared function.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::memory::types::Category;

/// Upper bound on candidates taken from a single piece of text
const MAX_CANDIDATES: usize = 10;

/// A fact proposed by an extractor, not yet recorded
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub category: Category,
    pub content: String,
}

impl Candidate {
    pub fn new(category: Category, content: impl Into<String>) -> Self {
        Self {
            category,
            content: content.into(),
        }
    }
}

/// Turns raw text from one kind of source into candidate facts
pub trait Extractor: Send + Sync {
    /// Name for logging
    fn name(&self) -> &'static str;

    /// Source identifiers this extractor handles
    fn source_kinds(&self) -> &[&'static str];

    /// Zero or more candidates found in `text`
    fn extract(&self, text: &str) -> Vec<Candidate>;
}

/// Error, panic and failure lines from command output
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorLineExtractor;

impl Extractor for ErrorLineExtractor {
    fn name(&self) -> &'static str {
        "error_lines"
    }

    fn source_kinds(&self) -> &[&'static str] {
        &["bash", "task"]
    }

    fn extract(&self, text: &str) -> Vec<Candidate> {
        static ERROR_LINE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"(?i)\b(?:error(?:\[E\d+\])?|panicked|exception|fatal|failed)\b")
                .expect("invalid error line regex")
        });
        // Zero counts in summaries such as "12 passed; 0 failed"
        static ZERO_COUNT: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(
                r"(?i)(?:0|no)\s+(?:failed|failures?|errors?|exceptions?)|(?:failed|failures|errors?)\s*[:=]\s*0",
            )
            .expect("invalid zero count regex")
        });

        text.lines()
            .map(str::trim)
            .filter(|line| {
                !line.is_empty() && ERROR_LINE.is_match(&ZERO_COUNT.replace_all(line, ""))
            })
            .take(5)
            .map(|line| Candidate::new(Category::Error, line))
            .collect()
    }
}

/// Path-like tokens (at least one directory and an extension)
#[derive(Debug, Default, Clone, Copy)]
pub struct FilePathExtractor;

impl Extractor for FilePathExtractor {
    fn name(&self) -> &'static str {
        "file_paths"
    }

    fn source_kinds(&self) -> &[&'static str] {
        &["read", "edit", "write", "grep", "glob"]
    }

    fn extract(&self, text: &str) -> Vec<Candidate> {
        static FILE_PATH: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r#"(?:^|[\s"'`(\[=:])(/?(?:[\w.-]+/)+[\w-][\w.-]*\.[A-Za-z0-9]{1,8})\b"#)
                .expect("invalid file path regex")
        });

        FILE_PATH
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| Candidate::new(Category::FilePath, m.as_str()))
            .collect()
    }
}

/// Commitment phrases in assistant text
#[derive(Debug, Default, Clone, Copy)]
pub struct DecisionExtractor;

impl Extractor for DecisionExtractor {
    fn name(&self) -> &'static str {
        "decisions"
    }

    fn source_kinds(&self) -> &[&'static str] {
        &["assistant"]
    }

    fn extract(&self, text: &str) -> Vec<Candidate> {
        static DECISION: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(
                r"(?i)\b(?:decided to|we will|we'll|going with|let's go with|chose to|opted to)\b[^.\n!?]*",
            )
            .expect("invalid decision regex")
        });

        DECISION
            .find_iter(text)
            .map(|m| m.as_str().trim())
            .filter(|s| s.split_whitespace().count() >= 3)
            .map(|s| Candidate::new(Category::Decision, s))
            .collect()
    }
}

/// Extractors grouped by source identifier
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    by_source: HashMap<String, Vec<Arc<dyn Extractor>>>,
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sources: Vec<&String> = self.by_source.keys().collect();
        sources.sort();
        f.debug_struct("ExtractorRegistry")
            .field("sources", &sources)
            .finish()
    }
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in error, file path and decision extractors
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ErrorLineExtractor));
        registry.register(Arc::new(FilePathExtractor));
        registry.register(Arc::new(DecisionExtractor));
        registry
    }

    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        for source in extractor.source_kinds() {
            self.by_source
                .entry((*source).to_string())
                .or_default()
                .push(Arc::clone(&extractor));
        }
    }

    /// Run every extractor registered for `source` over `text`.
    ///
    /// Candidates are de-duplicated, keep first-seen order and are capped.
    pub fn extract(&self, source: &str, text: &str) -> Vec<Candidate> {
        let Some(extractors) = self.by_source.get(source) else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for extractor in extractors {
            let found = extractor.extract(text);
            tracing::trace!(extractor = extractor.name(), found = found.len(), "Extracted");
            for candidate in found {
                if seen.insert(candidate.clone()) {
                    candidates.push(candidate);
                }
            }
        }
        candidates.truncate(MAX_CANDIDATES);
        candidates
    }

    pub fn handles(&self, source: &str) -> bool {
        self.by_source.contains_key(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_lines() {
        let output = "Compiling ebb v0.1.0\nerror[E0308]: mismatched types\n  --> src/lib.rs:4:5\nthread 'main' panicked at src/main.rs:2\nok";
        let found = ErrorLineExtractor.extract(output);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0], Candidate::new(Category::Error, "error[E0308]: mismatched types"));
        assert!(found[1].content.contains("panicked"));
    }

    #[test]
    fn test_error_lines_ignore_clean_output() {
        assert!(ErrorLineExtractor.extract("all 12 tests passed\n").is_empty());
    }

    #[test]
    fn test_error_lines_ignore_passing_summaries() {
        let output = "test result: ok. 12 passed; 0 failed; 0 ignored\nBuild finished with 0 errors\nfailures: 0";
        assert!(ErrorLineExtractor.extract(output).is_empty());

        let failing = ErrorLineExtractor.extract("test result: FAILED. 10 passed; 2 failed; 0 ignored");
        assert_eq!(failing.len(), 1);

        let mixed = ErrorLineExtractor.extract("0 failed in unit, error: linker not found");
        assert_eq!(mixed.len(), 1);
    }

    #[test]
    fn test_file_paths() {
        let output = "matches in src/memory/pool.rs and ./crates/ebb/Cargo.toml, see (/etc/hosts.conf)";
        let found: Vec<String> = FilePathExtractor
            .extract(output)
            .into_iter()
            .map(|c| c.content)
            .collect();
        assert_eq!(
            found,
            vec!["src/memory/pool.rs", "./crates/ebb/Cargo.toml", "/etc/hosts.conf"]
        );
    }

    #[test]
    fn test_file_paths_need_directory_and_extension() {
        assert!(FilePathExtractor.extract("see README.md or src/bin").is_empty());
    }

    #[test]
    fn test_decisions() {
        let text = "After comparing both, we decided to use SQLite for the cache. Ok.";
        let found = DecisionExtractor.extract(text);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].content, "decided to use SQLite for the cache");
        assert_eq!(found[0].category, Category::Decision);
    }

    #[test]
    fn test_registry_routes_by_source() {
        let registry = ExtractorRegistry::with_defaults();
        assert!(registry.handles("bash"));
        assert!(!registry.handles("webfetch"));
        assert!(registry.extract("webfetch", "error: nope").is_empty());

        let found = registry.extract("bash", "error: nope\nerror: nope");
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_registry_caps_candidates() {
        let registry = ExtractorRegistry::with_defaults();
        let text: String = (0..30).map(|i| format!("src/f{i}.rs\n")).collect();
        assert_eq!(registry.extract("glob", &text).len(), MAX_CANDIDATES);
    }
}
