use regex::Regex;

use crate::error::Result;

/// `#include "name"` or `#include <name>`, capturing the name
const INCLUDE_PATTERN: &str = r#"#include\s+[<"]([^">]+)[">]"#;

/// Extracts raw include targets from C/C++ source text.
///
/// This is a textual approximation of the preprocessor: includes inside
/// `#ifdef` blocks, comments or disabled code are all reported, which
/// over-approximates the dependency set.
pub struct IncludeScanner {
    include_regex: Regex,
}

impl IncludeScanner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            include_regex: Regex::new(INCLUDE_PATTERN)?,
        })
    }

    /// All include names in source order, duplicates preserved
    pub fn scan(&self, text: &str) -> Vec<String> {
        self.include_regex
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// First include name on a single line, if any
    pub fn find_in_line(&self, line: &str) -> Option<String> {
        self.include_regex
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}
