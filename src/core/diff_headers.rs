use crate::error::Result;
use super::IncludeScanner;

/// Pulls include names out of the added and removed lines of a unified diff
pub struct DiffHeaderExtractor {
    scanner: IncludeScanner,
}

impl DiffHeaderExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            scanner: IncludeScanner::new()?,
        })
    }

    /// Header names referenced by `+`/`-` lines, in diff order, duplicates kept.
    ///
    /// Lines before the first `diff --git` marker (commit headers, the
    /// message) are ignored, as are the `---`/`+++` file header lines.
    pub fn extract_changed_headers(&self, diff: &str) -> Vec<String> {
        let mut headers = Vec::new();
        let mut in_file_diff = false;

        for line in diff.lines() {
            if line.starts_with("diff --git") {
                in_file_diff = true;
                continue;
            }

            if !in_file_diff || line.starts_with("---") || line.starts_with("+++") {
                continue;
            }

            if let Some(content) = line.strip_prefix('+').or_else(|| line.strip_prefix('-')) {
                if let Some(name) = self.scanner.find_in_line(content) {
                    headers.push(name);
                }
            }
        }

        headers
    }
}
