use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::SearchLocation;

/// File counts per extension in a directory tree, `.git` excluded.
///
/// Files without an extension are counted under the empty string.
pub fn count_file_extensions(root: &Path) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();

    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git");

    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let ext = entry
            .path()
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        *counts.entry(ext).or_insert(0) += 1;
    }

    counts
}

/// How much the search locations offer, and which of them are missing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchLocationSummary {
    /// Files reachable under all locations (a forced header counts once)
    pub available_files: usize,

    /// Locations that are neither a file nor a directory
    pub missing: Vec<String>,
}

pub fn summarize_search_locations(locations: &[SearchLocation]) -> SearchLocationSummary {
    let mut summary = SearchLocationSummary::default();

    for location in locations {
        let path = Path::new(location.path());
        if path.is_file() {
            summary.available_files += 1;
        } else if path.is_dir() {
            summary.available_files += WalkDir::new(path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .count();
        } else {
            summary.missing.push(location.path().to_string());
        }
    }

    summary
}

/// Repository statistics reported around a split
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplitStatistics {
    pub file_extensions: BTreeMap<String, usize>,

    /// Commits reachable from `HEAD`
    pub commit_count: usize,

    /// `None` for a repository without commits
    pub earliest_commit: Option<DateTime<FixedOffset>>,

    pub target_commits: usize,
    pub search_locations: SearchLocationSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::paths;
    use assert_fs::prelude::*;

    #[test]
    fn test_count_file_extensions() {
        let repo = assert_fs::TempDir::new().unwrap();
        repo.child("a.c").write_str("").unwrap();
        repo.child("mm/b.c").write_str("").unwrap();
        repo.child("mm/b.h").write_str("").unwrap();
        repo.child("Makefile").write_str("").unwrap();
        repo.child(".git/objects/x.c").write_str("").unwrap();

        let counts = count_file_extensions(repo.path());
        assert_eq!(counts.get(".c"), Some(&2));
        assert_eq!(counts.get(".h"), Some(&1));
        assert_eq!(counts.get(""), Some(&1));
    }

    #[test]
    fn test_summarize_search_locations() {
        let repo = assert_fs::TempDir::new().unwrap();
        repo.child("include/a.h").write_str("").unwrap();
        repo.child("include/linux/b.h").write_str("").unwrap();
        repo.child("forced.h").write_str("").unwrap();

        let root = paths::normalize_path(repo.path());
        let locations: Vec<SearchLocation> = ["include", "forced.h", "generated"]
            .iter()
            .map(|p| SearchLocation::classify(&paths::join(&root, p)))
            .collect();

        let summary = summarize_search_locations(&locations);
        assert_eq!(summary.available_files, 3);
        assert_eq!(summary.missing, vec![paths::join(&root, "generated")]);
    }
}
