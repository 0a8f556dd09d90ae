// src/core/plan.rs
use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::ExtractionConfig;
use crate::error::{Result, SplitError};

/// Argument vector for `git filter-repo` keeping a set of paths.
///
/// Only built here; running it belongs to the repository-splitting workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionPlan {
    /// Final "paths to retain", in first-seen order
    pub paths: Vec<String>,

    /// Complete command line, program name first
    pub command: Vec<String>,
}

impl ExtractionPlan {
    /// Build the plan from raw target paths (sources, headers, unresolved
    /// include names, module directories) and tracked `.gitignore` files.
    pub fn build(targets: &[String], gitignores: &[String], options: &ExtractionConfig) -> Result<Self> {
        let window = DateWindow::parse(options.start_date.as_deref(), options.end_date.as_deref())?;

        let mut command = vec!["git".to_string(), "filter-repo".to_string()];
        let mut paths = Vec::new();
        let mut seen = HashSet::new();

        for target in targets {
            let target = retained_path(target);
            if target.is_empty() || !seen.insert(target.clone()) {
                continue;
            }

            command.push("--path".to_string());
            command.push(target.clone());
            if options.regex_with_glob {
                command.push("--path-glob".to_string());
                command.push(format!("*/{}", target));
            }
            paths.push(target);
        }

        if options.track_gitignore {
            for gitignore in gitignores {
                if !seen.insert(gitignore.clone()) {
                    continue;
                }
                command.push("--path".to_string());
                command.push(gitignore.clone());
                paths.push(gitignore.clone());
            }
        }

        if let Some(callback) = window.commit_callback() {
            command.push("--commit-callback".to_string());
            command.push(callback);
        }

        if options.preserve_commit_hashes {
            command.push("--preserve-commit-hashes".to_string());
        }
        command.push("--force".to_string());

        Ok(Self { paths, command })
    }
}

/// Spelling of a target path handed to the history-rewriting tool.
///
/// Separators become `/`, leading `/` and `./` are stripped, and a path
/// that still climbs out with `..` is reduced to its file name. The last
/// step can make unrelated files with the same name collide.
pub fn retained_path(path: &str) -> String {
    let mut path = path.replace('\\', "/");
    loop {
        if let Some(rest) = path.strip_prefix('/') {
            path = rest.to_string();
        } else if let Some(rest) = path.strip_prefix("./") {
            path = rest.to_string();
        } else {
            break;
        }
    }

    if path.contains("..") {
        path.rsplit('/').next().unwrap_or_default().to_string()
    } else {
        path
    }
}

/// Optional commit date range, both ends inclusive at midnight UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateWindow {
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let start = start.map(parse_date).transpose()?;
        let end = end.map(parse_date).transpose()?;

        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(SplitError::Date(format!("start date {} is after end date {}", s, e)));
            }
        }

        Ok(Self { start, end })
    }

    /// Python callback for `--commit-callback` skipping commits outside the window
    pub fn commit_callback(&self) -> Option<String> {
        let mut conditions = Vec::new();
        if let Some(start) = self.start {
            conditions.push(format!("commit_date < \"{}T00:00:00\"", start.format("%Y-%m-%d")));
        }
        if let Some(end) = self.end {
            conditions.push(format!("commit_date > \"{}T00:00:00\"", end.format("%Y-%m-%d")));
        }
        if conditions.is_empty() {
            return None;
        }

        Some(format!(
            "import datetime\n\
             timestamp = int(commit.committer_date.split()[0])\n\
             commit_date = datetime.datetime.utcfromtimestamp(timestamp).strftime(\"%Y-%m-%dT%H:%M:%S\")\n\
             if {}:\n\
             \tcommit.skip()",
            conditions.join(" or ")
        ))
    }
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| SplitError::Date(format!("{:?}: {} (expected YYYY-MM-DD)", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_retained_path() {
        assert_eq!(retained_path("/./mm/memory.c"), "mm/memory.c");
        assert_eq!(retained_path(".\\include\\linux\\mm.h"), "include/linux/mm.h");
        assert_eq!(retained_path("../other/include/x.h"), "x.h");
        assert_eq!(retained_path("linux/mm.h"), "linux/mm.h");
    }

    #[test]
    fn test_plan_dedups_and_orders() {
        let options = ExtractionConfig::default();
        let plan = ExtractionPlan::build(
            &strings(&["mm/memory.c", "./mm/memory.c", "../x/a.h", "include/a.h"]),
            &[],
            &options,
        )
        .unwrap();

        assert_eq!(plan.paths, strings(&["mm/memory.c", "a.h", "include/a.h"]));
        assert_eq!(
            plan.command,
            strings(&[
                "git", "filter-repo",
                "--path", "mm/memory.c",
                "--path", "a.h",
                "--path", "include/a.h",
                "--preserve-commit-hashes",
                "--force",
            ])
        );
    }

    #[test]
    fn test_glob_and_gitignore() {
        let options = ExtractionConfig {
            regex_with_glob: true,
            track_gitignore: true,
            preserve_commit_hashes: false,
            ..Default::default()
        };
        let plan = ExtractionPlan::build(&strings(&["a.h"]), &strings(&[".gitignore", "mm/.gitignore"]), &options).unwrap();

        assert_eq!(
            plan.command,
            strings(&[
                "git", "filter-repo",
                "--path", "a.h", "--path-glob", "*/a.h",
                "--path", ".gitignore",
                "--path", "mm/.gitignore",
                "--force",
            ])
        );
    }

    #[test]
    fn test_date_window() {
        assert!(DateWindow::parse(Some("2021-13-01"), None).is_err());
        assert!(DateWindow::parse(Some("2022-01-01"), Some("2021-01-01")).is_err());

        let window = DateWindow::parse(Some("2020-01-01"), Some("2021-06-30")).unwrap();
        let callback = window.commit_callback().unwrap();
        assert!(callback.contains("commit_date < \"2020-01-01T00:00:00\" or commit_date > \"2021-06-30T00:00:00\""));
        assert!(callback.ends_with("\tcommit.skip()"));

        assert!(DateWindow::parse(None, None).unwrap().commit_callback().is_none());
    }
}
