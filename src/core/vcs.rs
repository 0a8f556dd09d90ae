//! Version control queries used by history mining and extraction planning.
//!
//! The core only talks to [`VcsClient`]; [`GitCli`] is the production
//! implementation that shells out to `git`.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use tokio::process::Command;
use tracing::debug;

use crate::config::HistoryConfig;
use crate::error::{Result, SplitError};

#[async_trait]
pub trait VcsClient: Send + Sync {
    /// Commits that modified `file`, newest first
    async fn commits_touching(&self, repo: &Path, file: &str) -> Result<Vec<String>>;

    /// Unified diff of `commit` against its first parent
    async fn diff_of(&self, repo: &Path, commit: &str) -> Result<String>;

    /// Tracked paths matching a pathspec
    async fn tracked_files(&self, repo: &Path, pathspec: &str) -> Result<Vec<String>>;

    /// Number of commits reachable from `HEAD`
    async fn commit_count(&self, repo: &Path) -> Result<usize>;

    /// Commit time of the oldest commit reachable from `HEAD`, if any
    async fn earliest_commit(&self, repo: &Path) -> Result<Option<DateTime<FixedOffset>>>;
}

/// `git` subprocess client with a per-invocation timeout
pub struct GitCli {
    timeout: Duration,
    follow_renames: bool,
}

impl GitCli {
    pub fn new(config: &HistoryConfig) -> Self {
        Self::with_timeout(Duration::from_secs(config.timeout_secs), config.follow_renames)
    }

    pub fn with_timeout(timeout: Duration, follow_renames: bool) -> Self {
        Self {
            timeout,
            follow_renames,
        }
    }

    async fn run(&self, repo: &Path, args: &[&str]) -> Result<String> {
        let command = format!("git {}", args.join(" "));
        debug!("Running {} in {}", command, repo.display());

        let child = Command::new("git")
            .arg("-C")
            .arg(repo)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SplitError::Vcs {
                command: command.clone(),
                message: e.to_string(),
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(SplitError::VcsTimeout {
                    command,
                    seconds: self.timeout.as_secs_f64().ceil() as u64,
                })
            }
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(SplitError::Vcs {
                command,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl VcsClient for GitCli {
    async fn commits_touching(&self, repo: &Path, file: &str) -> Result<Vec<String>> {
        let mut args = vec!["log", "--pretty=format:%H"];
        if self.follow_renames {
            args.push("--follow");
        }
        args.push("--");
        args.push(file);

        let stdout = self.run(repo, &args).await?;
        Ok(non_empty_lines(&stdout))
    }

    async fn diff_of(&self, repo: &Path, commit: &str) -> Result<String> {
        self.run(
            repo,
            &[
                "show",
                "--pretty=format:",
                "--no-color",
                "--no-ext-diff",
                "--diff-merges=first-parent",
                commit,
            ],
        )
        .await
    }

    async fn tracked_files(&self, repo: &Path, pathspec: &str) -> Result<Vec<String>> {
        let stdout = self.run(repo, &["ls-files", "--", pathspec]).await?;
        Ok(non_empty_lines(&stdout))
    }

    async fn commit_count(&self, repo: &Path) -> Result<usize> {
        let stdout = self.run(repo, &["rev-list", "--count", "HEAD"]).await?;
        stdout.trim().parse().map_err(|_| SplitError::Vcs {
            command: "git rev-list --count HEAD".to_string(),
            message: format!("unexpected output {:?}", stdout.trim()),
        })
    }

    async fn earliest_commit(&self, repo: &Path) -> Result<Option<DateTime<FixedOffset>>> {
        // --reverse is applied after limiting, so -n1 would pick the newest commit
        let stdout = self.run(repo, &["log", "--reverse", "--pretty=format:%ci"]).await?;
        stdout.lines().find(|line| !line.trim().is_empty()).map(parse_commit_time).transpose()
    }
}

/// Parse a `%ci` timestamp such as `2005-04-16 15:20:36 -0700`
pub fn parse_commit_time(value: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_str(value.trim(), "%Y-%m-%d %H:%M:%S %z").map_err(|e| SplitError::Vcs {
        command: "git log --pretty=format:%ci".to_string(),
        message: format!("unparsable commit time {:?}: {}", value, e),
    })
}

fn non_empty_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_lines() {
        assert_eq!(
            non_empty_lines("abc\n\n def \n"),
            vec!["abc".to_string(), "def".to_string()]
        );
    }

    #[test]
    fn test_parse_commit_time() {
        let time = parse_commit_time("2005-04-16 15:20:36 -0700\n").unwrap();
        assert_eq!(time.to_rfc3339(), "2005-04-16T15:20:36-07:00");
        assert!(parse_commit_time("yesterday").is_err());
    }

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    fn git(repo: &Path, args: &[&str]) {
        let status = std::process::Command::new("git")
            .arg("-C")
            .arg(repo)
            .args(["-c", "user.name=Test", "-c", "user.email=test@example.com", "-c", "commit.gpgsign=false"])
            .args(args)
            .env("GIT_AUTHOR_DATE", "2020-01-02T03:04:05+0000")
            .env("GIT_COMMITTER_DATE", "2020-01-02T03:04:05+0000")
            .status()
            .unwrap();
        assert!(status.success(), "git {:?} failed", args);
    }

    fn commit_file(repo: &Path, file: &str, content: &str, message: &str) {
        let path = repo.join(file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        git(repo, &["add", "--", file]);
        git(repo, &["commit", "-q", "-m", message]);
    }

    #[tokio::test]
    async fn test_history_of_real_repository() {
        if !git_available() {
            eprintln!("git not installed, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path();
        git(repo, &["init", "-q"]);
        commit_file(repo, "src/a.c", "#include \"x.h\"\nint a;\n", "add x");
        commit_file(repo, "src/b.c", "#include \"unrelated.h\"\n", "sibling");
        commit_file(repo, "src/a.c", "#include \"y.h\"\nint a;\n", "x to y");

        let git = GitCli::new(&HistoryConfig::default());
        let commits = git.commits_touching(repo, "src/a.c").await.unwrap();
        assert_eq!(commits.len(), 2);

        let mut headers = Vec::new();
        for commit in &commits {
            let diff = git.diff_of(repo, commit).await.unwrap();
            assert!(diff.contains("diff --git a/src/a.c b/src/a.c"), "unexpected diff: {:?}", diff);
            headers.extend(crate::core::DiffHeaderExtractor::new().unwrap().extract_changed_headers(&diff));
        }
        headers.sort();
        assert_eq!(headers, vec!["x.h", "x.h", "y.h"]);

        assert_eq!(git.commit_count(repo).await.unwrap(), 3);
        let earliest = git.earliest_commit(repo).await.unwrap().unwrap();
        assert_eq!(earliest.to_rfc3339(), "2020-01-02T03:04:05+00:00");

        let tracked = git.tracked_files(repo, "*.c").await.unwrap();
        assert_eq!(tracked, vec!["src/a.c".to_string(), "src/b.c".to_string()]);
    }

    #[tokio::test]
    async fn test_slow_command_times_out() {
        if !git_available() {
            eprintln!("git not installed, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let git = GitCli::with_timeout(Duration::from_millis(200), false);

        let started = std::time::Instant::now();
        let result = git.run(dir.path(), &["-c", "alias.stall=!sleep 10", "stall"]).await;
        assert!(matches!(result, Err(SplitError::VcsTimeout { seconds: 1, .. })));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_git_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let git = GitCli::new(&HistoryConfig::default());

        // Not a repository: git exits non-zero, or git is not installed at all
        let result = git.diff_of(dir.path(), "HEAD").await;
        assert!(matches!(result, Err(SplitError::Vcs { .. })));
    }
}
