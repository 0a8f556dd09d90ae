// src/core/history.rs
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{Result, SplitError};
use super::{DiffHeaderExtractor, VcsClient};

/// Header names mined from every commit that touched the target files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoricalClosure {
    /// Raw include names added or removed by those commits
    pub headers: BTreeSet<String>,

    /// Distinct commits whose diff was requested
    pub commits_scanned: usize,

    /// Commits whose diff could not be retrieved, with the reason
    pub failed_commits: Vec<CommitFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitFailure {
    pub commit: String,
    pub message: String,
}

/// Unions the include names changed across a file set's entire history.
///
/// The result is order-insensitive, so both the per-file history queries
/// and the per-commit diff queries run concurrently, bounded by
/// `concurrency` in-flight VCS processes.
pub struct HistoricalClosureBuilder {
    vcs: Arc<dyn VcsClient>,
    extractor: Arc<DiffHeaderExtractor>,
    concurrency: usize,
}

impl HistoricalClosureBuilder {
    pub fn new(vcs: Arc<dyn VcsClient>, concurrency: usize) -> Result<Self> {
        Ok(Self {
            vcs,
            extractor: Arc::new(DiffHeaderExtractor::new()?),
            concurrency: concurrency.max(1),
        })
    }

    pub async fn build_historical_closure(&self, repo: &Path, targets: &[String]) -> Result<HistoricalClosure> {
        let commits = self.commits_touching_any(repo, targets).await?;
        info!("Mining {} commits touching {} target files", commits.len(), targets.len());

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for commit in &commits {
            let vcs = Arc::clone(&self.vcs);
            let extractor = Arc::clone(&self.extractor);
            let semaphore = Arc::clone(&semaphore);
            let repo = repo.to_path_buf();
            let commit = commit.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let diff = vcs.diff_of(&repo, &commit).await;
                (commit, diff.map(|text| extractor.extract_changed_headers(&text)))
            });
        }

        let mut closure = HistoricalClosure {
            commits_scanned: commits.len(),
            ..Default::default()
        };

        while let Some(joined) = tasks.join_next().await {
            let (commit, result) = joined.map_err(|e| SplitError::Vcs {
                command: "diff task".to_string(),
                message: e.to_string(),
            })?;

            match result {
                Ok(headers) => {
                    debug!("{}: {} include changes", commit, headers.len());
                    closure.headers.extend(headers);
                }
                Err(e) => {
                    warn!("Skipping commit {}: {}", commit, e);
                    closure.failed_commits.push(CommitFailure {
                        commit,
                        message: e.to_string(),
                    });
                }
            }
        }

        closure.failed_commits.sort_by(|a, b| a.commit.cmp(&b.commit));
        Ok(closure)
    }

    /// Union of the commit histories of every target file.
    ///
    /// A failing history query means the repository itself is unusable,
    /// so it aborts the build.
    pub async fn commits_touching_any(&self, repo: &Path, targets: &[String]) -> Result<BTreeSet<String>> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for target in targets {
            let vcs = Arc::clone(&self.vcs);
            let semaphore = Arc::clone(&semaphore);
            let repo: PathBuf = repo.to_path_buf();
            let target = target.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                vcs.commits_touching(&repo, &target).await
            });
        }

        let mut commits = BTreeSet::new();
        while let Some(joined) = tasks.join_next().await {
            let history = joined.map_err(|e| SplitError::Vcs {
                command: "history task".to_string(),
                message: e.to_string(),
            })??;
            commits.extend(history);
        }

        Ok(commits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vcs::fake::FakeVcs;

    fn targets(files: &[&str]) -> Vec<String> {
        files.iter().map(|f| f.to_string()).collect()
    }

    #[tokio::test]
    async fn test_headers_from_added_and_removed_lines() {
        let vcs = FakeVcs::default()
            .with_commit(
                "c1",
                &["mm/memory.c"],
                "diff --git a/mm/memory.c b/mm/memory.c\n+#include \"x.h\"\n",
            )
            .with_commit(
                "c2",
                &["mm/memory.c"],
                "diff --git a/mm/memory.c b/mm/memory.c\n-#include \"x.h\"\n+#include \"y.h\"\n",
            );

        let builder = HistoricalClosureBuilder::new(Arc::new(vcs), 4).unwrap();
        let closure = builder
            .build_historical_closure(Path::new("/repo"), &targets(&["mm/memory.c"]))
            .await
            .unwrap();

        assert!(closure.headers.contains("x.h"));
        assert!(closure.headers.contains("y.h"));
        assert_eq!(closure.commits_scanned, 2);
        assert!(closure.failed_commits.is_empty());
    }

    #[tokio::test]
    async fn test_each_target_contributes_its_history() {
        let vcs = FakeVcs::default()
            .with_commit("shared", &["a.c", "b.c"], "diff --git a/a.c b/a.c\n+#include <s.h>\n")
            .with_commit("only-b", &["b.c"], "diff --git a/b.c b/b.c\n+#include <b_only.h>\n")
            .with_commit("unrelated", &["z.c"], "diff --git a/z.c b/z.c\n+#include <z.h>\n");

        let builder = HistoricalClosureBuilder::new(Arc::new(vcs), 2).unwrap();
        let closure = builder
            .build_historical_closure(Path::new("/repo"), &targets(&["a.c", "b.c"]))
            .await
            .unwrap();

        assert_eq!(
            closure.headers,
            BTreeSet::from(["s.h".to_string(), "b_only.h".to_string()])
        );
        assert_eq!(closure.commits_scanned, 2);
    }

    #[tokio::test]
    async fn test_failed_diff_does_not_abort() {
        let mut vcs = FakeVcs::default()
            .with_commit("good", &["a.c"], "diff --git a/a.c b/a.c\n+#include <ok.h>\n");
        vcs.history.get_mut("a.c").unwrap().push("missing".to_string());

        let builder = HistoricalClosureBuilder::new(Arc::new(vcs), 1).unwrap();
        let closure = builder
            .build_historical_closure(Path::new("/repo"), &targets(&["a.c"]))
            .await
            .unwrap();

        assert_eq!(closure.headers, BTreeSet::from(["ok.h".to_string()]));
        assert_eq!(closure.failed_commits.len(), 1);
        assert_eq!(closure.failed_commits[0].commit, "missing");
    }

    #[tokio::test]
    async fn test_result_independent_of_concurrency() {
        let mut vcs = FakeVcs::default();
        for i in 0..20 {
            vcs = vcs.with_commit(
                &format!("c{}", i),
                &["t.c"],
                &format!("diff --git a/t.c b/t.c\n+#include <h{}.h>\n-#include <h{}.h>\n", i, i % 3),
            );
        }
        let vcs: Arc<dyn VcsClient> = Arc::new(vcs);

        let serial = HistoricalClosureBuilder::new(Arc::clone(&vcs), 1).unwrap();
        let parallel = HistoricalClosureBuilder::new(vcs, 16).unwrap();
        let t = targets(&["t.c"]);

        let a = serial.build_historical_closure(Path::new("/repo"), &t).await.unwrap();
        let b = parallel.build_historical_closure(Path::new("/repo"), &t).await.unwrap();
        assert_eq!(a.headers, b.headers);
        assert_eq!(a.headers.len(), 20);
    }
}
