// src/core/engine.rs
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::SplitError;
use super::stats::{count_file_extensions, summarize_search_locations, SplitStatistics};
use super::{
    paths, DependencyClosure, ExtractionPlan, GitCli, HeaderResolver, HistoricalClosure,
    HistoricalClosureBuilder, ModuleClosure, ModuleHeaderAggregator, SearchLocation, VcsClient,
};

/// Where to resolve: repository root and ordered include search list.
/// `None`/empty fields fall back to the configuration.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub repo: Option<PathBuf>,
    pub includes: Vec<PathBuf>,
}

/// Headers of a set of target files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub targets: Vec<String>,
    pub closure: DependencyClosure,
    pub history: Option<HistoricalClosure>,
}

impl FileReport {
    /// Targets, current closure and historical headers, in that order
    pub fn retained_paths(&self) -> Vec<String> {
        let mut paths = self.targets.clone();
        paths.extend(self.closure.headers.iter().cloned());
        paths.extend(self.closure.unresolved.iter().cloned());
        if let Some(history) = &self.history {
            paths.extend(history.headers.iter().cloned());
        }
        paths
    }
}

/// Headers of every translation unit under a set of module directories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleReport {
    pub modules: Vec<String>,
    pub closure: ModuleClosure,
    pub history: Option<HistoricalClosure>,
}

impl ModuleReport {
    /// Current closure and historical headers, followed by the module directories
    pub fn retained_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.closure.closure().all_paths().into_iter().collect();
        if let Some(history) = &self.history {
            paths.extend(history.headers.iter().cloned());
        }
        paths.extend(self.modules.iter().cloned());
        paths
    }
}

/// Validated repository root and resolver for one invocation
struct Prepared {
    repo: String,
    resolver: HeaderResolver,
    /// Configured search locations that do not exist
    missing: Vec<String>,
}

/// Main orchestration engine
pub struct Engine {
    config: Config,
    vcs: Arc<dyn VcsClient>,
}

impl Engine {
    /// Create a new engine from an optional configuration file
    pub async fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load_or_default(config_path)?;
        debug!("Loaded configuration: {:?}", config);

        let vcs: Arc<dyn VcsClient> = Arc::new(GitCli::new(&config.history));
        Ok(Self::with_vcs(config, vcs))
    }

    pub fn with_vcs(config: Config, vcs: Arc<dyn VcsClient>) -> Self {
        Self { config, vcs }
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Write the active configuration to `path` (default `header-split.toml`)
    pub async fn init(&self, path: Option<PathBuf>, force: bool) -> Result<PathBuf> {
        let path = path.unwrap_or_else(|| PathBuf::from("header-split.toml"));
        if path.exists() && !force {
            return Err(SplitError::InvalidConfiguration(format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            ))
            .into());
        }

        self.config.save(&path)?;
        info!("Wrote configuration to {}", path.display());
        Ok(path)
    }

    /// Resolve the headers of `targets` (paths relative to the repository)
    pub async fn resolve_files(
        &self,
        scope: &Scope,
        targets: &[String],
        recursive: Option<bool>,
        with_history: Option<bool>,
    ) -> Result<FileReport> {
        let prepared = self.prepare(scope)?;
        let targets = require_non_empty(targets, "target file")?;
        let recursive = recursive.unwrap_or(self.config.resolution.recursive);

        let started = Instant::now();
        let mut closure = DependencyClosure::default();
        for target in &targets {
            let source = paths::join(&prepared.repo, target);
            closure.merge(prepared.resolver.resolve(&source, recursive)?);
        }
        let closure = closure.to_relative(&prepared.repo);
        info!(
            "Resolved {} headers ({} unresolved) for {} files in {:.2?}",
            closure.headers.len(),
            closure.unresolved.len(),
            targets.len(),
            started.elapsed()
        );

        let history = if with_history.unwrap_or(self.config.history.enabled) {
            Some(self.mine_history(&prepared.repo, &targets).await?)
        } else {
            None
        };

        Ok(FileReport {
            targets,
            closure,
            history,
        })
    }

    /// Resolve every translation unit under `modules`
    pub async fn resolve_modules(
        &self,
        scope: &Scope,
        modules: &[String],
        with_history: Option<bool>,
    ) -> Result<ModuleReport> {
        let prepared = self.prepare(scope)?;
        let modules = require_non_empty(modules, "module")?;

        let started = Instant::now();
        let aggregator = ModuleHeaderAggregator::new(&self.config.resolution);
        let closure = aggregator.resolve_modules(&prepared.repo, &modules, &prepared.resolver)?;
        info!(
            "Resolved {} headers ({} unresolved) for {} source files in {:.2?}",
            closure.headers.len(),
            closure.unresolved.len(),
            closure.source_files.len(),
            started.elapsed()
        );

        let history = if with_history.unwrap_or(self.config.history.enabled) {
            let sources: Vec<String> = closure.source_files.iter().cloned().collect();
            Some(self.mine_history(&prepared.repo, &sources).await?)
        } else {
            None
        };

        Ok(ModuleReport {
            modules,
            closure,
            history,
        })
    }

    /// Header names added or removed by any commit touching `targets`
    pub async fn history(&self, repo: Option<&Path>, targets: &[String]) -> Result<HistoricalClosure> {
        let repo = self.repo_root(repo)?;
        let targets = require_non_empty(targets, "target file")?;
        self.mine_history(&repo, &targets).await
    }

    /// Filter-repo invocation for an already resolved set of paths
    pub async fn plan(&self, repo: Option<&Path>, retained: &[String]) -> Result<ExtractionPlan> {
        let repo = self.repo_root(repo)?;
        let options = &self.config.extraction;

        let gitignores = if options.track_gitignore {
            let found = self.vcs.tracked_files(Path::new(&repo), "*.gitignore").await?;
            info!("Keeping {} .gitignore files", found.len());
            found
        } else {
            Vec::new()
        };

        let plan = ExtractionPlan::build(retained, &gitignores, options)?;
        info!("Extraction plan retains {} paths", plan.paths.len());
        Ok(plan)
    }

    /// Repository statistics around the target files
    pub async fn stats(&self, scope: &Scope, targets: &[String]) -> Result<SplitStatistics> {
        let prepared = self.prepare(scope)?;

        let builder = HistoricalClosureBuilder::new(Arc::clone(&self.vcs), self.config.history.concurrency)?;
        let repo = Path::new(&prepared.repo);
        let commits = builder.commits_touching_any(repo, targets).await?;
        let commit_count = self.vcs.commit_count(repo).await?;
        let earliest_commit = self.vcs.earliest_commit(repo).await?;

        let mut search_locations = summarize_search_locations(prepared.resolver.locations());
        search_locations.missing.extend(prepared.missing);

        Ok(SplitStatistics {
            file_extensions: count_file_extensions(repo),
            commit_count,
            earliest_commit,
            target_commits: commits.len(),
            search_locations,
        })
    }

    async fn mine_history(&self, repo: &str, targets: &[String]) -> Result<HistoricalClosure> {
        let started = Instant::now();
        let builder = HistoricalClosureBuilder::new(Arc::clone(&self.vcs), self.config.history.concurrency)?;
        let history = builder
            .build_historical_closure(Path::new(repo), targets)
            .await?;

        if !history.failed_commits.is_empty() {
            warn!("{} commits could not be read", history.failed_commits.len());
        }
        info!(
            "Historical closure: {} headers from {} commits in {:.2?}",
            history.headers.len(),
            history.commits_scanned,
            started.elapsed()
        );
        Ok(history)
    }

    fn prepare(&self, scope: &Scope) -> Result<Prepared> {
        let repo = self.repo_root(scope.repo.as_deref())?;

        let configured = if scope.includes.is_empty() {
            &self.config.project.search_locations
        } else {
            &scope.includes
        };

        let mut locations = Vec::new();
        let mut missing = Vec::new();
        for include in configured {
            let path = if include.is_absolute() {
                paths::normalize_path(include)
            } else {
                paths::join(&repo, &include.to_string_lossy())
            };

            let location = SearchLocation::classify(&path);
            if let SearchLocation::Directory(dir) = &location {
                if !Path::new(dir).is_dir() {
                    warn!("Search location does not exist, skipping: {}", dir);
                    missing.push(dir.clone());
                    continue;
                }
            }
            locations.push(location);
        }
        debug!("Search locations: {:?}", locations);

        let resolver = HeaderResolver::new(locations, self.config.resolution.decode_policy)?;
        Ok(Prepared { repo, resolver, missing })
    }

    fn repo_root(&self, repo: Option<&Path>) -> Result<String> {
        let repo = repo.unwrap_or(&self.config.project.repo_path);
        let root = paths::absolutize(repo)?;

        if !Path::new(&root).is_dir() {
            return Err(SplitError::InvalidConfiguration(format!(
                "Repository path is not a directory: {}",
                root
            ))
            .into());
        }
        Ok(root)
    }
}

fn require_non_empty(items: &[String], what: &str) -> std::result::Result<Vec<String>, SplitError> {
    let items: Vec<String> = items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();

    if items.is_empty() {
        return Err(SplitError::InvalidConfiguration(format!("No {} given", what)));
    }

    // Duplicates only cost time; keep the first spelling
    let mut seen = BTreeSet::new();
    Ok(items.into_iter().filter(|item| seen.insert(item.clone())).collect())
}
