use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use anyhow::Result;
use serde::Serialize;

use crate::core::{Engine, Scope};

#[derive(Parser)]
#[command(name = "header-split")]
#[command(about = "Extract C/C++ files and the headers they depend on out of a large repository")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Print reports as JSON instead of one path per line
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct ScopeArgs {
    /// Repository working tree (defaults to the configured repo_path)
    #[arg(short, long)]
    pub repo: Option<PathBuf>,

    /// Include search location, in priority order; may be a directory or a header
    #[arg(short = 'I', long = "include")]
    pub includes: Vec<PathBuf>,
}

impl From<ScopeArgs> for Scope {
    fn from(args: ScopeArgs) -> Self {
        Scope {
            repo: args.repo,
            includes: args.includes,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write the current configuration to a TOML file
    Init {
        /// Destination (defaults to header-split.toml)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Resolve the headers of source files
    Files {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Only headers included directly by the targets
        #[arg(long)]
        direct: bool,

        /// Also mine every commit that touched the targets
        #[arg(long)]
        history: bool,

        /// Source files, relative to the repository
        #[arg(required = true)]
        targets: Vec<String>,
    },

    /// Resolve the headers of every source file under module directories
    Modules {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Also mine every commit that touched the module sources
        #[arg(long)]
        history: bool,

        /// Module directories, relative to the repository
        #[arg(required = true)]
        modules: Vec<String>,
    },

    /// List header names added or removed by commits touching the targets
    History {
        /// Repository working tree (defaults to the configured repo_path)
        #[arg(short, long)]
        repo: Option<PathBuf>,

        #[arg(required = true)]
        targets: Vec<String>,
    },

    /// Print the filter-repo command that keeps the targets and their headers
    Plan {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Treat targets as module directories
        #[arg(long)]
        modules: bool,

        /// Also mine history for headers
        #[arg(long)]
        history: bool,

        /// Add a --path-glob next to every --path
        #[arg(long)]
        glob: bool,

        /// Keep every tracked .gitignore
        #[arg(long)]
        track_gitignore: bool,

        /// Drop commits before this date (YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<String>,

        /// Drop commits after this date (YYYY-MM-DD)
        #[arg(long)]
        end_date: Option<String>,

        #[arg(required = true)]
        targets: Vec<String>,
    },

    /// Show repository statistics for the targets
    Stats {
        #[command(flatten)]
        scope: ScopeArgs,

        targets: Vec<String>,
    },
}

impl Cli {
    pub async fn execute(self, mut engine: Engine) -> Result<()> {
        let json = self.json;

        match self.command {
            Commands::Init { path, force } => {
                let path = engine.init(path, force).await?;
                println!("{}", path.display());
                Ok(())
            }
            Commands::Files { scope, direct, history, targets } => {
                let recursive = if direct { Some(false) } else { None };
                let report = engine
                    .resolve_files(&scope.into(), &targets, recursive, history.then_some(true))
                    .await?;
                emit(json, &report, || report.retained_paths())
            }
            Commands::Modules { scope, history, modules } => {
                let report = engine
                    .resolve_modules(&scope.into(), &modules, history.then_some(true))
                    .await?;
                emit(json, &report, || report.retained_paths())
            }
            Commands::History { repo, targets } => {
                let history = engine.history(repo.as_deref(), &targets).await?;
                emit(json, &history, || history.headers.iter().cloned().collect())
            }
            Commands::Plan {
                scope,
                modules,
                history,
                glob,
                track_gitignore,
                start_date,
                end_date,
                targets,
            } => {
                let extraction = &mut engine.config_mut().extraction;
                extraction.regex_with_glob |= glob;
                extraction.track_gitignore |= track_gitignore;
                if start_date.is_some() {
                    extraction.start_date = start_date;
                }
                if end_date.is_some() {
                    extraction.end_date = end_date;
                }

                let repo = scope.repo.clone();
                let scope: Scope = scope.into();
                let retained = if modules {
                    engine
                        .resolve_modules(&scope, &targets, history.then_some(true))
                        .await?
                        .retained_paths()
                } else {
                    engine
                        .resolve_files(&scope, &targets, None, history.then_some(true))
                        .await?
                        .retained_paths()
                };

                let plan = engine.plan(repo.as_deref(), &retained).await?;
                emit(json, &plan, || plan.command.clone())
            }
            Commands::Stats { scope, targets } => {
                let stats = engine.stats(&scope.into(), &targets).await?;
                emit(json, &stats, || {
                    let mut lines: Vec<String> = stats
                        .file_extensions
                        .iter()
                        .map(|(ext, count)| format!("Count of {} files: {}", ext, count))
                        .collect();
                    lines.push(format!("Total commits: {}", stats.commit_count));
                    lines.push(match stats.earliest_commit {
                        Some(time) => format!("Earliest commit: {}", time.format("%Y-%m-%d %H:%M:%S %z")),
                        None => "Earliest commit: none".to_string(),
                    });
                    lines.push(format!("Commits touching targets: {}", stats.target_commits));
                    lines.push(format!(
                        "Files under search locations: {}",
                        stats.search_locations.available_files
                    ));
                    for missing in &stats.search_locations.missing {
                        lines.push(format!("Missing search location: {}", missing));
                    }
                    lines
                })
            }
        }
    }
}

/// Print `report` as JSON, or the lines produced by `text`
fn emit<T: Serialize>(json: bool, report: &T, text: impl FnOnce() -> Vec<String>) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        for line in text() {
            println!("{}", line);
        }
    }
    Ok(())
}
