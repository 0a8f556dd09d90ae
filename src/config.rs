use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SplitError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Repository and include search settings
    pub project: ProjectConfig,

    /// Header resolution settings
    pub resolution: ResolutionConfig,

    /// Historical dependency mining
    pub history: HistoryConfig,

    /// Hand-off to the history-rewriting tool
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Working tree of the repository being split
    pub repo_path: PathBuf,

    /// Ordered include search locations (directories or forced headers), first match wins
    pub search_locations: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Extensions that mark a C/C++ translation unit
    pub source_extensions: Vec<String>,

    /// Follow includes transitively
    pub recursive: bool,

    /// What to do with files that are not valid UTF-8
    pub decode_policy: DecodePolicy,

    /// Skip gitignored files when enumerating modules
    pub respect_gitignore: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodePolicy {
    /// Replace invalid sequences and keep scanning
    Lossy,
    /// Treat the file as absent
    Skip,
    /// Abort the resolution with an error
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Mine past commits for headers by default
    pub enabled: bool,

    /// Maximum number of concurrent VCS processes
    pub concurrency: usize,

    /// Timeout for a single VCS process
    pub timeout_secs: u64,

    /// Pass `--follow` when listing the commits of a file
    pub follow_renames: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Add a `--path-glob */<path>` next to every `--path`
    pub regex_with_glob: bool,

    /// Keep every tracked `.gitignore`
    pub track_gitignore: bool,

    /// Keep original commit hashes instead of rewriting them
    pub preserve_commit_hashes: bool,

    /// Drop commits before this date (YYYY-MM-DD)
    pub start_date: Option<String>,

    /// Drop commits after this date (YYYY-MM-DD)
    pub end_date: Option<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            repo_path: PathBuf::from("."),
            search_locations: vec![PathBuf::from("include")],
        }
    }
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            source_extensions: vec![
                "c".to_string(),
                "cc".to_string(),
                "cpp".to_string(),
                "cxx".to_string(),
            ],
            recursive: true,
            decode_policy: DecodePolicy::Lossy,
            respect_gitignore: false,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            concurrency: 8,
            timeout_secs: 120,
            follow_renames: false,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            regex_with_glob: false,
            track_gitignore: false,
            preserve_commit_hashes: true,
            start_date: None,
            end_date: None,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| SplitError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SplitError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Ok(Self::default())
                }
            }
            None => {
                let candidates = [
                    "HeaderSplit.toml",
                    "header-split.toml",
                    ".header-split.toml",
                ];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }
}
