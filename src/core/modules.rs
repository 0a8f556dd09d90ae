use std::collections::BTreeSet;
use std::path::Path;

use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ResolutionConfig;
use crate::error::{Result, SplitError};
use super::{paths, DependencyClosure, HeaderResolver};

/// Resolved headers of every translation unit under a set of directories
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleClosure {
    pub headers: BTreeSet<String>,
    pub unresolved: BTreeSet<String>,
    /// Translation units found under the modules, relative to the repository
    pub source_files: BTreeSet<String>,
}

impl ModuleClosure {
    pub fn closure(&self) -> DependencyClosure {
        DependencyClosure {
            headers: self.headers.clone(),
            unresolved: self.unresolved.clone(),
        }
    }
}

/// Enumerates C/C++ sources under module directories and unions their closures
pub struct ModuleHeaderAggregator {
    source_extensions: Vec<String>,
    respect_gitignore: bool,
}

impl ModuleHeaderAggregator {
    pub fn new(config: &ResolutionConfig) -> Self {
        Self {
            source_extensions: config
                .source_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            respect_gitignore: config.respect_gitignore,
        }
    }

    /// Resolve every translation unit under `modules` (paths relative to `repo`).
    ///
    /// Header paths in the result are relative to `repo`.
    pub fn resolve_modules(
        &self,
        repo: &str,
        modules: &[String],
        resolver: &HeaderResolver,
    ) -> Result<ModuleClosure> {
        let mut result = ModuleClosure::default();
        let mut closure = DependencyClosure::default();

        for module in modules {
            let module_dir = paths::join(repo, module);
            let sources = self.enumerate_sources(&module_dir)?;
            info!("Module {}: {} source files", module, sources.len());

            for source in sources {
                debug!("Resolving {}", source);
                closure.merge(resolver.resolve_recursive(&source)?);
                result.source_files.insert(paths::relative_to(&source, repo));
            }
        }

        let relative = closure.to_relative(repo);
        result.headers = relative.headers;
        result.unresolved = relative.unresolved;
        Ok(result)
    }

    /// Sorted absolute paths of the translation units under `dir`
    pub fn enumerate_sources(&self, dir: &str) -> Result<Vec<String>> {
        if !Path::new(dir).is_dir() {
            return Err(SplitError::InvalidConfiguration(format!(
                "Module directory does not exist: {}",
                dir
            )));
        }

        let walker = WalkBuilder::new(dir)
            .hidden(false)
            .git_ignore(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .git_global(self.respect_gitignore)
            .ignore(self.respect_gitignore)
            .parents(self.respect_gitignore)
            .build();

        let mut sources = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| SplitError::Walk(e.to_string()))?;
            let path = entry.path();

            if path.is_file() && self.is_translation_unit(path) {
                sources.push(paths::normalize_path(path));
            }
        }

        sources.sort();
        Ok(sources)
    }

    fn is_translation_unit(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.source_extensions.iter().any(|known| known.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }
}
