// src/core/resolver.rs
use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::DecodePolicy;
use crate::error::{Result, SplitError};
use super::paths;
use super::IncludeScanner;

/// One entry of the ordered include search list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchLocation {
    /// Directory that include names are joined onto
    Directory(String),
    /// Header that is part of every closure, whether included or not
    File(String),
}

impl SearchLocation {
    /// Classify an absolute path by what is on disk: files are forced
    /// headers, everything else is searched as a directory.
    pub fn classify(path: &str) -> Self {
        let path = paths::normalize(path);
        if Path::new(&path).is_file() {
            SearchLocation::File(path)
        } else {
            SearchLocation::Directory(path)
        }
    }

    pub fn path(&self) -> &str {
        match self {
            SearchLocation::Directory(p) | SearchLocation::File(p) => p,
        }
    }
}

/// Headers a source file depends on, plus the include names nothing matched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyClosure {
    /// Normalized paths of headers confirmed to exist
    pub headers: BTreeSet<String>,

    /// Raw include names that matched no search location
    pub unresolved: BTreeSet<String>,
}

impl DependencyClosure {
    pub fn merge(&mut self, other: DependencyClosure) {
        self.headers.extend(other.headers);
        self.unresolved.extend(other.unresolved);
    }

    /// Rewrite header paths relative to `base` (usually the repository root)
    pub fn to_relative(&self, base: &str) -> DependencyClosure {
        DependencyClosure {
            headers: self
                .headers
                .iter()
                .map(|h| paths::relative_to(h, base))
                .collect(),
            unresolved: self.unresolved.clone(),
        }
    }

    /// Every path the extraction needs from this closure
    pub fn all_paths(&self) -> BTreeSet<String> {
        self.headers.union(&self.unresolved).cloned().collect()
    }
}

/// State of one resolution pass. Owned by a single call chain and
/// consumed into the returned closure.
struct ResolutionPass {
    closure: DependencyClosure,
    /// Files already parsed or queued for parsing
    visited: HashSet<String>,
    /// Include name -> located header, valid for the duration of the pass
    located: HashMap<String, Option<String>>,
    /// Files waiting to be parsed
    worklist: Vec<String>,
}

impl ResolutionPass {
    fn new() -> Self {
        Self {
            closure: DependencyClosure::default(),
            visited: HashSet::new(),
            located: HashMap::new(),
            worklist: Vec::new(),
        }
    }

    /// Record a header; queue it for parsing when `expand` and it is new
    fn add_header(&mut self, path: String, expand: bool) {
        if self.closure.headers.insert(path.clone()) && expand && self.visited.insert(path.clone()) {
            self.worklist.push(path);
        }
    }
}

/// Resolves include names against an ordered list of search locations
pub struct HeaderResolver {
    locations: Vec<SearchLocation>,
    scanner: IncludeScanner,
    decode_policy: DecodePolicy,
}

impl HeaderResolver {
    pub fn new(locations: Vec<SearchLocation>, decode_policy: DecodePolicy) -> Result<Self> {
        Ok(Self {
            locations,
            scanner: IncludeScanner::new()?,
            decode_policy,
        })
    }

    pub fn locations(&self) -> &[SearchLocation] {
        &self.locations
    }

    /// Headers included directly by `source`, without descending into them
    pub fn resolve_direct(&self, source: &str) -> Result<DependencyClosure> {
        self.resolve(source, false)
    }

    /// Full transitive include closure of `source`
    pub fn resolve_recursive(&self, source: &str) -> Result<DependencyClosure> {
        self.resolve(source, true)
    }

    pub fn resolve(&self, source: &str, recursive: bool) -> Result<DependencyClosure> {
        let source = paths::normalize(source);
        let mut pass = ResolutionPass::new();

        pass.visited.insert(source.clone());
        pass.worklist.push(source);

        for location in &self.locations {
            if let SearchLocation::File(path) = location {
                pass.add_header(path.clone(), recursive);
            }
        }

        // Explicit stack instead of recursion: include depth on large trees
        // must not translate into call depth.
        while let Some(file) = pass.worklist.pop() {
            let Some(text) = self.read_source(&file)? else {
                continue;
            };

            for name in self.scanner.scan(&text) {
                match self.locate(&name, &mut pass.located) {
                    Some(header) => pass.add_header(header, recursive),
                    None => {
                        debug!("Unresolved include <{}> in {}", name, file);
                        pass.closure.unresolved.insert(name);
                    }
                }
            }
        }

        Ok(pass.closure)
    }

    /// First directory location whose `join(location, name)` is an existing file
    fn locate(&self, name: &str, cache: &mut HashMap<String, Option<String>>) -> Option<String> {
        if let Some(hit) = cache.get(name) {
            return hit.clone();
        }

        let found = self.locations.iter().find_map(|location| match location {
            SearchLocation::Directory(dir) => {
                let candidate = paths::join(dir, name);
                if Path::new(&candidate).is_file() {
                    Some(candidate)
                } else {
                    None
                }
            }
            SearchLocation::File(_) => None,
        });

        cache.insert(name.to_string(), found.clone());
        found
    }

    /// Read a file for scanning.
    ///
    /// `Ok(None)` means the file is absent (or skipped by the decode policy);
    /// a file that exists but cannot be read is an error.
    fn read_source(&self, path: &str) -> Result<Option<String>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Skipping missing file {}", path);
                return Ok(None);
            }
            Err(source) => {
                return Err(SplitError::Read {
                    path: PathBuf::from(path),
                    source,
                })
            }
        };

        match String::from_utf8(bytes) {
            Ok(text) => Ok(Some(text)),
            Err(e) => match self.decode_policy {
                DecodePolicy::Lossy => {
                    debug!("Decoding {} lossily", path);
                    Ok(Some(String::from_utf8_lossy(e.as_bytes()).into_owned()))
                }
                DecodePolicy::Skip => {
                    warn!("Skipping {}: not valid UTF-8", path);
                    Ok(None)
                }
                DecodePolicy::Fail => Err(SplitError::Decode {
                    path: PathBuf::from(path),
                }),
            },
        }
    }
}
