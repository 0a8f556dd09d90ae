// src/core/mod.rs
mod engine;
mod scanner;
mod resolver;
mod diff_headers;
mod history;
mod modules;
mod plan;
mod stats;
mod vcs;

pub mod paths;

pub use scanner::IncludeScanner;
pub use resolver::{DependencyClosure, HeaderResolver, SearchLocation};
pub use diff_headers::DiffHeaderExtractor;
pub use history::{HistoricalClosure, HistoricalClosureBuilder};
pub use modules::{ModuleClosure, ModuleHeaderAggregator};
pub use plan::ExtractionPlan;
pub use vcs::{GitCli, VcsClient};

// Export the main engine
pub use engine::{Engine, Scope};
