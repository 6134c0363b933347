//! Shared test utilities.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let (_tmp, project) = fixture_project();
//! let report = tasks::page(&project).unwrap();
//! assert_eq!(output_paths(&report), vec!["temp/about.html", "temp/index.html"]);
//! ```

use crate::config::PipelineConfig;
use crate::tasks::{Project, TaskReport};
use tempfile::TempDir;

#[path = "../tests/common/fixtures.rs"]
mod fixtures;

pub use fixtures::setup_fixtures;

// =========================================================================
// Fixture setup
// =========================================================================

/// The fixture project from [`setup_fixtures`], opened with stock config.
pub fn fixture_project() -> (TempDir, Project) {
    let tmp = setup_fixtures();
    let project = Project::new(tmp.path(), PipelineConfig::default());
    (tmp, project)
}

// =========================================================================
// Report extractors
// =========================================================================

/// Output paths of a report, `/`-joined and root-relative, in report order.
pub fn output_paths(report: &TaskReport) -> Vec<String> {
    report
        .files
        .iter()
        .map(|f| {
            f.output
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect()
}
