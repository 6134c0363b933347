//! Fixture setup shared by the integration tests.

mod fixtures;

use sitepipe::config::PipelineConfig;
use sitepipe::tasks::Project;
use tempfile::TempDir;

/// The fixture project, opened with stock config.
pub fn fixture_project() -> (TempDir, Project) {
    let tmp = fixtures::setup_fixtures();
    let project = Project::new(tmp.path(), PipelineConfig::default());
    (tmp, project)
}
