//! Leaf tasks: one source set, one transform, one destination.
//!
//! | Task | Reads | Transform | Writes |
//! |------|-------|-----------|--------|
//! | [`clean`] | | delete | removes `temp/` and `dist/` |
//! | [`page`] | `src/*.html` | copy | `temp/` |
//! | [`style`] | `src/assets/styles/*.scss` | Sass | `temp/` (`.css`) |
//! | [`script`] | `src/assets/scripts/*.js` | transpile | `temp/` |
//! | [`image`] | `src/assets/images/**` | compress | `dist/` |
//! | [`font`] | `src/assets/fonts/**` | compress | `dist/` |
//! | [`extra`] | `public/**` | compress | `dist/` |
//! | [`useref`] | `temp/*.html` | bundle + minify | `dist/` |
//!
//! Files inside one task are processed in parallel on the rayon pool; the
//! report lists them in source order regardless.

use crate::compress::{self, CompressBackend, CompressError, CompressOutcome, Quality, RustBackend};
use crate::config::{ConfigError, Layout, PipelineConfig};
use crate::plan::TaskName;
use crate::serve::reload::ReloadHub;
use crate::sources::{SourceError, SourceFile, SourceSet};
use crate::transform::{TransformError, minify, script, style};
use crate::useref::{self, UserefError};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error(transparent)]
    Compress(#[from] CompressError),
    #[error(transparent)]
    Useref(#[from] UserefError),
    #[error(transparent)]
    Serve(#[from] crate::serve::ServeError),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> TaskError {
    let path = path.to_path_buf();
    move |source| TaskError::Io { path, source }
}

/// Inputs a task can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Pages,
    Styles,
    Scripts,
    Images,
    Fonts,
    Extras,
    /// Pages already compiled into the temp directory.
    CompiledPages,
}

/// Progress events emitted while tasks run.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Started(TaskName),
    Finished {
        report: TaskReport,
        elapsed: Duration,
    },
    Failed {
        task: TaskName,
        error: String,
    },
    Reloaded {
        paths: Vec<String>,
    },
}

/// A project on disk plus everything tasks share while running.
pub struct Project {
    pub config: PipelineConfig,
    pub layout: Layout,
    reload: ReloadHub,
    events: Option<Sender<PipelineEvent>>,
}

impl Project {
    pub fn new(root: &Path, config: PipelineConfig) -> Self {
        let layout = config.paths.resolve(root);
        Self {
            reload: ReloadHub::new(config.serve.notify),
            config,
            layout,
            events: None,
        }
    }

    /// Send progress events to `tx` (e.g. the CLI printer thread).
    pub fn with_events(mut self, tx: Sender<PipelineEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn reload_hub(&self) -> &ReloadHub {
        &self.reload
    }

    /// Tell connected browsers that `paths` (URL paths, no leading `/`) changed.
    pub(crate) fn reload(&self, paths: Vec<String>) {
        if paths.is_empty() {
            return;
        }
        self.reload.notify(paths.clone());
        self.emit(PipelineEvent::Reloaded { paths });
    }

    pub(crate) fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.events {
            // The receiver may already be gone during shutdown.
            let _ = tx.send(event);
        }
    }

    pub fn source_set(&self, input: Input) -> Result<SourceSet, SourceError> {
        let globs = &self.config.globs;
        let l = &self.layout;
        match input {
            Input::Pages => SourceSet::new(&l.src, &globs.pages),
            Input::Styles => SourceSet::new(&l.src, &globs.styles),
            Input::Scripts => SourceSet::new(&l.src, &globs.scripts),
            Input::Images => SourceSet::new(&l.src, &globs.images),
            Input::Fonts => SourceSet::new(&l.src, &globs.fonts),
            Input::Extras => SourceSet::new(&l.public, &globs.extras),
            Input::CompiledPages => SourceSet::new(&l.temp, &globs.pages),
        }
    }

    /// Path relative to the project root, for display.
    pub fn display_path<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.layout.root).unwrap_or(path)
    }
}

/// What a task did to one output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Removed,
    Copied,
    Compiled,
    Transpiled,
    Compressed,
    /// An image whose recompression would not have been smaller.
    Kept,
    Bundled { sources: usize },
    Minified,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    /// Output path relative to the project root.
    pub output: PathBuf,
    pub action: FileAction,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub task: TaskName,
    pub files: Vec<FileReport>,
}

impl TaskReport {
    pub fn bytes_saved(&self) -> u64 {
        self.files
            .iter()
            .map(|f| f.bytes_in.saturating_sub(f.bytes_out))
            .sum()
    }

    /// Outputs written beneath `dir`, as `/`-separated paths relative to it.
    pub fn outputs_under(&self, root: &Path, dir: &Path) -> Vec<String> {
        let Ok(prefix) = dir.strip_prefix(root) else {
            return Vec::new();
        };
        self.files
            .iter()
            .filter_map(|f| f.output.strip_prefix(prefix).ok())
            .map(|p| {
                p.components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .collect()
    }
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), TaskError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    std::fs::write(path, bytes).map_err(io_err(path))
}

fn report(
    project: &Project,
    output: &Path,
    action: FileAction,
    bytes_in: u64,
    bytes_out: u64,
) -> FileReport {
    FileReport {
        output: project.display_path(output).to_path_buf(),
        action,
        bytes_in,
        bytes_out,
    }
}

// =============================================================================
// Tasks
// =============================================================================

/// Delete the temp and dist directories. Missing directories are fine.
pub fn clean(project: &Project) -> Result<TaskReport, TaskError> {
    project.config.paths.validate()?;
    let mut files = Vec::new();
    for dir in [&project.layout.temp, &project.layout.dist] {
        match std::fs::remove_dir_all(dir) {
            Ok(()) => files.push(report(project, dir, FileAction::Removed, 0, 0)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(dir)(e)),
        }
    }
    Ok(TaskReport {
        task: TaskName::Clean,
        files,
    })
}

/// Copy pages into temp.
pub fn page(project: &Project) -> Result<TaskReport, TaskError> {
    let sources = project.source_set(Input::Pages)?.collect()?;
    let files = sources
        .par_iter()
        .map(|file| {
            let dest = project.layout.temp.join(&file.relative);
            let content = std::fs::read(&file.path).map_err(io_err(&file.path))?;
            write_output(&dest, &content)?;
            let size = content.len() as u64;
            Ok(report(project, &dest, FileAction::Copied, size, size))
        })
        .collect::<Result<Vec<_>, TaskError>>()?;
    Ok(TaskReport {
        task: TaskName::Page,
        files,
    })
}

/// Compile stylesheets into temp. Partials are skipped.
pub fn style(project: &Project) -> Result<TaskReport, TaskError> {
    let options = style::SassOptions::from_config(&project.config.styles, &project.layout.root);
    let sources: Vec<SourceFile> = project
        .source_set(Input::Styles)?
        .collect()?
        .into_iter()
        .filter(|f| !style::is_partial(&f.relative))
        .collect();
    let files = sources
        .par_iter()
        .map(|file| {
            let bytes_in = std::fs::metadata(&file.path)
                .map_err(io_err(&file.path))?
                .len();
            let css = style::compile_scss(&file.path, &options)?;
            let dest = project.layout.temp.join(style::css_path(&file.relative));
            write_output(&dest, css.as_bytes())?;
            Ok(report(project, &dest, FileAction::Compiled, bytes_in, css.len() as u64))
        })
        .collect::<Result<Vec<_>, TaskError>>()?;
    Ok(TaskReport {
        task: TaskName::Style,
        files,
    })
}

/// Transpile scripts into temp.
pub fn script(project: &Project) -> Result<TaskReport, TaskError> {
    let transpiler = script::Transpiler::new(
        project.config.scripts.transpile.clone(),
        &project.layout.root,
    );
    let action = if transpiler.is_passthrough() {
        FileAction::Copied
    } else {
        FileAction::Transpiled
    };
    let sources = project.source_set(Input::Scripts)?.collect()?;
    let files = sources
        .par_iter()
        .map(|file| {
            let source = std::fs::read(&file.path).map_err(io_err(&file.path))?;
            let bytes_in = source.len() as u64;
            let output = script::transpile(&file.path, source, &transpiler)?;
            let dest = project.layout.temp.join(&file.relative);
            write_output(&dest, &output)?;
            Ok(report(project, &dest, action, bytes_in, output.len() as u64))
        })
        .collect::<Result<Vec<_>, TaskError>>()?;
    Ok(TaskReport {
        task: TaskName::Script,
        files,
    })
}

pub fn image(project: &Project) -> Result<TaskReport, TaskError> {
    compress_into_dist(project, TaskName::Image, Input::Images, &RustBackend::new())
}

pub fn font(project: &Project) -> Result<TaskReport, TaskError> {
    compress_into_dist(project, TaskName::Font, Input::Fonts, &RustBackend::new())
}

pub fn extra(project: &Project) -> Result<TaskReport, TaskError> {
    compress_into_dist(project, TaskName::Extra, Input::Extras, &RustBackend::new())
}

/// Compress every file of `input` into dist, preserving relative paths.
pub fn compress_into_dist(
    project: &Project,
    task: TaskName,
    input: Input,
    backend: &impl CompressBackend,
) -> Result<TaskReport, TaskError> {
    let quality = Quality::new(project.config.images.jpeg_quality);
    let sources = project.source_set(input)?.collect()?;
    let files = sources
        .par_iter()
        .map(|file| {
            let dest = project.layout.dist.join(&file.relative);
            let outcome = compress::compress_file(backend, &file.path, &dest, quality)?;
            let action = match outcome {
                CompressOutcome::Compressed { .. } => FileAction::Compressed,
                CompressOutcome::Unchanged { .. } => FileAction::Kept,
                CompressOutcome::Copied { .. } => FileAction::Copied,
            };
            Ok(report(project, &dest, action, outcome.bytes_in(), outcome.bytes_out()))
        })
        .collect::<Result<Vec<_>, TaskError>>()?;
    Ok(TaskReport { task, files })
}

/// Bundle build blocks of the compiled pages and minify everything into dist.
pub fn useref(project: &Project) -> Result<TaskReport, TaskError> {
    let search_paths: Vec<PathBuf> = project
        .config
        .useref
        .search_paths
        .iter()
        .map(|p| project.layout.root.join(p))
        .collect();
    let toggles = &project.config.minify;
    let pages = project.source_set(Input::CompiledPages)?.collect()?;

    let processed = pages
        .par_iter()
        .map(|file| {
            let html = std::fs::read_to_string(&file.path).map_err(io_err(&file.path))?;
            let page = useref::process_page(&file.relative, &html, &search_paths)?;
            Ok((file, html.len() as u64, page))
        })
        .collect::<Result<Vec<_>, TaskError>>()?;

    let mut files = Vec::new();
    // Several pages may share one bundle; the first page to name it wins.
    let mut bundles = BTreeMap::new();
    for (file, bytes_in, page) in processed {
        let dest = project.layout.dist.join(&file.relative);
        let html = minify::minify_asset(page.html.into_bytes(), &dest, toggles)?;
        write_output(&dest, &html)?;
        let action = if toggles.html {
            FileAction::Minified
        } else {
            FileAction::Copied
        };
        files.push(report(project, &dest, action, bytes_in, html.len() as u64));
        for bundle in page.bundles {
            bundles.entry(bundle.target.clone()).or_insert(bundle);
        }
    }

    let written = bundles
        .into_values()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|bundle| {
            let dest = project.layout.dist.join(&bundle.target);
            let bytes_in = bundle.content.len() as u64;
            let content = minify::minify_asset(bundle.content, &dest, toggles)?;
            write_output(&dest, &content)?;
            let action = FileAction::Bundled {
                sources: bundle.sources.len(),
            };
            Ok(report(project, &dest, action, bytes_in, content.len() as u64))
        })
        .collect::<Result<Vec<_>, TaskError>>()?;
    files.extend(written);

    Ok(TaskReport {
        task: TaskName::Useref,
        files,
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::backend::tests::MockBackend;
    use crate::test_helpers::*;
    use std::fs;

    #[test]
    fn clean_removes_generated_directories_only() {
        let (_tmp, project) = fixture_project();
        fs::create_dir_all(project.layout.temp.join("assets")).unwrap();
        fs::create_dir_all(&project.layout.dist).unwrap();

        let report = clean(&project).unwrap();

        assert!(!project.layout.temp.exists());
        assert!(!project.layout.dist.exists());
        assert!(project.layout.src.exists());
        assert_eq!(report.files.len(), 2);
        assert!(report.files.iter().all(|f| f.action == FileAction::Removed));
    }

    #[test]
    fn clean_refuses_a_dist_that_aliases_src() {
        let (tmp, _) = fixture_project();
        let mut config = PipelineConfig::default();
        config.paths.dist = "src/".into();
        let project = Project::new(tmp.path(), config);

        let err = clean(&project).unwrap_err();
        assert!(matches!(err, TaskError::Config(_)), "got: {err}");
        assert!(project.layout.src.join("index.html").exists());
    }

    #[test]
    fn clean_without_directories_succeeds() {
        let (_tmp, project) = fixture_project();
        let report = clean(&project).unwrap();
        assert!(report.files.is_empty());
    }

    #[test]
    fn page_copies_html_into_temp() {
        let (_tmp, project) = fixture_project();
        let report = page(&project).unwrap();

        assert_eq!(
            output_paths(&report),
            vec!["temp/about.html", "temp/index.html"]
        );
        let copied = fs::read_to_string(project.layout.temp.join("index.html")).unwrap();
        let original = fs::read_to_string(project.layout.src.join("index.html")).unwrap();
        assert_eq!(copied, original);
    }

    #[test]
    fn style_compiles_and_skips_partials() {
        let (_tmp, project) = fixture_project();
        let report = style(&project).unwrap();

        assert_eq!(output_paths(&report), vec!["temp/assets/styles/main.css"]);
        let css = fs::read_to_string(project.layout.temp.join("assets/styles/main.css")).unwrap();
        assert!(css.contains(".site-header .title"), "got: {css}");
        assert!(!project.layout.temp.join("assets/styles/_variables.css").exists());

        let scss = fs::read(project.layout.src.join("assets/styles/main.scss")).unwrap();
        assert_eq!(report.files[0].bytes_in, scss.len() as u64);
        assert_eq!(report.files[0].bytes_out, css.len() as u64);
    }

    #[test]
    fn script_passthrough_copies_into_temp() {
        let (_tmp, project) = fixture_project();
        let report = script(&project).unwrap();

        assert_eq!(output_paths(&report), vec!["temp/assets/scripts/main.js"]);
        assert_eq!(report.files[0].action, FileAction::Copied);

        let js = fs::read(project.layout.src.join("assets/scripts/main.js")).unwrap();
        assert!(!js.is_empty());
        assert_eq!(report.files[0].bytes_in, js.len() as u64);
        assert_eq!(report.files[0].bytes_out, js.len() as u64);
    }

    #[test]
    fn compress_tasks_mirror_relative_paths_into_dist() {
        let (_tmp, project) = fixture_project();
        let backend = MockBackend::shrinking(10);

        let report = compress_into_dist(&project, TaskName::Image, Input::Images, &backend).unwrap();
        assert_eq!(output_paths(&report), vec!["dist/assets/images/logo.png"]);
        assert_eq!(report.files[0].action, FileAction::Compressed);
        assert_eq!(report.bytes_saved(), 10);

        let report = compress_into_dist(&project, TaskName::Extra, Input::Extras, &backend).unwrap();
        assert_eq!(
            output_paths(&report),
            vec!["dist/favicon.ico", "dist/robots.txt"]
        );
        assert!(report.files.iter().all(|f| f.action == FileAction::Copied));
    }

    #[test]
    fn useref_bundles_and_minifies() {
        let (_tmp, project) = fixture_project();
        page(&project).unwrap();
        style(&project).unwrap();
        script(&project).unwrap();

        let report = useref(&project).unwrap();
        let outputs = output_paths(&report);
        assert!(outputs.contains(&"dist/index.html".to_string()));
        assert!(outputs.contains(&"dist/assets/styles/vendor.css".to_string()));
        assert!(outputs.contains(&"dist/assets/scripts/vendor.js".to_string()));

        let html = fs::read_to_string(project.layout.dist.join("index.html")).unwrap();
        assert!(html.contains("assets/styles/vendor.css"));
        assert!(!html.contains("node_modules"));

        // Both pages name the same bundles; each is written once.
        let bundled = report
            .files
            .iter()
            .filter(|f| matches!(f.action, FileAction::Bundled { .. }))
            .count();
        assert_eq!(bundled, 2);
    }

    #[test]
    fn useref_without_compiled_pages_is_a_no_op() {
        let (_tmp, project) = fixture_project();
        let report = useref(&project).unwrap();
        assert!(report.files.is_empty());
    }

    #[test]
    fn outputs_under_gives_url_paths() {
        let report = TaskReport {
            task: TaskName::Style,
            files: vec![FileReport {
                output: PathBuf::from("temp/assets/styles/main.css"),
                action: FileAction::Compiled,
                bytes_in: 1,
                bytes_out: 1,
            }],
        };
        let root = Path::new("/site");
        assert_eq!(
            report.outputs_under(root, &root.join("temp")),
            vec!["assets/styles/main.css"]
        );
        assert!(report.outputs_under(root, &root.join("dist")).is_empty());
    }
}
