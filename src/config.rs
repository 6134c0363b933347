//! Pipeline configuration.
//!
//! Handles loading, validating, and merging `sitepipe.toml`. The file is
//! optional and sparse: stock defaults are the base layer and the user file
//! only overrides the keys it names.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [paths]
//! src = "src"               # Authored HTML, styles, scripts, images, fonts
//! public = "public"         # Extra files copied to the output root
//! temp = "temp"             # Compiled pages/styles/scripts (dev server, useref input)
//! dist = "dist"             # Final output
//!
//! [globs]
//! pages = "*.html"                    # relative to paths.src
//! styles = "assets/styles/*.scss"
//! scripts = "assets/scripts/*.js"
//! images = "assets/images/**"
//! fonts = "assets/fonts/**"
//! extras = "**"                       # relative to paths.public
//!
//! [styles]
//! output_style = "expanded" # expanded | compressed
//! load_paths = []           # Extra @use/@import search directories
//!
//! [scripts]
//! transpile = []            # External transpiler argv, reads stdin, writes stdout
//!
//! [images]
//! jpeg_quality = 90         # JPEG re-encoding quality (1-100)
//!
//! [useref]
//! search_paths = ["temp", "."]
//!
//! [minify]
//! html = true
//! css = true
//! js = true
//!
//! [serve]
//! host = "127.0.0.1"
//! port = 6060
//! base_dirs = ["temp", "src", "public"]
//! poll_interval_ms = 300
//! notify = false
//!
//! [serve.routes]
//! "/node_modules" = "node_modules"
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the project root.
pub const CONFIG_FILENAME: &str = "sitepipe.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `sitepipe.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Directory layout of the project.
    pub paths: PathsConfig,
    /// Globs selecting each task's inputs.
    pub globs: GlobsConfig,
    /// Sass compilation settings.
    pub styles: StylesConfig,
    /// Script transpilation settings.
    pub scripts: ScriptsConfig,
    /// Image compression settings.
    pub images: ImagesConfig,
    /// Build-block bundling settings.
    pub useref: UserefConfig,
    /// Which asset kinds are minified on the way to `dist/`.
    pub minify: MinifyConfig,
    /// Dev server and watcher settings.
    pub serve: ServeConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.images.jpeg_quality) {
            return Err(ConfigError::Validation(
                "images.jpeg_quality must be 1-100".into(),
            ));
        }
        if self.serve.port == 0 {
            return Err(ConfigError::Validation("serve.port must be non-zero".into()));
        }
        if self.serve.base_dirs.is_empty() {
            return Err(ConfigError::Validation(
                "serve.base_dirs must not be empty".into(),
            ));
        }
        if let Some(prefix) = self.serve.routes.keys().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::Validation(format!(
                "serve.routes prefix {prefix:?} must start with '/'"
            )));
        }
        if self.serve.poll_interval_ms < 10 {
            return Err(ConfigError::Validation(
                "serve.poll_interval_ms must be at least 10".into(),
            ));
        }
        if self.useref.search_paths.is_empty() {
            return Err(ConfigError::Validation(
                "useref.search_paths must not be empty".into(),
            ));
        }
        self.paths.validate()?;
        Ok(())
    }
}

/// Directory layout, relative to the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub src: String,
    pub public: String,
    pub temp: String,
    pub dist: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            src: "src".to_string(),
            public: "public".to_string(),
            temp: "temp".to_string(),
            dist: "dist".to_string(),
        }
    }
}

/// Absolute directory layout for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub root: PathBuf,
    pub src: PathBuf,
    pub public: PathBuf,
    pub temp: PathBuf,
    pub dist: PathBuf,
}

impl PathsConfig {
    /// Resolve every directory against the project root.
    pub fn resolve(&self, root: &Path) -> Layout {
        Layout {
            root: root.to_path_buf(),
            src: root.join(&self.src),
            public: root.join(&self.public),
            temp: root.join(&self.temp),
            dist: root.join(&self.dist),
        }
    }

    /// Check that `clean` can delete `temp` and `dist` without touching
    /// anything else: neither may be the root or one of its ancestors, and
    /// neither may overlap an input directory or the other.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let temp = normalize_dir(&self.temp);
        let dist = normalize_dir(&self.dist);
        let inputs = [("src", normalize_dir(&self.src)), ("public", normalize_dir(&self.public))];

        for (name, generated) in [("temp", &temp), ("dist", &dist)] {
            if generated.components().all(|c| c == Component::ParentDir) {
                return Err(ConfigError::Validation(format!(
                    "paths.{name} resolves to the project root or above it; clean would delete the project"
                )));
            }
            for (input, dir) in &inputs {
                if overlaps(generated, dir) {
                    return Err(ConfigError::Validation(format!(
                        "paths.{name} overlaps paths.{input}; clean would delete inputs"
                    )));
                }
            }
        }
        if overlaps(&temp, &dist) {
            return Err(ConfigError::Validation(
                "paths.temp and paths.dist must not overlap".into(),
            ));
        }
        Ok(())
    }
}

/// Lexically normalize a root-relative directory: `.` segments and trailing
/// slashes vanish and `..` folds into its parent. The root itself is the
/// empty path.
fn normalize_dir(dir: &str) -> PathBuf {
    let mut out = PathBuf::new();
    for component in Path::new(dir).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// True when one directory is the other or sits inside it.
fn overlaps(a: &Path, b: &Path) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

/// Input globs. `extras` is relative to `paths.public`, the rest to `paths.src`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlobsConfig {
    pub pages: String,
    pub styles: String,
    pub scripts: String,
    pub images: String,
    pub fonts: String,
    pub extras: String,
}

impl Default for GlobsConfig {
    fn default() -> Self {
        Self {
            pages: "*.html".to_string(),
            styles: "assets/styles/*.scss".to_string(),
            scripts: "assets/scripts/*.js".to_string(),
            images: "assets/images/**".to_string(),
            fonts: "assets/fonts/**".to_string(),
            extras: "**".to_string(),
        }
    }
}

/// Sass output formatting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStyle {
    #[default]
    Expanded,
    Compressed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StylesConfig {
    pub output_style: OutputStyle,
    /// Additional directories searched by `@use` and `@import`, relative to the root.
    pub load_paths: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptsConfig {
    /// External transpiler command line. Empty means scripts are copied unchanged.
    pub transpile: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// JPEG re-encoding quality (1 = worst, 100 = best).
    pub jpeg_quality: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self { jpeg_quality: 90 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UserefConfig {
    /// Directories searched, in order, for assets referenced inside build blocks.
    pub search_paths: Vec<String>,
}

impl Default for UserefConfig {
    fn default() -> Self {
        Self {
            search_paths: vec!["temp".to_string(), ".".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MinifyConfig {
    pub html: bool,
    pub css: bool,
    pub js: bool,
}

impl Default for MinifyConfig {
    fn default() -> Self {
        Self {
            html: true,
            css: true,
            js: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
    /// Directories searched, in order, for a requested path.
    pub base_dirs: Vec<String>,
    /// URL prefix → directory, checked before `base_dirs`.
    pub routes: BTreeMap<String, String>,
    /// How often the watcher rescans its source sets.
    pub poll_interval_ms: u64,
    /// Log every reload notification at info level.
    pub notify: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6060,
            base_dirs: vec!["temp".to_string(), "src".to_string(), "public".to_string()],
            routes: BTreeMap::from([("/node_modules".to_string(), "node_modules".to_string())]),
            poll_interval_ms: 300,
            notify: false,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(PipelineConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the project config.
///
/// `explicit` names a config file given on the command line; it must exist.
/// Otherwise `sitepipe.toml` in the root is used when present.
pub fn load_config(root: &Path, explicit: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    let overlay = match explicit {
        Some(path) => Some(toml::from_str(&fs::read_to_string(path)?)?),
        None => load_raw_config(&root.join(CONFIG_FILENAME))?,
    };
    resolve_config(overlay)
}

/// Returns a fully-commented stock `sitepipe.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# sitepipe configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Directory layout (relative to the project root)
# ---------------------------------------------------------------------------
[paths]
# Authored pages, styles, scripts, images and fonts.
src = "src"
# Extra files copied as-is to the output root (favicon, robots.txt, ...).
public = "public"
# Compiled pages, styles and scripts. Served in development, bundled on build.
temp = "temp"
# Final output. Removed by `clean` together with temp.
dist = "dist"

# ---------------------------------------------------------------------------
# Input globs: `*` stays in one directory, `**` crosses directories
# ---------------------------------------------------------------------------
[globs]
pages = "*.html"
styles = "assets/styles/*.scss"
scripts = "assets/scripts/*.js"
images = "assets/images/**"
fonts = "assets/fonts/**"
# Relative to paths.public.
extras = "**"

# ---------------------------------------------------------------------------
# Sass
# ---------------------------------------------------------------------------
[styles]
# "expanded" or "compressed". Files named _partial.scss are never emitted.
output_style = "expanded"
# Extra directories searched by @use / @import.
load_paths = []

# ---------------------------------------------------------------------------
# Scripts
# ---------------------------------------------------------------------------
[scripts]
# External transpiler. Receives the script on stdin, prints the result.
# Example: ["npx", "babel", "--presets", "@babel/preset-env"]
# Empty copies scripts unchanged.
transpile = []

# ---------------------------------------------------------------------------
# Image compression
# ---------------------------------------------------------------------------
[images]
# JPEG re-encoding quality. PNGs are always recompressed losslessly.
# A file is only replaced when the result is smaller.
jpeg_quality = 90

# ---------------------------------------------------------------------------
# Build blocks (<!-- build:css target.css --> ... <!-- endbuild -->)
# ---------------------------------------------------------------------------
[useref]
# Directories searched, in order, for referenced assets.
search_paths = ["temp", "."]

[minify]
html = true
css = true
js = true

# ---------------------------------------------------------------------------
# Development server
# ---------------------------------------------------------------------------
[serve]
host = "127.0.0.1"
port = 6060
# Directories searched, in order, for each request.
base_dirs = ["temp", "src", "public"]
# How often watched files are rescanned.
poll_interval_ms = 300
# Log every reload notification.
notify = false

# URL prefix -> directory, checked before base_dirs.
[serve.routes]
"/node_modules" = "node_modules"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.serve.port, 6060);
        assert_eq!(config.serve.base_dirs, vec!["temp", "src", "public"]);
        assert_eq!(
            config.serve.routes.get("/node_modules").map(String::as_str),
            Some("node_modules")
        );
        assert_eq!(config.styles.output_style, OutputStyle::Expanded);
    }

    #[test]
    fn stock_toml_matches_defaults() {
        let parsed: toml::Value = toml::from_str(stock_config_toml()).unwrap();
        let config = resolve_config(Some(parsed)).unwrap();
        let defaults = PipelineConfig::default();

        assert_eq!(config.globs.styles, defaults.globs.styles);
        assert_eq!(config.useref.search_paths, defaults.useref.search_paths);
        assert_eq!(config.serve.routes, defaults.serve.routes);
        assert_eq!(config.images.jpeg_quality, defaults.images.jpeg_quality);
        assert_eq!(config.processing.max_processes, None);
    }

    #[test]
    fn sparse_overlay_keeps_other_defaults() {
        let overlay: toml::Value = toml::from_str(
            r#"
            [serve]
            port = 3000

            [styles]
            output_style = "compressed"
            "#,
        )
        .unwrap();
        let config = resolve_config(Some(overlay)).unwrap();

        assert_eq!(config.serve.port, 3000);
        assert_eq!(config.serve.host, "127.0.0.1");
        assert_eq!(config.styles.output_style, OutputStyle::Compressed);
        assert_eq!(config.paths.temp, "temp");
    }

    #[test]
    fn merge_toml_overrides_nested_keys() {
        let base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3\nz = 4").unwrap();
        let merged = merge_toml(base, overlay);
        let table = merged["a"].as_table().unwrap();

        assert_eq!(table["x"].as_integer(), Some(1));
        assert_eq!(table["y"].as_integer(), Some(3));
        assert_eq!(table["z"].as_integer(), Some(4));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let overlay: toml::Value = toml::from_str("[serve]\nprot = 3000").unwrap();
        assert!(matches!(
            resolve_config(Some(overlay)),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn jpeg_quality_out_of_range_is_rejected() {
        let overlay: toml::Value = toml::from_str("[images]\njpeg_quality = 0").unwrap();
        assert!(matches!(
            resolve_config(Some(overlay)),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn route_prefix_must_be_absolute() {
        let overlay: toml::Value =
            toml::from_str("[serve.routes]\n\"vendor\" = \"node_modules\"").unwrap();
        let err = resolve_config(Some(overlay)).unwrap_err();
        assert!(err.to_string().contains("vendor"));
    }

    #[test]
    fn temp_cannot_alias_an_input_directory() {
        let overlay: toml::Value = toml::from_str("[paths]\ntemp = \"src\"").unwrap();
        assert!(matches!(
            resolve_config(Some(overlay)),
            Err(ConfigError::Validation(_))
        ));

        let overlay: toml::Value = toml::from_str("[paths]\ndist = \"temp\"").unwrap();
        assert!(matches!(
            resolve_config(Some(overlay)),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn generated_directories_are_compared_after_normalizing() {
        for overlay in [
            "[paths]\ndist = \"src/\"",
            "[paths]\ndist = \".\"",
            "[paths]\ndist = \"\"",
            "[paths]\ntemp = \"./public\"",
            "[paths]\ntemp = \"src/../public/\"",
            "[paths]\ndist = \"..\"",
        ] {
            let value: toml::Value = toml::from_str(overlay).unwrap();
            assert!(
                matches!(resolve_config(Some(value)), Err(ConfigError::Validation(_))),
                "accepted {overlay:?}"
            );
        }
    }

    #[test]
    fn generated_directories_cannot_nest_with_inputs_or_each_other() {
        for overlay in [
            "[paths]\ndist = \"src/dist\"",
            "[paths]\ntemp = \"public/.cache\"",
            "[paths]\nsrc = \"temp/src\"",
            "[paths]\ndist = \"temp/dist\"",
        ] {
            let value: toml::Value = toml::from_str(overlay).unwrap();
            let err = resolve_config(Some(value)).unwrap_err();
            assert!(err.to_string().contains("overlap"), "{overlay:?}: {err}");
        }
    }

    #[test]
    fn generated_directories_may_live_outside_the_inputs() {
        for overlay in [
            "[paths]\ndist = \"build/site\"",
            "[paths]\ndist = \"../site-out\"",
            "[paths]\ntemp = \".tmp/\"",
        ] {
            let value: toml::Value = toml::from_str(overlay).unwrap();
            resolve_config(Some(value)).unwrap();
        }
    }

    #[test]
    fn load_config_reads_root_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "[serve]\nport = 8080\n").unwrap();

        let config = load_config(tmp.path(), None).unwrap();
        assert_eq!(config.serve.port, 8080);
    }

    #[test]
    fn load_config_without_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path(), None).unwrap();
        assert_eq!(config.paths.dist, "dist");
    }

    #[test]
    fn explicit_config_must_exist() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope.toml");
        assert!(matches!(
            load_config(tmp.path(), Some(&missing)),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn layout_resolves_against_root() {
        let layout = PathsConfig::default().resolve(Path::new("/site"));
        assert_eq!(layout.src, Path::new("/site/src"));
        assert_eq!(layout.dist, Path::new("/site/dist"));
    }

    #[test]
    fn effective_threads_caps_at_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let config = ProcessingConfig {
            max_processes: Some(cores + 10),
        };
        assert_eq!(effective_threads(&config), cores);
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }
}
