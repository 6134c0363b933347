//! Sass compilation.

use super::TransformError;
use crate::config::{OutputStyle, StylesConfig};
use std::path::{Path, PathBuf};

/// Sass options resolved against the project root.
#[derive(Debug, Clone)]
pub struct SassOptions {
    pub style: OutputStyle,
    pub load_paths: Vec<PathBuf>,
}

impl SassOptions {
    pub fn from_config(config: &StylesConfig, root: &Path) -> Self {
        Self {
            style: config.output_style,
            load_paths: config.load_paths.iter().map(|p| root.join(p)).collect(),
        }
    }

    fn to_grass(&self) -> grass::Options<'_> {
        let style = match self.style {
            OutputStyle::Expanded => grass::OutputStyle::Expanded,
            OutputStyle::Compressed => grass::OutputStyle::Compressed,
        };
        self.load_paths
            .iter()
            .fold(grass::Options::default().style(style), |opts, path| {
                opts.load_path(path)
            })
    }
}

/// Sass partials (`_name.scss`) are only ever imported, never emitted.
pub fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}

/// The CSS output path for a stylesheet source path.
pub fn css_path(path: &Path) -> PathBuf {
    path.with_extension("css")
}

/// Compile one `.scss` file to CSS.
pub fn compile_scss(path: &Path, options: &SassOptions) -> Result<String, TransformError> {
    grass::from_path(path, &options.to_grass()).map_err(|e| TransformError::Sass {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
