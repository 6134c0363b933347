//! HTML, CSS and JavaScript minification for `dist/` output.

use super::TransformError;
use std::path::Path;

/// Asset kinds the bundler knows how to minify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Html,
    Css,
    Js,
}

impl AssetKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "html" | "htm" => Some(Self::Html),
            "css" => Some(Self::Css),
            "js" | "mjs" => Some(Self::Js),
            _ => None,
        }
    }
}

/// Collapse whitespace and minify inline `<style>` and `<script>` content.
pub fn html(source: &[u8]) -> Vec<u8> {
    let mut cfg = minify_html::Cfg::new();
    cfg.minify_css = true;
    cfg.minify_js = true;
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    minify_html::minify(source, &cfg)
}

/// Minify a stylesheet by re-emitting it through Sass in compressed style.
pub fn css(source: &str, path: &Path) -> Result<String, TransformError> {
    let options = grass::Options::default().style(grass::OutputStyle::Compressed);
    grass::from_string(source, &options).map_err(|e| TransformError::Minify {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

pub fn js(source: &[u8], path: &Path) -> Result<Vec<u8>, TransformError> {
    let session = minify_js::Session::new();
    let mut out = Vec::with_capacity(source.len());
    minify_js::minify(&session, minify_js::TopLevelMode::Global, source, &mut out).map_err(
        |e| TransformError::Minify {
            path: path.to_path_buf(),
            message: format!("{e:?}"),
        },
    )?;
    Ok(out)
}

/// Minify `source` according to the kind inferred from `path`, honoring the per-kind toggles.
pub fn minify_asset(
    source: Vec<u8>,
    path: &Path,
    toggles: &crate::config::MinifyConfig,
) -> Result<Vec<u8>, TransformError> {
    match AssetKind::from_path(path) {
        Some(AssetKind::Html) if toggles.html => Ok(html(&source)),
        Some(AssetKind::Css) if toggles.css => {
            let text = String::from_utf8(source).map_err(|e| TransformError::Minify {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            css(&text, path).map(String::into_bytes)
        }
        Some(AssetKind::Js) if toggles.js => js(&source, path),
        _ => Ok(source),
    }
}
