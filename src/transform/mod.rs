//! Single-file transforms delegated to external libraries or tools.
//!
//! | Transform | Delegated to |
//! |---|---|
//! | [`style::compile_scss`] | `grass` |
//! | [`script::transpile`] | configured external command, or passthrough |
//! | [`minify::html`] | `minify-html` (inline `<style>`/`<script>` included) |
//! | [`minify::css`] | `grass` with compressed output |
//! | [`minify::js`] | `minify-js` |
//!
//! Every transform maps its library's failure into [`TransformError`],
//! naming the file that failed.

pub mod minify;
pub mod script;
pub mod style;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Sass error in {path}: {message}")]
    Sass { path: PathBuf, message: String },
    #[error("transpiler `{command}` failed on {path}: {message}")]
    Transpile {
        command: String,
        path: PathBuf,
        message: String,
    },
    #[error("failed to minify {path}: {message}")]
    Minify { path: PathBuf, message: String },
}
