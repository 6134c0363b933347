//! # sitepipe
//!
//! A static-site asset pipeline. Pages, stylesheets and scripts are compiled
//! into a scratch directory the dev server works from; a build then bundles,
//! minifies and compresses everything into the directory you deploy.
//!
//! ```text
//! src/      ──page/style/script──▶  temp/  ──useref──▶  dist/
//! src/ + public/  ──image/font/extra (compress)──────▶  dist/
//! ```
//!
//! # Architecture: Tasks Composed in Series and Parallel
//!
//! Every unit of work is a *task*: read a source set (base directory + glob),
//! apply one transform per file, write each result under a destination
//! directory at the same relative path. Composite tasks combine tasks in
//! series or in parallel:
//!
//! ```text
//! compile = parallel(page, style, script)
//! develop = series(clean, compile, serve)
//! build   = series(clean, parallel(image, font, extra, series(compile, useref)))
//! ```
//!
//! Parallel branches and the files inside one task share the rayon pool,
//! sized from `processing.max_processes`.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`plan`] | Task names, their composition, the series/parallel runner |
//! | [`tasks`] | Leaf tasks, the shared [`tasks::Project`], per-file reports |
//! | [`sources`] | Globs and source sets walked with `walkdir` |
//! | [`transform`] | Sass, script transpilation, HTML/CSS/JS minification |
//! | [`compress`] | Re-encode JPEG/PNG, keep the original when it is smaller |
//! | [`useref`] | Build-block parsing, reference resolution, bundle concatenation |
//! | [`serve`] | Dev server, polling watcher, live reload over SSE |
//! | [`config`] | `sitepipe.toml` loading, merging over stock defaults, validation |
//! | [`output`] | CLI output formatting for task progress |
//!
//! # Design Decisions
//!
//! ## Delegate the Heavy Transforms
//!
//! Sass compiles with `grass`, HTML and JavaScript minify with `minify-html`
//! and `minify-js`, images re-encode with the `image` crate. Transpiling
//! modern JavaScript is left to whatever external tool the project already
//! uses, configured as a command that filters stdin to stdout.
//!
//! ## Polling Over File-System Events
//!
//! The watcher rescans its source sets on an interval and compares
//! `(mtime, len)` snapshots. It behaves the same on every platform and
//! inside containers and network mounts, and a few hundred files scan in
//! well under a millisecond.
//!
//! ## Server-Sent Events for Live Reload
//!
//! Browsers reconnect `EventSource` on their own, the protocol is plain
//! HTTP, and one broadcast channel feeds every open tab. A stylesheet-only
//! change swaps `<link>` URLs in place instead of reloading the page.

pub mod compress;
pub mod config;
pub mod output;
pub mod plan;
pub mod serve;
pub mod sources;
pub mod tasks;
pub mod transform;
pub mod useref;

#[cfg(test)]
pub(crate) mod test_helpers;
