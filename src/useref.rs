//! Build-block bundling for HTML pages.
//!
//! Pages mark groups of development references with build comments:
//!
//! ```html
//! <!-- build:css assets/styles/vendor.css -->
//! <link rel="stylesheet" href="/node_modules/bootstrap/dist/css/bootstrap.css">
//! <link rel="stylesheet" href="assets/styles/main.css">
//! <!-- endbuild -->
//! <!-- build:js assets/scripts/vendor.js -->
//! <script src="/node_modules/jquery/dist/jquery.js"></script>
//! <!-- endbuild -->
//! <!-- build:remove -->
//! <script src="/dev-only.js"></script>
//! <!-- endbuild -->
//! ```
//!
//! For every `css`/`js` block the referenced files are concatenated into the
//! block's target, and the block is replaced by a single tag pointing at it.
//! `remove` blocks are dropped. Everything outside blocks is left untouched.
//!
//! ## Resolving references
//!
//! Query strings and fragments are stripped. A reference starting with `/`
//! is relative to each search path; any other reference is relative to the
//! page's directory inside each search path. Search paths are tried in
//! order and the first existing file wins.
//!
//! Targets follow the same rule against the output directory: a leading `/`
//! means the output root, otherwise the page's directory.

use maud::html;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UserefError {
    #[error("{page}:{line}: {message}")]
    Parse {
        page: PathBuf,
        line: usize,
        message: String,
    },
    #[error("{page}: cannot resolve {reference:?} (searched {searched:?})")]
    Unresolved {
        page: PathBuf,
        reference: String,
        searched: Vec<PathBuf>,
    },
    #[error("{page}: remote reference {reference:?} cannot be bundled")]
    Remote { page: PathBuf, reference: String },
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Css,
    Js,
    Remove,
}

/// One `<!-- build:... -->` … `<!-- endbuild -->` region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildBlock {
    pub kind: BlockKind,
    /// Bundle path as written in the comment; `None` for `remove` blocks.
    pub target: Option<String>,
    /// `href`/`src` values of the `<link>`/`<script>` tags inside the block.
    pub references: Vec<String>,
    /// Byte range of the whole block, opening and closing comments included.
    pub span: std::ops::Range<usize>,
}

/// A syntax problem, located by 1-based line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

fn line_of(html: &str, offset: usize) -> usize {
    html[..offset].bytes().filter(|b| *b == b'\n').count() + 1
}

/// Next HTML comment at or after `from`: (start, end-after-`-->`, trimmed body).
fn next_comment(html: &str, from: usize) -> Option<(usize, usize, &str)> {
    let start = from + html[from..].find("<!--")?;
    let body_start = start + 4;
    let body_end = body_start + html[body_start..].find("-->")?;
    Some((start, body_end + 3, html[body_start..body_end].trim()))
}

/// Find every build block in a page.
pub fn parse_blocks(html: &str) -> Result<Vec<BuildBlock>, ParseError> {
    let mut blocks = Vec::new();
    let mut pos = 0;

    while let Some((start, open_end, body)) = next_comment(html, pos) {
        pos = open_end;
        if body == "endbuild" {
            return Err(ParseError {
                line: line_of(html, start),
                message: "endbuild without a matching build comment".into(),
            });
        }
        let Some(spec) = body.strip_prefix("build:") else {
            continue;
        };

        let mut words = spec.split_whitespace();
        let kind = match words.next() {
            Some("css") => BlockKind::Css,
            Some("js") => BlockKind::Js,
            Some("remove") => BlockKind::Remove,
            other => {
                return Err(ParseError {
                    line: line_of(html, start),
                    message: format!("unknown build block type {:?}", other.unwrap_or("")),
                });
            }
        };
        let target = words.next().map(str::to_string);
        if kind != BlockKind::Remove && target.is_none() {
            return Err(ParseError {
                line: line_of(html, start),
                message: "build block needs a target path".into(),
            });
        }
        if let Some(target) = &target
            && target.split(['/', '\\']).any(|segment| segment == "..")
        {
            return Err(ParseError {
                line: line_of(html, start),
                message: format!("build block target {target:?} must not contain '..'"),
            });
        }

        // Find the closing comment, rejecting nested openings on the way.
        let close = loop {
            let Some((c_start, c_end, c_body)) = next_comment(html, pos) else {
                return Err(ParseError {
                    line: line_of(html, start),
                    message: "build block is never closed with <!-- endbuild -->".into(),
                });
            };
            pos = c_end;
            if c_body == "endbuild" {
                break c_start;
            }
            if c_body.starts_with("build:") {
                return Err(ParseError {
                    line: line_of(html, c_start),
                    message: "build blocks cannot be nested".into(),
                });
            }
        };

        blocks.push(BuildBlock {
            kind,
            target,
            references: extract_references(&html[open_end..close]),
            span: start..pos,
        });
    }
    Ok(blocks)
}

/// `href` of `<link>` tags and `src` of `<script>` tags, in document order.
fn extract_references(fragment: &str) -> Vec<String> {
    let lower = fragment.to_ascii_lowercase();
    let mut refs = Vec::new();
    let mut pos = 0;
    while let Some(rel) = lower[pos..].find('<') {
        let start = pos + rel;
        let end = lower[start..].find('>').map_or(lower.len(), |e| start + e);
        let tag = &fragment[start..end];
        let tag_lower = &lower[start..end];
        let attr = if tag_lower.starts_with("<link") {
            Some("href")
        } else if tag_lower.starts_with("<script") {
            Some("src")
        } else {
            None
        };
        if let Some(value) = attr.and_then(|name| attr_value(tag, name)) {
            refs.push(value);
        }
        pos = end;
    }
    refs
}

/// Value of attribute `name` inside a start tag (quoted or unquoted).
fn attr_value(tag: &str, name: &str) -> Option<String> {
    let lower = tag.to_ascii_lowercase();
    let mut from = 0;
    while let Some(rel) = lower[from..].find(name) {
        let at = from + rel;
        from = at + name.len();
        // Must be a whole attribute name: preceded by whitespace, followed by `=`.
        let preceded = lower[..at]
            .chars()
            .next_back()
            .is_some_and(char::is_whitespace);
        let rest = lower[from..].trim_start();
        if !preceded || !rest.starts_with('=') {
            continue;
        }
        let value_start = tag.len() - rest.len() + 1;
        let value = tag[value_start..].trim_start();
        return match value.chars().next() {
            Some(q @ ('"' | '\'')) => value[1..].split(q).next().map(str::to_string),
            Some(_) => value
                .split(|c: char| c.is_whitespace() || c == '>')
                .next()
                .map(str::to_string),
            None => None,
        };
    }
    None
}

/// The single tag that replaces a block.
fn replacement(block: &BuildBlock) -> String {
    match (block.kind, block.target.as_deref()) {
        (BlockKind::Css, Some(target)) => html! { link rel="stylesheet" href=(target); }.into_string(),
        (BlockKind::Js, Some(target)) => html! { script src=(target) {} }.into_string(),
        _ => String::new(),
    }
}

/// Replace each block with its bundle tag (or nothing, for `remove`).
pub fn rewrite(html: &str, blocks: &[BuildBlock]) -> String {
    let mut out = String::with_capacity(html.len());
    let mut pos = 0;
    for block in blocks {
        out.push_str(&html[pos..block.span.start]);
        out.push_str(&replacement(block));
        pos = block.span.end;
    }
    out.push_str(&html[pos..]);
    out
}

fn strip_query(reference: &str) -> &str {
    let end = reference.find(['?', '#']).unwrap_or(reference.len());
    &reference[..end]
}

fn is_remote(reference: &str) -> bool {
    reference.starts_with("//") || reference.contains("://") || reference.starts_with("data:")
}

/// Path of a reference relative to a search root, given the page's directory.
fn reference_path(reference: &str, page_dir: &Path) -> PathBuf {
    let clean = strip_query(reference);
    match clean.strip_prefix('/') {
        Some(absolute) => PathBuf::from(absolute),
        None => page_dir.join(clean),
    }
}

/// Locate a referenced asset in the first search path that has it.
pub fn resolve_reference(
    reference: &str,
    page: &Path,
    search_paths: &[PathBuf],
) -> Result<PathBuf, UserefError> {
    if is_remote(reference) {
        return Err(UserefError::Remote {
            page: page.to_path_buf(),
            reference: reference.to_string(),
        });
    }
    let page_dir = page.parent().unwrap_or(Path::new(""));
    let relative = reference_path(reference, page_dir);
    let searched: Vec<PathBuf> = search_paths.iter().map(|sp| sp.join(&relative)).collect();
    searched
        .iter()
        .find(|candidate| candidate.is_file())
        .cloned()
        .ok_or_else(|| UserefError::Unresolved {
            page: page.to_path_buf(),
            reference: reference.to_string(),
            searched,
        })
}

/// One concatenated output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub kind: BlockKind,
    /// Path relative to the output directory.
    pub target: PathBuf,
    pub sources: Vec<PathBuf>,
    pub content: Vec<u8>,
}

/// A page after bundling.
#[derive(Debug, Clone)]
pub struct ProcessedPage {
    pub html: String,
    pub bundles: Vec<Bundle>,
}

/// Parse, resolve, concatenate and rewrite one page.
///
/// `page` is the page's path relative to its base directory and only
/// steers relative references; `html` is its content.
pub fn process_page(
    page: &Path,
    html: &str,
    search_paths: &[PathBuf],
) -> Result<ProcessedPage, UserefError> {
    let blocks = parse_blocks(html).map_err(|e| UserefError::Parse {
        page: page.to_path_buf(),
        line: e.line,
        message: e.message,
    })?;
    let page_dir = page.parent().unwrap_or(Path::new(""));

    let mut bundles = Vec::new();
    for block in &blocks {
        let Some(target) = block.target.as_deref() else {
            continue;
        };
        let mut sources = Vec::with_capacity(block.references.len());
        let mut content = Vec::new();
        for reference in &block.references {
            let source = resolve_reference(reference, page, search_paths)?;
            let bytes = std::fs::read(&source).map_err(|e| UserefError::Io {
                path: source.clone(),
                source: e,
            })?;
            if !content.is_empty() {
                content.push(b'\n');
            }
            content.extend_from_slice(&bytes);
            sources.push(source);
        }
        bundles.push(Bundle {
            kind: block.kind,
            target: reference_path(target, page_dir),
            sources,
            content,
        });
    }

    Ok(ProcessedPage {
        html: rewrite(html, &blocks),
        bundles,
    })
}
