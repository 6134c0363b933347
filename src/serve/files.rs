//! Static file resolution for the dev server.
//!
//! A URL path is looked up in the configured routes first (longest prefix
//! wins), then in each base directory in order. The first existing file is
//! served; a directory serves its `index.html`.

use super::AppState;
use super::reload::CLIENT_PATH;
use crate::tasks::Project;
use axum::extract::State;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use maud::html;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct FileResolver {
    /// `(prefix, directory)`, longest prefix first.
    routes: Vec<(String, PathBuf)>,
    base_dirs: Vec<PathBuf>,
}

impl FileResolver {
    pub fn new(routes: Vec<(String, PathBuf)>, base_dirs: Vec<PathBuf>) -> Self {
        let mut routes = routes;
        routes.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { routes, base_dirs }
    }

    pub fn for_project(project: &Project) -> Self {
        let root = &project.layout.root;
        let serve = &project.config.serve;
        let routes = serve
            .routes
            .iter()
            .map(|(prefix, dir)| (prefix.trim_end_matches('/').to_string(), root.join(dir)))
            .collect();
        let base_dirs = serve.base_dirs.iter().map(|d| root.join(d)).collect();
        Self::new(routes, base_dirs)
    }

    /// Map a URL path to a file on disk. `None` means 404.
    pub fn resolve(&self, url_path: &str) -> Option<PathBuf> {
        let segments: Vec<&str> = url_path
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .collect();
        if segments.iter().any(|s| *s == ".." || s.contains('\\')) {
            return None;
        }
        let relative: PathBuf = segments.iter().collect();

        for (prefix, dir) in &self.routes {
            let Some(rest) = strip_route(url_path, prefix) else {
                continue;
            };
            let rest: PathBuf = rest.split('/').filter(|s| !s.is_empty()).collect();
            if let Some(found) = existing_file(&dir.join(rest)) {
                return Some(found);
            }
        }
        self.base_dirs
            .iter()
            .find_map(|base| existing_file(&base.join(&relative)))
    }
}

/// The remainder of `url_path` after `prefix`, if the prefix matches on a segment boundary.
fn strip_route<'a>(url_path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = url_path.strip_prefix(prefix)?;
    (rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/') || prefix.is_empty())
        .then_some(rest)
}

fn existing_file(candidate: &Path) -> Option<PathBuf> {
    if candidate.is_dir() {
        let index = candidate.join("index.html");
        return index.is_file().then_some(index);
    }
    candidate.is_file().then(|| candidate.to_path_buf())
}

/// Content-Type for a served file, guessed from its extension. Text types
/// carry an explicit UTF-8 charset.
pub fn content_type(path: &Path) -> String {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let essence = mime.essence_str();
    if essence.starts_with("text/") || essence == "application/javascript" {
        format!("{essence}; charset=utf-8")
    } else {
        essence.to_string()
    }
}

/// Insert the reload client before the last `</body>`, or append it.
pub fn inject_reload_client(page: &str) -> String {
    let tag = html! { script src=(CLIENT_PATH) {} }.into_string();
    match page.to_ascii_lowercase().rfind("</body>") {
        Some(at) => {
            let mut out = String::with_capacity(page.len() + tag.len());
            out.push_str(&page[..at]);
            out.push_str(&tag);
            out.push_str(&page[at..]);
            out
        }
        None => format!("{page}{tag}"),
    }
}

/// Fallback handler: everything that is not a reload endpoint.
pub(crate) async fn serve_file(State(state): State<AppState>, uri: Uri) -> Response {
    let Some(path) = state.files.resolve(uri.path()) else {
        debug!(path = uri.path(), "not found");
        return (StatusCode::NOT_FOUND, "not found").into_response();
    };
    let body = match tokio::fs::read(&path).await {
        Ok(body) => body,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "read failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "read failed").into_response();
        }
    };

    let mime = content_type(&path);
    let body = if mime.starts_with("text/html") {
        inject_reload_client(&String::from_utf8_lossy(&body)).into_bytes()
    } else {
        body
    };
    (
        [(header::CONTENT_TYPE, mime.as_str()), (header::CACHE_CONTROL, "no-cache")],
        body,
    )
        .into_response()
}
