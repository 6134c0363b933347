//! Source sets: a base directory plus a glob selecting files beneath it.
//!
//! Every task reads its inputs through a [`SourceSet`]. Output paths keep
//! the path relative to the base, so `src/assets/styles/main.scss` read
//! with base `src` lands at `<dest>/assets/styles/main.scss`.
//!
//! ## Glob syntax
//!
//! Globs are `/`-separated and always relative to the base:
//!
//! | Segment | Matches |
//! |---------|---------|
//! | `*.html` | any name ending in `.html` within one directory |
//! | `?` | exactly one character |
//! | `**` | zero or more directories (and, as the last segment, every file below) |
//!
//! A base that does not exist yields an empty set. Matching nothing is not an
//! error: a project without fonts simply has an empty font task.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("invalid glob {glob:?}: {reason}")]
    InvalidGlob { glob: String, reason: &'static str },
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    AnyDepth,
    Name(String),
}

/// A parsed glob pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glob {
    raw: String,
    segments: Vec<Segment>,
}

impl Glob {
    pub fn new(pattern: &str) -> Result<Self, SourceError> {
        let invalid = |reason| SourceError::InvalidGlob {
            glob: pattern.to_string(),
            reason,
        };
        if pattern.is_empty() {
            return Err(invalid("empty pattern"));
        }
        if pattern.starts_with('/') {
            return Err(invalid("must be relative to its base directory"));
        }
        let mut segments = Vec::new();
        for part in pattern.split('/') {
            match part {
                "" => return Err(invalid("empty path segment")),
                "." | ".." => return Err(invalid("'.' and '..' segments are not allowed")),
                "**" => {
                    // Collapse `**/**`.
                    if segments.last() != Some(&Segment::AnyDepth) {
                        segments.push(Segment::AnyDepth);
                    }
                }
                p if p.contains("**") => return Err(invalid("'**' must be a whole segment")),
                p => segments.push(Segment::Name(p.to_string())),
            }
        }
        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Test a base-relative path (`/`-separated components).
    pub fn matches(&self, relative: &Path) -> bool {
        let parts: Vec<&str> = match relative
            .components()
            .map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
        {
            Some(parts) if !parts.is_empty() => parts,
            _ => return false,
        };
        match_segments(&self.segments, &parts)
    }

    /// Leading literal directories, walked instead of the whole base.
    fn literal_prefix(&self) -> PathBuf {
        let mut prefix = PathBuf::new();
        // The last segment names files, never a directory to descend into.
        let dirs = &self.segments[..self.segments.len().saturating_sub(1)];
        for segment in dirs {
            match segment {
                Segment::Name(name) if !has_wildcard(name) => prefix.push(name),
                _ => break,
            }
        }
        prefix
    }
}

impl std::fmt::Display for Glob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn has_wildcard(segment: &str) -> bool {
    segment.contains(['*', '?'])
}

fn match_segments(segments: &[Segment], parts: &[&str]) -> bool {
    match segments.split_first() {
        None => parts.is_empty(),
        Some((Segment::AnyDepth, rest)) => {
            if rest.is_empty() {
                return !parts.is_empty();
            }
            (0..=parts.len()).any(|skip| match_segments(rest, &parts[skip..]))
        }
        Some((Segment::Name(pattern), rest)) => match parts.split_first() {
            Some((part, tail)) => match_name(pattern, part) && match_segments(rest, tail),
            None => false,
        },
    }
}

/// Match a single path segment against `*` / `?` wildcards.
fn match_name(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    let (mut pi, mut ni) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ni < n.len() {
        match p.get(pi) {
            Some('*') => {
                backtrack = Some((pi, ni));
                pi += 1;
            }
            Some('?') => {
                pi += 1;
                ni += 1;
            }
            Some(c) if *c == n[ni] => {
                pi += 1;
                ni += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    pi = star + 1;
                    ni = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    p[pi..].iter().all(|c| *c == '*')
}

/// One file selected by a source set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute (root-joined) path on disk.
    pub path: PathBuf,
    /// Path relative to the source set's base; preserved in the output tree.
    pub relative: PathBuf,
}

/// A base directory and the glob selecting files beneath it.
#[derive(Debug, Clone)]
pub struct SourceSet {
    pub base: PathBuf,
    pub glob: Glob,
}

impl SourceSet {
    pub fn new(base: impl Into<PathBuf>, pattern: &str) -> Result<Self, SourceError> {
        Ok(Self {
            base: base.into(),
            glob: Glob::new(pattern)?,
        })
    }

    /// All matching files, sorted by relative path.
    pub fn collect(&self) -> Result<Vec<SourceFile>, SourceError> {
        let start = self.base.join(self.glob.literal_prefix());
        if !start.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(&start).follow_links(true) {
            let entry = entry.map_err(|source| SourceError::Walk {
                path: start.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.base) else {
                continue;
            };
            if self.glob.matches(relative) {
                files.push(SourceFile {
                    path: entry.path().to_path_buf(),
                    relative: relative.to_path_buf(),
                });
            }
        }
        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, rel).unwrap();
    }

    // =========================================================================
    // Glob matching
    // =========================================================================

    #[test]
    fn star_stays_within_one_directory() {
        let glob = Glob::new("*.html").unwrap();
        assert!(glob.matches(Path::new("index.html")));
        assert!(!glob.matches(Path::new("nested/index.html")));
        assert!(!glob.matches(Path::new("index.htm")));
    }

    #[test]
    fn double_star_matches_every_file_below() {
        let glob = Glob::new("assets/images/**").unwrap();
        assert!(glob.matches(Path::new("assets/images/logo.png")));
        assert!(glob.matches(Path::new("assets/images/icons/a/b.svg")));
        assert!(!glob.matches(Path::new("assets/images")));
        assert!(!glob.matches(Path::new("assets/fonts/a.woff")));
    }

    #[test]
    fn double_star_in_the_middle_matches_zero_directories() {
        let glob = Glob::new("assets/**/*.js").unwrap();
        assert!(glob.matches(Path::new("assets/main.js")));
        assert!(glob.matches(Path::new("assets/scripts/vendor/x.js")));
        assert!(!glob.matches(Path::new("other/main.js")));
    }

    #[test]
    fn question_mark_matches_one_char() {
        let glob = Glob::new("page?.html").unwrap();
        assert!(glob.matches(Path::new("page1.html")));
        assert!(!glob.matches(Path::new("page10.html")));
    }

    #[test]
    fn wildcard_backtracks() {
        assert!(match_name("*.min.*", "app.min.js"));
        assert!(match_name("a*b*c", "aXbYbZc"));
        assert!(!match_name("a*b*c", "aXbY"));
        assert!(match_name("*", ""));
    }

    #[test]
    fn invalid_globs_are_rejected() {
        for bad in ["", "/abs/*.html", "a//b", "../up", "a**b"] {
            assert!(Glob::new(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn literal_prefix_stops_at_first_wildcard() {
        assert_eq!(
            Glob::new("assets/styles/*.scss").unwrap().literal_prefix(),
            PathBuf::from("assets/styles")
        );
        assert_eq!(Glob::new("**").unwrap().literal_prefix(), PathBuf::new());
        assert_eq!(
            Glob::new("assets/**/x.js").unwrap().literal_prefix(),
            PathBuf::from("assets")
        );
    }

    // =========================================================================
    // Collecting files
    // =========================================================================

    #[test]
    fn collect_returns_sorted_relative_paths() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "b.html");
        touch(tmp.path(), "a.html");
        touch(tmp.path(), "notes.txt");
        touch(tmp.path(), "sub/c.html");

        let set = SourceSet::new(tmp.path(), "*.html").unwrap();
        let rel: Vec<PathBuf> = set.collect().unwrap().into_iter().map(|f| f.relative).collect();
        assert_eq!(rel, vec![PathBuf::from("a.html"), PathBuf::from("b.html")]);
    }

    #[test]
    fn collect_recursive_tree() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "assets/images/logo.png");
        touch(tmp.path(), "assets/images/icons/x.svg");
        touch(tmp.path(), "assets/fonts/a.woff");

        let set = SourceSet::new(tmp.path(), "assets/images/**").unwrap();
        let files = set.collect().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(
            files[0].relative,
            PathBuf::from("assets/images/icons/x.svg")
        );
        assert_eq!(files[1].path, tmp.path().join("assets/images/logo.png"));
    }

    #[test]
    fn missing_base_is_empty() {
        let tmp = TempDir::new().unwrap();
        let set = SourceSet::new(tmp.path().join("nope"), "**").unwrap();
        assert!(set.collect().unwrap().is_empty());
    }
}
