//! Polling file watcher.
//!
//! Each watch pairs a source set with what to do when it changes: rerun a
//! task (which then notifies browsers itself) or notify browsers directly.
//! One thread polls every watch in turn, so triggers never overlap.
//!
//! | Source set | On change |
//! |------------|-----------|
//! | pages      | `page`    |
//! | styles     | `style`   |
//! | scripts    | `script`  |
//! | images, fonts, extras | reload only |

use crate::plan::{self, TaskName};
use crate::sources::{SourceError, SourceSet};
use crate::tasks::{Input, Project};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// `(mtime, len)` of every file in a source set, keyed by base-relative path.
pub type Snapshot = BTreeMap<PathBuf, (SystemTime, u64)>;

pub fn snapshot(set: &SourceSet) -> Result<Snapshot, SourceError> {
    let mut snap = Snapshot::new();
    for file in set.collect()? {
        // A file can vanish between the walk and the stat; the next poll sees it gone.
        if let Ok(meta) = std::fs::metadata(&file.path) {
            let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            snap.insert(file.relative, (mtime, meta.len()));
        }
    }
    Ok(snap)
}

/// Paths added, modified or removed between two snapshots, sorted.
pub fn diff(before: &Snapshot, after: &Snapshot) -> Vec<PathBuf> {
    let mut changed: Vec<PathBuf> = after
        .iter()
        .filter(|(path, stamp)| before.get(*path) != Some(*stamp))
        .map(|(path, _)| path.clone())
        .collect();
    changed.extend(before.keys().filter(|p| !after.contains_key(*p)).cloned());
    changed.sort();
    changed
}

struct Watch {
    set: SourceSet,
    rerun: Option<TaskName>,
    last: Snapshot,
}

/// What one poll found for one watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub rerun: Option<TaskName>,
    /// `/`-separated, relative to the source set's base.
    pub paths: Vec<String>,
}

pub struct Watcher<'a> {
    project: &'a Project,
    watches: Vec<Watch>,
    interval: Duration,
}

impl<'a> Watcher<'a> {
    /// Register every watch and take the initial snapshots.
    pub fn new(project: &'a Project) -> Result<Self, SourceError> {
        let bindings = [
            (Input::Pages, Some(TaskName::Page)),
            (Input::Styles, Some(TaskName::Style)),
            (Input::Scripts, Some(TaskName::Script)),
            (Input::Images, None),
            (Input::Fonts, None),
            (Input::Extras, None),
        ];
        let mut watches = Vec::with_capacity(bindings.len());
        for (input, rerun) in bindings {
            let set = project.source_set(input)?;
            let last = snapshot(&set)?;
            debug!(glob = %set.glob, files = last.len(), "watching");
            watches.push(Watch { set, rerun, last });
        }
        Ok(Self {
            project,
            watches,
            interval: Duration::from_millis(project.config.serve.poll_interval_ms),
        })
    }

    /// Compare every watch against its last snapshot.
    pub fn changes(&mut self) -> Vec<Change> {
        let mut found = Vec::new();
        for watch in &mut self.watches {
            let next = match snapshot(&watch.set) {
                Ok(next) => next,
                Err(e) => {
                    warn!(error = %e, "watch scan failed");
                    continue;
                }
            };
            let changed = diff(&watch.last, &next);
            watch.last = next;
            if !changed.is_empty() {
                found.push(Change {
                    rerun: watch.rerun,
                    paths: changed.iter().map(|p| url_path(p)).collect(),
                });
            }
        }
        found
    }

    /// Rerun the bound task, or notify browsers directly.
    ///
    /// A failing task is logged; the watcher keeps going.
    pub fn dispatch(&self, change: &Change) {
        match change.rerun {
            Some(task) => {
                info!(%task, paths = ?change.paths, "changed, rerunning");
                if let Err(e) = plan::run_task(self.project, task) {
                    warn!(%task, error = %e, "rerun failed");
                }
            }
            None => self.project.reload(change.paths.clone()),
        }
    }

    /// One polling round: detect and dispatch.
    pub fn poll(&mut self) -> Vec<Change> {
        let changes = self.changes();
        for change in &changes {
            self.dispatch(change);
        }
        changes
    }

    /// Poll until `stop` is set.
    pub fn run(&mut self, stop: &AtomicBool) {
        while !stop.load(Ordering::Relaxed) {
            std::thread::sleep(self.interval);
            self.poll();
        }
        debug!("watcher stopped");
    }
}

fn url_path(path: &std::path::Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
