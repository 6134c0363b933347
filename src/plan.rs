//! Task names, their composition, and the runner.
//!
//! Composite tasks are trees of two combinators:
//!
//! - **Series**: each step runs to completion before the next starts; the
//!   first failure stops the series.
//! - **Parallel**: every step starts together on the rayon pool; the
//!   composite completes when all steps have finished, and fails if any did.
//!
//! ```text
//! compile = parallel(page, style, script)
//! develop = series(clean, compile, serve)
//! build   = series(clean, parallel(image, font, extra, series(compile, useref)))
//! ```

use crate::serve;
use crate::tasks::{self, PipelineEvent, Project, TaskError, TaskReport};
use rayon::prelude::*;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use thiserror::Error;

/// Every task the CLI can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskName {
    Clean,
    Page,
    Style,
    Script,
    Image,
    Font,
    Extra,
    Serve,
    Compile,
    Develop,
    Useref,
    Build,
}

impl TaskName {
    pub const ALL: [TaskName; 12] = [
        TaskName::Clean,
        TaskName::Page,
        TaskName::Style,
        TaskName::Script,
        TaskName::Image,
        TaskName::Font,
        TaskName::Extra,
        TaskName::Serve,
        TaskName::Compile,
        TaskName::Develop,
        TaskName::Useref,
        TaskName::Build,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskName::Clean => "clean",
            TaskName::Page => "page",
            TaskName::Style => "style",
            TaskName::Script => "script",
            TaskName::Image => "image",
            TaskName::Font => "font",
            TaskName::Extra => "extra",
            TaskName::Serve => "serve",
            TaskName::Compile => "compile",
            TaskName::Develop => "develop",
            TaskName::Useref => "useref",
            TaskName::Build => "build",
        }
    }

    /// Whether a finished run of this task should refresh connected browsers.
    pub fn reloads(self) -> bool {
        matches!(self, TaskName::Page | TaskName::Style | TaskName::Script)
    }

    /// The composition this task stands for.
    pub fn plan(self) -> Plan {
        use Plan::{Parallel, Series, Task};
        match self {
            TaskName::Compile => Parallel(vec![
                Task(TaskName::Page),
                Task(TaskName::Style),
                Task(TaskName::Script),
            ]),
            TaskName::Develop => Series(vec![
                Task(TaskName::Clean),
                TaskName::Compile.plan(),
                Task(TaskName::Serve),
            ]),
            TaskName::Build => Series(vec![
                Task(TaskName::Clean),
                Parallel(vec![
                    Task(TaskName::Image),
                    Task(TaskName::Font),
                    Task(TaskName::Extra),
                    Series(vec![TaskName::Compile.plan(), Task(TaskName::Useref)]),
                ]),
            ]),
            leaf => Task(leaf),
        }
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
#[error("unknown task {0:?}")]
pub struct UnknownTask(String);

impl FromStr for TaskName {
    type Err = UnknownTask;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskName::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownTask(s.to_string()))
    }
}

/// A composition of tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Task(TaskName),
    Series(Vec<Plan>),
    Parallel(Vec<Plan>),
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, steps) = match self {
            Plan::Task(t) => return write!(f, "{t}"),
            Plan::Series(steps) => ("series", steps),
            Plan::Parallel(steps) => ("parallel", steps),
        };
        write!(f, "{name}(")?;
        for (i, step) in steps.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{step}")?;
        }
        f.write_str(")")
    }
}

/// A leaf task failed.
#[derive(Error, Debug)]
#[error("task `{task}` failed: {source}")]
pub struct PipelineError {
    pub task: TaskName,
    #[source]
    pub source: TaskError,
}

/// Run a plan to completion, returning the report of every leaf that ran.
pub fn run(project: &Project, plan: &Plan) -> Result<Vec<TaskReport>, PipelineError> {
    match plan {
        Plan::Task(task) => run_task(project, *task).map(|report| vec![report]),
        Plan::Series(steps) => {
            let mut reports = Vec::new();
            for step in steps {
                reports.extend(run(project, step)?);
            }
            Ok(reports)
        }
        Plan::Parallel(steps) => {
            let results: Vec<_> = steps.par_iter().map(|step| run(project, step)).collect();
            // Every branch has finished; surface the first failure in declaration order.
            let mut reports = Vec::new();
            for result in results {
                reports.extend(result?);
            }
            Ok(reports)
        }
    }
}

/// Run one leaf task, emitting progress events and reload notifications.
pub fn run_task(project: &Project, task: TaskName) -> Result<TaskReport, PipelineError> {
    project.emit(PipelineEvent::Started(task));
    let started = Instant::now();

    let result = match task {
        TaskName::Clean => tasks::clean(project),
        TaskName::Page => tasks::page(project),
        TaskName::Style => tasks::style(project),
        TaskName::Script => tasks::script(project),
        TaskName::Image => tasks::image(project),
        TaskName::Font => tasks::font(project),
        TaskName::Extra => tasks::extra(project),
        TaskName::Useref => tasks::useref(project),
        TaskName::Serve => serve::serve(project),
        composite => {
            return run(project, &composite.plan()).map(|reports| TaskReport {
                task: composite,
                files: reports.into_iter().flat_map(|r| r.files).collect(),
            });
        }
    };

    match result {
        Ok(report) => {
            project.emit(PipelineEvent::Finished {
                report: report.clone(),
                elapsed: started.elapsed(),
            });
            if task.reloads() {
                project.reload(report.outputs_under(&project.layout.root, &project.layout.temp));
            }
            Ok(report)
        }
        Err(source) => {
            project.emit(PipelineEvent::Failed {
                task,
                error: source.to_string(),
            });
            Err(PipelineError { task, source })
        }
    }
}
