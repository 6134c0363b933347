//! CLI output formatting for task runs.
//!
//! # Output Format
//!
//! Every leaf task prints a header when it starts and a block when it
//! finishes. Finished blocks list each output with what happened to it;
//! compression and minification also show the size change.
//!
//! ```text
//! ==> style
//! ==> page
//! page (2 files, 3 ms)
//!     temp/about.html: copied
//!     temp/index.html: copied
//! style (1 file, 41 ms)
//!     temp/assets/styles/main.css: compiled
//! image (1 file, 280 ms, saved 12.4 KB)
//!     dist/assets/images/logo.png: compressed 48.1 KB → 35.7 KB
//! ```
//!
//! Parallel tasks interleave, so lines from sibling tasks may mix; each
//! finished block is printed in one piece.
//!
//! # Architecture
//!
//! Each `format_*` function returns `Vec<String>` (or a `String`) and does
//! no I/O; the `print_*` wrappers write to stdout.

use crate::plan::TaskName;
use crate::tasks::{FileAction, FileReport, PipelineEvent, TaskReport};
use std::time::Duration;

// ============================================================================
// Helpers
// ============================================================================

/// Human-readable byte count: `512 B`, `12.4 KB`, `3.1 MB`.
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{bytes} B")
    }
}

pub fn format_duration(elapsed: Duration) -> String {
    let ms = elapsed.as_millis();
    if ms >= 1000 {
        format!("{:.2} s", elapsed.as_secs_f64())
    } else {
        format!("{ms} ms")
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// One output line, indented under its task.
pub fn format_file(file: &FileReport) -> String {
    let path = file.output.display();
    let sizes = format!(
        "{} \u{2192} {}",
        format_bytes(file.bytes_in),
        format_bytes(file.bytes_out)
    );
    match file.action {
        FileAction::Removed => format!("    {path}: removed"),
        FileAction::Copied => format!("    {path}: copied"),
        FileAction::Compiled => format!("    {path}: compiled"),
        FileAction::Transpiled => format!("    {path}: transpiled"),
        FileAction::Kept => format!("    {path}: kept ({})", format_bytes(file.bytes_out)),
        FileAction::Compressed => format!("    {path}: compressed {sizes}"),
        FileAction::Minified => format!("    {path}: minified {sizes}"),
        FileAction::Bundled { sources } => {
            format!("    {path}: bundled {} {sizes}", plural(sources, "file"))
        }
    }
}

// ============================================================================
// Task output
// ============================================================================

pub fn format_report(report: &TaskReport, elapsed: Duration) -> Vec<String> {
    let mut header = format!(
        "{} ({}, {}",
        report.task,
        plural(report.files.len(), "file"),
        format_duration(elapsed)
    );
    let saved = report.bytes_saved();
    if saved > 0 {
        header.push_str(&format!(", saved {}", format_bytes(saved)));
    }
    header.push(')');

    let mut lines = vec![header];
    lines.extend(report.files.iter().map(format_file));
    lines
}

/// Format one progress event as display lines.
pub fn format_event(event: &PipelineEvent) -> Vec<String> {
    match event {
        PipelineEvent::Started(task) => vec![format!("==> {task}")],
        PipelineEvent::Finished { report, elapsed } => format_report(report, *elapsed),
        PipelineEvent::Failed { task, error } => vec![format!("!! {task} failed: {error}")],
        PipelineEvent::Reloaded { paths } => {
            vec![format!("    reload: {}", paths.join(", "))]
        }
    }
}

pub fn print_event(event: &PipelineEvent) {
    for line in format_event(event) {
        println!("{}", line);
    }
}

/// Closing line after a whole run.
pub fn format_summary(task: TaskName, reports: &[TaskReport], elapsed: Duration) -> String {
    let files: usize = reports.iter().map(|r| r.files.len()).sum();
    let saved: u64 = reports.iter().map(TaskReport::bytes_saved).sum();
    let mut line = format!(
        "==> {task} complete: {} in {}",
        plural(files, "file"),
        format_duration(elapsed)
    );
    if saved > 0 {
        line.push_str(&format!(", saved {}", format_bytes(saved)));
    }
    line
}

pub fn print_summary(task: TaskName, reports: &[TaskReport], elapsed: Duration) {
    println!("{}", format_summary(task, reports, elapsed));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file(output: &str, action: FileAction, bytes_in: u64, bytes_out: u64) -> FileReport {
        FileReport {
            output: PathBuf::from(output),
            action,
            bytes_in,
            bytes_out,
        }
    }

    #[test]
    fn bytes_scale_units() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn durations_switch_to_seconds() {
        assert_eq!(format_duration(Duration::from_millis(41)), "41 ms");
        assert_eq!(format_duration(Duration::from_millis(1250)), "1.25 s");
    }

    #[test]
    fn file_lines_by_action() {
        assert_eq!(
            format_file(&file("temp/index.html", FileAction::Copied, 10, 10)),
            "    temp/index.html: copied"
        );
        assert_eq!(
            format_file(&file("dist/a.png", FileAction::Compressed, 2048, 1024)),
            "    dist/a.png: compressed 2.0 KB \u{2192} 1.0 KB"
        );
        assert_eq!(
            format_file(&file("dist/v.js", FileAction::Bundled { sources: 1 }, 100, 50)),
            "    dist/v.js: bundled 1 file 100 B \u{2192} 50 B"
        );
        assert_eq!(
            format_file(&file("dist/b.jpg", FileAction::Kept, 900, 900)),
            "    dist/b.jpg: kept (900 B)"
        );
    }

    #[test]
    fn report_header_counts_and_savings() {
        let report = TaskReport {
            task: TaskName::Image,
            files: vec![
                file("dist/a.png", FileAction::Compressed, 2048, 1024),
                file("dist/b.png", FileAction::Kept, 10, 10),
            ],
        };
        let lines = format_report(&report, Duration::from_millis(7));
        assert_eq!(lines[0], "image (2 files, 7 ms, saved 1.0 KB)");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn report_without_savings_omits_them() {
        let report = TaskReport {
            task: TaskName::Clean,
            files: vec![],
        };
        assert_eq!(
            format_report(&report, Duration::from_millis(1)),
            vec!["clean (0 files, 1 ms)"]
        );
    }

    #[test]
    fn events_format() {
        assert_eq!(
            format_event(&PipelineEvent::Started(TaskName::Style)),
            vec!["==> style"]
        );
        assert_eq!(
            format_event(&PipelineEvent::Failed {
                task: TaskName::Style,
                error: "boom".into()
            }),
            vec!["!! style failed: boom"]
        );
        assert_eq!(
            format_event(&PipelineEvent::Reloaded {
                paths: vec!["index.html".into(), "about.html".into()]
            }),
            vec!["    reload: index.html, about.html"]
        );
    }

    #[test]
    fn summary_totals_all_reports() {
        let reports = vec![
            TaskReport {
                task: TaskName::Page,
                files: vec![file("temp/index.html", FileAction::Copied, 5, 5)],
            },
            TaskReport {
                task: TaskName::Extra,
                files: vec![file("dist/a.png", FileAction::Compressed, 300, 100)],
            },
        ];
        assert_eq!(
            format_summary(TaskName::Build, &reports, Duration::from_millis(12)),
            "==> build complete: 2 files in 12 ms, saved 200 B"
        );
    }
}
