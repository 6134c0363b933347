//! Script transpilation.
//!
//! Transpiling modern JavaScript down to older targets stays the job of an
//! external tool (babel, esbuild, swc ...). The configured command receives
//! the script on stdin and must print the result on stdout; the source path
//! is exported as `SITEPIPE_FILE` for tools that want a filename. With no
//! command configured, scripts pass through unchanged.

use super::TransformError;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// A transpiler invocation, run from the project root.
#[derive(Debug, Clone, Default)]
pub struct Transpiler {
    argv: Vec<String>,
    cwd: PathBuf,
}

impl Transpiler {
    pub fn new(argv: Vec<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            argv,
            cwd: cwd.into(),
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.argv.is_empty()
    }

    fn display(&self) -> String {
        self.argv.join(" ")
    }
}

/// Transpile `source`, the contents of the script at `path`.
pub fn transpile(
    path: &Path,
    source: Vec<u8>,
    transpiler: &Transpiler,
) -> Result<Vec<u8>, TransformError> {
    let Some((program, args)) = transpiler.argv.split_first() else {
        return Ok(source);
    };

    let failed = |message: String| TransformError::Transpile {
        command: transpiler.display(),
        path: path.to_path_buf(),
        message,
    };

    let mut child = Command::new(program)
        .args(args)
        .current_dir(&transpiler.cwd)
        .env("SITEPIPE_FILE", path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| failed(format!("could not start: {e}")))?;

    // Feed stdin from another thread so a chatty child cannot deadlock on a full stdout pipe.
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| failed("stdin was not captured".into()))?;
    let writer = std::thread::spawn(move || stdin.write_all(&source));

    let output = child
        .wait_with_output()
        .map_err(|e| failed(format!("could not wait: {e}")))?;
    match writer.join() {
        Ok(Ok(())) => {}
        // The child may legitimately exit without reading all input.
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
        Ok(Err(e)) => return Err(failed(format!("could not write stdin: {e}"))),
        Err(_) => return Err(failed("stdin writer panicked".into())),
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(failed(format!("{}: {}", output.status, stderr.trim())));
    }
    Ok(output.stdout)
}
