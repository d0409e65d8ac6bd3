//! External process helpers.
use anyhow::{Context as _, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::error::ToolError;

/// Result of a command execution.
#[derive(Debug)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: Vec<u8>,
    /// Captured standard error.
    pub stderr: Vec<u8>,
    /// Whether the process exited zero.
    pub success: bool,
    /// Exit code; `None` when terminated by a signal.
    pub code: Option<i32>,
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

impl ExecResult {
    /// Standard output followed by standard error, as one buffer.
    #[must_use]
    pub fn combined(&self) -> Vec<u8> {
        let mut out = self.stdout.clone();
        out.extend_from_slice(&self.stderr);
        out
    }

    /// Standard error decoded lossily and trimmed.
    #[must_use]
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Run `git -C <dir> <args>`, failing on a non-zero exit.
///
/// # Errors
///
/// Returns an error if git cannot be spawned, or [`ToolError::VcsFailed`]
/// if it exits non-zero.
pub fn git_in(dir: &Path, args: &[&str]) -> Result<ExecResult> {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .with_context(|| format!("failed to execute: git in {}", dir.display()))?;
    let result = ExecResult::from(output);
    if !result.success {
        return Err(ToolError::VcsFailed {
            code: result.code.unwrap_or(-1),
            stderr: result.stderr_text(),
        }
        .into());
    }
    Ok(result)
}

/// Run a command, allowing failure (returns result without bailing).
///
/// # Errors
///
/// Returns an error only if the program cannot be spawned.
pub fn run_unchecked<S: AsRef<OsStr>>(program: &Path, args: &[S]) -> Result<ExecResult> {
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("failed to execute: {}", program.display()))?;

    Ok(ExecResult::from(output))
}

/// Resolve `program` against `PATH`.
///
/// # Errors
///
/// Returns [`ToolError::DiffUnresolvable`] if the program cannot be found.
pub fn which(program: &str) -> Result<PathBuf, ToolError> {
    which::which(program).map_err(|source| ToolError::DiffUnresolvable {
        program: program.to_string(),
        source,
    })
}
