//! Comparing rendered candidates against live home-directory files.
//!
//! The simple comparison never produces text: it checks the mode, then the
//! length, then the bytes. The verbose comparison materializes the candidate
//! in a scratch file and hands both paths to an external line-diff program.
use std::borrow::Cow;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};

use crate::config::DiffTool;
use crate::error::ToolError;
use crate::exec;
use crate::paths;

/// Rendered bytes and captured mode of a managed file.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    /// Rendered contents.
    pub data: &'a [u8],
    /// Permission bits of the source file.
    pub mode: u32,
}

/// Outcome of comparing one candidate with its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffResult {
    /// Same contents and mode.
    Identical,
    /// Differs; no detail requested.
    Differs,
    /// Differs, with the external tool's output.
    Verbose(String),
    /// The target does not exist.
    Missing,
}

impl DiffResult {
    /// Whether the target needs attention.
    #[must_use]
    pub const fn is_different(&self) -> bool {
        !matches!(self, Self::Identical)
    }

    /// Text shown beneath the file in verbose output.
    #[must_use]
    pub fn payload(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Verbose(text) => Some(Cow::Borrowed(text)),
            Self::Missing => Some(Cow::Borrowed("does not exist")),
            Self::Identical | Self::Differs => None,
        }
    }
}

#[derive(Debug, Clone)]
struct External {
    program: PathBuf,
    args: Vec<String>,
    tmpdir: Option<PathBuf>,
}

/// Compares candidates with live files, optionally through an external tool.
#[derive(Debug, Clone, Default)]
pub struct DiffEngine {
    external: Option<External>,
}

impl DiffEngine {
    /// Engine that only reports whether files differ.
    #[must_use]
    pub const fn simple() -> Self {
        Self { external: None }
    }

    /// Engine that produces a textual diff using `tool`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DiffUnresolvable`] if the program is not found.
    pub fn verbose(tool: &DiffTool, tmpdir: Option<&Path>) -> Result<Self, ToolError> {
        let program = exec::which(&tool.program)?;
        tracing::debug!("using diff utility {}", program.display());
        Ok(Self {
            external: Some(External {
                program,
                args: tool.args.clone(),
                tmpdir: tmpdir.map(Path::to_path_buf),
            }),
        })
    }

    /// Whether an external tool produces textual diffs.
    #[must_use]
    pub const fn is_verbose(&self) -> bool {
        self.external.is_some()
    }

    /// Compare `candidate` with the file at `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the target cannot be read, the scratch file
    /// cannot be written, or the diff program cannot be spawned.
    pub fn check(&self, target: &Path, candidate: &Candidate<'_>) -> Result<DiffResult> {
        if !paths::exists(target) {
            return Ok(DiffResult::Missing);
        }
        let meta = std::fs::metadata(target)
            .with_context(|| format!("reading metadata of {}", target.display()))?;
        let live_mode = paths::mode_of(&meta);

        let Some(external) = &self.external else {
            if live_mode != candidate.mode
                || meta.len() != candidate.data.len() as u64
            {
                return Ok(DiffResult::Differs);
            }
            let live = std::fs::read(target)
                .with_context(|| format!("reading {}", target.display()))?;
            return Ok(if live == candidate.data {
                DiffResult::Identical
            } else {
                DiffResult::Differs
            });
        };

        let mut text = String::new();
        if live_mode != candidate.mode {
            text = format!("mode: 0{live_mode:o} != 0{:o}", candidate.mode);
        }
        let output = external.run(target, candidate.data)?;
        if !output.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(output.trim_end_matches('\n'));
        }
        Ok(if text.is_empty() {
            DiffResult::Identical
        } else {
            DiffResult::Verbose(text)
        })
    }
}

impl External {
    /// Diff `target` against `data`, returning the tool's combined output.
    fn run(&self, target: &Path, data: &[u8]) -> Result<String> {
        let builder = {
            let mut b = tempfile::Builder::new();
            b.prefix("dotfiles.");
            b
        };
        let mut scratch = match &self.tmpdir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .context("creating diff scratch file")?;
        scratch
            .as_file_mut()
            .write_all(data)
            .context("writing diff scratch file")?;

        let mut args: Vec<&std::ffi::OsStr> = self.args.iter().map(std::ffi::OsStr::new).collect();
        args.push(target.as_os_str());
        args.push(scratch.path().as_os_str());
        let result = exec::run_unchecked(&self.program, &args)?;
        Ok(String::from_utf8_lossy(&result.combined()).into_owned())
    }
}
