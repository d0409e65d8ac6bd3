//! Rayon-based fan-out over the managed file set.
//!
//! Every file is read, templated and handed to the caller's action on the
//! rayon pool. Results are consumed in manifest order, so the error that
//! surfaces on failure does not depend on thread scheduling.
use std::path::Path;

use anyhow::{Context as _, Result};
use rayon::prelude::*;

use crate::manifest::ManagedFile;
use crate::paths;
use crate::template::{self, TemplateParameters};

/// Apply `action` to every file in `files`.
///
/// The action receives the destination path under `home`, the rendered
/// bytes, and the file record. All files are processed even when one fails;
/// the first failure in `files` order is returned, tagged with its offset.
///
/// # Errors
///
/// Returns the first per-file error wrapped in `file: <offset>` context.
pub fn process<T, F>(
    files: &[ManagedFile],
    home: &Path,
    params: &TemplateParameters,
    action: F,
) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(&Path, Vec<u8>, &ManagedFile) -> Result<T> + Sync,
{
    tracing::debug!("processing {} files", files.len());
    let results: Vec<Result<T>> = files
        .par_iter()
        .map(|file| {
            process_one(file, home, params, &action)
                .with_context(|| format!("file: {}", file.offset))
        })
        .collect();
    results.into_iter().collect()
}

fn process_one<T, F>(
    file: &ManagedFile,
    home: &Path,
    params: &TemplateParameters,
    action: &F,
) -> Result<T>
where
    F: Fn(&Path, Vec<u8>, &ManagedFile) -> Result<T>,
{
    let raw = std::fs::read(&file.path)
        .with_context(|| format!("reading {}", file.path.display()))?;
    let data = template::render(raw, params)?;
    let target = paths::join_offset(home, &file.offset);
    action(&target, data, file)
}
