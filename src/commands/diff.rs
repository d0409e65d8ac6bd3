//! Command: report managed files that differ from home.
use std::io::Write;

use anyhow::Result;

use crate::config::Settings;
use crate::diff::{Candidate, DiffEngine};
use crate::manifest::ManagedFile;
use crate::processing;

/// Print `-> <offset>` for every file that differs or is missing, followed
/// by the textual difference when `verbose`.
///
/// # Errors
///
/// Returns an error if the diff utility cannot be resolved or any file
/// fails to process. Nothing is printed in that case.
pub fn run(
    settings: &Settings,
    files: &[ManagedFile],
    verbose: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let engine = if verbose {
        DiffEngine::verbose(&settings.diff, settings.tmpdir.as_deref())?
    } else {
        DiffEngine::simple()
    };
    let results = processing::process(files, &settings.home, &settings.params, |to, data, file| {
        let candidate = Candidate {
            data: &data,
            mode: file.mode,
        };
        Ok((file.offset.clone(), engine.check(to, &candidate)?))
    })?;

    for (offset, result) in results.iter().filter(|(_, r)| r.is_different()) {
        writeln!(out, "-> {offset}")?;
        if verbose && let Some(payload) = result.payload() {
            writeln!(out, "{payload}")?;
        }
    }
    Ok(())
}
