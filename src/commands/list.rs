//! Command: print the managed offsets.
use std::io::Write;

use anyhow::Result;

use crate::manifest::ManagedFile;

/// Print each offset on its own line, in manifest order.
///
/// # Errors
///
/// Returns an error if the sink cannot be written.
pub fn run(files: &[ManagedFile], out: &mut dyn Write) -> Result<()> {
    for file in files {
        writeln!(out, "{}", file.offset)?;
    }
    Ok(())
}
