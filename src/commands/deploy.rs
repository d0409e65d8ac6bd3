//! Command: write managed files into the home directory.
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};

use super::DeployOptions;
use crate::config::Settings;
use crate::diff::{Candidate, DiffEngine, DiffResult};
use crate::manifest::ManagedFile;
use crate::paths;
use crate::processing;

/// A file that needs writing.
#[derive(Debug)]
struct Pending {
    offset: String,
    target: PathBuf,
    exists: bool,
    data: Vec<u8>,
    mode: u32,
}

/// Deploy every managed file that is missing or differs.
///
/// Each pending file is reported as `-> <offset> (adding|differs)`; the
/// annotation is dropped under `force`. Files that exist and differ are
/// skipped unless `overwrite` is set. Under `dry_run` nothing is written.
///
/// # Errors
///
/// Returns an error if any file fails to process or a write fails.
pub fn run(
    settings: &Settings,
    files: &[ManagedFile],
    opts: DeployOptions,
    out: &mut dyn Write,
) -> Result<()> {
    opts.validate()?;
    let engine = DiffEngine::simple();
    let pending = processing::process(files, &settings.home, &settings.params, |to, data, file| {
        let mut exists = false;
        if !opts.force {
            let candidate = Candidate {
                data: &data,
                mode: file.mode,
            };
            match engine.check(to, &candidate)? {
                DiffResult::Identical => return Ok(None),
                DiffResult::Missing => {}
                DiffResult::Differs | DiffResult::Verbose(_) => exists = true,
            }
        }
        Ok(Some(Pending {
            offset: file.offset.clone(),
            target: to.to_path_buf(),
            exists,
            data,
            mode: file.mode,
        }))
    })?;

    let mut changed = false;
    for item in pending.into_iter().flatten() {
        if opts.force {
            writeln!(out, "-> {}", item.offset)?;
        } else {
            let status = if item.exists { "differs" } else { "adding" };
            writeln!(out, "-> {} ({status})", item.offset)?;
            if item.exists && !opts.overwrite {
                writeln!(out, "    ^ skipped")?;
                continue;
            }
        }
        changed = true;
        if opts.dry_run {
            continue;
        }
        write_atomic(&item.target, &item.data, item.mode)
            .with_context(|| format!("file: {}", item.offset))?;
    }

    if opts.dry_run && changed {
        writeln!(out, "\n[DRYRUN] no changes made")?;
    }
    Ok(())
}

/// Ensure the parent directory of `path` exists.
fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent: {}", parent.display()))?;
    }
    Ok(())
}

/// Where a write to `target` must land: the file a symlink points at, or
/// `target` itself.
fn write_destination(target: &Path) -> Result<PathBuf> {
    match std::fs::symlink_metadata(target) {
        Ok(meta) if meta.file_type().is_symlink() => {
            if let Ok(resolved) = dunce::canonicalize(target) {
                return Ok(resolved);
            }
            // Dangling link: create the file it names.
            let link = std::fs::read_link(target)
                .with_context(|| format!("reading link {}", target.display()))?;
            Ok(target.parent().map_or_else(|| link.clone(), |dir| dir.join(&link)))
        }
        _ => Ok(target.to_path_buf()),
    }
}

/// Replace `target` with `data` via a sibling temp file and rename.
///
/// The temp file gets `mode` before the rename, so the target never exists
/// with the wrong contents or permissions. On failure the temp file is
/// removed and the target is left as it was. A symlinked target is written
/// through, leaving the link in place.
fn write_atomic(target: &Path, data: &[u8], mode: u32) -> Result<()> {
    let target = write_destination(target)?;
    let target = target.as_path();
    ensure_parent_dir(target)?;
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".git-dotfiles.")
        .tempfile_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;
    tmp.as_file_mut()
        .write_all(data)
        .with_context(|| format!("writing {}", tmp.path().display()))?;
    paths::set_mode(tmp.path(), mode)
        .with_context(|| format!("setting mode on {}", tmp.path().display()))?;
    tmp.persist(target)
        .map_err(|e| e.error)
        .with_context(|| format!("replacing {}", target.display()))?;
    tracing::debug!("wrote {} ({:o})", target.display(), mode);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_creates_parents() {
        let home = tempfile::tempdir().unwrap();
        let target = home.path().join(".config/app/settings");
        write_atomic(&target, b"k=v\n", 0o640).unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"k=v\n");
        #[cfg(unix)]
        assert_eq!(
            paths::mode_of(&std::fs::metadata(&target).unwrap()),
            0o640
        );
    }

    #[test]
    fn write_atomic_replaces_existing() {
        let home = tempfile::tempdir().unwrap();
        let target = home.path().join(".vimrc");
        std::fs::write(&target, "old").unwrap();
        write_atomic(&target, b"new", 0o644).unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "new");
        assert_eq!(std::fs::read_dir(home.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn write_atomic_follows_dangling_link() {
        let home = tempfile::tempdir().unwrap();
        let link = home.path().join(".gitconfig");
        std::os::unix::fs::symlink("dotfiles/gitconfig", &link).unwrap();
        write_atomic(&link, b"[user]\n", 0o644).unwrap();
        assert!(std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(
            std::fs::read(home.path().join("dotfiles/gitconfig")).unwrap(),
            b"[user]\n"
        );
    }

    #[test]
    fn failed_write_leaves_target_and_no_temp() {
        let home = tempfile::tempdir().unwrap();
        let target = home.path().join("occupied");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), "x").unwrap();
        assert!(write_atomic(&target, b"data", 0o644).is_err());
        assert!(target.join("keep").is_file());
        assert_eq!(std::fs::read_dir(home.path()).unwrap().count(), 1);
    }
}
