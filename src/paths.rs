//! Filesystem path helpers shared by every component.
use std::io;
use std::path::{Component, Path};

/// Returns `true` unless stat reports that `path` does not exist.
///
/// Any other stat failure (e.g. permission denied) counts as existing so
/// the caller surfaces the real error on the next operation instead of
/// treating the file as absent.
#[must_use]
pub fn exists(path: &Path) -> bool {
    !matches!(std::fs::metadata(path), Err(e) if e.kind() == io::ErrorKind::NotFound)
}

/// Render `path` relative to `root` using `/` separators.
///
/// Returns `None` when `path` is not under `root`, including paths that
/// climb back out of it through `..`.
#[must_use]
pub fn offset_of(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Join a `/`-separated offset onto `base`.
#[must_use]
pub fn join_offset(base: &Path, offset: &str) -> std::path::PathBuf {
    offset
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(base.to_path_buf(), |acc, part| acc.join(part))
}

/// Permission bits of a file, as compared and restored by deploy.
#[cfg(unix)]
#[must_use]
pub fn mode_of(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt as _;
    meta.permissions().mode() & 0o7777
}

/// Permission bits of a file, as compared and restored by deploy.
///
/// Non-unix platforms only expose the read-only flag.
#[cfg(not(unix))]
#[must_use]
pub fn mode_of(meta: &std::fs::Metadata) -> u32 {
    if meta.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

/// Apply captured permission bits to `path`.
///
/// # Errors
///
/// Returns an error if the permissions cannot be changed.
#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt as _;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

/// Apply captured permission bits to `path`.
///
/// # Errors
///
/// Returns an error if the permissions cannot be changed.
#[cfg(not(unix))]
pub fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_readonly(mode & 0o222 == 0);
    std::fs::set_permissions(path, perms)
}
