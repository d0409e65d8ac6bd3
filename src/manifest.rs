//! Manifest resolution: turning `.dotfiles` rules into the managed file set.
//!
//! The manifest is rendered through the template engine first, then read as
//! one [`SelectionRule`] per line. Inclusions add files, negations mark them
//! ignored; ignores always win regardless of where they appear. The optional
//! consistency audit cross-checks version-control tracked files against the
//! result to catch manifest drift.
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::Result;
use walkdir::WalkDir;

use crate::config::Settings;
use crate::error::{DiscoveryError, DotfilesError};
use crate::exec;
use crate::paths;
use crate::template::{self, TemplateParameters};

/// One resolved source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedFile {
    /// Absolute source path.
    pub path: PathBuf,
    /// Path relative to the repository root, `/`-separated.
    pub offset: String,
    /// Permission bits captured at discovery time.
    pub mode: u32,
}

/// One manifest line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRule {
    /// Path or glob relative to the repository root.
    pub pattern: String,
    /// Set for `!` rules, which exclude what they match.
    pub negated: bool,
}

impl SelectionRule {
    /// Parse a manifest line; blank and `#` lines yield `None`.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let (pattern, negated) = line
            .strip_prefix('!')
            .map_or((line, false), |rest| (rest.trim_start(), true));
        if pattern.is_empty() {
            return None;
        }
        Some(Self {
            pattern: pattern.to_string(),
            negated,
        })
    }

    /// Whether the pattern needs glob expansion.
    #[must_use]
    pub fn is_glob(&self) -> bool {
        self.pattern.contains(['*', '?', '['])
    }
}

/// Output of [`resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolved {
    /// Managed files sorted by offset, ignores already removed.
    pub files: Vec<ManagedFile>,
    /// Offsets matched by a negation rule.
    pub ignored: BTreeSet<String>,
}

impl Resolved {
    fn is_managed(&self, offset: &str) -> bool {
        self.files
            .binary_search_by(|f| f.offset.as_str().cmp(offset))
            .is_ok()
    }
}

/// Read and render the manifest at `root/name` into rules.
///
/// # Errors
///
/// Returns an error if the manifest is missing or unreadable, or if its
/// template text fails to render.
pub fn read_rules(
    root: &Path,
    name: &str,
    params: &TemplateParameters,
) -> Result<Vec<SelectionRule>, DotfilesError> {
    let path = root.join(name);
    if !paths::exists(&path) {
        return Err(DiscoveryError::ManifestMissing(path).into());
    }
    let raw = std::fs::read(&path).map_err(|source| DiscoveryError::Read {
        path: path.clone(),
        source,
    })?;
    let rendered = template::render(raw, params)?;
    Ok(String::from_utf8_lossy(&rendered)
        .lines()
        .filter_map(SelectionRule::parse)
        .collect())
}

/// Resolve the managed file set for the repository at `root`.
///
/// # Errors
///
/// Returns a [`DiscoveryError`] if the manifest is missing, a literal
/// inclusion names a missing path, a rule reaches outside `root`, a pattern
/// is invalid, or nothing matched;
/// or a [`crate::error::TemplateError`] if the manifest fails to render.
pub fn resolve(
    root: &Path,
    name: &str,
    params: &TemplateParameters,
) -> Result<Resolved, DotfilesError> {
    let rules = read_rules(root, name, params)?;
    let mut found: BTreeMap<String, ManagedFile> = BTreeMap::new();
    let mut ignored = BTreeSet::new();

    for rule in &rules {
        let leaves = expand(root, rule)?;
        if leaves.is_empty() && !rule.negated && !rule.is_glob() {
            return Err(DiscoveryError::EntryNotFound(rule.pattern.clone()).into());
        }
        for leaf in leaves {
            let Some(offset) = paths::offset_of(root, &leaf) else {
                return Err(DiscoveryError::EntryOutsideRoot(rule.pattern.clone()).into());
            };
            if rule.negated {
                ignored.insert(offset);
                continue;
            }
            if found.contains_key(&offset) {
                continue;
            }
            let meta = std::fs::metadata(&leaf).map_err(|source| DiscoveryError::Read {
                path: leaf.clone(),
                source,
            })?;
            found.insert(
                offset.clone(),
                ManagedFile {
                    path: leaf,
                    offset,
                    mode: paths::mode_of(&meta),
                },
            );
        }
    }

    let files: Vec<ManagedFile> = found
        .into_values()
        .filter(|f| !ignored.contains(&f.offset))
        .collect();
    tracing::debug!(
        "resolved {} rules into {} files ({} ignored)",
        rules.len(),
        files.len(),
        ignored.len()
    );
    if files.is_empty() {
        return Err(DiscoveryError::NothingMatched.into());
    }
    Ok(Resolved { files, ignored })
}

/// Expand one rule into the regular files it names.
fn expand(root: &Path, rule: &SelectionRule) -> Result<Vec<PathBuf>, DiscoveryError> {
    let items = if rule.is_glob() {
        let full = format!(
            "{}/{}",
            glob::Pattern::escape(&root.to_string_lossy()),
            rule.pattern
        );
        let matches = glob::glob(&full).map_err(|source| DiscoveryError::InvalidPattern {
            pattern: rule.pattern.clone(),
            source,
        })?;
        matches.collect::<Result<Vec<_>, _>>()?
    } else {
        let full = paths::join_offset(root, &rule.pattern);
        if !paths::exists(&full) {
            return Ok(Vec::new());
        }
        vec![full]
    };

    let mut leaves = Vec::new();
    for item in items {
        for entry in WalkDir::new(&item).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }
            leaves.push(entry.into_path());
        }
    }
    Ok(leaves)
}

/// Source of version-control tracked paths for the consistency audit.
#[cfg_attr(test, mockall::automock)]
pub trait VcsQuery {
    /// Tracked paths relative to `root`, `/`-separated.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be run or fails.
    fn tracked(&self, root: &Path) -> Result<Vec<String>>;
}

/// [`VcsQuery`] backed by `git ls-files -z`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitLsFiles;

impl VcsQuery for GitLsFiles {
    fn tracked(&self, root: &Path) -> Result<Vec<String>> {
        let out = exec::git_in(root, &["ls-files", "-z"])?;
        Ok(out
            .stdout
            .split(|b| *b == 0)
            .filter(|entry| !entry.is_empty())
            .map(|entry| String::from_utf8_lossy(entry).into_owned())
            .collect())
    }
}

/// Fail if any tracked file that is present in `home` is neither managed nor
/// ignored.
///
/// # Errors
///
/// Returns [`DiscoveryError::Drift`] listing every offender, or the query's
/// own error.
pub fn audit(resolved: &Resolved, root: &Path, home: &Path, vcs: &dyn VcsQuery) -> Result<()> {
    let mut offenders: Vec<String> = vcs
        .tracked(root)?
        .into_iter()
        .filter(|offset| !resolved.is_managed(offset) && !resolved.ignored.contains(offset))
        .filter(|offset| paths::join_offset(home, offset).is_file())
        .collect();
    if offenders.is_empty() {
        return Ok(());
    }
    offenders.sort();
    tracing::warn!("{} tracked files escape the manifest", offenders.len());
    Err(DiscoveryError::Drift(offenders).into())
}

/// Resolve the managed set for `settings`, running the audit when enabled.
///
/// # Errors
///
/// Returns any resolution or audit failure.
pub fn discover(settings: &Settings, vcs: &dyn VcsQuery) -> Result<Vec<ManagedFile>> {
    let resolved = resolve(&settings.root, &settings.manifest, &settings.params)?;
    if settings.auto_detect {
        audit(&resolved, &settings.root, &settings.home, vcs)?;
    }
    Ok(resolved.files)
}
