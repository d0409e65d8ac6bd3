//! Domain-specific error types for the dotfiles engine.
//!
//! Library modules return these typed errors; command handlers and per-file
//! actions work in [`anyhow::Result`] and convert through `?`, attaching
//! the offending file's offset as context.
//!
//! # Error hierarchy
//!
//! ```text
//! DotfilesError
//! ├── Config(ConfigError)      # settings, flag combinations
//! ├── Discovery(DiscoveryError) # manifest resolution, consistency audit
//! ├── Template(TemplateError)  # macro parsing and execution
//! └── Tool(ToolError)          # diff utility, version control
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the dotfiles engine.
#[derive(Error, Debug)]
pub enum DotfilesError {
    /// Settings could not be resolved or are contradictory.
    #[error("configuration error")]
    Config(#[from] ConfigError),

    /// The managed file set could not be produced.
    #[error("discovery error")]
    Discovery(#[from] DiscoveryError),

    /// A template failed to parse or execute.
    #[error("template error")]
    Template(#[from] TemplateError),

    /// An external tool could not be used.
    #[error("tool error")]
    Tool(#[from] ToolError),
}

/// Errors detected while resolving settings, before touching managed files.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No repository root was configured.
    #[error("dotfiles root not set")]
    RootNotSet,

    /// The configured root is not a directory.
    #[error("dotfiles root is not a directory: {0}")]
    RootNotDirectory(PathBuf),

    /// Neither `HOME` nor `USERPROFILE` is set.
    #[error("unable to determine home directory")]
    HomeNotFound,

    /// The diff command string expanded to nothing.
    #[error("unable to determine diff utility")]
    EmptyDiffCommand,

    /// `--force` and `--overwrite` were both requested.
    #[error("can not force and overwrite (force implies overwrite)")]
    ForceWithOverwrite,

    /// The settings file could not be read.
    #[error("IO error reading config file {path}: {source}")]
    Io {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The settings file is not valid TOML for the expected schema.
    #[error("invalid config file {path}: {source}")]
    InvalidFile {
        /// Path to the offending file.
        path: PathBuf,
        /// Underlying parse error.
        source: toml::de::Error,
    },
}

/// Errors raised while resolving the managed file set.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// The manifest file is absent from the repository root.
    #[error("manifest not found: {0}")]
    ManifestMissing(PathBuf),

    /// No rule matched any file.
    #[error("no items matched")]
    NothingMatched,

    /// An inclusion rule names a literal path that does not exist.
    #[error("manifest entry not found: {0}")]
    EntryNotFound(String),

    /// A rule matched a path outside the repository root.
    #[error("manifest entry outside repository root: {0}")]
    EntryOutsideRoot(String),

    /// A rule is not a valid glob pattern.
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The rule as written in the manifest.
        pattern: String,
        /// Underlying pattern error.
        source: glob::PatternError,
    },

    /// The manifest or a matched file's metadata could not be read.
    #[error("reading {path}: {source}")]
    Read {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A glob match could not be inspected.
    #[error(transparent)]
    Glob(#[from] glob::GlobError),

    /// Walking a matched directory failed.
    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    /// Tracked files are present in the home directory but unaccounted for.
    #[error("unmanaged tracked files found in home: {}", .0.join(", "))]
    Drift(Vec<String>),
}

/// Errors raised by the template engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// Parameter references and foreign macros appear in the same file.
    #[error("cannot mix dotfiles and non-dotfiles templating")]
    Mixed,

    /// The macro text is malformed.
    #[error("line {line}: {message}")]
    Parse {
        /// 1-based line of the offending block.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// The macro text is well-formed but failed while executing.
    #[error("line {line}: {message}")]
    Exec {
        /// 1-based line of the offending block.
        line: usize,
        /// What went wrong.
        message: String,
    },
}

/// Errors raised by external tools.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The configured diff program is not on `PATH`.
    #[error("unable to resolve diff utility '{program}': {source}")]
    DiffUnresolvable {
        /// Program name as configured.
        program: String,
        /// Lookup failure.
        source: which::Error,
    },

    /// A version-control query exited non-zero.
    #[error("git ls-files failed (exit {code}): {stderr}")]
    VcsFailed {
        /// Exit code, or -1 when killed by a signal.
        code: i32,
        /// Captured standard error.
        stderr: String,
    },
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn config_error_messages() {
        assert_eq!(ConfigError::RootNotSet.to_string(), "dotfiles root not set");
        assert_eq!(
            ConfigError::ForceWithOverwrite.to_string(),
            "can not force and overwrite (force implies overwrite)"
        );
        assert_eq!(
            ConfigError::EmptyDiffCommand.to_string(),
            "unable to determine diff utility"
        );
    }

    #[test]
    fn drift_lists_every_offset() {
        let e = DiscoveryError::Drift(vec![".bashrc".to_string(), ".vimrc".to_string()]);
        assert_eq!(
            e.to_string(),
            "unmanaged tracked files found in home: .bashrc, .vimrc"
        );
    }

    #[test]
    fn template_error_reports_line() {
        let e = TemplateError::Parse {
            line: 3,
            message: "unclosed action".to_string(),
        };
        assert_eq!(e.to_string(), "line 3: unclosed action");
    }

    #[test]
    fn dotfiles_error_from_discovery_error() {
        let e: DotfilesError = DiscoveryError::NothingMatched.into();
        assert_eq!(e.to_string(), "discovery error");
        let chained = format!("{:#}", anyhow::Error::from(e));
        assert_eq!(chained, "discovery error: no items matched");
    }

    #[test]
    fn tool_error_vcs_display() {
        let e = ToolError::VcsFailed {
            code: 128,
            stderr: "not a git repository".to_string(),
        };
        assert!(e.to_string().contains("exit 128"));
        assert!(e.to_string().contains("not a git repository"));
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn all_error_types_are_send_sync() {
        assert_send_sync::<DotfilesError>();
        assert_send_sync::<ConfigError>();
        assert_send_sync::<DiscoveryError>();
        assert_send_sync::<TemplateError>();
        assert_send_sync::<ToolError>();
    }

    #[test]
    fn template_error_converts_to_anyhow() {
        let _anyhow_err: anyhow::Error = TemplateError::Mixed.into();
    }
}
