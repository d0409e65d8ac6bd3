//! Settings resolution: optional TOML file, then environment, then CLI.
//!
//! Everything the engine needs from the outside world is captured here once
//! and frozen into [`Settings`]; no other module reads the process
//! environment.
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::platform::Platform;
use crate::template::{TemplateParameters, expand_env};

/// Prefix of every environment variable the tool reads.
pub const ENV_PREFIX: &str = "GIT_DOTFILES_";

/// Manifest file name used when none is configured.
pub const DEFAULT_MANIFEST: &str = ".dotfiles";

/// Diff command used when none is configured.
pub const DEFAULT_DIFF: &str = "diff -u";

/// Contents of the optional `config.toml`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Repository root.
    pub root: Option<PathBuf>,
    /// Host identifier.
    pub host: Option<String>,
    /// Category tags.
    pub categories: Option<Vec<String>>,
    /// Diff command line.
    pub diff: Option<String>,
    /// Scratch directory for verbose diffs.
    pub tmpdir: Option<PathBuf>,
    /// Enable the consistency audit.
    pub auto_detect: Option<bool>,
    /// Manifest file name.
    pub manifest: Option<String>,
}

impl FileConfig {
    /// Load `path`; a missing file yields defaults unless `required`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path, required: bool) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        toml::from_str(&content).map_err(|source| ConfigError::InvalidFile {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Snapshot of the process environment.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Capture the current process environment (non-UTF-8 entries are skipped).
    #[must_use]
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    /// Build an environment from explicit pairs.
    #[must_use]
    pub fn from_pairs<K: Into<String>, V: Into<String>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of `name`, treating empty values as unset.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Value of `GIT_DOTFILES_<suffix>`.
    #[must_use]
    pub fn tool(&self, suffix: &str) -> Option<&str> {
        self.get(&format!("{ENV_PREFIX}{suffix}"))
    }

    /// The underlying variables.
    #[must_use]
    pub const fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }
}

/// Values supplied on the command line; they win over everything else.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Overrides {
    /// Explicit settings file; it must exist when given.
    pub config: Option<PathBuf>,
    /// Repository root.
    pub root: Option<PathBuf>,
    /// Host identifier.
    pub host: Option<String>,
    /// Category tags; empty means not given.
    pub categories: Vec<String>,
    /// Force the consistency audit on.
    pub auto_detect: bool,
}

/// External line-diff program and its leading arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffTool {
    /// Program name or path, resolved on `PATH` when needed.
    pub program: String,
    /// Arguments placed before the two file paths.
    pub args: Vec<String>,
}

impl DiffTool {
    /// Expand environment references in `command` and split it into fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyDiffCommand`] if nothing remains.
    pub fn parse(command: &str, env: &Environment) -> Result<Self, ConfigError> {
        let expanded = expand_env(command, env.vars());
        let mut fields = expanded.split_whitespace().map(str::to_string);
        let program = fields.next().ok_or(ConfigError::EmptyDiffCommand)?;
        Ok(Self {
            program,
            args: fields.collect(),
        })
    }
}

/// Fully resolved, immutable settings for one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Canonical repository root.
    pub root: PathBuf,
    /// Deployment target directory.
    pub home: PathBuf,
    /// Manifest file name, relative to `root`.
    pub manifest: String,
    /// Diff program for verbose output.
    pub diff: DiffTool,
    /// Directory for verbose-diff scratch files; system default when `None`.
    pub tmpdir: Option<PathBuf>,
    /// Run the consistency audit during discovery.
    pub auto_detect: bool,
    /// Values exposed to templated files.
    pub params: TemplateParameters,
}

impl Settings {
    /// Resolve settings from the config file, `env` and `overrides`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the root is unset or not a directory,
    /// the home directory is unknown, the diff command is empty, or the
    /// config file is unreadable.
    pub fn resolve(
        env: &Environment,
        overrides: &Overrides,
        platform: &Platform,
    ) -> Result<Self, ConfigError> {
        let home = home_dir(env, platform)?;
        let file = match &overrides.config {
            Some(path) => FileConfig::load(path, true)?,
            None => FileConfig::load(&default_config_path(env, &home), false)?,
        };

        let root = overrides
            .root
            .clone()
            .or_else(|| env.tool("ROOT").map(PathBuf::from))
            .or(file.root)
            .ok_or(ConfigError::RootNotSet)?;
        let root = dunce::canonicalize(&root)
            .ok()
            .filter(|p| p.is_dir())
            .ok_or(ConfigError::RootNotDirectory(root))?;

        let host = overrides
            .host
            .clone()
            .or_else(|| env.tool("HOST").map(str::to_string))
            .or(file.host)
            .unwrap_or_default();

        let categories = if !overrides.categories.is_empty() {
            overrides.categories.clone()
        } else if let Some(list) = env.tool("CATEGORIES") {
            split_list(list)
        } else {
            file.categories.unwrap_or_default()
        };

        let diff_cmd = env
            .tool("DIFF")
            .map(str::to_string)
            .or(file.diff)
            .unwrap_or_else(|| DEFAULT_DIFF.to_string());
        let diff = DiffTool::parse(&diff_cmd, env)?;

        let tmpdir = env.tool("TMP").map(PathBuf::from).or(file.tmpdir);
        let auto_detect = overrides.auto_detect
            || env.tool("AUTO_DETECT").map_or_else(
                || file.auto_detect.unwrap_or(false),
                is_yes,
            );
        let manifest = env
            .tool("MANIFEST")
            .map(str::to_string)
            .or(file.manifest)
            .unwrap_or_else(|| DEFAULT_MANIFEST.to_string());

        let params = TemplateParameters::new(
            platform,
            &host,
            &categories,
            env.vars().clone(),
            &root,
            &home,
        );

        Ok(Self {
            root,
            home,
            manifest,
            diff,
            tmpdir,
            auto_detect,
            params,
        })
    }
}

/// Interpret a yes/true/1 style flag value.
#[must_use]
pub fn is_yes(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "yes" | "true" | "1")
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn home_dir(env: &Environment, platform: &Platform) -> Result<PathBuf, ConfigError> {
    let home = if platform.is_windows() {
        env.get("USERPROFILE").or_else(|| env.get("HOME"))
    } else {
        env.get("HOME")
    };
    home.map(PathBuf::from).ok_or(ConfigError::HomeNotFound)
}

fn default_config_path(env: &Environment, home: &Path) -> PathBuf {
    env.get("XDG_CONFIG_HOME")
        .map_or_else(|| home.join(".config"), PathBuf::from)
        .join("git-dotfiles")
        .join("config.toml")
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::platform::Os;

    fn linux() -> Platform {
        Platform::new(Os::Linux, "x86_64")
    }

    struct Fixture {
        root: tempfile::TempDir,
        home: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                root: tempfile::tempdir().unwrap(),
                home: tempfile::tempdir().unwrap(),
            }
        }

        fn env(&self, extra: &[(&str, &str)]) -> Environment {
            let mut pairs = vec![
                ("HOME".to_string(), self.home.path().display().to_string()),
                (
                    "GIT_DOTFILES_ROOT".to_string(),
                    self.root.path().display().to_string(),
                ),
            ];
            pairs.extend(extra.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())));
            Environment::from_pairs(pairs)
        }
    }

    #[test]
    fn defaults_when_only_root_and_home_set() {
        let fx = Fixture::new();
        let s = Settings::resolve(&fx.env(&[]), &Overrides::default(), &linux()).unwrap();
        assert_eq!(s.root, dunce::canonicalize(fx.root.path()).unwrap());
        assert_eq!(s.home, fx.home.path());
        assert_eq!(s.manifest, DEFAULT_MANIFEST);
        assert_eq!(s.diff.program, "diff");
        assert_eq!(s.diff.args, vec!["-u"]);
        assert!(!s.auto_detect);
        assert_eq!(s.params.os, "linux");
        assert_eq!(s.params.host, "");
    }

    #[test]
    fn root_not_set_is_error() {
        let home = tempfile::tempdir().unwrap();
        let env = Environment::from_pairs([("HOME", home.path().display().to_string())]);
        let err = Settings::resolve(&env, &Overrides::default(), &linux()).unwrap_err();
        assert!(matches!(err, ConfigError::RootNotSet));
    }

    #[test]
    fn root_must_be_directory() {
        let fx = Fixture::new();
        let file = fx.root.path().join("file");
        std::fs::write(&file, "").unwrap();
        let overrides = Overrides {
            root: Some(file),
            ..Overrides::default()
        };
        let err = Settings::resolve(&fx.env(&[]), &overrides, &linux()).unwrap_err();
        assert!(matches!(err, ConfigError::RootNotDirectory(_)));
    }

    #[test]
    fn missing_home_is_error() {
        let root = tempfile::tempdir().unwrap();
        let env = Environment::from_pairs([("GIT_DOTFILES_ROOT", root.path().display().to_string())]);
        let err = Settings::resolve(&env, &Overrides::default(), &linux()).unwrap_err();
        assert!(matches!(err, ConfigError::HomeNotFound));
    }

    #[test]
    fn environment_overrides_file_and_cli_overrides_environment() {
        let fx = Fixture::new();
        let cfg = fx.home.path().join("config.toml");
        std::fs::write(
            &cfg,
            "host = \"from-file\"\ncategories = [\"file\"]\ndiff = \"colordiff -u\"\nauto_detect = true\n",
        )
        .unwrap();

        let env = fx.env(&[("GIT_DOTFILES_HOST", "from-env"), ("GIT_DOTFILES_CATEGORIES", "a, b")]);
        let overrides = Overrides {
            config: Some(cfg.clone()),
            ..Overrides::default()
        };
        let s = Settings::resolve(&env, &overrides, &linux()).unwrap();
        assert_eq!(s.params.host, "from-env");
        assert_eq!(s.params.categories, vec!["a", "b"]);
        assert_eq!(s.diff.program, "colordiff");
        assert!(s.auto_detect);

        let overrides = Overrides {
            config: Some(cfg),
            host: Some("from-cli".to_string()),
            categories: vec!["cli".to_string()],
            ..Overrides::default()
        };
        let s = Settings::resolve(&env, &overrides, &linux()).unwrap();
        assert_eq!(s.params.host, "from-cli");
        assert_eq!(s.params.categories, vec!["cli"]);
    }

    #[test]
    fn config_file_found_under_xdg_config_home() {
        let fx = Fixture::new();
        let dir = fx.home.path().join("xdg").join("git-dotfiles");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), "manifest = \"dotfiles.list\"\n").unwrap();
        let xdg = fx.home.path().join("xdg").display().to_string();
        let env = fx.env(&[("XDG_CONFIG_HOME", xdg.as_str())]);
        let s = Settings::resolve(&env, &Overrides::default(), &linux()).unwrap();
        assert_eq!(s.manifest, "dotfiles.list");
    }

    #[test]
    fn explicit_missing_config_is_error() {
        let fx = Fixture::new();
        let overrides = Overrides {
            config: Some(fx.home.path().join("absent.toml")),
            ..Overrides::default()
        };
        let err = Settings::resolve(&fx.env(&[]), &overrides, &linux()).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn unknown_config_key_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("config.toml");
        std::fs::write(&cfg, "colour = true\n").unwrap();
        let err = FileConfig::load(&cfg, true).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFile { .. }));
    }

    #[test]
    fn diff_tool_expands_environment() {
        let env = Environment::from_pairs([("DIFFER", "delta")]);
        let tool = DiffTool::parse("$DIFFER --side-by-side", &env).unwrap();
        assert_eq!(tool.program, "delta");
        assert_eq!(tool.args, vec!["--side-by-side"]);
    }

    #[test]
    fn empty_diff_command_is_error() {
        let err = DiffTool::parse("  $UNSET ", &Environment::default()).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyDiffCommand));
    }

    #[test]
    fn is_yes_values() {
        assert!(is_yes("yes"));
        assert!(is_yes("TRUE"));
        assert!(is_yes("1"));
        assert!(!is_yes("no"));
        assert!(!is_yes(""));
    }
}
