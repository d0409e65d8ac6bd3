//! The fixed parameter surface exposed to templated files.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::platform::Platform;

/// Prefix shared by every parameter reference.
pub const PREFIX: &str = "$.Dotfiles.";

/// A named member of the parameter surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    /// `OS`: operating system name.
    Os,
    /// `Arch`: CPU architecture.
    Arch,
    /// `Host`: configured host identifier.
    Host,
    /// `Categories`: configured category tags.
    Categories,
    /// `HasCategory "tag"`: category membership test.
    HasCategory,
    /// `Env "NAME"`: environment lookup.
    Env,
    /// `Exists "path"`: path existence test.
    Exists,
    /// `Read "path"`: file contents without the final newline.
    Read,
}

impl Param {
    /// Every member, in the order used to build [`IDENTIFIERS`].
    pub const ALL: [Self; 8] = [
        Self::Os,
        Self::Arch,
        Self::Host,
        Self::Categories,
        Self::HasCategory,
        Self::Env,
        Self::Exists,
        Self::Read,
    ];

    /// The member name as written after [`PREFIX`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Os => "OS",
            Self::Arch => "Arch",
            Self::Host => "Host",
            Self::Categories => "Categories",
            Self::HasCategory => "HasCategory",
            Self::Env => "Env",
            Self::Exists => "Exists",
            Self::Read => "Read",
        }
    }

    /// Look up a member by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Number of arguments the member accepts; fields take none.
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::Os | Self::Arch | Self::Host | Self::Categories => 0,
            Self::HasCategory | Self::Env | Self::Exists | Self::Read => 1,
        }
    }
}

/// Fully qualified identifiers scanned for by the template pre-screen.
pub const IDENTIFIERS: [&str; 8] = [
    "$.Dotfiles.OS",
    "$.Dotfiles.Arch",
    "$.Dotfiles.Host",
    "$.Dotfiles.Categories",
    "$.Dotfiles.HasCategory",
    "$.Dotfiles.Env",
    "$.Dotfiles.Exists",
    "$.Dotfiles.Read",
];

/// Read-only values every templated file is rendered against.
///
/// Built once per run and shared across worker threads; nothing in here
/// consults the live process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateParameters {
    /// Operating system name.
    pub os: String,
    /// CPU architecture.
    pub arch: String,
    /// Host identifier; empty when not configured.
    pub host: String,
    /// Category tags in configured order.
    pub categories: Vec<String>,
    /// Environment snapshot taken when settings were resolved.
    pub env: BTreeMap<String, String>,
    /// Repository root; relative `Read`/`Exists` paths resolve against it.
    pub root: PathBuf,
    /// Home directory used for `~` expansion.
    pub home: PathBuf,
}

impl TemplateParameters {
    /// Build parameters for `platform`.
    #[must_use]
    pub fn new(
        platform: &Platform,
        host: &str,
        categories: &[String],
        env: BTreeMap<String, String>,
        root: &Path,
        home: &Path,
    ) -> Self {
        Self {
            os: platform.os.to_string(),
            arch: platform.arch.clone(),
            host: host.to_string(),
            categories: categories.to_vec(),
            env,
            root: root.to_path_buf(),
            home: home.to_path_buf(),
        }
    }

    /// Value of an environment variable, empty when unset.
    #[must_use]
    pub fn env_var(&self, name: &str) -> &str {
        self.env.get(name).map_or("", String::as_str)
    }

    /// Whether `tag` is one of the configured categories.
    #[must_use]
    pub fn has_category(&self, tag: &str) -> bool {
        self.categories.iter().any(|c| c == tag)
    }

    /// Expand `~` and environment references, resolving relative results
    /// against the repository root.
    #[must_use]
    pub fn expand_path(&self, raw: &str) -> PathBuf {
        let expanded = expand_env(raw, &self.env);
        let path = if expanded == "~" {
            self.home.clone()
        } else if let Some(rest) = expanded
            .strip_prefix("~/")
            .or_else(|| expanded.strip_prefix("~\\"))
        {
            self.home.join(rest)
        } else {
            PathBuf::from(expanded)
        };
        if path.is_absolute() {
            path
        } else {
            self.root.join(path)
        }
    }
}

/// Expand `$VAR` and `${VAR}` references against `env`; unset variables
/// expand to the empty string.
#[must_use]
pub fn expand_env(raw: &str, env: &BTreeMap<String, String>) -> String {
    shellexpand::env_with_context_no_errors(raw, |name: &str| {
        Some(env.get(name).map_or("", String::as_str))
    })
    .into_owned()
}
