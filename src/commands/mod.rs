//! Operation dispatch: diff, deploy and list over the managed file set.
//!
//! Every mode writes its report to a caller-supplied sink so the engine has
//! no direct coupling to the console.
pub mod completions;
pub mod deploy;
pub mod diff;
pub mod list;

use std::io::Write;

use anyhow::Result;

use crate::config::Settings;
use crate::error::ConfigError;
use crate::manifest::{self, VcsQuery};

/// Flags accepted by deploy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeployOptions {
    /// Report only; write nothing.
    pub dry_run: bool,
    /// Write every file without comparing.
    pub force: bool,
    /// Replace files that exist and differ.
    pub overwrite: bool,
}

impl DeployOptions {
    /// Reject contradictory flag combinations.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ForceWithOverwrite`] if both are set.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.force && self.overwrite {
            return Err(ConfigError::ForceWithOverwrite);
        }
        Ok(())
    }
}

/// The operating mode selected for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Report files that differ from home.
    Diff {
        /// Include the textual difference under each file.
        verbose: bool,
    },
    /// Write files that are missing or differ.
    Deploy(DeployOptions),
    /// Print every managed offset.
    List,
}

/// Validate `mode`, resolve the managed set, and run the mode.
///
/// # Errors
///
/// Returns a configuration error before any discovery, a discovery error
/// before any per-file work, or the first per-file failure.
pub fn run(mode: Mode, settings: &Settings, vcs: &dyn VcsQuery, out: &mut dyn Write) -> Result<()> {
    if let Mode::Deploy(opts) = mode {
        opts.validate()?;
    }
    let files = manifest::discover(settings, vcs)?;
    tracing::debug!("{mode:?} over {} files", files.len());
    match mode {
        Mode::Diff { verbose } => diff::run(settings, &files, verbose, out),
        Mode::Deploy(opts) => deploy::run(settings, &files, opts, out),
        Mode::List => list::run(&files, out),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{Environment, Overrides};
    use crate::manifest::MockVcsQuery;
    use crate::platform::{Os, Platform};

    #[test]
    fn force_with_overwrite_is_rejected() {
        let opts = DeployOptions {
            dry_run: false,
            force: true,
            overwrite: true,
        };
        assert!(matches!(opts.validate(), Err(ConfigError::ForceWithOverwrite)));
        assert!(DeployOptions::default().validate().is_ok());
    }

    #[test]
    fn flags_are_checked_before_discovery() {
        let root = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let env = Environment::from_pairs([
            ("HOME", home.path().display().to_string()),
            ("GIT_DOTFILES_ROOT", root.path().display().to_string()),
        ]);
        let settings = Settings::resolve(
            &env,
            &Overrides::default(),
            &Platform::new(Os::Linux, "x86_64"),
        )
        .unwrap();
        let mode = Mode::Deploy(DeployOptions {
            dry_run: true,
            force: true,
            overwrite: true,
        });
        let mut out = Vec::new();
        // No manifest exists; the flag error must still win.
        let err = run(mode, &settings, &MockVcsQuery::new(), &mut out).unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
        assert!(out.is_empty());
    }

    #[test]
    fn audit_runs_only_when_enabled() {
        let root = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join(".dotfiles"), ".vimrc\n").unwrap();
        std::fs::write(root.path().join(".vimrc"), "set nu\n").unwrap();
        let env = Environment::from_pairs([
            ("HOME", home.path().display().to_string()),
            ("GIT_DOTFILES_ROOT", root.path().display().to_string()),
        ]);
        let platform = Platform::new(Os::Linux, "x86_64");

        let settings = Settings::resolve(&env, &Overrides::default(), &platform).unwrap();
        let mut out = Vec::new();
        run(Mode::List, &settings, &MockVcsQuery::new(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), ".vimrc\n");

        let overrides = Overrides {
            auto_detect: true,
            ..Overrides::default()
        };
        let settings = Settings::resolve(&env, &overrides, &platform).unwrap();
        let mut vcs = MockVcsQuery::new();
        vcs.expect_tracked()
            .times(1)
            .returning(|_| Ok(vec![".vimrc".to_string()]));
        let mut out = Vec::new();
        run(Mode::List, &settings, &vcs, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), ".vimrc\n");
    }
}
