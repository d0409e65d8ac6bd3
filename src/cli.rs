//! Command-line definitions and their mapping onto engine modes.
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use crate::commands::{DeployOptions, Mode};
use crate::config::Overrides;

/// Version string stamped by the build script, falling back to the crate version.
pub const VERSION: &str = match option_env!("GIT_DOTFILES_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};

/// Top-level CLI entry point.
#[derive(Parser, Debug)]
#[command(
    name = "git-dotfiles",
    about = "Deploy and diff a manifest-driven dotfiles repository",
    version = VERSION
)]
pub struct Cli {
    /// The mode to run
    #[command(subcommand)]
    pub command: Command,

    /// Options accepted by every subcommand
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Dotfiles repository root
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Settings file (default: $XDG_CONFIG_HOME/git-dotfiles/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Host identifier exposed to templates
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Category tag exposed to templates (repeatable)
    #[arg(long = "category", global = true, value_delimiter = ',')]
    pub categories: Vec<String>,

    /// Fail when tracked files in home are missing from the manifest
    #[arg(long, global = true)]
    pub auto_detect: bool,

    /// Emit debug diagnostics on stderr
    #[arg(short = 'l', long, global = true)]
    pub verbose_log: bool,
}

impl GlobalOpts {
    /// Command-line values that override configuration.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        Overrides {
            config: self.config.clone(),
            root: self.root.clone(),
            host: self.host.clone(),
            categories: self.categories.clone(),
            auto_detect: self.auto_detect,
        }
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show which managed files differ from home
    Diff(DiffOpts),
    /// Write managed files into home
    Deploy(DeployOpts),
    /// List managed files
    List,
    /// Print a shell completion script
    Completions(CompletionsOpts),
}

/// Options for the `diff` subcommand.
#[derive(Args, Debug, Clone)]
pub struct DiffOpts {
    /// Show the textual difference for each file
    #[arg(short, long)]
    pub verbose: bool,
}

/// Options for the `deploy` subcommand.
#[derive(Args, Debug, Clone)]
pub struct DeployOpts {
    /// Report what would change without writing
    #[arg(short = 'd', long)]
    pub dry_run: bool,

    /// Write every file without comparing
    #[arg(long)]
    pub force: bool,

    /// Replace files that differ
    #[arg(long)]
    pub overwrite: bool,
}

/// Options for the `completions` subcommand.
#[derive(Args, Debug, Clone)]
pub struct CompletionsOpts {
    /// Target shell
    #[arg(value_enum, default_value_t = Shell::Bash)]
    pub shell: Shell,
}

impl Command {
    /// The engine mode for this subcommand; `None` for completions.
    #[must_use]
    pub const fn mode(&self) -> Option<Mode> {
        match self {
            Self::Diff(opts) => Some(Mode::Diff {
                verbose: opts.verbose,
            }),
            Self::Deploy(opts) => Some(Mode::Deploy(DeployOptions {
                dry_run: opts.dry_run,
                force: opts.force,
                overwrite: opts.overwrite,
            })),
            Self::List => Some(Mode::List),
            Self::Completions(_) => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_diff_verbose() {
        let cli = Cli::parse_from(["git-dotfiles", "diff", "-v"]);
        assert_eq!(cli.command.mode(), Some(Mode::Diff { verbose: true }));
    }

    #[test]
    fn parse_deploy_flags() {
        let cli = Cli::parse_from(["git-dotfiles", "deploy", "--dry-run", "--overwrite"]);
        assert_eq!(
            cli.command.mode(),
            Some(Mode::Deploy(DeployOptions {
                dry_run: true,
                force: false,
                overwrite: true,
            }))
        );
    }

    #[test]
    fn force_and_overwrite_reach_validation() {
        let cli = Cli::parse_from(["git-dotfiles", "deploy", "--force", "--overwrite"]);
        assert!(matches!(
            cli.command.mode(),
            Some(Mode::Deploy(opts)) if opts.validate().is_err()
        ));
    }

    #[test]
    fn parse_global_options_after_subcommand() {
        let cli = Cli::parse_from([
            "git-dotfiles",
            "list",
            "--root",
            "/srv/dotfiles",
            "--category",
            "work,gui",
            "--category",
            "laptop",
            "--auto-detect",
            "-l",
        ]);
        assert_eq!(cli.command.mode(), Some(Mode::List));
        let overrides = cli.global.overrides();
        assert_eq!(overrides.root, Some(PathBuf::from("/srv/dotfiles")));
        assert_eq!(overrides.categories, vec!["work", "gui", "laptop"]);
        assert!(overrides.auto_detect);
        assert!(cli.global.verbose_log);
    }

    #[test]
    fn completions_default_to_bash() {
        let cli = Cli::parse_from(["git-dotfiles", "completions"]);
        assert!(matches!(
            cli.command,
            Command::Completions(CompletionsOpts { shell: Shell::Bash })
        ));
        assert_eq!(cli.command.mode(), None);
    }

    #[test]
    fn completions_accept_shell() {
        let cli = Cli::parse_from(["git-dotfiles", "completions", "zsh"]);
        assert!(matches!(
            cli.command,
            Command::Completions(CompletionsOpts { shell: Shell::Zsh })
        ));
    }
}
