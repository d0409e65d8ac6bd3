//! `git-dotfiles` binary entry point.
use std::io::Write as _;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use git_dotfiles::cli::{Cli, Command};
use git_dotfiles::commands;
use git_dotfiles::config::{Environment, Settings};
use git_dotfiles::logging;
use git_dotfiles::manifest::GitLsFiles;
use git_dotfiles::platform::Platform;

fn main() -> ExitCode {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();
    logging::init_subscriber(args.global.verbose_log);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("{e:?}");
            let _ = writeln!(std::io::stderr(), "error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Cli) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let Some(mode) = args.command.mode() else {
        if let Command::Completions(opts) = &args.command {
            commands::completions::run(opts.shell, &mut out);
        }
        return Ok(());
    };

    let settings = Settings::resolve(
        &Environment::capture(),
        &args.global.overrides(),
        &Platform::detect(),
    )?;
    tracing::debug!(
        "root {} home {}",
        settings.root.display(),
        settings.home.display()
    );
    commands::run(mode, &settings, &GitLsFiles, &mut out)?;
    out.flush()?;
    Ok(())
}
