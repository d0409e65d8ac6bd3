//! Manifest-driven dotfiles engine.
//!
//! A dotfiles repository carries a `.dotfiles` manifest naming the files it
//! manages. The engine resolves that manifest into a sorted set of files,
//! renders any that reference the template parameter surface, and compares
//! or deploys the results against the home directory.
//!
//! The public API is organised into these layers:
//!
//! - **[`config`]** resolve settings from file, environment and CLI
//! - **[`manifest`]** selection rules, file discovery, drift audit
//! - **[`template`]** host/OS/category conditioned file contents
//! - **[`diff`]** compare rendered candidates with live files
//! - **[`processing`]** parallel read, render and act per file
//! - **[`commands`]** the `diff`, `deploy`, `list` and `completions` modes
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod diff;
pub mod error;
pub mod exec;
pub mod logging;
pub mod manifest;
pub mod paths;
pub mod platform;
pub mod processing;
pub mod template;
