// Shared helpers for integration tests.
//
// Provides a temporary dotfiles repository paired with a temporary home
// directory, and a fluent builder so each test can describe its fixture
// without repeating filesystem boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use git_dotfiles::commands::{self, Mode};
use git_dotfiles::config::{Environment, Overrides, Settings};
use git_dotfiles::manifest::GitLsFiles;
use git_dotfiles::platform::{Os, Platform};

/// An isolated repository and home directory, each backed by a
/// [`tempfile::TempDir`] and deleted on drop.
pub struct IntegrationTestContext {
    pub root: tempfile::TempDir,
    pub home: tempfile::TempDir,
    pub host: String,
    pub auto_detect: bool,
}

impl IntegrationTestContext {
    pub fn root_path(&self) -> &Path {
        self.root.path()
    }

    pub fn home_path(&self) -> &Path {
        self.home.path()
    }

    /// Path of `offset` under the home directory.
    pub fn home_file(&self, offset: &str) -> PathBuf {
        self.home.path().join(offset)
    }

    /// Settings for this fixture on a fixed Linux platform.
    pub fn settings(&self) -> Settings {
        let mut pairs = vec![
            ("HOME", self.home.path().display().to_string()),
            ("XDG_CONFIG_HOME", self.home.path().join(".config").display().to_string()),
            ("GIT_DOTFILES_ROOT", self.root.path().display().to_string()),
            ("GIT_DOTFILES_HOST", self.host.clone()),
        ];
        if self.auto_detect {
            pairs.push(("GIT_DOTFILES_AUTO_DETECT", "yes".to_string()));
        }
        let env = Environment::from_pairs(pairs);
        Settings::resolve(&env, &Overrides::default(), &Platform::new(Os::Linux, "x86_64"))
            .expect("resolve settings")
    }

    /// Run `mode` and return everything written to the output sink.
    pub fn run(&self, mode: Mode) -> anyhow::Result<String> {
        let mut out = Vec::new();
        commands::run(mode, &self.settings(), &GitLsFiles, &mut out)?;
        Ok(String::from_utf8(out).expect("utf-8 output"))
    }

    /// Turn the repository into a git work tree with every file staged.
    pub fn git_track_all(&self) {
        for args in [&["init", "-q"][..], &["add", "-A"][..]] {
            let status = Command::new("git")
                .arg("-C")
                .arg(self.root.path())
                .args(args)
                .status()
                .expect("run git");
            assert!(status.success(), "git {args:?} failed");
        }
    }

    /// Number of regular files below the home directory.
    pub fn home_file_count(&self) -> usize {
        walkdir::WalkDir::new(self.home.path())
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .count()
    }
}

/// Fluent builder for [`IntegrationTestContext`].
pub struct TestContextBuilder {
    ctx: IntegrationTestContext,
}

impl TestContextBuilder {
    pub fn new() -> Self {
        Self {
            ctx: IntegrationTestContext {
                root: tempfile::tempdir().expect("create repo dir"),
                home: tempfile::tempdir().expect("create home dir"),
                host: "testhost".to_string(),
                auto_detect: false,
            },
        }
    }

    /// Write the `.dotfiles` manifest.
    pub fn with_manifest(self, content: &str) -> Self {
        std::fs::write(self.ctx.root.path().join(".dotfiles"), content).expect("write manifest");
        self
    }

    /// Write a repository file at `offset`.
    pub fn with_file(self, offset: &str, content: &str) -> Self {
        write(&self.ctx.root.path().join(offset), content);
        self
    }

    /// Write a file into the home directory at `offset`.
    pub fn with_home_file(self, offset: &str, content: &str) -> Self {
        write(&self.ctx.home.path().join(offset), content);
        self
    }

    pub fn with_host(mut self, host: &str) -> Self {
        self.ctx.host = host.to_string();
        self
    }

    /// Enable the consistency audit through the environment.
    pub fn with_auto_detect(mut self) -> Self {
        self.ctx.auto_detect = true;
        self
    }

    pub fn build(self) -> IntegrationTestContext {
        self.ctx
    }
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dir");
    }
    std::fs::write(path, content).expect("write file");
}

/// Set the permission bits of `path`.
#[cfg(unix)]
pub fn chmod(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt as _;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).expect("chmod");
}
