//! Build script: stamps `GIT_DOTFILES_VERSION` into the binary.

use std::process::Command;

fn main() {
    // Release builds stamp GIT_DOTFILES_VERSION; local builds use git describe.
    if let Ok(version) = std::env::var("GIT_DOTFILES_VERSION") {
        println!("cargo:rustc-env=GIT_DOTFILES_VERSION={version}");
    } else if let Ok(output) = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        && output.status.success()
    {
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=GIT_DOTFILES_VERSION={version}");
    }

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");
    println!("cargo:rerun-if-env-changed=GIT_DOTFILES_VERSION");
}
