//! Build script to inject version and git SHA at compile time.
//!
//! Environment variables (set by CI or fall back to defaults):
//! - NARROWCAST_VERSION: Version string (defaults to CARGO_PKG_VERSION)
//! - NARROWCAST_GIT_SHA: Git commit SHA (defaults to git rev-parse or "unknown")

use std::process::Command;

fn main() {
    let version = std::env::var("NARROWCAST_VERSION").unwrap_or_else(|_| {
        std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "unknown".into())
    });
    println!("cargo:rustc-env=NARROWCAST_VERSION={}", version);

    // Prefer NARROWCAST_GIT_SHA, then CI_COMMIT_SHORT_SHA, then the git command
    let git_sha = std::env::var("NARROWCAST_GIT_SHA")
        .or_else(|_| std::env::var("CI_COMMIT_SHORT_SHA"))
        .unwrap_or_else(|_| get_git_sha());
    println!("cargo:rustc-env=NARROWCAST_GIT_SHA={}", git_sha);

    println!("cargo:rerun-if-env-changed=NARROWCAST_VERSION");
    println!("cargo:rerun-if-env-changed=NARROWCAST_GIT_SHA");
    println!("cargo:rerun-if-env-changed=CI_COMMIT_SHORT_SHA");
}

fn get_git_sha() -> String {
    Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .and_then(|o| {
            if o.status.success() {
                String::from_utf8(o.stdout)
                    .ok()
                    .map(|s| s.trim().to_string())
            } else {
                None
            }
        })
        .unwrap_or_else(|| "unknown".into())
}
