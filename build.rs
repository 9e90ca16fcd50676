// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=VEINSCOPE_VERSION");

    // Packaged builds pin the version explicitly
    let version = match std::env::var("VEINSCOPE_VERSION") {
        Ok(v) => v,
        Err(_) => describe_version(),
    };

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// `git describe` output normalized to `<tag>-<hash>` or `<tag>-dirty-<hash>`.
fn describe_version() -> String {
    let described = run_git(&["describe", "--tags", "--always", "--match", "v*"]);
    let commit = run_git(&["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".into());

    let Some(described) = described else {
        return format!("{}-{}", env!("CARGO_PKG_VERSION"), commit);
    };
    let described = described.strip_prefix('v').unwrap_or(&described).to_string();

    // "0.1.0-5-gabcdef1" means commits on top of a tag
    let parts: Vec<&str> = described.rsplitn(3, '-').collect();
    if parts.len() == 3 {
        let hash = parts[0].strip_prefix('g').unwrap_or(parts[0]);
        format!("{}-dirty-{}", parts[2], hash)
    } else if described == commit {
        // No tags at all, describe fell back to the hash
        format!("{}-{}", env!("CARGO_PKG_VERSION"), commit)
    } else {
        format!("{}-{}", described, commit)
    }
}

fn run_git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if output.status.success() {
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        None
    }
}
