// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=src/media/converter/nv21_to_packed.wgsl");
    println!("cargo::rerun-if-env-changed=POSE_STREAM_VERSION");

    // Packagers can pin the version string
    let version = std::env::var("POSE_STREAM_VERSION").unwrap_or_else(|_| build_version());
    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// "<crate version>-<short hash>", or the bare crate version outside a checkout
fn build_version() -> String {
    let crate_version = std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".into());
    match short_commit() {
        Some(hash) => format!("{}-{}", crate_version, hash),
        None => crate_version,
    }
}

fn short_commit() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!hash.is_empty()).then_some(hash)
}
