//! Embeds the source revision printed by `hsbc-parse version`.

use std::env;
use std::path::Path;
use std::process::Command;

fn git(repo: &Path, args: &[&str]) -> Option<String> {
    let out = Command::new("git").arg("-C").arg(repo).args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&out.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn main() {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    let repo = Path::new(&manifest_dir).join("..");

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=HSBC_PARSE_BUILD_SHA");
    for tracked in [".git/HEAD", ".git/index"] {
        let path = repo.join(tracked);
        if path.exists() {
            println!("cargo:rerun-if-changed={}", path.display());
        }
    }

    // An explicit value wins for builds from a source tarball.
    let revision = env::var("HSBC_PARSE_BUILD_SHA")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| git(&repo, &["describe", "--always", "--dirty", "--abbrev=10"]))
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=HSBC_PARSE_BUILD_SHA={revision}");
}
