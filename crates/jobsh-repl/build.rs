//! Stamps the `jobsh --version` line with the commit and build date.

use std::path::Path;
use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn main() {
    let git_dir = Path::new("../../.git");
    if git_dir.exists() {
        println!("cargo::rerun-if-changed={}", git_dir.join("HEAD").display());
        println!("cargo::rerun-if-changed={}", git_dir.join("refs/heads").display());
    }

    let commit = git(&["describe", "--always", "--dirty"]).unwrap_or_else(|| "unknown".into());
    let date = chrono::Utc::now().format("%Y-%m-%d");

    println!("cargo:rustc-env=JOBSH_GIT_HASH={commit}");
    println!("cargo:rustc-env=JOBSH_BUILD_DATE={date}");
}
