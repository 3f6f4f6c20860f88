//! Stamps the deployer binary with the commit and time it was built from,
//! surfaced by `deployer --version` and `GET /version`.
//!
//! Packaged builds without a git checkout can set `DEPLOYER_GIT_HASH`.

use std::env;
use std::process::Command;

use chrono::{SecondsFormat, Utc};

fn git_hash() -> Option<String> {
    if let Ok(hash) = env::var("DEPLOYER_GIT_HASH") {
        return Some(hash);
    }
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())?;
    let hash = String::from_utf8(output.stdout).ok()?;
    Some(hash.trim().to_string()).filter(|hash| !hash.is_empty())
}

fn main() {
    let git_hash = git_hash().unwrap_or_else(|| "unknown".to_string());
    let build_time = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    println!("cargo:rustc-env=GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=BUILD_TIME={}", build_time);

    println!("cargo:rerun-if-env-changed=DEPLOYER_GIT_HASH");
    println!("cargo:rerun-if-changed=../.git/HEAD");
}
