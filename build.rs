use chrono::Utc;
use std::process::Command;

/// Embeds the git revision and build timestamp reported by `/health`.
fn main() {
    let revision = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=GIT_HASH={}", revision);
    println!("cargo:rustc-env=BUILD_TIME={}", Utc::now().to_rfc3339());
    println!("cargo:rerun-if-changed=.git/HEAD");
}
