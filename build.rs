extern crate time;

use std::process::Command;

fn main() {
    emit_git_rev();
    emit_compile_date();
}

/// Expose the short git hash as DDS3MODEL_BUILD_COMMIT so `dds3model version` can
/// report it.
fn emit_git_rev() {
    let commit_hash = Command::new("git")
        .args(&["rev-parse", "--short", "HEAD"])
        .output();
    let changes_in_working_dir = Command::new("git")
        .args(&["status", "--porcelain"])
        .output();

    let rev = match (commit_hash, changes_in_working_dir) {
        (Ok(hash), Ok(status)) if hash.status.success() && status.status.success() => {
            let hash = String::from_utf8_lossy(&hash.stdout).trim().to_string();
            if status.stdout.is_empty() {
                hash
            } else {
                format!("WIP {}", hash)
            }
        }
        _ => "unknown commit".to_string(),
    };
    println!("cargo:rustc-env=DDS3MODEL_BUILD_COMMIT={}", rev);
}

fn emit_compile_date() {
    let now = time::now_utc();
    let date = time::strftime("%Y-%m-%d", &now).unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=DDS3MODEL_BUILD_DATE={}", date);
}
