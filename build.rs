// build.rs - Build information for vicenza-sim
//
// Exports the build timestamp, compiler version and git commit as
// compile-time environment variables read by `vicenza_sim::build_info`.

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=Cargo.toml");

    set_build_env_vars();
}

/// Set build environment variables that the code expects
fn set_build_env_vars() {
    println!(
        "cargo:rustc-env=VICENZA_BUILD_TIMESTAMP={}",
        chrono::Utc::now().to_rfc3339()
    );

    // Honour the RUSTC cargo hands us so wrappers report the right compiler
    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let rustc_version = Command::new(rustc)
        .arg("--version")
        .output()
        .ok()
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=VICENZA_RUST_VERSION={}", rustc_version);

    // Only set when building from a git checkout
    if let Ok(output) = Command::new("git").args(["rev-parse", "--short", "HEAD"]).output() {
        if output.status.success() {
            if let Ok(git_hash) = String::from_utf8(output.stdout) {
                println!("cargo:rustc-env=VICENZA_GIT_HASH={}", git_hash.trim());
            }
        }
    }
}
