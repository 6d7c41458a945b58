use std::process::Command;

/// Exposes the short git hash as `FATURA_BUILD_SHA` for `fatura --version`.
fn main() {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    let root = std::path::Path::new(&manifest_dir).join("..");

    println!("cargo:rerun-if-changed={}", root.join(".git/HEAD").display());

    let sha = Command::new("git")
        .arg("-C")
        .arg(&root)
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=FATURA_BUILD_SHA={sha}");
}
