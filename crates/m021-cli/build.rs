use std::path::Path;

#[path = "src/build_rev.rs"]
mod build_rev;

/// Stamp the binary with the short git revision, or `unknown` outside a checkout.
fn main() {
    println!("cargo:rerun-if-env-changed=M021_BUILD_REV");

    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    let git_dir = Path::new(&manifest_dir).join("../../.git");
    for path in build_rev::watched_git_files(&git_dir) {
        println!("cargo:rerun-if-changed={}", path.display());
    }

    let rev = std::env::var("M021_BUILD_REV")
        .ok()
        .or_else(build_rev::git_revision)
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=M021_BUILD_REV={rev}");
}
