use std::env;

fn main() {
    // Release pipelines may stamp their own version; otherwise use the crate version
    let version = env::var("SFX_VERSION")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.1".to_string()));

    println!("cargo:rustc-env=SFX_VERSION={}", version.trim());
    println!("cargo:rerun-if-env-changed=SFX_VERSION");
}
