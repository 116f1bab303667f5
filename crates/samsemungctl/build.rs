// Build script for samsemungctl - embeds version at compile time

fn main() {
    // Release pipelines may override the crate version
    let version = std::env::var("SAMSEMUNG_VERSION")
        .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo:rustc-env=SAMSEMUNG_VERSION={}", version);

    println!("cargo:rerun-if-changed=Cargo.toml");
    println!("cargo:rerun-if-env-changed=SAMSEMUNG_VERSION");
}
