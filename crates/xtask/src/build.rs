use crate::constants::{PACKAGE, TARGET};
use anyhow::{Context, Result};
use std::process::Command;

/// Build the library for the embedded target, the way firmware links it.
pub fn check_embedded(features: Option<&str>, release: bool) -> Result<()> {
    let mut cargo_build = Command::new("cargo");
    cargo_build
        .arg("build")
        .arg("--no-default-features")
        .args(["--package", PACKAGE])
        .arg("--target")
        .arg(TARGET);

    if release {
        cargo_build.arg("--release");
    }

    if let Some(features) = features {
        cargo_build.args(["--features", features]);
    }

    let status = cargo_build
        .status()
        .with_context(|| format!("Failed to build {} for {}", PACKAGE, TARGET))?;

    if !status.success() {
        anyhow::bail!("Build failed for {} ({})", PACKAGE, TARGET);
    }

    Ok(())
}
