//! Build utilities for testsuite examples.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};

/// Target the testsuite is built for.
const TARGET: &str = "thumbv7m-none-eabi";

/// Get the project root directory.
pub fn project_root() -> Result<PathBuf> {
    let manifest_dir = match std::env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => std::env::current_dir().context("Failed to read current directory")?,
    };

    // If we're in xtask/, go up one level.
    match manifest_dir.parent() {
        Some(parent) if manifest_dir.ends_with("xtask") => Ok(parent.to_path_buf()),
        _ => Ok(manifest_dir),
    }
}

/// Build an example and return the path to the ELF.
pub fn build_example(example: &str, release: bool) -> Result<PathBuf> {
    let root = project_root()?;

    let mut cmd = Command::new("cargo");
    cmd.current_dir(root.join("testsuite"))
        .env("DEFMT_LOG", "trace")
        .stderr(Stdio::inherit())
        .arg("build")
        .arg("--example")
        .arg(example)
        .arg("--target")
        .arg(TARGET);

    if release {
        cmd.arg("--release");
    }

    let status = cmd.status().context("Failed to run cargo build")?;
    if !status.success() {
        bail!("cargo build failed for '{example}'");
    }

    let profile = if release { "release" } else { "debug" };
    Ok(root
        .join("target")
        .join(TARGET)
        .join(profile)
        .join("examples")
        .join(example))
}

/// Discover all examples in the testsuite.
pub fn discover_examples() -> Result<Vec<String>> {
    let examples_dir = project_root()?.join("testsuite").join("examples");

    let mut examples = Vec::new();
    for entry in fs::read_dir(&examples_dir).context("Failed to read examples directory")? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "rs") {
            if let Some(stem) = path.file_stem() {
                examples.push(stem.to_string_lossy().into_owned());
            }
        }
    }
    examples.sort();
    Ok(examples)
}
