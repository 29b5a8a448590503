//! Runs one example and judges the result.
//!
//! An example passes when it exits through semihosting with success (every
//! `defmt::assert!` held). If `testsuite/expected/<example>.expected` exists,
//! the decoded log must also match it line for line.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::build::{build_example, project_root};
use crate::defmt;
use crate::qemu::run_qemu;

/// Options for running an example.
pub struct RunOptions {
    /// Print the decoded log even when the example passes.
    pub verbose: bool,
    /// Write the decoded log to the expected file instead of comparing.
    pub bless: bool,
    /// Build in release mode.
    pub release: bool,
}

/// Run an example with the given options.
///
/// Returns `Ok(true)` if the test passed, `Ok(false)` if it failed.
pub fn run_example(example: &str, opts: &RunOptions) -> Result<bool> {
    println!("Building '{example}'...");
    let elf_path = build_example(example, opts.release)?;

    println!("Running in QEMU...");
    let output = run_qemu(&elf_path)?;
    let log = defmt::decode_output(&elf_path, &output.semihosting)?;

    if opts.verbose || !output.success {
        print!("{log}");
        println!("--- QEMU run end ---");
    }
    if !output.serial.is_empty() {
        println!("--- UART0 ---");
        println!("{}", String::from_utf8_lossy(&output.serial));
    }
    if !output.success {
        println!("  FAIL: example did not exit successfully");
        if !output.stderr.is_empty() {
            println!("--- stderr ---");
            print!("{}", output.stderr);
        }
        return Ok(false);
    }

    let expected_path = project_root()?
        .join("testsuite")
        .join("expected")
        .join(format!("{example}.expected"));

    if opts.bless {
        bless(&expected_path, &log)?;
        return Ok(true);
    }

    if !expected_path.exists() {
        println!("  PASS");
        return Ok(true);
    }

    let expected = fs::read_to_string(&expected_path)?;
    if log == expected {
        println!("  PASS (output matches expected)");
        Ok(true)
    } else {
        println!("  FAIL: output differs from expected");
        println!("--- expected ---");
        print!("{expected}");
        println!("--- actual ---");
        print!("{log}");
        Ok(false)
    }
}

fn bless(expected_path: &Path, log: &str) -> Result<()> {
    let filename = expected_path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();

    let status = if expected_path.exists() {
        if fs::read_to_string(expected_path)? == log {
            "No change"
        } else {
            fs::write(expected_path, log)?;
            "Updated"
        }
    } else {
        let dir = expected_path
            .parent()
            .context("Expected file has no parent directory")?;
        fs::create_dir_all(dir)?;
        fs::write(expected_path, log)?;
        "Created"
    };
    println!("  {filename}: {status}");
    Ok(())
}
