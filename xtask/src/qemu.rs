//! QEMU runner for Cortex-M3 emulation.

use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

/// Output from running QEMU.
pub struct QemuOutput {
    /// Whether the example exited through semihosting with success.
    pub success: bool,
    /// defmt frames written to semihosting stdout.
    pub semihosting: Vec<u8>,
    /// Anything the firmware or QEMU printed to stderr.
    pub stderr: String,
    /// Raw bytes on the emulated board's UART0, normally empty.
    pub serial: Vec<u8>,
}

/// Run an ELF on the emulated LM3S6965 until it exits.
pub fn run_qemu(elf_path: &Path) -> Result<QemuOutput> {
    let serial_file = NamedTempFile::new().context("Failed to create temp file for UART0")?;
    let serial_path = serial_file.path();

    let output = Command::new("qemu-system-arm")
        .arg("-cpu")
        .arg("cortex-m3")
        .arg("-machine")
        .arg("lm3s6965evb")
        .arg("-nographic")
        .arg("-monitor")
        .arg("none")
        .arg("-semihosting-config")
        .arg("enable=on,target=native")
        .arg("-serial")
        .arg(format!("file:{}", serial_path.display()))
        .arg("-kernel")
        .arg(elf_path)
        .stdin(Stdio::null())
        .output()
        .context("Failed to run QEMU")?;

    let serial = fs::read(serial_path).unwrap_or_default();

    Ok(QemuOutput {
        success: output.status.success(),
        semihosting: output.stdout,
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        serial,
    })
}
