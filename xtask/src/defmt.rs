//! Turns the raw rzcobs stream from semihosting into text, one line per frame.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use defmt_decoder::{DecodeError, Frame, Locations, Table};

/// Decode every complete frame in `raw` using the defmt table of `elf_path`.
///
/// A truncated final frame (the example died mid-log) is ignored.
pub fn decode_output(elf_path: &Path, raw: &[u8]) -> Result<String> {
    let elf = fs::read(elf_path)
        .with_context(|| format!("Failed to read ELF file {}", elf_path.display()))?;
    let table = Table::parse(&elf)
        .context("Failed to parse defmt table from ELF")?
        .ok_or_else(|| anyhow!("No defmt data found in ELF"))?;
    let locs = table.get_locations(&elf).ok();

    let mut decoder = table.new_stream_decoder();
    decoder.received(raw);

    let mut out = String::new();
    loop {
        match decoder.decode() {
            Ok(frame) => {
                out.push_str(&render(&frame, locs.as_ref()));
                out.push('\n');
            }
            Err(DecodeError::UnexpectedEof) => return Ok(out),
            Err(DecodeError::Malformed) => bail!("Malformed defmt frame after:\n{out}"),
        }
    }
}

/// `<file>:<line>: [LEVEL] message`, with only the file name of the location
/// so expected files don't depend on the checkout path.
fn render(frame: &Frame, locs: Option<&Locations>) -> String {
    let level = frame
        .level()
        .map_or("print", |l| l.as_str())
        .to_uppercase();
    let message = frame.display_message();

    let loc = locs.and_then(|locs| locs.get(&frame.index())).map(|loc| {
        let file = loc.file.file_name().map_or_else(
            || loc.file.display().to_string(),
            |f| f.to_string_lossy().into_owned(),
        );
        format!("{file}:{}", loc.line)
    });

    match loc {
        Some(loc) => format!("{loc}: [{level:<5}] {message}"),
        None => format!("[{level:<5}] {message}"),
    }
}
