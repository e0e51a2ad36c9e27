//! Tokenize command implementation.

use super::CommandResult;
use std::io::Write;

/// Prints the segment key derived from `input`, in decimal and hex.
pub fn run(input: &str, out: &mut impl Write) -> CommandResult {
    let key = shmkv_core::tokenize(input)?;
    writeln!(out, "{} ({key})", key.get())?;
    Ok(())
}
