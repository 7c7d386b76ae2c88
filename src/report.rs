//! Rendering of final results.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::core::{FatalError, ScalarResult};

/// One line per trade: `TradeID : Result : Error`, omitting absent parts.
pub fn write_results<W: Write>(out: &mut W, results: &[ScalarResult]) -> io::Result<()> {
    for entry in results {
        write!(out, "{}", entry.trade_id)?;
        if let Some(value) = entry.result {
            write!(out, " : {value}")?;
        }
        if let Some(error) = &entry.error {
            write!(out, " : {error}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn write_json<W: Write>(out: W, results: &[ScalarResult]) -> serde_json::Result<()> {
    serde_json::to_writer_pretty(out, results)
}

pub fn write_json_file(path: impl AsRef<Path>, results: &[ScalarResult]) -> anyhow::Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    write_json(&mut writer, results)?;
    writer.flush()?;
    Ok(())
}

/// Banner for a run that did not complete.
pub fn write_incomplete_banner<W: Write>(
    out: &mut W,
    fatal: &FatalError,
    recorded: usize,
) -> io::Result<()> {
    writeln!(out, "==================================================")?;
    writeln!(out, "PIPELINE INCOMPLETE: partial results")?;
    writeln!(out, "cause: {fatal}")?;
    writeln!(out, "trades recorded before failure: {recorded}")?;
    writeln!(out, "==================================================")?;
    Ok(())
}
