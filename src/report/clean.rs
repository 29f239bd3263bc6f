//! Noise-token removal for exported tables.

use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use regex::Regex;

/// The grid injects a "Single"/"SINGLE" order-kind marker into instrument
/// names. Matched as a whole word together with adjacent whitespace, so
/// `"ABC Single Ltd"` comes out as `"ABCLtd"`.
fn noise_token() -> &'static Regex {
    static NOISE: OnceLock<Regex> = OnceLock::new();
    NOISE.get_or_init(|| Regex::new(r"(?i)\s*\bsingle\b\s*").expect("static pattern"))
}

/// Remove the noise token from one cell and trim what is left.
pub fn clean_cell(value: &str) -> String {
    noise_token().replace_all(value, "").trim().to_string()
}

/// Rewrite the named column of `input` into `output`, record by record.
/// The header passes through unchanged; when the named column is absent
/// the first column is cleaned instead. Streaming, so file size is not a
/// concern.
pub fn clean_column(input: &Path, output: &Path, column: &str) -> Result<()> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(input)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    let mut writer = WriterBuilder::new()
        .flexible(true)
        .from_path(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let mut records = reader.records();
    let header = match records.next() {
        Some(header) => header?,
        None => {
            writer.flush()?;
            return Ok(());
        }
    };
    let column_index = header.iter().position(|h| h == column).unwrap_or(0);
    writer.write_record(&header)?;

    for record in records {
        let record = record?;
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        if row.len() > column_index {
            row[column_index] = clean_cell(&row[column_index]);
        }
        writer.write_record(&row)?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", output.display()))?;
    tracing::info!(output = %output.display(), column, "Cleaned column");
    Ok(())
}
