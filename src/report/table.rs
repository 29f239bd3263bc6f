//! In-memory representation of a scraped on-page table.

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use csv::WriterBuilder;

use super::clean_cell;

/// Rows scraped from the portal's order grid, normalized to the header
/// width as they are added.
#[derive(Debug, Clone)]
pub struct ScrapedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ScrapedTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Add one scraped row. Rows with no non-empty cell are dropped;
    /// surviving rows get the first cell cleaned of the noise token and
    /// are padded or truncated to the header width. Returns whether the
    /// row was kept.
    pub fn push_row(&mut self, cells: Vec<String>) -> bool {
        if cells.iter().all(|cell| cell.trim().is_empty()) {
            return false;
        }

        let mut row: Vec<String> = cells.into_iter().map(|cell| cell.trim().to_string()).collect();
        row[0] = clean_cell(&row[0]);
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Grid rendering for the console.
    pub fn render(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(self.headers.clone());
        for row in &self.rows {
            table.add_row(row.clone());
        }
        table.to_string()
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = WriterBuilder::new()
            .from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to flush {}", path.display()))?;
        Ok(())
    }
}
