//! Cross-account merge of same-type report files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};

/// Merge `files` (per-account exports of one report type, in account
/// order) into `all_{tag}_{merged_at}.csv` under `base_dir`.
///
/// The output header is the first file's header with an `Account ID`
/// column prepended; every data row is prefixed with its file's parent
/// directory name (the account id). Headers of later files are dropped,
/// not validated: schema drift across inputs silently follows the first
/// file's shape. An empty `files` list is a no-op and produces no file.
pub fn consolidate(
    tag: &str,
    files: &[PathBuf],
    base_dir: &Path,
    merged_at: i64,
) -> Result<Option<PathBuf>> {
    if files.is_empty() {
        return Ok(None);
    }

    let output = base_dir.join(format!("all_{tag}_{merged_at}.csv"));
    let mut writer = WriterBuilder::new()
        .flexible(true)
        .from_path(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut header_written = false;

    for file in files {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(file)
            .with_context(|| format!("Failed to open {}", file.display()))?;
        let mut records = reader.records();

        let Some(header) = records.next() else {
            continue;
        };
        let header = header?;
        if !header_written {
            let mut row = vec!["Account ID".to_string()];
            row.extend(header.iter().map(str::to_string));
            writer.write_record(&row)?;
            header_written = true;
        }

        let account_id = file
            .parent()
            .and_then(|dir| dir.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        for record in records {
            let record = record?;
            let mut row = vec![account_id.clone()];
            row.extend(record.iter().map(str::to_string));
            writer.write_record(&row)?;
        }
    }

    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", output.display()))?;
    tracing::info!(tag, output = %output.display(), inputs = files.len(), "Consolidated report files");
    Ok(Some(output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn merges_rows_with_account_prefix() -> Result<()> {
        let dir = TempDir::new()?;
        let acct1 = dir.path().join("acct1");
        let acct2 = dir.path().join("acct2");
        std::fs::create_dir_all(&acct1)?;
        std::fs::create_dir_all(&acct2)?;
        let file1 = acct1.join("x.csv");
        let file2 = acct2.join("x.csv");
        std::fs::write(&file1, "h1,h2\na,b\n")?;
        std::fs::write(&file2, "h1,h2\nc,d\n")?;

        let output = consolidate("orders", &[file1, file2], dir.path(), 100)?
            .expect("output file should be produced");
        assert_eq!(
            output.file_name().unwrap().to_string_lossy(),
            "all_orders_100.csv"
        );

        let merged = std::fs::read_to_string(&output)?;
        assert_eq!(merged, "Account ID,h1,h2\nacct1,a,b\nacct2,c,d\n");
        Ok(())
    }

    #[test]
    fn empty_input_produces_no_file() -> Result<()> {
        let dir = TempDir::new()?;
        let output = consolidate("orders", &[], dir.path(), 100)?;
        assert!(output.is_none());
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn header_comes_from_first_file_only() -> Result<()> {
        let dir = TempDir::new()?;
        let acct1 = dir.path().join("acct1");
        let acct2 = dir.path().join("acct2");
        std::fs::create_dir_all(&acct1)?;
        std::fs::create_dir_all(&acct2)?;
        let file1 = acct1.join("x.csv");
        let file2 = acct2.join("x.csv");
        std::fs::write(&file1, "h1,h2\na,b\n")?;
        std::fs::write(&file2, "other,header\nc,d\n")?;

        let output = consolidate("tradebook", &[file1, file2], dir.path(), 7)?.unwrap();
        let merged = std::fs::read_to_string(&output)?;
        assert_eq!(merged, "Account ID,h1,h2\nacct1,a,b\nacct2,c,d\n");
        Ok(())
    }
}
