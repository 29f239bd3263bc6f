//! Download directory layout and the file watcher.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::account::{AccountId, ReportType};
use crate::error::ExtractError;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Per-account download directory under `base`, created lazily on first
/// use and never cleaned up.
pub fn account_dir(base: &Path, account: &AccountId) -> Result<PathBuf> {
    let dir = base.join(account.as_str());
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create download dir: {}", dir.display()))?;
    Ok(dir)
}

/// Poll `dir` once per second for a CSV whose name contains `fragment`,
/// returning the first match. In-progress `.crdownload` files are skipped.
pub async fn wait_for_file(
    dir: &Path,
    fragment: &str,
    timeout: Duration,
    account: &AccountId,
) -> Result<PathBuf, ExtractError> {
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        if let Some(path) = scan_dir(dir, fragment) {
            return Ok(path);
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(ExtractError::DownloadTimeout {
                account: account.to_string(),
                fragment: fragment.to_string(),
                timeout_secs: timeout.as_secs(),
            });
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn scan_dir(dir: &Path, fragment: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => continue,
        };
        if name.ends_with(".crdownload") {
            continue;
        }
        let is_csv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if is_csv && name.contains(fragment) {
            return Some(path);
        }
    }
    None
}

/// Move a downloaded file into the account's namespace:
/// `{account_id}_{tag}_{unix_time}.csv` in the same directory. A plain
/// same-directory rename, atomic on a local filesystem.
pub fn rename_report(
    path: &Path,
    account: &AccountId,
    report: ReportType,
    captured_at: i64,
) -> Result<PathBuf> {
    let dir = path
        .parent()
        .with_context(|| format!("Downloaded file has no parent dir: {}", path.display()))?;
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "csv".to_string());
    let renamed = dir.join(format!("{account}_{}_{captured_at}.{ext}", report.tag()));

    std::fs::rename(path, &renamed).with_context(|| {
        format!("Failed to rename {} to {}", path.display(), renamed.display())
    })?;
    tracing::info!(from = %path.display(), to = %renamed.display(), "Renamed download");
    Ok(renamed)
}
