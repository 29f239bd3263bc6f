//! Equity trade book export.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::account::{Account, ReportType};
use crate::config::Config;
use crate::download::{account_dir, rename_report, wait_for_file};
use crate::flows::{csv_export_link, period_label, settle};
use crate::locate::resolve;
use crate::portal::{Locator, Portal, Wait};

/// Drive the trade book page: pick the configured period, render, and
/// export to CSV. Returns the renamed file.
pub async fn download_tradebook<P: Portal + ?Sized>(
    portal: &P,
    account: &Account,
    config: &Config,
) -> Result<PathBuf> {
    let timeout = config.element_timeout();

    let nav = resolve(
        portal,
        "trade book link",
        &[Locator::link_text("Trade Book")],
        Wait::Clickable,
        timeout,
    )
    .await?;
    portal.click(&nav).await?;

    let period_menu = resolve(
        portal,
        "period menu",
        &[Locator::id("hypPeriod")],
        Wait::Clickable,
        timeout,
    )
    .await?;
    portal.click(&period_menu).await?;

    let period = resolve(
        portal,
        "period option",
        &[period_label(&config.tradebook_period)],
        Wait::Clickable,
        timeout,
    )
    .await?;
    portal.click(&period).await?;
    settle(2).await;

    let view = resolve(
        portal,
        "view button",
        &[Locator::id("btnview")],
        Wait::Clickable,
        timeout,
    )
    .await?;
    portal.click(&view).await?;
    settle(5).await;

    let export_menu = resolve(
        portal,
        "export menu",
        &[Locator::xpath("//div[@id='dvequity']//div[@class='pull-right']")],
        Wait::Clickable,
        timeout,
    )
    .await?;
    portal.click(&export_menu).await?;

    let csv = resolve(portal, "CSV export link", &csv_export_link(), Wait::Present, timeout).await?;
    // The export link detaches the menu as the download starts, so skip
    // the post-click staleness check.
    portal.click_unchecked(&csv).await?;

    let dir = account_dir(config.download_base_dir.as_path(), &account.id)?;
    let fragment = ReportType::TradeBook
        .download_fragment()
        .context("Trade book has no download fragment")?;
    let downloaded =
        wait_for_file(&dir, fragment, config.download_wait(), &account.id).await?;
    let renamed = rename_report(
        &downloaded,
        &account.id,
        ReportType::TradeBook,
        Utc::now().timestamp(),
    )?;

    tracing::info!(account = %account.id, file = %renamed.display(), "Trade book downloaded");
    settle(2).await;
    Ok(renamed)
}
