//! Equity portfolio summary export.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::account::{Account, ReportType};
use crate::config::Config;
use crate::download::{account_dir, rename_report, wait_for_file};
use crate::flows::settle;
use crate::locate::resolve;
use crate::portal::{Locator, Portal, Wait};

/// Open the portfolio page and export the summary CSV from its grid menu.
pub async fn download_portfolio<P: Portal + ?Sized>(
    portal: &P,
    account: &Account,
    config: &Config,
) -> Result<PathBuf> {
    let timeout = config.element_timeout();

    let nav = resolve(
        portal,
        "portfolio link",
        &[Locator::xpath(
            "//a[@class='sub-navlink' and contains(text(), 'Portfolio')]",
        )],
        Wait::Clickable,
        timeout,
    )
    .await?;
    portal.click(&nav).await?;
    settle(5).await;

    let grid_menu = resolve(
        portal,
        "portfolio grid menu",
        &[Locator::xpath(
            "(//div[@class='pull-right']//ul[contains(@class,'grid_menu')]/li)[3]",
        )],
        Wait::Present,
        timeout,
    )
    .await?;
    portal.click(&grid_menu).await?;
    settle(2).await;

    let csv = resolve(
        portal,
        "summary CSV link",
        &[Locator::xpath("//a[contains(text(), 'Summary: CSV')]")],
        Wait::Present,
        timeout,
    )
    .await?;
    portal.click_unchecked(&csv).await?;

    let dir = account_dir(config.download_base_dir.as_path(), &account.id)?;
    let fragment = ReportType::Portfolio
        .download_fragment()
        .context("Portfolio has no download fragment")?;
    let downloaded =
        wait_for_file(&dir, fragment, config.download_wait(), &account.id).await?;
    let renamed = rename_report(
        &downloaded,
        &account.id,
        ReportType::Portfolio,
        Utc::now().timestamp(),
    )?;

    tracing::info!(account = %account.id, file = %renamed.display(), "Portfolio downloaded");
    settle(2).await;
    Ok(renamed)
}
