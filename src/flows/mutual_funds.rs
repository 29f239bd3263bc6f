//! Mutual fund flows.
//!
//! The MF section is a separate Angular application embedded in an
//! iframe. On first entry it shows an interstitial that has to be walked
//! through ("Get Started", then "Back to old MF") before the classic
//! pages become reachable.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::account::{Account, ReportType};
use crate::config::Config;
use crate::download::{account_dir, rename_report, wait_for_file};
use crate::flows::{csv_export_link, period_label, settle};
use crate::locate::resolve;
use crate::portal::{Locator, Portal, Wait};

const ANGULAR_STABLE_SCRIPT: &str = "!!(window.getAllAngularTestabilities && window.getAllAngularTestabilities().every(function(t) { return t.isStable(); }))";
const READY_STATE_SCRIPT: &str = "document.readyState === 'complete'";

const SUB_APP_WAIT: Duration = Duration::from_secs(20);
const SIGNAL_POLL: Duration = Duration::from_millis(500);

/// Poll a boolean script signal until it reports true or `timeout`
/// passes. Script errors are logged and treated as a positive signal;
/// the pages this gates on sometimes unload the probed globals mid-wait.
async fn wait_for_signal<P: Portal + ?Sized>(
    portal: &P,
    expression: &str,
    timeout: Duration,
) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match portal.eval_bool(expression).await {
            Ok(true) => return true,
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "Script signal probe failed, proceeding");
                return true;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(SIGNAL_POLL).await;
    }
}

/// Enter the MF section and export the portfolio CSV.
pub async fn download_my_portfolio<P: Portal + ?Sized>(
    portal: &P,
    account: &Account,
    config: &Config,
) -> Result<PathBuf> {
    let timeout = config.element_timeout();

    let nav = resolve(
        portal,
        "mutual funds menu",
        &[Locator::css("a[mnu-name=\"mf\"]")],
        Wait::Clickable,
        timeout,
    )
    .await?;
    portal.click(&nav).await?;
    settle(5).await;

    portal
        .enter_frame(&Locator::id("ifrmangwh"))
        .await
        .context("Failed to enter MF frame")?;
    let inner = dismiss_interstitial(portal, timeout).await;
    if let Err(err) = portal.exit_frame().await {
        tracing::warn!(error = %format!("{err:#}"), "Failed to exit MF frame");
    }
    inner?;

    if !wait_for_signal(portal, READY_STATE_SCRIPT, SUB_APP_WAIT).await {
        anyhow::bail!("Classic MF page never finished loading");
    }
    settle(3).await;

    let portfolio_menu = resolve(
        portal,
        "MF portfolio menu",
        &[Locator::xpath("//*[@id='pnlmnudsp']//ul[1]/li[2]")],
        Wait::Present,
        timeout,
    )
    .await?;
    portal.click(&portfolio_menu).await?;
    settle(3).await;

    let my_portfolio = resolve(
        portal,
        "My Portfolio link",
        &[Locator::xpath("//a[contains(text(),'My Portfolio')]")],
        Wait::Clickable,
        timeout,
    )
    .await?;
    portal.click(&my_portfolio).await?;
    settle(3).await;

    let export_menu = resolve(
        portal,
        "MF portfolio export menu",
        &[Locator::xpath("((//div[@id='dvFilter']//div)[2]/ul/li)[1]")],
        Wait::Present,
        timeout,
    )
    .await?;
    portal.click(&export_menu).await?;

    let csv = resolve(portal, "CSV export link", &csv_export_link(), Wait::Present, timeout).await?;
    portal.click_unchecked(&csv).await?;

    let dir = account_dir(config.download_base_dir.as_path(), &account.id)?;
    let fragment = ReportType::MfPortfolio
        .download_fragment()
        .context("MF portfolio has no download fragment")?;
    let downloaded =
        wait_for_file(&dir, fragment, config.download_wait(), &account.id).await?;
    let renamed = rename_report(
        &downloaded,
        &account.id,
        ReportType::MfPortfolio,
        Utc::now().timestamp(),
    )?;

    tracing::info!(account = %account.id, file = %renamed.display(), "MF portfolio downloaded");
    settle(2).await;
    Ok(renamed)
}

/// Walk the Angular interstitial inside the MF frame. Runs with the
/// frame context already entered; the caller pops it afterwards.
async fn dismiss_interstitial<P: Portal + ?Sized>(
    portal: &P,
    timeout: Duration,
) -> Result<()> {
    if !wait_for_signal(portal, ANGULAR_STABLE_SCRIPT, SUB_APP_WAIT).await {
        tracing::warn!("Angular never reported stable, proceeding anyway");
    }
    settle(5).await;

    resolve(
        portal,
        "MF interstitial",
        &[Locator::id("Div1")],
        Wait::Visible,
        timeout,
    )
    .await?;

    let get_started = resolve(
        portal,
        "Get Started button",
        &[Locator::xpath("//div[@id='Div1']//a[text()='Get Started']")],
        Wait::Clickable,
        timeout,
    )
    .await?;
    portal.click(&get_started).await?;

    let back = resolve(
        portal,
        "Back to old MF link",
        &[Locator::xpath("//a[normalize-space(text())='Back to old MF']")],
        Wait::Clickable,
        timeout,
    )
    .await?;
    portal.click(&back).await?;
    settle(5).await;
    Ok(())
}

/// Export the MF order book for the configured period. Assumes
/// [`download_my_portfolio`] already ran, which lands the session on the
/// classic MF pages.
pub async fn download_mf_orderbook<P: Portal + ?Sized>(
    portal: &P,
    account: &Account,
    config: &Config,
) -> Result<PathBuf> {
    let timeout = config.element_timeout();

    let orders_menu = resolve(
        portal,
        "MF orders menu",
        &[Locator::xpath("//*[@id='pnlmnudsp']//ul[1]/li[9]")],
        Wait::Present,
        timeout,
    )
    .await?;
    portal.click(&orders_menu).await?;

    let order_book = resolve(
        portal,
        "MF order book link",
        &[Locator::xpath("//a[contains(text(),'Order Book')]")],
        Wait::Clickable,
        timeout,
    )
    .await?;
    portal.click(&order_book).await?;
    settle(3).await;

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
        &[Locator::xpath("//div[@id='MFOrderBookDiv']//input[@value='View']")],
        Wait::Clickable,
        timeout,
    )
    .await?;
    portal.click(&view).await?;
    settle(2).await;

    let download_menu = resolve(
        portal,
        "download menu",
        &[Locator::xpath("//a[@class='dropdown' and normalize-space()='Download']")],
        Wait::Clickable,
        timeout,
    )
    .await?;
    portal.click(&download_menu).await?;

    let csv = resolve(portal, "CSV export link", &csv_export_link(), Wait::Present, timeout).await?;
    portal.click_unchecked(&csv).await?;

    let dir = account_dir(config.download_base_dir.as_path(), &account.id)?;
    let fragment = ReportType::MfOrderBook
        .download_fragment()
        .context("MF order book has no download fragment")?;
    let downloaded =
        wait_for_file(&dir, fragment, config.download_wait(), &account.id).await?;
    let renamed = rename_report(
        &downloaded,
        &account.id,
        ReportType::MfOrderBook,
        Utc::now().timestamp(),
    )?;

    tracing::info!(account = %account.id, file = %renamed.display(), "MF order book downloaded");
    settle(2).await;
    Ok(renamed)
}
