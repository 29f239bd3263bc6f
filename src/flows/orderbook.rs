//! GTT order book scrape.
//!
//! The GTT tab has no export control, so the table is read cell by cell
//! and written out as CSV locally.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};

use crate::account::Account;
use crate::config::Config;
use crate::download::account_dir;
use crate::flows::settle;
use crate::locate::resolve;
use crate::portal::{ElementHandle, Locator, Portal, Wait};
use crate::report::{clean_column, ScrapedTable, STOCK_COLUMN};

/// The rendered table sits behind several nested layout containers with
/// no stable id, hence the absolute path.
const ORDERS_TABLE_XPATH: &str = "/html/body/form/div[3]/div[3]/div/span/div[2]/div/div[2]/div/div/div[1]/form/div[2]/div[4]/div/div/div/div/table[2]";

const SCRAPE_WAIT: Duration = Duration::from_secs(20);

/// Scrape the GTT order table into `{account}_orders.csv` plus a cleaned
/// copy. Returns `None` when the account has no GTT orders.
pub async fn scrape_orders<P: Portal + ?Sized>(
    portal: &P,
    account: &Account,
    config: &Config,
) -> Result<Option<PathBuf>> {
    let timeout = config.element_timeout();

    let nav = resolve(
        portal,
        "order book link",
        &[Locator::xpath(
            "//a[@class='sub-navlink' and contains(text(), 'Order Book')]",
        )],
        Wait::Clickable,
        timeout,
    )
    .await?;
    portal.click(&nav).await?;
    settle(2).await;

    let gtt_tab = resolve(
        portal,
        "GTT tab",
        &[Locator::xpath(
            "//ul[contains(@class, 'tabs-menu')]//a[normalize-space(text())='GTT']",
        )],
        Wait::Clickable,
        timeout,
    )
    .await?;
    portal.click(&gtt_tab).await?;
    settle(2).await;

    let table = resolve(
        portal,
        "GTT order table",
        &[Locator::xpath(ORDERS_TABLE_XPATH)],
        Wait::Present,
        SCRAPE_WAIT,
    )
    .await?;

    let scraped = scrape_table(portal, &table).await?;
    if scraped.is_empty() {
        println!("No GTT orders for {}", account.id);
        tracing::warn!(account = %account.id, "GTT order table is empty");
        return Ok(None);
    }

    println!("GTT orders for {}:\n{}", account.id, scraped.render());

    let dir = account_dir(config.download_base_dir.as_path(), &account.id)?;
    let raw = dir.join(format!("{}_orders.csv", account.id));
    scraped.write_csv(&raw)?;

    let cleaned = dir.join(format!("{}_orders_cleaned.csv", account.id));
    clean_column(&raw, &cleaned, STOCK_COLUMN)?;

    tracing::info!(
        account = %account.id,
        rows = scraped.len(),
        file = %cleaned.display(),
        "GTT orders scraped"
    );
    settle(2).await;
    Ok(Some(cleaned))
}

async fn scrape_table<P: Portal + ?Sized>(
    portal: &P,
    table: &ElementHandle,
) -> Result<ScrapedTable> {
    let mut headers = Vec::new();
    for cell in portal
        .find_all(Some(table), &Locator::xpath(".//thead/tr/th"))
        .await?
    {
        let text = portal.text(&cell).await?.trim().to_string();
        if !text.is_empty() {
            headers.push(text);
        }
    }
    if headers.is_empty() {
        bail!("GTT order table has no header row");
    }

    let mut scraped = ScrapedTable::new(headers);
    for row in portal
        .find_all(Some(table), &Locator::xpath(".//tbody/tr"))
        .await?
    {
        // Detail rows toggled open under each order carry the
        // expand_content class and duplicate the parent row's data.
        let class = portal.attribute(&row, "class").await?.unwrap_or_default();
        if class.contains("expand_content") {
            continue;
        }

        let mut cells = Vec::new();
        for cell in portal.find_all(Some(&row), &Locator::xpath(".//td")).await? {
            cells.push(portal.text(&cell).await?);
        }
        scraped.push_row(cells);
    }
    Ok(scraped)
}
