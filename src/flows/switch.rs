//! Sub-account switching.

use anyhow::{Context, Result};

use crate::account::{Account, AccountId};
use crate::config::Config;
use crate::error::ExtractError;
use crate::flows::settle;
use crate::locate::resolve;
use crate::portal::{Locator, Portal, Wait};

fn switch_control_candidates() -> Vec<Locator> {
    vec![
        Locator::css(".mrl10"),
        Locator::xpath("//a[@id='dropdownMenuButton1']/span[2]"),
        Locator::xpath("//a[contains(@class, 'dropdown-toggle')]"),
    ]
}

fn account_menu_candidates() -> Vec<Locator> {
    vec![
        Locator::css(".p-2:nth-child(2) .fw-bold"),
        Locator::xpath("//div[@id='pnlHeadLogin']//li[2]/div/div[2]"),
        Locator::xpath("//li[contains(@class, 'dropdown-item')]//div[contains(text(), 'Select Account')]"),
    ]
}

fn confirm_candidates() -> Vec<Locator> {
    vec![
        Locator::css(".btn-short"),
        Locator::xpath("//div[@id='pnlSelMDP']/div[2]/input"),
        Locator::xpath("//input[@type='button' and contains(@value, 'Confirm')]"),
    ]
}

/// Pick the selector option for `requested`: exact match first, then any
/// option containing the id's penultimate segment (the account number).
pub fn select_target<'a>(
    requested: &AccountId,
    options: &'a [String],
) -> Result<&'a str, ExtractError> {
    if let Some(exact) = options.iter().find(|option| *option == requested.as_str()) {
        return Ok(exact);
    }

    if let Some(segment) = requested.penultimate_segment() {
        if let Some(partial) = options.iter().find(|option| option.contains(segment)) {
            return Ok(partial);
        }
    }

    Err(ExtractError::AccountNotFound {
        requested: requested.to_string(),
        available: options.to_vec(),
    })
}

/// Change the active sub-account context. The orchestrator wraps this in
/// the retry combinator; every failure below is logged with the account id
/// before propagating.
pub async fn switch_account<P: Portal + ?Sized>(
    portal: &P,
    account: &Account,
    config: &Config,
) -> Result<()> {
    tracing::info!(account = %account.id, "Switching account");
    let result = switch_steps(portal, account, config).await;
    if let Err(err) = &result {
        tracing::error!(
            account = %account.id,
            error = %format!("{err:#}"),
            "Failed to switch account"
        );
    }
    result
}

async fn switch_steps<P: Portal + ?Sized>(
    portal: &P,
    account: &Account,
    config: &Config,
) -> Result<()> {
    let timeout = config.switch_step_timeout();

    let control = resolve(
        portal,
        "account switch control",
        &switch_control_candidates(),
        Wait::Clickable,
        timeout,
    )
    .await?;
    portal.click(&control).await?;

    let menu_item = resolve(
        portal,
        "account selection menu",
        &account_menu_candidates(),
        Wait::Clickable,
        timeout,
    )
    .await?;
    portal.click(&menu_item).await?;

    let dropdown = resolve(
        portal,
        "account dropdown",
        &[Locator::id("drpAccount")],
        Wait::Present,
        timeout,
    )
    .await?;
    let options = portal
        .select_options(&dropdown)
        .await
        .context("Failed to read account options")?;
    tracing::info!(?options, "Available account ids");

    let target = select_target(&account.id, &options)?;
    if target != account.id.as_str() {
        tracing::info!(account = %account.id, selected = target, "Selected account by partial match");
    }
    portal.select_value(&dropdown, target).await?;

    let confirm = resolve(
        portal,
        "confirm button",
        &confirm_candidates(),
        Wait::Clickable,
        timeout,
    )
    .await?;
    portal.click(&confirm).await?;

    tracing::info!(account = %account.id, "Switched account");
    settle(1).await;
    Ok(())
}
