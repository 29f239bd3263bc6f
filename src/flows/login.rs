//! Session establishment against the portal's login page.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::credentials::Credentials;
use crate::error::ExtractError;
use crate::locate::resolve;
use crate::portal::{Locator, Portal, Wait};

pub const LOGIN_URL: &str = "https://secure.icicidirect.com/customer/login";

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Session state as the login flow drives it. Every later flow assumes
/// `Authenticated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Start,
    CredentialsSubmitted,
    SecondFactorPending,
    Authenticated,
}

fn second_factor_candidates() -> Vec<Locator> {
    vec![
        Locator::id("higootp"),
        Locator::xpath("//input[@type='text' and contains(@id, 'otp')]"),
    ]
}

fn dashboard_candidates() -> Vec<Locator> {
    vec![
        Locator::css(".mrl10"),
        Locator::xpath("//a[@id='dropdownMenuButton1']"),
    ]
}

/// Submit credentials, then poll for either the second-factor page or the
/// dashboard until `login_timeout` elapses.
///
/// The second factor is entered manually by the operator in the visible
/// browser window; the first dashboard marker seen wins regardless of
/// whether a second-factor page was ever detected. Failure here is fatal
/// to the run.
pub async fn login<P: Portal + ?Sized>(
    portal: &P,
    credentials: &Credentials,
    config: &Config,
) -> Result<()> {
    let mut state = LoginState::Start;
    tracing::info!(?state, "Starting login");

    portal
        .goto(LOGIN_URL)
        .await
        .context("Failed to open the login page")?;
    tracing::info!(
        title = %portal.page_title().await.unwrap_or_default(),
        url = %portal.current_url().await.unwrap_or_default(),
        "Navigated to login page"
    );

    let timeout = config.element_timeout();
    submit_credentials(portal, credentials, timeout)
        .await
        .inspect_err(|err| tracing::error!(error = %format!("{err:#}"), "Credential submission failed"))?;
    state = LoginState::CredentialsSubmitted;
    tracing::info!(?state, "Login submitted");

    let deadline = tokio::time::Instant::now() + Duration::from_secs(config.login_timeout);
    let second_factor = second_factor_candidates();
    let dashboard = dashboard_candidates();

    loop {
        // Second-factor first, dashboard second, every iteration. A portal
        // that never shows the second-factor page is indistinguishable from
        // one that has not rendered it yet; both just keep polling.
        if state != LoginState::SecondFactorPending && probe(portal, &second_factor).await {
            state = LoginState::SecondFactorPending;
            tracing::info!(?state, "Second-factor page detected; waiting for manual entry on the website");
            println!("Second-factor challenge detected. Complete it in the browser window.");
        }

        if probe(portal, &dashboard).await {
            state = LoginState::Authenticated;
            tracing::info!(
                ?state,
                title = %portal.page_title().await.unwrap_or_default(),
                url = %portal.current_url().await.unwrap_or_default(),
                "Dashboard detected"
            );
            return Ok(());
        }

        if state == LoginState::SecondFactorPending {
            tracing::debug!("Still on second-factor page");
        }

        if tokio::time::Instant::now() >= deadline {
            let err = ExtractError::LoginTimeout {
                timeout_secs: config.login_timeout,
            };
            tracing::error!(error = %err, "Login failed");
            return Err(err.into());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn submit_credentials<P: Portal + ?Sized>(
    portal: &P,
    credentials: &Credentials,
    timeout: Duration,
) -> Result<()> {
    let username = resolve(
        portal,
        "username field",
        &[Locator::id("txtu")],
        Wait::Present,
        timeout,
    )
    .await?;
    portal.type_text(&username, credentials.username()).await?;

    let password = resolve(
        portal,
        "password field",
        &[Locator::id("txtp")],
        Wait::Present,
        timeout,
    )
    .await?;
    portal.type_text(&password, credentials.password()).await?;

    let button = resolve(
        portal,
        "login button",
        &[Locator::id("btnlogin")],
        Wait::Clickable,
        timeout,
    )
    .await?;
    portal.click(&button).await?;
    Ok(())
}

/// Single-shot probe across candidates; probe errors count as "not seen".
async fn probe<P: Portal + ?Sized>(portal: &P, candidates: &[Locator]) -> bool {
    for locator in candidates {
        match portal.try_find(locator, Wait::Present).await {
            Ok(Some(_)) => return true,
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(%locator, error = %err, "Login probe failed");
            }
        }
    }
    false
}
