//! Typed failures for the extraction workflow.
//!
//! Flows propagate `anyhow::Error` like the rest of the crate; these are the
//! leaf conditions callers may want to match on or that carry diagnostics
//! worth keeping structured.

use crate::portal::Locator;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Every locator candidate for a logical UI target was exhausted.
    #[error("could not locate {target}; tried {candidates:?}")]
    ElementNotFound {
        target: String,
        candidates: Vec<Locator>,
    },

    /// The dashboard never appeared within the login timeout.
    #[error("login did not reach the dashboard within {timeout_secs} seconds")]
    LoginTimeout { timeout_secs: u64 },

    /// The switch target matched none of the selectable options.
    #[error("account {requested} not found in selector options {available:?}")]
    AccountNotFound {
        requested: String,
        available: Vec<String>,
    },

    /// The expected export never appeared in the download directory.
    #[error(
        "no file matching {fragment:?} appeared within {timeout_secs} seconds for account {account}"
    )]
    DownloadTimeout {
        account: String,
        fragment: String,
        timeout_secs: u64,
    },
}
