//! Account and report identity types.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Structured sub-account identifier of the form
/// `{institution}-{branch}-{account}-{type}`, e.g.
/// `IN303028-76957800-6500081466-NRE`.
///
/// The identifier doubles as a directory name, so it must stay a single
/// path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('-')
    }

    /// The segment second from the end (the account number in the standard
    /// four-segment form). Used for partial matching when the portal's
    /// selector lists identifiers in a different shape.
    pub fn penultimate_segment(&self) -> Option<&str> {
        let segments: Vec<&str> = self.segments().collect();
        if segments.len() < 2 {
            return None;
        }
        Some(segments[segments.len() - 2])
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One configured sub-account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,

    /// Run the mutual-fund flows for this account.
    #[serde(default)]
    pub mutual_funds: bool,
}

/// The report surfaces the portal exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportType {
    TradeBook,
    Portfolio,
    Orders,
    MfPortfolio,
    MfOrderBook,
}

impl ReportType {
    pub const ALL: [ReportType; 5] = [
        ReportType::TradeBook,
        ReportType::Portfolio,
        ReportType::Orders,
        ReportType::MfPortfolio,
        ReportType::MfOrderBook,
    ];

    /// Tag used in produced file names (`{account}_{tag}_{ts}.csv`,
    /// `all_{tag}_{ts}.csv`).
    pub fn tag(&self) -> &'static str {
        match self {
            ReportType::TradeBook => "tradebook",
            ReportType::Portfolio => "portfolio",
            ReportType::Orders => "orders",
            ReportType::MfPortfolio => "myportfolio",
            ReportType::MfOrderBook => "orderbook",
        }
    }

    /// Partial file name the portal's export is known to contain, for the
    /// download watcher. `None` for the scraped order table, which never
    /// goes through the browser's download pipeline.
    pub fn download_fragment(&self) -> Option<&'static str> {
        match self {
            ReportType::TradeBook => Some("TradeBook"),
            ReportType::Portfolio => Some("Summary"),
            ReportType::Orders => None,
            ReportType::MfPortfolio => Some("Portfolio"),
            ReportType::MfOrderBook => Some("OrderBook"),
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A produced report file; immutable once written.
#[derive(Debug, Clone)]
pub struct ReportFile {
    pub account: AccountId,
    pub report: ReportType,
    pub path: PathBuf,
}
