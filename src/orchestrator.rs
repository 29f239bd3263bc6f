//! Top-level run loop: login once, then per-account report extraction
//! and the final cross-account merge.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::account::{Account, ReportFile, ReportType};
use crate::config::Config;
use crate::credentials::Credentials;
use crate::download::account_dir;
use crate::flows::login::login;
use crate::flows::mutual_funds::{download_mf_orderbook, download_my_portfolio};
use crate::flows::orderbook::scrape_orders;
use crate::flows::portfolio::download_portfolio;
use crate::flows::switch::switch_account;
use crate::flows::tradebook::download_tradebook;
use crate::portal::Portal;
use crate::report::consolidate;
use crate::retry::with_retry;

pub struct Orchestrator {
    config: Config,
    credentials: Credentials,
}

impl Orchestrator {
    pub fn new(config: Config, credentials: Credentials) -> Self {
        Self { config, credentials }
    }

    /// Run the whole extraction: authenticate, process every configured
    /// account, then merge the per-account files. Returns the merged
    /// file paths (empty when consolidation is disabled).
    ///
    /// A failed login aborts the run; a failed account is logged and
    /// skipped so the remaining accounts still produce output.
    pub async fn run<P: Portal + ?Sized>(&self, portal: &P) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.config.download_base_dir).with_context(|| {
            format!(
                "Failed to create download dir: {}",
                self.config.download_base_dir.display()
            )
        })?;

        login(portal, &self.credentials, &self.config)
            .await
            .context("Login failed")?;

        let mut reports = Vec::new();
        for account in &self.config.accounts {
            match self.process_account(portal, account).await {
                Ok(mut files) => reports.append(&mut files),
                Err(err) => {
                    tracing::error!(
                        account = %account.id,
                        error = %format!("{err:#}"),
                        "Account failed, continuing with the rest"
                    );
                }
            }
        }

        if !self.config.consolidate_output {
            return Ok(Vec::new());
        }
        self.consolidate_all(&reports)
    }

    async fn process_account<P: Portal + ?Sized>(
        &self,
        portal: &P,
        account: &Account,
    ) -> Result<Vec<ReportFile>> {
        let policy = self.config.retry.policy();

        with_retry(policy, "switch account", || {
            switch_account(portal, account, &self.config)
        })
        .await?;

        // Route the browser's downloads into this account's directory so
        // the watcher and the files land in the same place.
        let dir = account_dir(self.config.download_base_dir.as_path(), &account.id)?;
        portal.set_download_dir(&dir).await?;

        let mut files = Vec::new();

        let path = with_retry(policy, "trade book", || {
            download_tradebook(portal, account, &self.config)
        })
        .await?;
        files.push(ReportFile {
            account: account.id.clone(),
            report: ReportType::TradeBook,
            path,
        });

        let path = with_retry(policy, "portfolio", || {
            download_portfolio(portal, account, &self.config)
        })
        .await?;
        files.push(ReportFile {
            account: account.id.clone(),
            report: ReportType::Portfolio,
            path,
        });

        if let Some(path) = with_retry(policy, "GTT orders", || {
            scrape_orders(portal, account, &self.config)
        })
        .await?
        {
            files.push(ReportFile {
                account: account.id.clone(),
                report: ReportType::Orders,
                path,
            });
        }

        if account.mutual_funds {
            let path = with_retry(policy, "MF portfolio", || {
                download_my_portfolio(portal, account, &self.config)
            })
            .await?;
            files.push(ReportFile {
                account: account.id.clone(),
                report: ReportType::MfPortfolio,
                path,
            });

            let path = with_retry(policy, "MF order book", || {
                download_mf_orderbook(portal, account, &self.config)
            })
            .await?;
            files.push(ReportFile {
                account: account.id.clone(),
                report: ReportType::MfOrderBook,
                path,
            });
        }

        tracing::info!(account = %account.id, reports = files.len(), "Account done");
        Ok(files)
    }

    fn consolidate_all(&self, reports: &[ReportFile]) -> Result<Vec<PathBuf>> {
        let merged_at = Utc::now().timestamp();
        let mut outputs = Vec::new();

        for report_type in ReportType::ALL {
            let files: Vec<PathBuf> = reports
                .iter()
                .filter(|r| r.report == report_type)
                .map(|r| r.path.clone())
                .collect();
            if let Some(path) = consolidate(
                report_type.tag(),
                &files,
                self.config.download_base_dir.as_path(),
                merged_at,
            )
            .with_context(|| format!("Failed to consolidate {report_type} files"))?
            {
                tracing::info!(report = %report_type, file = %path.display(), "Consolidated");
                outputs.push(path);
            }
        }
        Ok(outputs)
    }
}
