use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::account::Account;
use crate::retry::RetryPolicy;

fn default_download_base_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_tradebook_period() -> String {
    "1 Month".to_string()
}

fn default_max_download_wait() -> u64 {
    30
}

fn default_consolidate_output() -> bool {
    true
}

/// Login and manual second-factor handling (3 minutes).
fn default_login_timeout() -> u64 {
    180
}

fn default_switch_timeout() -> u64 {
    60
}

/// Per-candidate readiness wait used by element resolution.
fn default_element_wait() -> u64 {
    30
}

/// Retry policy for flow-level transient UI flakiness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,
    pub delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay_secs: 2,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.attempts,
            delay: Duration::from_secs(self.delay_secs),
        }
    }
}

/// Application configuration. All durations are in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base directory for downloaded and consolidated files.
    pub download_base_dir: PathBuf,

    /// Trade-book lookback period, e.g. "1 Week" or "1 Month". The last
    /// word selects the portal's period option.
    pub tradebook_period: String,

    /// Seconds to wait for an export to appear on disk.
    pub max_download_wait: u64,

    /// Combine same-type files across accounts after the run.
    pub consolidate_output: bool,

    /// Seconds to wait for login (including manual second-factor entry).
    pub login_timeout: u64,

    /// Seconds to wait for each step of the account-switch sequence.
    pub switch_timeout: u64,

    /// Seconds to wait per locator candidate elsewhere.
    pub element_wait: u64,

    pub retry: RetryConfig,

    /// Sub-accounts, processed in listed order.
    pub accounts: Vec<Account>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_base_dir: default_download_base_dir(),
            tradebook_period: default_tradebook_period(),
            max_download_wait: default_max_download_wait(),
            consolidate_output: default_consolidate_output(),
            login_timeout: default_login_timeout(),
            switch_timeout: default_switch_timeout(),
            element_wait: default_element_wait(),
            retry: RetryConfig::default(),
            accounts: Vec::new(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from a file, or return default config if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn download_wait(&self) -> Duration {
        Duration::from_secs(self.max_download_wait)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_wait)
    }

    pub fn switch_step_timeout(&self) -> Duration {
        Duration::from_secs(self.switch_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.download_base_dir, PathBuf::from("downloads"));
        assert_eq!(config.tradebook_period, "1 Month");
        assert_eq!(config.max_download_wait, 30);
        assert!(config.consolidate_output);
        assert_eq!(config.login_timeout, 180);
        assert_eq!(config.switch_timeout, 60);
        assert_eq!(config.element_wait, 30);
        assert_eq!(config.retry.attempts, 3);
        assert_eq!(config.retry.delay_secs, 2);
        assert!(config.accounts.is_empty());
    }

    #[test]
    fn test_load_accounts() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("icici-extract.toml");

        let mut file = std::fs::File::create(&config_path)?;
        writeln!(file, "tradebook_period = \"1 Week\"")?;
        writeln!(file)?;
        writeln!(file, "[[accounts]]")?;
        writeln!(file, "id = \"IN303028-76957800-6500081466-NRE\"")?;
        writeln!(file)?;
        writeln!(file, "[[accounts]]")?;
        writeln!(file, "id = \"IN303028-76957826-7510072528-NPNRO\"")?;
        writeln!(file, "mutual_funds = true")?;

        let config = Config::load(&config_path)?;
        assert_eq!(config.tradebook_period, "1 Week");
        assert_eq!(config.accounts.len(), 2);
        assert_eq!(
            config.accounts[0].id.as_str(),
            "IN303028-76957800-6500081466-NRE"
        );
        assert!(!config.accounts[0].mutual_funds);
        assert!(config.accounts[1].mutual_funds);

        Ok(())
    }

    #[test]
    fn test_load_retry_policy() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("icici-extract.toml");

        let mut file = std::fs::File::create(&config_path)?;
        writeln!(file, "[retry]")?;
        writeln!(file, "attempts = 5")?;
        writeln!(file, "delay_secs = 1")?;

        let config = Config::load(&config_path)?;
        let policy = config.retry.policy();
        assert_eq!(policy.attempts, 5);
        assert_eq!(policy.delay, Duration::from_secs(1));

        Ok(())
    }

    #[test]
    fn test_load_empty_config_uses_defaults() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("icici-extract.toml");
        std::fs::File::create(&config_path)?;

        let config = Config::load(&config_path)?;
        assert_eq!(config.max_download_wait, 30);

        Ok(())
    }

    #[test]
    fn test_load_or_default_missing_file() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("missing.toml");

        let config = Config::load_or_default(&config_path)?;
        assert!(config.consolidate_output);

        Ok(())
    }
}
