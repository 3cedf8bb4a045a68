use anyhow::{Context, Result};
use chrono::Duration;
use std::env;
use std::path::{Path, PathBuf};

use crate::selector::{ClusterSelector, DEFAULT_PUBLISH_DELAY_HOURS};

pub const APP_DIR: &str = "cluster-desk";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Upper bound on the publish delay, one year.
const MAX_PUBLISH_DELAY_HOURS: f64 = 24.0 * 365.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    store_path: Option<PathBuf>,
    pub publish_delay_hours: f64,
    pub bind_addr: String,
}

/// Command-line values. A value given here wins over the environment, and
/// the matching variable is then never read or validated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub store_path: Option<PathBuf>,
    pub publish_delay_hours: Option<f64>,
    pub bind_addr: Option<String>,
}

impl Config {
    pub fn from_env(overrides: Overrides) -> Result<Self> {
        // Try to load .env from multiple locations
        Self::try_load_dotenv();

        Self::from_lookup(overrides, |key| env::var(key).ok())
    }

    fn from_lookup(overrides: Overrides, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let store_path = overrides
            .store_path
            .or_else(|| lookup("CLUSTER_STORE_PATH").map(PathBuf::from))
            .or_else(Self::default_store_path);

        let publish_delay_hours = match overrides.publish_delay_hours {
            Some(hours) => validate_delay_hours(hours)?,
            None => match lookup("PUBLISH_DELAY_HOURS") {
                Some(raw) => parse_delay_hours(&raw)?,
                None => DEFAULT_PUBLISH_DELAY_HOURS,
            },
        };

        let bind_addr = overrides
            .bind_addr
            .or_else(|| lookup("CLUSTER_DESK_BIND"))
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        Ok(Self {
            store_path,
            publish_delay_hours,
            bind_addr,
        })
    }

    /// Only fails when a database is actually needed and none is known.
    pub fn store_path(&self) -> Result<&Path> {
        self.store_path.as_deref().context(
            "CLUSTER_STORE_PATH not set and no local data directory found.\n\n\
            To fix this, create ~/.config/cluster-desk/.env with:\n  \
            CLUSTER_STORE_PATH=/path/to/clusters.db",
        )
    }

    pub fn selector(&self) -> ClusterSelector {
        ClusterSelector::from_hours(self.publish_delay_hours)
    }

    fn default_store_path() -> Option<PathBuf> {
        dirs::data_local_dir().map(|dir| dir.join(APP_DIR).join("clusters.db"))
    }

    fn try_load_dotenv() {
        // 1. Current directory (for development)
        if dotenvy::dotenv().is_ok() {
            return;
        }

        // 2. ~/.config/cluster-desk/.env
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join(APP_DIR).join(".env");
            if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
                return;
            }
        }

        // 3. ~/.env
        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".env");
            if home_path.exists() {
                let _ = dotenvy::from_path(&home_path);
            }
        }

        // Nothing found is fine, the variables may be set system-wide
    }
}

/// Hours as a non-negative number of at most a year.
pub fn parse_delay_hours(raw: &str) -> Result<f64> {
    let hours: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("PUBLISH_DELAY_HOURS must be a number, got {:?}", raw))?;

    validate_delay_hours(hours)
}

pub fn validate_delay_hours(hours: f64) -> Result<f64> {
    if !hours.is_finite() || !(0.0..=MAX_PUBLISH_DELAY_HOURS).contains(&hours) {
        anyhow::bail!(
            "publish delay must be between 0 and {} hours, got {}",
            MAX_PUBLISH_DELAY_HOURS,
            hours
        );
    }

    Ok(hours)
}

/// Lookback window for `--max-age-days`: a positive number of days that
/// fits in a `Duration`.
pub fn max_age_from_days(days: i64) -> Result<Duration> {
    if days <= 0 {
        anyhow::bail!("--max-age-days must be positive, got {}", days);
    }

    Duration::try_days(days).with_context(|| format!("--max-age-days is too large: {}", days))
}
