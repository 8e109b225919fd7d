use std::time::Duration;

use crate::{
    Error, Result, BATCH_SIZE, MIN_PLAUSIBLE_ROWS, PAGE_DELAY_MS, WEEKS_PER_SEASON, WEEK_DELAY_MS,
};

pub const STORE_URL_VAR: &str = "SUPABASE_URL";
pub const STORE_KEY_VAR: &str = "SUPABASE_SERVICE_ROLE_KEY";

/// Location and credential of the upsert store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub service_key: String,
}

impl StoreConfig {
    /// Reads the store settings from the environment, after loading `.env` if there is one.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(Error::MissingConfig(name))
        };
        Ok(Self {
            url: get(STORE_URL_VAR)?,
            service_key: get(STORE_KEY_VAR)?,
        })
    }
}

/// Settings for a rankings snapshot walk.
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Rankings URL with a `{page}` placeholder.
    pub url_template: String,
    pub format: String,
    pub max_pages: usize,
    pub page_delay: Duration,
    pub min_rows: usize,
    pub batch_size: usize,
    pub table: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            url_template: "https://keeptradecut.com/dynasty-rankings?page={page}&filters=QB|WR|RB|TE&format=2"
                .to_string(),
            format: "superflex".to_string(),
            max_pages: 10,
            page_delay: Duration::from_millis(PAGE_DELAY_MS),
            min_rows: MIN_PLAUSIBLE_ROWS,
            batch_size: BATCH_SIZE,
            table: "ktc_values".to_string(),
        }
    }
}

/// Settings for a league history backfill.
#[derive(Debug, Clone)]
pub struct BackfillConfig {
    pub start_league_id: String,
    pub api_base: String,
    pub weeks: u32,
    pub week_delay: Duration,
    pub batch_size: usize,
    pub table: String,
}

impl BackfillConfig {
    pub fn new(start_league_id: impl Into<String>) -> Self {
        Self {
            start_league_id: start_league_id.into(),
            api_base: "https://api.sleeper.app/v1".to_string(),
            weeks: WEEKS_PER_SEASON,
            week_delay: Duration::from_millis(WEEK_DELAY_MS),
            batch_size: BATCH_SIZE,
            table: "transactions".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn store_config_requires_both_values() {
        let env: HashMap<&str, &str> = [(STORE_URL_VAR, "https://db.test")].into();
        let err = StoreConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert!(matches!(err, Err(Error::MissingConfig(STORE_KEY_VAR))));

        let env: HashMap<&str, &str> =
            [(STORE_URL_VAR, "https://db.test"), (STORE_KEY_VAR, "  ")].into();
        let err = StoreConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert!(matches!(err, Err(Error::MissingConfig(STORE_KEY_VAR))));

        let env: HashMap<&str, &str> =
            [(STORE_URL_VAR, "https://db.test"), (STORE_KEY_VAR, "secret")].into();
        let config = StoreConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.url, "https://db.test");
        assert_eq!(config.service_key, "secret");
    }
}
