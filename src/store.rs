//! Upsert targets.
//!
//! A store receives flat rows and writes them last-write-wins on the given conflict columns.
//! The handle is built once per run and lent to whatever needs it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::StoreConfig;
use crate::{Error, Result};

pub type Row = Map<String, Value>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts `rows`, overwriting existing rows that match on `conflict_keys`.
    /// Returns the number of rows written.
    async fn upsert(&self, table: &str, rows: Vec<Row>, conflict_keys: &[&str]) -> Result<usize>;
}

/// Supabase / PostgREST table endpoint, `POST {url}/rest/v1/{table}?on_conflict=...`.
pub struct PostgrestStore {
    client: Client,
    base_url: String,
}

impl PostgrestStore {
    pub fn new(config: &StoreConfig, timeout: Duration) -> Result<Self> {
        let key = config.service_key.as_str();
        let mut headers = header::HeaderMap::new();
        headers.insert("apikey", header_value(key)?);
        headers.insert(header::AUTHORIZATION, header_value(&format!("Bearer {key}"))?);
        headers.insert(
            "Prefer",
            header::HeaderValue::from_static("resolution=merge-duplicates,return=representation"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }
}

fn header_value(value: &str) -> Result<header::HeaderValue> {
    header::HeaderValue::from_str(value)
        .map_err(|_| Error::MissingConfig("a header-safe service key"))
}

#[async_trait]
impl Store for PostgrestStore {
    async fn upsert(&self, table: &str, rows: Vec<Row>, conflict_keys: &[&str]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let url = format!("{}/rest/v1/{table}", self.base_url);
        let res = self
            .client
            .post(&url)
            .query(&[("on_conflict", conflict_keys.join(","))])
            .json(&rows)
            .send()
            .await
            .map_err(|e| Error::Store(e.to_string()))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| Error::Store(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Store(format!("{table}: {status}: {body}")));
        }

        // With `return=representation` the body is the written rows.
        let written = serde_json::from_str::<Vec<Value>>(&body)
            .map(|v| v.len())
            .unwrap_or(rows.len());
        debug!(table, written, "upserted");
        Ok(written)
    }
}

/// Keeps tables in memory with the same conflict semantics. Used for dry runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, BTreeMap<Vec<String>, Row>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows currently held in `table`, ordered by conflict key.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.lock()
            .get(table)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, table: &str) -> usize {
        self.lock().get(table).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, BTreeMap<Vec<String>, Row>>> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert(&self, table: &str, rows: Vec<Row>, conflict_keys: &[&str]) -> Result<usize> {
        let keyed = rows
            .into_iter()
            .map(|row| {
                let key = conflict_keys
                    .iter()
                    .map(|k| match row.get(*k) {
                        Some(Value::String(s)) => Ok(s.clone()),
                        Some(v) if !v.is_null() => Ok(v.to_string()),
                        _ => Err(Error::Store(format!(
                            "{table}: row is missing conflict key `{k}`"
                        ))),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok((key, row))
            })
            .collect::<Result<Vec<_>>>()?;

        let written = keyed.len();
        let mut tables = self.lock();
        let table = tables.entry(table.to_string()).or_default();
        for (key, row) in keyed {
            table.insert(key, row);
        }
        Ok(written)
    }
}
