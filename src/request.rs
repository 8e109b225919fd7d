use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::model::LeagueMeta;
use crate::{Error, Result, USER_AGENT};

/// A fetched document and the URL that produced it. Dropped as soon as it's parsed.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl RawDocument {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One GET per call, no retries. Transport failures come back as `Err`,
/// any HTTP status (including errors) comes back as a document.
#[async_trait]
pub trait SourceClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<RawDocument>;
}

/// `reqwest` backed source that presents itself as a desktop browser.
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static("en-US,en;q=0.9"),
        );
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SourceClient for HttpSource {
    async fn get(&self, url: &str) -> Result<RawDocument> {
        let transport = |e: reqwest::Error| Error::Transport(format!("{url}: {e}"));
        let res = self.client.get(url).send().await.map_err(transport)?;
        let status = res.status().as_u16();
        let body = res.text().await.map_err(transport)?;
        debug!(url, status, bytes = body.len(), "fetched");
        Ok(RawDocument {
            url: url.to_string(),
            status,
            body,
        })
    }
}

/// Fills the `{page}` placeholder of a rankings URL template.
pub fn ranking_page_url(template: &str, page: usize) -> String {
    template.replace("{page}", &page.to_string())
}

/// Requests one rankings page. A non-success status is an error, the HTML source doesn't do soft failures.
pub async fn request_ranking_page<S: SourceClient + ?Sized>(
    source: &S,
    template: &str,
    page: usize,
) -> Result<String> {
    let doc = source.get(&ranking_page_url(template, page)).await?;
    if !doc.is_success() {
        return Err(Error::Status {
            url: doc.url,
            status: doc.status,
        });
    }
    Ok(doc.body)
}

/// Requests league metadata. `Ok(None)` when the API doesn't know the league.
pub async fn request_league<S: SourceClient + ?Sized>(
    source: &S,
    api_base: &str,
    league_id: &str,
) -> Result<Option<LeagueMeta>> {
    let doc = source.get(&format!("{api_base}/league/{league_id}")).await?;
    if !doc.is_success() {
        error!(league_id, status = doc.status, "could not find league");
        return Ok(None);
    }
    match serde_json::from_str::<Option<LeagueMeta>>(&doc.body)? {
        Some(meta) => Ok(Some(meta)),
        None => {
            error!(league_id, "league lookup returned null");
            Ok(None)
        }
    }
}

/// Requests one week of transactions. Every failure mode reads as an empty week.
pub async fn request_transactions<S: SourceClient + ?Sized>(
    source: &S,
    api_base: &str,
    league_id: &str,
    week: u32,
) -> Vec<Value> {
    let url = format!("{api_base}/league/{league_id}/transactions/{week}");
    let doc = match source.get(&url).await {
        Ok(doc) if doc.is_success() => doc,
        Ok(doc) => {
            debug!(league_id, week, status = doc.status, "no transactions");
            return Vec::new();
        }
        Err(e) => {
            warn!(league_id, week, "transactions request failed: {e}");
            return Vec::new();
        }
    };
    match serde_json::from_str::<Option<Vec<Value>>>(&doc.body) {
        Ok(txs) => txs.unwrap_or_default(),
        Err(e) => {
            warn!(league_id, week, "transactions body is not an array: {e}");
            Vec::new()
        }
    }
}
