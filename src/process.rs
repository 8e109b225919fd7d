use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use tokio::{task::spawn_blocking, time::sleep};
use tracing::{info, warn};

use crate::config::{BackfillConfig, SnapshotConfig};
use crate::model::{LeagueMeta, RankingRecord, RawRow};
use crate::normalize::{ranking_record, transaction_record};
use crate::parse::Extractor;
use crate::persist::{BatchPersister, PersistReport};
use crate::request::{request_league, request_ranking_page, request_transactions, SourceClient};
use crate::store::Store;
use crate::{info_time, Result};

/// What a walk did. Failed batches are reported here instead of failing the walk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WalkSummary {
    /// Pages or leagues fetched.
    pub visited: usize,
    pub records: usize,
    pub persisted: usize,
    pub failed_batches: usize,
    pub failed_rows: usize,
}

impl WalkSummary {
    fn absorb(&mut self, report: PersistReport) {
        self.persisted += report.succeeded;
        self.failed_rows += report.failed_rows();
        self.failed_batches += report.errors.len();
    }
}

/// Walks the rankings pages `0..max_pages` and upserts one snapshot stamped with `as_of`.
///
/// The walk stops at the first page without rows, or when a page can't be fetched at all.
/// The first page must pass the extractor's plausibility check, later pages may be short.
pub async fn process_rankings<C, S>(
    source: &C,
    store: &S,
    config: &SnapshotConfig,
    as_of: NaiveDate,
) -> Result<WalkSummary>
where
    C: SourceClient + ?Sized,
    S: Store + ?Sized,
{
    let start_time = Local::now();
    info_time!("Started rankings snapshot for {as_of}");

    let extractor = Arc::new(Extractor::new()?.with_min_rows(config.min_rows));
    let persister = BatchPersister::new(store, config.table.as_str(), config.batch_size);
    let mut summary = WalkSummary::default();
    let mut buffer: Vec<RankingRecord> = Vec::with_capacity(config.batch_size);

    for page in 0..config.max_pages {
        if page > 0 {
            sleep(config.page_delay).await;
        }

        let html = match request_ranking_page(source, &config.url_template, page).await {
            Ok(html) => html,
            Err(e) if e.is_transport() => {
                warn!(page, "request failed, treating it as the end of the data: {e}");
                break;
            }
            Err(e) => return Err(e),
        };
        summary.visited += 1;

        let rows = parse_page(Arc::clone(&extractor), html, page == 0).await?;
        if rows.is_empty() {
            info!(page, "found EMPTY page, stopping");
            break;
        }

        let records: Vec<RankingRecord> = rows
            .into_iter()
            .filter_map(|raw| ranking_record(raw, &config.format, as_of))
            .collect();
        info!(page, records = records.len(), "parsed page");
        summary.records += records.len();
        buffer.extend(records);

        if buffer.len() >= persister.batch_size() {
            summary.absorb(persister.persist(std::mem::take(&mut buffer)).await);
        }
    }
    summary.absorb(persister.persist(buffer).await);

    info_time!(
        start_time,
        "Finished rankings snapshot: {} pages, {} records, {} persisted",
        summary.visited,
        summary.records,
        summary.persisted
    );
    Ok(summary)
}

/// Parses on the blocking pool, `Html` can't be held across an await.
async fn parse_page(extractor: Arc<Extractor>, html: String, gated: bool) -> Result<Vec<RawRow>> {
    spawn_blocking(move || {
        if gated {
            extractor.extract(&html)
        } else {
            Ok(extractor.extract_lenient(&html))
        }
    })
    .await?
}

/// Walks a league's history backwards through `previous_league_id`, upserting every week's
/// transactions. Every request after the first, league or week, waits `week_delay`.
///
/// Ends when a league has no predecessor, when the API doesn't know a league, or when the chain
/// points back at a league already walked.
pub async fn process_history<C, S>(
    source: &C,
    store: &S,
    config: &BackfillConfig,
) -> Result<WalkSummary>
where
    C: SourceClient + ?Sized,
    S: Store + ?Sized,
{
    let start_time = Local::now();
    info_time!("Started history backfill from league {}", config.start_league_id);

    let persister = BatchPersister::new(store, config.table.as_str(), config.batch_size);
    let mut summary = WalkSummary::default();
    let mut visited = HashSet::new();
    let mut current = Some(config.start_league_id.clone());

    while let Some(league_id) = current.take() {
        if !visited.is_empty() {
            sleep(config.week_delay).await;
        }
        visited.insert(league_id.clone());

        let Some(meta) = request_league(source, &config.api_base, &league_id).await? else {
            break;
        };
        summary.visited += 1;

        process_season(source, &persister, config, &league_id, &meta, &mut summary).await;

        match meta.predecessor() {
            Some(prev) if visited.contains(prev) => {
                warn!(
                    league_id = %league_id,
                    previous = prev,
                    "previous league was already walked, stopping"
                );
            }
            Some(prev) => {
                info!(
                    league_id = %league_id,
                    previous = prev,
                    "found previous season, walking back"
                );
                current = Some(prev.to_string());
            }
            None => info!(league_id = %league_id, "reached the beginning of the league"),
        }
    }

    info_time!(
        start_time,
        "Finished history backfill: {} seasons, {} transactions, {} persisted",
        summary.visited,
        summary.records,
        summary.persisted
    );
    Ok(summary)
}

/// Fetches and upserts weeks `1..=weeks` of one league season. Empty weeks are skipped.
async fn process_season<C, S>(
    source: &C,
    persister: &BatchPersister<'_, S>,
    config: &BackfillConfig,
    league_id: &str,
    meta: &LeagueMeta,
    summary: &mut WalkSummary,
) where
    C: SourceClient + ?Sized,
    S: Store + ?Sized,
{
    let season = meta.season.as_deref();
    info!(
        league_id,
        season = season.unwrap_or("?"),
        league = meta.display_name(),
        "processing season"
    );

    let mut season_total = 0;
    for week in 1..=config.weeks {
        if week > 1 {
            sleep(config.week_delay).await;
        }

        let fetched_at = Utc::now();
        let txs = request_transactions(source, &config.api_base, league_id, week).await;
        if txs.is_empty() {
            continue;
        }

        let records: Vec<_> = txs
            .into_iter()
            .enumerate()
            .map(|(i, payload)| transaction_record(league_id, season, week, i, payload, fetched_at))
            .collect();
        summary.records += records.len();

        let report = persister.persist(records).await;
        info!(league_id, week, saved = report.succeeded, "week done");
        season_total += report.succeeded;
        summary.absorb(report);
    }

    info!(league_id, season = season.unwrap_or("?"), total = season_total, "finished season");
}
