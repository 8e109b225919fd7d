//! Turns loosely typed extraction output into canonical records.
//! Anything that can't be made canonical comes back as `None` and is skipped by the caller.

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Url;
use serde_json::Value;
use tracing::debug;

use crate::model::{RankingRecord, RawRow, TransactionRecord};
use crate::{NO_POSITION, NO_TEAM, UNRANKED};

/// Parses a displayed integer such as `"1,234"`.
/// Thousands separators and surrounding whitespace are ignored, anything else non-numeric is rejected.
pub fn parse_int(text: &str) -> Option<u32> {
    let digits: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '\u{a0}' | ' '))
        .collect();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// A ranking value must be a positive integer. Zero is as meaningless as a missing value.
pub fn parse_value(text: &str) -> Option<u32> {
    parse_int(text).filter(|v| *v > 0)
}

/// Stable player id taken from the last path segment of the player link,
/// e.g. `/dynasty-rankings/players/patrick-mahomes-1` -> `patrick-mahomes-1`.
///
/// Without a usable link the id is synthesised from `name` and `position`. Those ids are
/// only as stable as the displayed name, a rename upstream produces a new id.
pub fn player_id(href: Option<&str>, name: &str, position: &str) -> String {
    let slug = href.map(link_path).and_then(|path| {
        path.trim_end_matches('/')
            .rsplit('/')
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    });

    match slug {
        Some(slug) => slug,
        None => {
            let synth = format!("{}_{}", name.trim(), position.trim())
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("_")
                .to_lowercase();
            debug!(name, position, id = %synth, "no player link, synthesised id");
            synth
        }
    }
}

/// Path part of a link. Absolute links lose their scheme and host,
/// relative ones their query and fragment.
fn link_path(href: &str) -> String {
    match Url::parse(href) {
        Ok(url) => url.path().to_string(),
        Err(_) => href.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}

/// Builds a ranking record stamped with `format` and `as_of`. Returns `None` when the value gate fails.
pub fn ranking_record(raw: RawRow, format: &str, as_of: NaiveDate) -> Option<RankingRecord> {
    let value = parse_value(&raw.value)?;
    let rank = raw.rank.as_deref().and_then(parse_int).unwrap_or(UNRANKED);
    let position = raw.position.unwrap_or_else(|| NO_POSITION.to_string());
    let team = raw.team.unwrap_or_else(|| NO_TEAM.to_string());
    let player_id = player_id(raw.href.as_deref(), &raw.name, &position);

    Some(RankingRecord {
        player_id,
        player_name: raw.name,
        position,
        team,
        format: format.to_string(),
        rank,
        value,
        as_of_date: as_of,
    })
}

/// Builds a transaction record from one element of a week's transaction array.
///
/// `executed_at` falls back from `status_updated` to `created` to `fetched_at`, so it is always set.
/// `ordinal` is the element's position in the array and only used when the payload carries no id.
pub fn transaction_record(
    league_id: &str,
    season: Option<&str>,
    week: u32,
    ordinal: usize,
    payload: Value,
    fetched_at: DateTime<Utc>,
) -> TransactionRecord {
    let executed_at = ["status_updated", "created"]
        .iter()
        .find_map(|key| payload.get(key).and_then(epoch_millis))
        .unwrap_or(fetched_at);

    let kind = payload
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    let transaction_id = match payload.get("transaction_id").and_then(scalar_string) {
        Some(id) => id,
        None => {
            debug!(league_id, week, ordinal, "transaction without id, using position");
            format!("{week}:{ordinal}")
        }
    };

    TransactionRecord {
        league_id: league_id.to_string(),
        season: season.map(String::from),
        week,
        transaction_id,
        kind,
        executed_at,
        payload,
    }
}

/// Epoch milliseconds as sent by the league API. Zero and negatives count as absent.
fn epoch_millis(value: &Value) -> Option<DateTime<Utc>> {
    let ms = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    (ms > 0).then(|| DateTime::from_timestamp_millis(ms)).flatten()
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
