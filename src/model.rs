use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One candidate row pulled out of a rankings document, before normalization.
/// `name` and `value` are required, everything else may be missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub name: String,
    pub href: Option<String>,
    pub team: Option<String>,
    pub position: Option<String>,
    pub value: String,
    pub rank: Option<String>,
}

/// A player's value on a given date.
/// Natural key: `(player_id, format, as_of_date)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingRecord {
    #[serde(rename = "ktc_player_id")]
    pub player_id: String,
    pub player_name: String,
    pub position: String,
    #[serde(rename = "nfl_team")]
    pub team: String,
    pub format: String,
    #[serde(rename = "ktc_rank")]
    pub rank: u32,
    #[serde(rename = "ktc_value")]
    pub value: u32,
    pub as_of_date: NaiveDate,
}

/// One league transaction for a given week.
/// Natural key: `(league_id, week, transaction_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub league_id: String,
    pub season: Option<String>,
    pub week: u32,
    pub transaction_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub executed_at: DateTime<Utc>,
    #[serde(rename = "data")]
    pub payload: Value,
}

/// The part of `GET /league/{id}` the backfill cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct LeagueMeta {
    #[serde(default, deserialize_with = "string_or_number")]
    pub season: Option<String>,
    pub name: Option<String>,
    pub previous_league_id: Option<String>,
}

impl LeagueMeta {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown League")
    }

    /// The predecessor league id, if there is a real one.
    /// Missing, empty and `"0"` all mean the chain ends here.
    pub fn predecessor(&self) -> Option<&str> {
        self.previous_league_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty() && *id != "0")
    }
}

fn string_or_number<'de, D>(deserializer: D) -> core::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// A record that can be flattened into a store row and upserted on its natural key.
pub trait Record: Serialize {
    /// Columns the store uses to detect an existing row.
    const CONFLICT_KEYS: &'static [&'static str];
}

impl Record for RankingRecord {
    const CONFLICT_KEYS: &'static [&'static str] = &["ktc_player_id", "format", "as_of_date"];
}

impl Record for TransactionRecord {
    const CONFLICT_KEYS: &'static [&'static str] = &["league_id", "week", "transaction_id"];
}
