//! Player rankings snapshots and league transaction history, scraped and upserted.
//!
//! Two walks share the same pieces: a source client that fetches one document per call,
//! an extractor/normalizer pair that turns documents into records, and a batch persister
//! that upserts records on their natural key.

mod macros;

pub mod config;
mod error;
pub mod model;
pub mod normalize;
pub mod parse;
pub mod persist;
pub mod process;
pub mod request;
pub mod store;

pub use error::{Error, Result};

/// Records per upsert call.
pub const BATCH_SIZE: usize = 100;
/// A rankings page holds a few hundred players. Fewer rows than this means the markup changed.
pub const MIN_PLAUSIBLE_ROWS: usize = 25;
pub const PAGE_DELAY_MS: u64 = 1_000;
pub const WEEK_DELAY_MS: u64 = 200;
pub const WEEKS_PER_SEASON: u32 = 18;
pub const REQUEST_TIMEOUT_SECS: u64 = 20;

/// Rank given to a row whose rank can't be read.
pub const UNRANKED: u32 = 999;
/// Team of a player without one.
pub const NO_TEAM: &str = "FA";
pub const NO_POSITION: &str = "UNK";

/// The rankings site turns away default client identifiers.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
