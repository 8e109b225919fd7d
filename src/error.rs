use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Extraction yielded {found} rows, expected at least {minimum}. Upstream markup probably changed.")]
    Extraction { found: usize, minimum: usize },
    #[error("Neither the rankings container nor any fallback rows were found in the document.")]
    MissingContainer,
    #[error("Couldn't compile selector: {0}")]
    Selector(String),

    #[error("Request to {url} failed with status {status}")]
    Status { url: String, status: u16 },
    #[error("Couldn't fetch {0}")]
    Transport(String),
    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store rejected the request: {0}")]
    Store(String),
    #[error("Missing required configuration: {0}")]
    MissingConfig(&'static str),

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),
}

impl Error {
    /// Errors that should end the process with a non-zero status.
    /// Batch level store failures never reach this point, they are counted instead.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Store(_))
    }

    /// Timeouts, refused connections and the like. Absorbed by the paginated walk.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}
