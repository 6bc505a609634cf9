use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid PMC identifier: {0}")]
    InvalidIdentifier(String),

    #[error("timed out processing {0}")]
    Timeout(String),

    #[error("store error: {0}")]
    Store(#[from] pmcscope_core::CoreError),
}

pub type Result<T> = std::result::Result<T, HarvestError>;
