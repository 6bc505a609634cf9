use thiserror::Error;

/// All errors that can occur in pmcscope-core.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("article not found: {0}")]
    ArticleNotFound(String),

    #[error("unsupported filter key: {0}")]
    UnsupportedFilter(String),

    #[error("invalid value {value:?} for filter {key}")]
    InvalidFilterValue { key: String, value: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
