//! pmcscope core — article records, SQLite storage, filter grammar, config.

pub mod config;
pub mod error;
pub mod filters;
pub mod models;
pub mod storage;

pub use config::{AppConfig, FetchConfig, KeywordConfig, StorageConfig};
pub use error::{CoreError, Result};
pub use filters::{ArticleFilter, FilterSet, IdFilter};
pub use models::*;

pub use storage::database::{open_database, open_in_memory, ConnectionPool, Database};
pub use storage::repositories::{ArticleRepository, Repository, SqliteArticleRepository};
