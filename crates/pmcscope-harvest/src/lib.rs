//! pmcscope harvest — resilient fetching, dual-source article reconciliation,
//! keyword fallback, batch ingestion.

pub mod error;
pub mod http;
pub mod identifiers;
pub mod keywords;
pub mod pipeline;
pub mod pmc;

pub use error::{HarvestError, Result};
pub use http::RetryingClient;
pub use identifiers::PmcId;
pub use keywords::KeywordSuggester;
pub use pipeline::{BatchError, BatchReport, IngestOptions, IngestPipeline};
pub use pmc::PmcClient;
