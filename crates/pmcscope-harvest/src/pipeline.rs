//! Batch ingestion: worklist entries → reconciled records → store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use pmcscope_core::Database;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{HarvestError, Result};
use crate::identifiers::PmcId;
use crate::keywords::KeywordSuggester;
use crate::pmc::PmcClient;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Generate keywords from the title when the feed supplies none.
    pub auto_keywords: bool,
    pub keyword_count: usize,
    /// Worker-pool width; 1 keeps the strictly sequential baseline.
    pub concurrency: usize,
    /// Budget for one identifier's whole reconciliation, when set.
    pub item_timeout: Option<Duration>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            auto_keywords: true,
            keyword_count: 3,
            concurrency: 1,
            item_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchError {
    /// 1-based position in the worklist.
    pub position: usize,
    pub entry: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BatchReport {
    /// Entries actually processed (total minus those skipped by cancellation).
    pub attempted: usize,
    pub stored: usize,
    pub skipped: usize,
    pub elapsed: Duration,
    pub errors: Vec<BatchError>,
}

enum Outcome {
    Stored,
    Failed(String),
    Skipped,
}

/// Drives the whole batch: identifier extraction, reconciliation, keyword
/// fallback, upsert. One bad entry never aborts the run, and failed items
/// are not retried within it.
pub struct IngestPipeline {
    client: PmcClient,
    store: Arc<Database>,
    keywords: KeywordSuggester,
    options: IngestOptions,
}

impl IngestPipeline {
    pub fn new(client: PmcClient, store: Arc<Database>, options: IngestOptions) -> Self {
        Self {
            client,
            store,
            keywords: KeywordSuggester::new(),
            options,
        }
    }

    /// Process every worklist entry and report aggregate wall-clock time plus
    /// the itemized error log. Returns only after all attempted items have
    /// fully completed. Once `cancel` fires, no further entries are started.
    pub async fn run(&self, worklist: &[String], cancel: &CancellationToken) -> BatchReport {
        let start = Instant::now();
        let total = worklist.len();

        let mut outcomes: Vec<(usize, Outcome)> = if self.options.concurrency > 1 {
            futures::stream::iter(worklist.iter().enumerate())
                .map(|(index, entry)| async move {
                    (index, self.outcome_for(entry, cancel).await)
                })
                .buffer_unordered(self.options.concurrency)
                .collect()
                .await
        } else {
            let mut outcomes = Vec::with_capacity(total);
            for (index, entry) in worklist.iter().enumerate() {
                outcomes.push((index, self.outcome_for(entry, cancel).await));
            }
            outcomes
        };
        outcomes.sort_by_key(|(index, _)| *index);

        let mut stored = 0;
        let mut skipped = 0;
        let mut errors = Vec::new();
        for (index, outcome) in outcomes {
            match outcome {
                Outcome::Stored => stored += 1,
                Outcome::Skipped => skipped += 1,
                Outcome::Failed(message) => errors.push(BatchError {
                    position: index + 1,
                    entry: worklist[index].clone(),
                    message,
                }),
            }
        }

        let report = BatchReport {
            attempted: total - skipped,
            stored,
            skipped,
            elapsed: start.elapsed(),
            errors,
        };
        info!(
            attempted = report.attempted,
            stored = report.stored,
            failed = report.errors.len(),
            skipped = report.skipped,
            "batch finished in {:.2?}",
            report.elapsed
        );
        report
    }

    async fn outcome_for(&self, entry: &str, cancel: &CancellationToken) -> Outcome {
        if cancel.is_cancelled() {
            return Outcome::Skipped;
        }
        match self.process_entry(entry).await {
            Ok(id) => {
                debug!(id = %id, "stored article");
                Outcome::Stored
            }
            Err(err) => {
                warn!(entry, "failed to process entry: {err}");
                Outcome::Failed(err.to_string())
            }
        }
    }

    async fn process_entry(&self, entry: &str) -> Result<PmcId> {
        let id = PmcId::extract(entry)
            .ok_or_else(|| HarvestError::InvalidIdentifier(entry.to_string()))?;

        let fetch = self.client.fetch_record(&id);
        let mut record = match self.options.item_timeout {
            Some(timeout) => tokio::time::timeout(timeout, fetch)
                .await
                .map_err(|_| HarvestError::Timeout(id.to_string()))??,
            None => fetch.await?,
        };

        if record.keywords.is_empty() && self.options.auto_keywords {
            record.keywords = self
                .keywords
                .suggest(&record.title, self.options.keyword_count);
        }

        self.store.upsert_article(&record)?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use mockito::{Server, ServerGuard};

    use crate::http::RetryingClient;

    const FEED_XML: &str = r#"<?xml version="1.0"?>
<pmc-articleset><article>
  <front>
    <article-meta>
      <title-group><article-title>Radiation tolerance of tardigrades</article-title></title-group>
      <pub-date pub-type="epub"><year>2022</year></pub-date>
    </article-meta>
  </front>
</article></pmc-articleset>"#;

    fn pipeline_for(server: &ServerGuard, options: IngestOptions) -> IngestPipeline {
        let client = PmcClient::with_bases(
            &format!("{}/efetch.fcgi", server.url()),
            &format!("{}/articles", server.url()),
            RetryingClient::new(0, Duration::ZERO, Duration::from_secs(5)),
        );
        let store = Arc::new(Database::open_in_memory().unwrap());
        IngestPipeline::new(client, store, options)
    }

    #[tokio::test]
    async fn batch_continues_past_bad_entries() {
        let mut server = Server::new_async().await;
        let _ok_feed = server
            .mock("GET", "/efetch.fcgi?db=pmc&retmode=xml&id=PMC1000")
            .with_status(200)
            .with_body(FEED_XML)
            .create_async()
            .await;
        let _ok_page = server
            .mock("GET", "/articles/PMC1000/")
            .with_status(404)
            .create_async()
            .await;
        let _bad_feed = server
            .mock("GET", "/efetch.fcgi?db=pmc&retmode=xml&id=PMC1001")
            .with_status(500)
            .create_async()
            .await;

        let pipeline = pipeline_for(&server, IngestOptions::default());
        let worklist = vec![
            "https://x/PMC1000".to_string(),
            "badurl".to_string(),
            "https://x/PMC1001".to_string(),
        ];

        let report = pipeline
            .run(&worklist, &CancellationToken::new())
            .await;

        assert_eq!(report.attempted, 3);
        assert_eq!(report.stored, 1);
        assert_eq!(report.skipped, 0);
        assert!(report.elapsed > Duration::ZERO);

        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].position, 2);
        assert_eq!(report.errors[0].entry, "badurl");
        assert_eq!(report.errors[1].position, 3);
        assert_eq!(report.errors[1].entry, "https://x/PMC1001");

        let stored = pipeline.store.get_article("PMC1000").unwrap();
        assert_eq!(stored.title, "Radiation tolerance of tardigrades");
    }

    #[tokio::test]
    async fn keywords_generated_when_feed_has_none() {
        let mut server = Server::new_async().await;
        let _feed = server
            .mock("GET", "/efetch.fcgi?db=pmc&retmode=xml&id=PMC1000")
            .with_status(200)
            .with_body(FEED_XML)
            .create_async()
            .await;
        let _page = server
            .mock("GET", "/articles/PMC1000/")
            .with_status(404)
            .create_async()
            .await;

        let pipeline = pipeline_for(&server, IngestOptions::default());
        let worklist = vec!["https://x/PMC1000".to_string()];
        let report = pipeline.run(&worklist, &CancellationToken::new()).await;
        assert_eq!(report.stored, 1);

        let stored = pipeline.store.get_article("PMC1000").unwrap();
        assert!(!stored.keywords.is_empty());
        assert!(stored.keywords.len() <= 3);
    }

    #[tokio::test]
    async fn auto_keywords_can_be_disabled() {
        let mut server = Server::new_async().await;
        let _feed = server
            .mock("GET", "/efetch.fcgi?db=pmc&retmode=xml&id=PMC1000")
            .with_status(200)
            .with_body(FEED_XML)
            .create_async()
            .await;
        let _page = server
            .mock("GET", "/articles/PMC1000/")
            .with_status(404)
            .create_async()
            .await;

        let options = IngestOptions {
            auto_keywords: false,
            ..IngestOptions::default()
        };
        let pipeline = pipeline_for(&server, options);
        let worklist = vec!["https://x/PMC1000".to_string()];
        pipeline.run(&worklist, &CancellationToken::new()).await;

        let stored = pipeline.store.get_article("PMC1000").unwrap();
        assert!(stored.keywords.is_empty());
    }

    #[tokio::test]
    async fn cancelled_token_skips_all_entries() {
        let server = Server::new_async().await;
        let pipeline = pipeline_for(&server, IngestOptions::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let worklist = vec![
            "https://x/PMC1000".to_string(),
            "https://x/PMC1001".to_string(),
        ];
        let report = pipeline.run(&worklist, &cancel).await;

        assert_eq!(report.attempted, 0);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.stored, 0);
        assert!(report.errors.is_empty());
        assert_eq!(pipeline.store.count_articles().unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrent_run_reports_all_items_in_order() {
        let mut server = Server::new_async().await;
        for id in ["PMC1", "PMC2", "PMC3"] {
            let _feed = server
                .mock(
                    "GET",
                    format!("/efetch.fcgi?db=pmc&retmode=xml&id={id}").as_str(),
                )
                .with_status(200)
                .with_body(FEED_XML)
                .create_async()
                .await;
            let _page = server
                .mock("GET", format!("/articles/{id}/").as_str())
                .with_status(404)
                .create_async()
                .await;
        }

        let options = IngestOptions {
            concurrency: 3,
            ..IngestOptions::default()
        };
        let pipeline = pipeline_for(&server, options);
        let worklist = vec![
            "https://x/PMC1".to_string(),
            "badurl".to_string(),
            "https://x/PMC2".to_string(),
            "https://x/PMC3".to_string(),
        ];
        let report = pipeline.run(&worklist, &CancellationToken::new()).await;

        assert_eq!(report.stored, 3);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].position, 2);
        assert_eq!(pipeline.store.count_articles().unwrap(), 3);
    }
}
