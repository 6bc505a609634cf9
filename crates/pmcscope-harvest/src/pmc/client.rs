use pmcscope_core::models::ArticleRecord;
use tracing::{debug, warn};

use crate::error::Result;
use crate::http::RetryingClient;
use crate::identifiers::PmcId;
use crate::pmc::page;
use crate::pmc::xml::{parse_article_xml, ArticleXml};

const EFETCH_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";
const ARTICLE_BASE: &str = "https://www.ncbi.nlm.nih.gov/pmc/articles";

/// Stray marker the feed sometimes leaves inside titles.
const TITLE_MARKER: char = '▿';

/// Reconciles the structured efetch feed and the rendered article page into
/// one normalized record per identifier. Stateless across identifiers.
pub struct PmcClient {
    http: RetryingClient,
    efetch_base: String,
    article_base: String,
}

impl PmcClient {
    pub fn new(http: RetryingClient) -> Self {
        Self::with_bases(EFETCH_BASE, ARTICLE_BASE, http)
    }

    pub fn with_bases(efetch_base: &str, article_base: &str, http: RetryingClient) -> Self {
        Self {
            http,
            efetch_base: efetch_base.to_string(),
            article_base: article_base.to_string(),
        }
    }

    fn efetch_url(&self, id: &PmcId) -> String {
        format!("{}?db=pmc&retmode=xml&id={}", self.efetch_base, id)
    }

    fn article_url(&self, id: &PmcId) -> String {
        format!("{}/{}/", self.article_base, id)
    }

    /// Fetch and merge both sources for `id`.
    ///
    /// Only the structured feed is load-bearing: an XML fetch or parse
    /// failure is fatal for this identifier, while the page fetch degrades
    /// to empty images and no PDF link. The page is fetched once and reused
    /// for both extractions.
    pub async fn fetch_record(&self, id: &PmcId) -> Result<ArticleRecord> {
        let xml = self.http.get(&self.efetch_url(id)).await?;
        let doc = parse_article_xml(&xml)?;
        debug!(id = %id, restricted = doc.restricted(), "parsed article feed");

        let page_html = match self.http.get(&self.article_url(id)).await {
            Ok(html) => Some(html),
            Err(err) => {
                warn!(id = %id, "article page fetch failed, continuing without it: {err}");
                None
            }
        };

        Ok(assemble_record(id, &doc, page_html.as_deref()))
    }
}

fn assemble_record(id: &PmcId, doc: &ArticleXml, page_html: Option<&str>) -> ArticleRecord {
    let mut record = ArticleRecord::new(id.as_str());

    if let Some(title) = &doc.title {
        record.title = title.replace(TITLE_MARKER, "");
    }
    if let Some(publisher) = &doc.publisher {
        record.publisher = publisher.clone();
    }
    if let Some(abstract_text) = &doc.abstract_text {
        record.abstract_text = abstract_text.clone();
    }

    let authors = doc.author_names();
    if !authors.is_empty() {
        record.authors = authors;
    }

    record.publication_date = doc.publication_date();
    record.keywords = doc.keywords.clone();
    record.restricted = doc.restricted();
    record.sections = doc.section_map();

    if let Some(html) = page_html {
        record.images = page::extract_images(html);
        record.pdf_url = page::extract_pdf_url(html);
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use mockito::Server;
    use pmcscope_core::models::{NO_AUTHORS, UNKNOWN_DATE, UNKNOWN_PUBLISHER};

    const FEED_XML: &str = r#"<?xml version="1.0"?>
<pmc-articleset><article>
  <front>
    <journal-meta>
      <publisher><publisher-name>Example Press</publisher-name></publisher>
    </journal-meta>
    <article-meta>
      <title-group><article-title>Muscle response▿ under unloading</article-title></title-group>
      <contrib-group>
        <contrib><name><surname>Lovelace</surname><given-names>Ada</given-names></name></contrib>
      </contrib-group>
      <pub-date pub-type="epub"><day>4</day><month>3</month><year>2021</year></pub-date>
      <abstract><p>A study of muscle response.</p></abstract>
    </article-meta>
  </front>
  <body>
    <sec><title>Introduction</title><p>Lead paragraph.</p></sec>
  </body>
</article></pmc-articleset>"#;

    const PAGE_HTML: &str = r#"<html><head>
      <meta name="citation_pdf_url" content="/pmc/articles/PMC1000/pdf/main.pdf">
    </head><body>
      <img class="graphic" src="/pmc/articles/PMC1000/fig1.jpg">
    </body></html>"#;

    fn test_client(server_url: &str) -> PmcClient {
        PmcClient::with_bases(
            &format!("{server_url}/efetch.fcgi"),
            &format!("{server_url}/articles"),
            RetryingClient::new(0, Duration::ZERO, Duration::from_secs(5)),
        )
    }

    #[tokio::test]
    async fn reconciles_feed_and_page_into_one_record() {
        let mut server = Server::new_async().await;
        let _feed = server
            .mock("GET", "/efetch.fcgi?db=pmc&retmode=xml&id=PMC1000")
            .with_status(200)
            .with_body(FEED_XML)
            .create_async()
            .await;
        let _page = server
            .mock("GET", "/articles/PMC1000/")
            .with_status(200)
            .with_body(PAGE_HTML)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let id = PmcId::parse("PMC1000").unwrap();
        let record = client.fetch_record(&id).await.unwrap();

        assert_eq!(record.id, "PMC1000");
        // The stray marker is stripped from the title.
        assert_eq!(record.title, "Muscle response under unloading");
        assert_eq!(record.authors, vec!["Ada Lovelace".to_string()]);
        assert_eq!(record.publication_date, "2021-03-04");
        assert_eq!(record.publisher, "Example Press");
        assert_eq!(record.abstract_text, "A study of muscle response.");
        assert_eq!(record.sections.len(), 1);
        assert!(!record.restricted);
        assert_eq!(
            record.images,
            vec!["https://www.ncbi.nlm.nih.gov/pmc/articles/PMC1000/fig1.jpg".to_string()]
        );
        assert_eq!(
            record.pdf_url.as_deref(),
            Some("https://www.ncbi.nlm.nih.gov/pmc/articles/PMC1000/pdf/main.pdf")
        );
    }

    #[tokio::test]
    async fn page_failure_degrades_to_empty_images() {
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

        let client = test_client(&server.url());
        let id = PmcId::parse("PMC1000").unwrap();
        let record = client.fetch_record(&id).await.unwrap();

        assert_eq!(record.title, "Muscle response under unloading");
        assert!(record.images.is_empty());
        assert!(record.pdf_url.is_none());
    }

    #[tokio::test]
    async fn feed_fetch_failure_is_fatal() {
        let mut server = Server::new_async().await;
        let _feed = server
            .mock("GET", "/efetch.fcgi?db=pmc&retmode=xml&id=PMC1000")
            .with_status(404)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let id = PmcId::parse("PMC1000").unwrap();
        let err = client.fetch_record(&id).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::HarvestError::Status { status: 404, .. }
        ));
    }

    #[tokio::test]
    async fn feed_without_front_yields_restricted_sentinel_record() {
        let mut server = Server::new_async().await;
        let _feed = server
            .mock("GET", "/efetch.fcgi?db=pmc&retmode=xml&id=PMC1000")
            .with_status(200)
            .with_body("<pmc-articleset><error>withdrawn</error></pmc-articleset>")
            .create_async()
            .await;
        let _page = server
            .mock("GET", "/articles/PMC1000/")
            .with_status(404)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let id = PmcId::parse("PMC1000").unwrap();
        let record = client.fetch_record(&id).await.unwrap();

        assert!(record.restricted);
        assert!(record.sections.is_empty());
        assert_eq!(record.authors, vec![NO_AUTHORS.to_string()]);
        assert_eq!(record.publication_date, UNKNOWN_DATE);
        assert_eq!(record.publisher, UNKNOWN_PUBLISHER);
    }
}
