mod connection;
mod migrations;
mod schema;

pub use connection::ConnectionPool;
pub use migrations::{get_applied_versions, run_migrations, Migration};
pub use schema::{init_schema, SCHEMA_VERSION};

use std::path::Path;

use crate::error::{CoreError, Result};
use crate::filters::FilterSet;
use crate::models::ArticleRecord;

use super::repositories::{ArticleRepository, Repository, SqliteArticleRepository};

pub fn open_database(path: &Path) -> Result<ConnectionPool> {
    let pool = ConnectionPool::open(path)?;
    {
        let conn = pool.get_connection();
        migrations::run_migrations(&conn)?;
    }
    Ok(pool)
}

pub fn open_in_memory() -> Result<ConnectionPool> {
    let pool = ConnectionPool::open_in_memory()?;
    {
        let conn = pool.get_connection();
        migrations::run_migrations(&conn)?;
    }
    Ok(pool)
}

/// Facade over the article store. One table keyed by identifier; upsert
/// fully replaces the row, so re-running the pipeline for an id is the only
/// way a stored record changes.
pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let pool = open_database(path)?;
        Ok(Self { pool })
    }

    pub fn open_in_memory() -> Result<Self> {
        let pool = open_in_memory()?;
        Ok(Self { pool })
    }

    pub fn upsert_article(&self, record: &ArticleRecord) -> Result<()> {
        let conn = self.pool.get_connection();
        let repo = SqliteArticleRepository::new(conn);
        repo.save(record)
    }

    pub fn get_article(&self, id: &str) -> Result<ArticleRecord> {
        let conn = self.pool.get_connection();
        let repo = SqliteArticleRepository::new(conn);
        repo.find_by_id(&id.to_string())?
            .ok_or_else(|| CoreError::ArticleNotFound(id.to_string()))
    }

    pub fn query_articles(&self, filters: &FilterSet) -> Result<Vec<ArticleRecord>> {
        let conn = self.pool.get_connection();
        let repo = SqliteArticleRepository::new(conn);
        repo.query(filters)
    }

    pub fn count_articles(&self) -> Result<usize> {
        let conn = self.pool.get_connection();
        let repo = SqliteArticleRepository::new(conn);
        repo.count()
    }

    pub fn delete_article(&self, id: &str) -> Result<()> {
        let conn = self.pool.get_connection();
        let repo = SqliteArticleRepository::new(conn);
        if !repo.delete(&id.to_string())? {
            return Err(CoreError::ArticleNotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::filters::{ArticleFilter, IdFilter};
    use crate::models::SectionKind;

    fn sample_record(id: &str) -> ArticleRecord {
        let mut sections = BTreeMap::new();
        sections.insert(SectionKind::Introduction, "Opening paragraphs.".to_string());

        ArticleRecord {
            id: id.to_string(),
            title: "Hindlimb suspension in Wistar rats".to_string(),
            authors: vec!["Ada Lovelace".to_string(), "Charles Babbage".to_string()],
            publication_date: "2021-03-04".to_string(),
            publisher: "Example Press".to_string(),
            keywords: vec!["microgravity".to_string()],
            abstract_text: "A study of muscle response.".to_string(),
            sections,
            restricted: false,
            images: vec![
                "https://www.ncbi.nlm.nih.gov/pmc/a.jpg".to_string(),
                "https://www.ncbi.nlm.nih.gov/pmc/b.png".to_string(),
            ],
            pdf_url: Some("https://www.ncbi.nlm.nih.gov/pmc/articles/PMC1/pdf".to_string()),
        }
    }

    #[test]
    fn migrations_are_recorded_once() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.pool.get_connection();
        run_migrations(&conn).unwrap();
        assert_eq!(get_applied_versions(&conn).unwrap(), vec![1]);
    }

    #[test]
    fn record_round_trips_exactly() {
        let db = Database::open_in_memory().unwrap();
        let record = sample_record("PMC1000");
        db.upsert_article(&record).unwrap();

        let stored = db.get_article("PMC1000").unwrap();
        assert_eq!(stored, record);
    }

    #[test]
    fn empty_collections_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let record = ArticleRecord::new("PMC2000");
        db.upsert_article(&record).unwrap();

        let stored = db.get_article("PMC2000").unwrap();
        assert!(stored.images.is_empty());
        assert!(stored.keywords.is_empty());
        assert!(stored.sections.is_empty());
        assert_eq!(stored, record);
    }

    #[test]
    fn upsert_replaces_existing_row() {
        let db = Database::open_in_memory().unwrap();
        let mut record = sample_record("PMC1000");
        db.upsert_article(&record).unwrap();

        record.title = "Revised title".to_string();
        db.upsert_article(&record).unwrap();

        assert_eq!(db.count_articles().unwrap(), 1);
        assert_eq!(db.get_article("PMC1000").unwrap().title, "Revised title");
    }

    #[test]
    fn empty_filter_set_returns_all_rows() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_article(&sample_record("PMC1")).unwrap();
        db.upsert_article(&sample_record("PMC2")).unwrap();

        let all = db.query_articles(&FilterSet::new()).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn restricted_filter_matches_only_restricted_rows() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_article(&sample_record("PMC1")).unwrap();

        let mut restricted = sample_record("PMC2");
        restricted.restricted = true;
        restricted.sections.clear();
        db.upsert_article(&restricted).unwrap();

        let filters = FilterSet::new().with(ArticleFilter::Restricted(true));
        let rows = db.query_articles(&filters).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "PMC2");
        assert!(rows[0].sections.is_empty());
    }

    #[test]
    fn title_filter_is_case_insensitive_substring() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_article(&sample_record("PMC1")).unwrap();

        let filters = FilterSet::new().with(ArticleFilter::Title("WISTAR".to_string()));
        assert_eq!(db.query_articles(&filters).unwrap().len(), 1);

        let filters = FilterSet::new().with(ArticleFilter::Title("zebrafish".to_string()));
        assert!(db.query_articles(&filters).unwrap().is_empty());
    }

    #[test]
    fn id_membership_filter_selects_subset() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_article(&sample_record("PMC1")).unwrap();
        db.upsert_article(&sample_record("PMC2")).unwrap();
        db.upsert_article(&sample_record("PMC3")).unwrap();

        let filters = FilterSet::new().with(ArticleFilter::Id(IdFilter::AnyOf(vec![
            "PMC1".to_string(),
            "PMC3".to_string(),
        ])));
        let rows = db.query_articles(&filters).unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["PMC1", "PMC3"]);
    }

    #[test]
    fn year_prefix_matches_publication_date() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_article(&sample_record("PMC1")).unwrap();

        let filters =
            FilterSet::new().with(ArticleFilter::PublicationDate("2021".to_string()));
        assert_eq!(db.query_articles(&filters).unwrap().len(), 1);
    }

    #[test]
    fn rows_survive_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("articles.db");

        {
            let db = Database::open(&path).unwrap();
            db.upsert_article(&sample_record("PMC1")).unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.get_article("PMC1").unwrap().id, "PMC1");
    }

    #[test]
    fn get_missing_article_errors() {
        let db = Database::open_in_memory().unwrap();
        let err = db.get_article("PMC404").unwrap_err();
        assert!(matches!(err, CoreError::ArticleNotFound(id) if id == "PMC404"));
    }
}
