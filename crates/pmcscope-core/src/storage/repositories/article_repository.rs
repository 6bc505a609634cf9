use std::sync::MutexGuard;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::error::Result;
use crate::filters::FilterSet;
use crate::models::ArticleRecord;

use super::Repository;

const ARTICLE_COLUMNS: &str = "id, title, authors, publication_date, publisher, keywords, \
                               abstract, sections, restricted, images, pdf_url";

pub trait ArticleRepository: Repository<Entity = ArticleRecord, Id = String> {
    fn query(&self, filters: &FilterSet) -> Result<Vec<ArticleRecord>>;
    fn count(&self) -> Result<usize>;
}

pub struct SqliteArticleRepository<'a> {
    conn: MutexGuard<'a, Connection>,
}

impl<'a> SqliteArticleRepository<'a> {
    pub fn new(conn: MutexGuard<'a, Connection>) -> Self {
        Self { conn }
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<ArticleRecord> {
        let authors_json: String = row.get(2)?;
        let keywords_json: String = row.get(5)?;
        let sections_json: String = row.get(7)?;
        let images_json: String = row.get(9)?;

        Ok(ArticleRecord {
            id: row.get(0)?,
            title: row.get(1)?,
            authors: serde_json::from_str(&authors_json).unwrap_or_default(),
            publication_date: row.get(3)?,
            publisher: row.get(4)?,
            keywords: serde_json::from_str(&keywords_json).unwrap_or_default(),
            abstract_text: row.get(6)?,
            sections: serde_json::from_str(&sections_json).unwrap_or_default(),
            restricted: row.get::<_, i64>(8)? != 0,
            images: serde_json::from_str(&images_json).unwrap_or_default(),
            pdf_url: row.get(10)?,
        })
    }
}

impl<'a> Repository for SqliteArticleRepository<'a> {
    type Entity = ArticleRecord;
    type Id = String;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let record = stmt
            .query_row(params![id], Self::row_to_record)
            .optional()?;
        Ok(record)
    }

    /// Replaces any existing row with the same identifier. The single
    /// statement keeps the overwrite atomic per key.
    fn save(&self, record: &Self::Entity) -> Result<()> {
        let authors_json = serde_json::to_string(&record.authors)?;
        let keywords_json = serde_json::to_string(&record.keywords)?;
        let sections_json = serde_json::to_string(&record.sections)?;
        let images_json = serde_json::to_string(&record.images)?;

        self.conn.execute(
            "INSERT OR REPLACE INTO articles
                (id, title, authors, publication_date, publisher, keywords,
                 abstract, sections, restricted, images, pdf_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.id,
                record.title,
                authors_json,
                record.publication_date,
                record.publisher,
                keywords_json,
                record.abstract_text,
                sections_json,
                i64::from(record.restricted),
                images_json,
                record.pdf_url.as_deref(),
            ],
        )?;

        Ok(())
    }

    fn delete(&self, id: &Self::Id) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM articles WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}

impl<'a> ArticleRepository for SqliteArticleRepository<'a> {
    fn query(&self, filters: &FilterSet) -> Result<Vec<ArticleRecord>> {
        let (clause, values) = filters.to_sql();
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles{clause} ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;

        let rows = stmt
            .query_map(params_from_iter(values), Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
