use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: u32 = 1;

pub fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        ",
    )?;
    Ok(())
}

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS articles (
            id               TEXT PRIMARY KEY,
            title            TEXT NOT NULL,
            authors          TEXT NOT NULL DEFAULT '[]',
            publication_date TEXT NOT NULL,
            publisher        TEXT NOT NULL,
            keywords         TEXT NOT NULL DEFAULT '[]',
            abstract         TEXT NOT NULL,
            sections         TEXT NOT NULL DEFAULT '{}',
            restricted       INTEGER NOT NULL DEFAULT 0,
            images           TEXT NOT NULL DEFAULT '[]',
            pdf_url          TEXT
        );
        ",
    )?;
    Ok(())
}

pub fn create_indexes(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_articles_publication_date ON articles(publication_date);
        CREATE INDEX IF NOT EXISTS idx_articles_publisher        ON articles(publisher);
        CREATE INDEX IF NOT EXISTS idx_articles_restricted       ON articles(restricted);
        ",
    )?;
    Ok(())
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    create_tables(conn)?;
    create_indexes(conn)?;
    Ok(())
}
