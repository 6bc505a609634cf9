use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use pmcscope_core::{
    AppConfig, ArticleFilter, ArticleRecord, Database, FilterSet, IdFilter,
};
use pmcscope_harvest::{IngestOptions, IngestPipeline, PmcClient, RetryingClient};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "pmcscope",
    about = "Harvest and query PubMed Central article metadata",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format (for scripts and dashboards).
    #[arg(long, global = true)]
    json: bool,

    /// Database path override.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Config file path (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a worklist file: one article URL or identifier per line.
    Ingest {
        worklist: PathBuf,

        /// Disable keyword generation for records without feed keywords.
        #[arg(long)]
        no_auto_keywords: bool,

        /// Keywords to generate per record.
        #[arg(long)]
        keyword_count: Option<usize>,

        /// Worker-pool width; 1 processes strictly sequentially.
        #[arg(long, default_value = "1")]
        concurrency: usize,

        /// Per-identifier processing budget in seconds.
        #[arg(long)]
        item_timeout_secs: Option<u64>,
    },

    /// Query stored records with field filters.
    Query {
        /// Raw filter, repeatable: key=value over the closed vocabulary
        /// (title, authors, publication_date, publisher, restricted, id).
        #[arg(long, value_parser = parse_key_val)]
        filter: Vec<(String, String)>,

        /// Title substring (case-insensitive).
        #[arg(long)]
        title: Option<String>,

        /// Author substring.
        #[arg(long)]
        author: Option<String>,

        /// Publication-date substring, e.g. a year.
        #[arg(long)]
        date: Option<String>,

        /// Publisher substring.
        #[arg(long)]
        publisher: Option<String>,

        /// Restricted flag, exact.
        #[arg(long)]
        restricted: Option<bool>,

        /// Identifier, repeatable for a membership query.
        #[arg(long, action = clap::ArgAction::Append)]
        id: Vec<String>,
    },

    /// Show one stored record.
    Get { id: String },

    /// Show store statistics.
    Stats,
}

fn parse_key_val(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))?;
    Ok((key.to_string(), value.to_string()))
}

// ─── Entry point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load_or_default(cli.config.as_deref())?;
    let db_path = cli
        .db
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.storage.db_path));

    match cli.command {
        Commands::Ingest {
            ref worklist,
            no_auto_keywords,
            keyword_count,
            concurrency,
            item_timeout_secs,
        } => {
            let entries = read_worklist(worklist)?;
            let store = Arc::new(open_store(&db_path)?);
            let client = PmcClient::new(RetryingClient::from_config(&config.fetch));
            let options = IngestOptions {
                auto_keywords: config.keywords.auto_generate && !no_auto_keywords,
                keyword_count: keyword_count.unwrap_or(config.keywords.count),
                concurrency: concurrency.max(1),
                item_timeout: item_timeout_secs.map(Duration::from_secs),
            };
            let pipeline = IngestPipeline::new(client, store, options);

            let cancel = CancellationToken::new();
            let ctrl_c_cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c_cancel.cancel();
                }
            });

            let report = pipeline.run(&entries, &cancel).await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{} stored, {} failed, {} skipped in {:.2?}",
                    report.stored,
                    report.errors.len(),
                    report.skipped,
                    report.elapsed
                );
                for error in &report.errors {
                    println!(
                        "  line {}: {}: {}",
                        error.position, error.entry, error.message
                    );
                }
            }
        }

        Commands::Query {
            ref filter,
            ref title,
            ref author,
            ref date,
            ref publisher,
            restricted,
            ref id,
        } => {
            let mut filters =
                FilterSet::from_pairs(filter.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
            if let Some(title) = title {
                filters.push(ArticleFilter::Title(title.clone()));
            }
            if let Some(author) = author {
                filters.push(ArticleFilter::Authors(author.clone()));
            }
            if let Some(date) = date {
                filters.push(ArticleFilter::PublicationDate(date.clone()));
            }
            if let Some(publisher) = publisher {
                filters.push(ArticleFilter::Publisher(publisher.clone()));
            }
            if let Some(restricted) = restricted {
                filters.push(ArticleFilter::Restricted(restricted));
            }
            match id.len() {
                0 => {}
                1 => filters.push(ArticleFilter::Id(IdFilter::One(id[0].clone()))),
                _ => filters.push(ArticleFilter::Id(IdFilter::AnyOf(id.clone()))),
            }

            let db = open_store(&db_path)?;
            let records = db.query_articles(&filters)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                print_records(&records);
            }
        }

        Commands::Get { ref id } => {
            let db = open_store(&db_path)?;
            let record = db.get_article(id)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_record(&record);
            }
        }

        Commands::Stats => {
            let db = open_store(&db_path)?;
            let total = db.count_articles()?;
            let restricted = db
                .query_articles(&FilterSet::new().with(ArticleFilter::Restricted(true)))?
                .len();
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "articles": total,
                        "restricted": restricted,
                    }))?
                );
            } else {
                println!("{total} article(s), {restricted} restricted");
            }
        }
    }

    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn open_store(db_path: &Path) -> Result<Database> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    Database::open(db_path).with_context(|| format!("opening store at {}", db_path.display()))
}

fn read_worklist(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading worklist {}", path.display()))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn print_records(records: &[ArticleRecord]) {
    for record in records {
        println!(
            "{}  {}  {}",
            record.id, record.publication_date, record.title
        );
    }
    println!("{} article(s)", records.len());
}

fn print_record(record: &ArticleRecord) {
    println!("id:          {}", record.id);
    println!("title:       {}", record.title);
    println!("authors:     {}", record.authors.join(", "));
    println!("date:        {}", record.publication_date);
    println!("publisher:   {}", record.publisher);
    println!("keywords:    {}", record.keywords.join(", "));
    println!("restricted:  {}", record.restricted);
    println!("abstract:    {}", record.abstract_text);
    for (kind, text) in &record.sections {
        let preview: String = text.chars().take(120).collect();
        println!("{kind}: {preview}");
    }
    if !record.images.is_empty() {
        println!("images:      {}", record.images.join("\n             "));
    }
    if let Some(pdf_url) = &record.pdf_url {
        println!("pdf:         {pdf_url}");
    }
}
