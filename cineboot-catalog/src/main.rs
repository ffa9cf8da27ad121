//! cineboot-catalog - batch catalog builder
//!
//! Reads the provider feeds, runs the catalog pipeline against the metadata
//! snapshot and the external services, and writes `films.json` for the site
//! generator.

use anyhow::{Context, Result};
use clap::Parser;
use cineboot_catalog::tier1::{
    JsonKvStore, JsonRecordFeed, OmdbClient, RecordFeed, SqliteMetadataStore, WikidataClient,
};
use cineboot_catalog::{CatalogCaches, CatalogConfig, CatalogPipeline, CatalogSources};
use cineboot_common::config::{
    get_user_agent, load_toml_config, locate_config_file, resolve_omdb_api_key, write_atomic,
    CompiledDefaults, RootFolderResolver, TomlConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "cineboot-catalog")]
#[command(about = "Build the deduplicated, enriched film catalog")]
#[command(version)]
struct Args {
    /// Root folder holding the metadata snapshot, caches and output
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, env = "CINEBOOT_CONFIG")]
    config: Option<PathBuf>,

    /// Output file (default: <root>/films.json)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Provider feed files; defaults to every *.json under <root>/feeds
    feeds: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(|| locate_config_file().ok());
    let toml_config = match &config_path {
        Some(path) => load_toml_config(path)?,
        None => TomlConfig::default(),
    };

    let level = toml_config.logging.level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("cineboot_catalog={level},cineboot_common={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cineboot-catalog");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let root_folder = RootFolderResolver::new("catalog")
        .with_cli_arg(args.root_folder.clone())
        .resolve();
    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;
    info!("Root folder: {}", root_folder.display());

    let catalog_config = match &config_path {
        Some(path) => CatalogConfig::load(path)?,
        None => CatalogConfig::default(),
    };

    let metadata_db = root_folder.join(
        toml_config
            .metadata_db
            .clone()
            .unwrap_or_else(|| CompiledDefaults::for_current_platform().metadata_db),
    );
    info!("Metadata database: {}", metadata_db.display());
    let pool = cineboot_catalog::db::open_metadata_pool(&metadata_db).await?;

    let user_agent = get_user_agent(toml_config.contact.as_deref());
    let api_key = resolve_omdb_api_key(&toml_config)?;
    let sources = CatalogSources {
        store: Arc::new(SqliteMetadataStore::new(pool)),
        attributes: Arc::new(OmdbClient::new(api_key, &user_agent, &catalog_config.http)?),
        knowledge: Arc::new(WikidataClient::new(&user_agent, &catalog_config.http)?),
    };

    let cache_dir = root_folder.join("cache");
    let caches = CatalogCaches {
        ids: Box::new(JsonKvStore::load(&cache_dir.join("imdb_ids.json"))?),
        publications: Box::new(JsonKvStore::load(&cache_dir.join("published.json"))?),
    };

    let feed_paths = if args.feeds.is_empty() {
        discover_feeds(&root_folder.join("feeds"))?
    } else {
        args.feeds.clone()
    };
    let feeds: Vec<Box<dyn RecordFeed>> = feed_paths
        .iter()
        .filter_map(|p| JsonRecordFeed::from_path(p))
        .map(|f| Box::new(f) as Box<dyn RecordFeed>)
        .collect();
    info!("Provider feeds: {}", feeds.len());

    let mut pipeline = CatalogPipeline::new(
        catalog_config,
        sources,
        caches,
        cineboot_common::time::today(),
    );
    let report = pipeline.run_feeds(&feeds).await?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| root_folder.join("films.json"));
    let json = serde_json::to_vec_pretty(&report.films)?;
    write_atomic(&output, &json)?;

    info!(
        run_id = %report.run_id,
        films = report.films.len(),
        skipped = report.skipped.len(),
        unresolved = report.unresolved,
        "Catalog written to {}",
        output.display()
    );

    Ok(())
}

/// Every `*.json` directly under `dir`, sorted by name
fn discover_feeds(dir: &std::path::Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read feed folder {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();
    Ok(paths)
}
