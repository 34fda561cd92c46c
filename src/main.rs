use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use rivulet::config::Config;
use rivulet::feed;
use rivulet::refresh::{FetchOutcome, Refresher, RefreshOptions};
use rivulet::store::{NewEntry, Store, StoreError};
use rivulet::wire::{fetch_feeds, FetchRequest};

/// Get the config directory path (~/.config/rivulet/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("rivulet"))
}

#[derive(Parser, Debug)]
#[command(name = "rivulet", about = "Concurrent feed fetcher and aggregator")]
struct Args {
    /// Database file (defaults to ~/.config/rivulet/feeds.db)
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,

    /// Config file (defaults to ~/.config/rivulet/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Subscribe to a feed or page URL
    #[arg(long, value_name = "URL")]
    add: Option<String>,

    /// Refresh even if the cooldown window has not elapsed
    #[arg(long)]
    force: bool,

    /// Collapse duplicate feeds and entries, then exit
    #[arg(long)]
    dedup: bool,

    /// Print recent refresh history, then exit
    #[arg(long)]
    history: bool,

    /// Fetch the given URLs without touching the store and print JSON
    #[arg(long, value_name = "URL", num_args = 1..)]
    probe: Option<Vec<String>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path).context("Failed to load configuration")?;

    let client = reqwest::Client::builder()
        .user_agent(concat!("rivulet/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;

    // --probe is storeless: fetch, print, exit
    if let Some(urls) = args.probe {
        let request = FetchRequest {
            urls,
            force_refresh: true,
        };
        let response = fetch_feeds(&client, &request, config.batch_size).await;
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let db_path = args
        .db
        .or_else(|| config.db_path.clone())
        .unwrap_or_else(|| config_dir.join("feeds.db"));
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let store = match Store::open(db_path_str).await {
        Ok(store) => store,
        Err(StoreError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of rivulet appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    if let Some(raw) = args.add {
        return add_feed(&client, &store, &raw).await;
    }

    if args.dedup {
        let report = store.deduplicate().await?;
        if report.is_clean() {
            println!("No duplicates found.");
        } else {
            println!(
                "Removed {} duplicate feeds, {} duplicate entries, {} orphaned entries.",
                report.feeds_removed, report.entries_removed, report.orphans_removed
            );
        }
        return Ok(());
    }

    if args.history {
        let records = store.recent_history(20).await?;
        if records.is_empty() {
            println!("No refresh history yet.");
        }
        for record in records {
            let started = Utc
                .timestamp_opt(record.started_at, 0)
                .single()
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| record.started_at.to_string());
            let status = record
                .error_message
                .unwrap_or_else(|| "ok".to_string());
            println!(
                "{}  {} new entries  [{}]",
                started,
                record.added_titles.len(),
                status
            );
        }
        return Ok(());
    }

    // Default action: run one refresh cycle
    let refresher = Refresher::new(store, client).with_options(RefreshOptions {
        batch_size: config.batch_size,
        cooldown: Duration::from_secs(config.cooldown_minutes * 60),
        ..RefreshOptions::default()
    });

    let run = refresher
        .refresh(
            args.force,
            Duration::from_secs(config.timeout_secs),
            config.retry_count,
        )
        .await?;

    match run {
        None => println!("Refresh skipped (cooldown active, use --force to override)."),
        Some(run) => {
            println!(
                "Refreshed {} feeds: {} new entries, {} ok, {} timed out, {} failed.",
                run.outcomes.len(),
                run.entries_added,
                run.successes,
                run.timeouts,
                run.errors
            );
            for (url, outcome) in &run.outcomes {
                match outcome {
                    FetchOutcome::Success { added } if *added > 0 => {
                        println!("  {} (+{})", url, added);
                    }
                    FetchOutcome::Success { .. } => {}
                    FetchOutcome::Timeout => println!("  {} (timed out)", url),
                    FetchOutcome::Error(error) => println!("  {} ({})", url, error),
                }
            }
        }
    }
    Ok(())
}

/// Subscribe to a feed, following HTML pages to their linked feed document.
async fn add_feed(client: &reqwest::Client, store: &Store, raw: &str) -> Result<()> {
    let url = Url::parse(raw).with_context(|| format!("Invalid URL: {raw}"))?;
    let fetched = feed::fetch_feed(client, &url)
        .await
        .context("Failed to fetch feed")?;

    let canonical = rivulet::util::url::canonicalize(&fetched.url);
    if let Some(existing) = store.find_feed_by_canonical(&canonical).await? {
        println!("Already subscribed: {} ({})", existing.title, existing.url);
        return Ok(());
    }

    let feed_id = store
        .insert_feed(
            &fetched.url,
            &fetched.title,
            fetched.page_url.as_ref().map(Url::as_str),
            fetched.overview.as_deref(),
            fetched.image_url.as_ref().map(Url::as_str),
        )
        .await?;
    let entries: Vec<NewEntry> = fetched.entries.iter().cloned().map(Into::into).collect();
    let added = store.insert_entries(feed_id, &entries).await?;
    println!("Subscribed to {} ({} entries).", fetched.title, added);
    Ok(())
}
