mod config;
mod dedup;
mod kleinanzeigen;
mod models;
mod run;
mod store;

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::WatchConfig;
use store::JsonFileStore;

/// Watches kleinanzeigen.de saved searches and records new listings
#[derive(Parser, Debug)]
#[command(name = "kleinanzeigen-watcher", version, about)]
struct Args {
    /// Path to the watch configuration file
    #[arg(long, default_value = "watcher.json")]
    config: PathBuf,

    /// Path to the JSON results store
    #[arg(long, default_value = "results.json")]
    store: PathBuf,

    /// Cap on result pages per search, overriding the configuration
    #[arg(long)]
    max_pages: Option<u32>,

    /// Stop paginating a search once a whole page is already known
    #[arg(long)]
    stop_on_known: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("🔎 Kleinanzeigen Watcher");

    let mut config = WatchConfig::load(&args.config).await?;
    if let Some(max_pages) = args.max_pages {
        config.settings.max_pages_per_search = max_pages;
    }
    if args.stop_on_known {
        config.settings.stop_on_known = true;
    }

    let active = config.searches.iter().filter(|s| s.active).count();
    if active == 0 {
        println!("No active searches configured.");
        return Ok(());
    }
    info!(
        "{} active search(es) from {}",
        active,
        args.config.display()
    );

    let store = JsonFileStore::new(&args.store);
    let report = run::run(&config, &store).await?;

    // Display new results
    if report.new_records.is_empty() {
        println!("No new results.");
    } else {
        println!("Added {} new row(s):", report.new_records.len());
        println!();
        for (i, record) in report.new_records.iter().enumerate() {
            let price = record
                .price_eur
                .map(|p| format!("{} €", p))
                .unwrap_or_else(|| "k.A.".to_string());
            println!("{}. {} ({})", i + 1, record.title, price);
            if let Some(km) = record.km {
                println!("   {} km", km);
            }
            println!("   {} | via '{}'", record.location, record.query);
            println!("   URL: {}", record.url);
            println!();
        }
        info!(
            "💾 Saved {} new listing(s) to {}",
            report.new_records.len(),
            args.store.display()
        );
    }

    let summary = &report.summary;
    info!(
        "✅ Done: {} search(es), {} failed, {} page(s), {} listing(s) seen, {} card(s) skipped",
        summary.searches_run,
        summary.searches_failed,
        summary.pages_fetched,
        summary.listings_seen,
        summary.skipped_cards
    );

    Ok(())
}
