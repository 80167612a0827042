//! Bowerbird main entry point
//!
//! Command-line interface for the Bowerbird marketplace catalog harvester.

use bowerbird::config::load_config_with_hash;
use bowerbird::market::run_harvest;
use bowerbird::storage::{CatalogStore, SqliteCatalog};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Bowerbird: a marketplace catalog harvester
///
/// Bowerbird walks the paginated category listings of a marketplace,
/// validates each entry against its detail page, enriches accepted entries
/// through the marketplace API, and stores everything in SQLite.
#[derive(Parser, Debug)]
#[command(name = "bowerbird")]
#[command(version)]
#[command(about = "A marketplace catalog harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be harvested without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        run_harvest(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("bowerbird=info,warn"),
            1 => EnvFilter::new("bowerbird=debug,info"),
            2 => EnvFilter::new("bowerbird=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would run
fn handle_dry_run(config: &bowerbird::Config) {
    println!("=== Bowerbird Dry Run ===\n");

    println!("Crawl:");
    println!(
        "  Request budget: {}/minute",
        config.crawl.requests_per_minute
    );
    println!("  Max workers per category: {}", config.crawl.max_workers);
    println!("  Stall passes: {}", config.crawl.stall_passes);

    println!("\nMarketplace:");
    println!("  Base URL: {}", config.market.base_url);
    if config.market.categories.is_empty() {
        println!("  Categories: discovered from the marketplace navigation");
    } else {
        println!("  Categories ({}):", config.market.categories.len());
        for category in &config.market.categories {
            println!("    - {}", category);
        }
    }
    println!(
        "  Placeholder category: {}",
        config.market.placeholder_category
    );

    println!("\nEnrichment API:");
    println!("  Endpoint: {}", config.api.endpoint);
    println!("  Credentials: {}", config.api.tokens.len());
    println!("  Quota poll interval: {}s", config.api.quota_poll_seconds);

    println!("\nFields:");
    println!("  versions:     {}", config.fields.versions);
    println!("  issues:       {}", config.fields.issues);
    println!("  contributors: {}", config.fields.contributors);
    println!("  stars:        {}", config.fields.stars);
    println!("  watchers:     {}", config.fields.watchers);
    println!("  forks:        {}", config.fields.forks);
    println!("  dependents:   {}", config.fields.dependents);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &bowerbird::Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let store = SqliteCatalog::new(Path::new(&config.output.database_path))?;

    let total = store.count_entries()?;
    println!("Entries: {}", total);

    let counts = store.category_counts()?;
    if !counts.is_empty() {
        println!("\nBy category:");
        for (category, count) in counts {
            println!("  {:<30} {}", category, count);
        }
    }

    Ok(())
}
