use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// Use library instead of local modules
use ygo_library::{
    db, export_csv, spawn_refresh, AppConfig, AutoPick, CancelFlag, CatalogSource, ImageCache,
    LogSink, PromptChooser, RarityChooser, ReconciliationEngine, YgoProClient,
};

#[derive(Parser)]
#[command(name = "ygo-library", version, about = "Reconcile a card collection CSV against the YGOPRODeck catalog")]
struct Cli {
    /// SQLite library file
    #[arg(long, env = "COLLECTORKING_DB")]
    db: Option<PathBuf>,

    /// Directory for downloaded card images
    #[arg(long, env = "COLLECTORKING_IMAGE_DIR")]
    images: Option<PathBuf>,

    /// Catalog API base URL
    #[arg(long, env = "COLLECTORKING_CATALOG_URL")]
    catalog_url: Option<String>,

    /// Verbose logging
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import a collection CSV
    Import {
        csv: PathBuf,
        /// Ask on stdin when a set code has several rarities
        #[arg(long)]
        interactive: bool,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-price every card in the library
    Refresh,
    /// Write the library to a CSV file
    Export { csv: PathBuf },
    /// Change how many copies of a card are owned
    SetQty { set_code: String, qty: i64 },
    /// Show the library and its total value
    List,
    /// Reconcile a single card
    Add {
        set_code: String,
        #[arg(long)]
        rarity: Option<String>,
        #[arg(long)]
        qty: Option<i64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_level())).init();

    match &cli.command {
        Command::Import { csv, interactive, json } => run_import(&config, csv, *interactive, *json),
        Command::Refresh => run_refresh(&config),
        Command::Export { csv } => run_export(&config, csv),
        Command::SetQty { set_code, qty } => run_set_qty(&config, set_code, *qty),
        Command::List => run_list(&config),
        Command::Add { set_code, rarity, qty } => run_add(&config, set_code, rarity.as_deref(), *qty),
    }
}

/// Defaults → environment → flags
fn resolve_config(cli: &Cli) -> AppConfig {
    let mut config = AppConfig::from_env();
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    if let Some(dir) = &cli.images {
        config.image_dir = dir.clone();
    }
    if let Some(url) = &cli.catalog_url {
        config.catalog_base_url = url.clone();
    }
    config.debug |= cli.debug;
    config
}

fn catalog_client(config: &AppConfig) -> Result<YgoProClient> {
    YgoProClient::new(&config.catalog_base_url, config.metadata_timeout, config.image_timeout)
        .context("Failed to create catalog client")
}

fn run_import(config: &AppConfig, csv_path: &Path, interactive: bool, json: bool) -> Result<()> {
    println!("📂 Importing {}...", csv_path.display());

    let conn = db::open_database(&config.db_path)?;
    let catalog = catalog_client(config)?;
    let images = ImageCache::new(&config.image_dir);

    let prompt = PromptChooser::new(BufReader::new(io::stdin()), io::stderr());
    let chooser: &dyn RarityChooser = if interactive { &prompt } else { &AutoPick };

    let engine = ReconciliationEngine::new(&conn, &catalog, &images, &LogSink).with_row_delay(config.row_delay);
    let summary = engine
        .import_file(csv_path, chooser, &CancelFlag::new())
        .with_context(|| format!("Import of {} failed", csv_path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("{}", summary.summary());
        println!("✓ Library contains {} cards", db::verify_count(&conn)?);
    }

    Ok(())
}

fn run_refresh(config: &AppConfig) -> Result<()> {
    println!("💱 Refreshing prices...");

    let catalog: Arc<dyn CatalogSource> = Arc::new(catalog_client(config)?);
    let handle = spawn_refresh(config.db_path.clone(), catalog, Arc::new(LogSink), config.row_delay);

    let summary = handle.wait()?;
    println!("✓ Prices refreshed: {} updated, {} failed", summary.updated, summary.failed);

    Ok(())
}

fn run_export(config: &AppConfig, csv_path: &Path) -> Result<()> {
    let conn = db::open_database(&config.db_path)?;
    let count = export_csv(&conn, csv_path)?;
    println!("✓ Exported {} cards to {}", count, csv_path.display());

    Ok(())
}

fn run_set_qty(config: &AppConfig, set_code: &str, qty: i64) -> Result<()> {
    let conn = db::open_database(&config.db_path)?;
    if db::set_quantity(&conn, set_code, qty)? {
        println!("✓ {} quantity set to {}", set_code, qty.max(0));
    } else {
        eprintln!("❌ {} is not in the library", set_code);
        std::process::exit(1);
    }

    Ok(())
}

fn run_list(config: &AppConfig) -> Result<()> {
    let conn = db::open_database(&config.db_path)?;
    let cards = db::get_all_cards(&conn)?;

    for card in &cards {
        println!(
            "{:<14} {:<40} {:<28} x{:<3} ${:>9.2}",
            card.set_code,
            card.name,
            card.rarity,
            card.quantity,
            card.line_total()
        );
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("{} cards, total value ${:.2}", cards.len(), db::collection_total(&cards));

    Ok(())
}

fn run_add(config: &AppConfig, set_code: &str, rarity: Option<&str>, qty: Option<i64>) -> Result<()> {
    let conn = db::open_database(&config.db_path)?;
    let catalog = catalog_client(config)?;
    let images = ImageCache::new(&config.image_dir);
    let prompt = PromptChooser::new(BufReader::new(io::stdin()), io::stderr());

    let card = ReconciliationEngine::new(&conn, &catalog, &images, &LogSink)
        .reconcile(set_code, rarity, qty, &prompt)
        .with_context(|| format!("Could not add {}", set_code))?;

    println!(
        "✓ {} - {} [{}] x{} @ ${:.2}",
        card.set_code,
        card.name,
        if card.rarity.is_empty() { "unknown rarity" } else { card.rarity.as_str() },
        card.quantity,
        card.price
    );

    Ok(())
}
