//! CLI commands implementation.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;

use crate::config::{write_default_settings, Settings};
use crate::models::RawCardRecord;
use crate::orchestrator::{persist_records, CrawlOrchestrator};
use crate::store::CardStore;

#[derive(Parser)]
#[command(name = "cardscout")]
#[command(about = "Bank credit-card information crawler")]
#[command(version)]
pub struct Cli {
    /// Data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory, settings file and database
    Init,

    /// Crawl card information for all banks (or one with --bank)
    Crawl {
        /// Only crawl this bank
        #[arg(short, long)]
        bank: Option<String>,
        /// Number of concurrent bank units
        #[arg(short, long, default_value = "1")]
        workers: usize,
    },

    /// Locate each bank's credit-card page without extracting cards
    Locate,

    /// Import card records from an earlier crawl's JSON audit file
    Import {
        /// A credit_cards_<stamp>.json file
        file: PathBuf,
    },

    /// List stored cards
    Cards {
        /// Only list this bank's cards
        #[arg(short, long)]
        bank: Option<String>,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.data_dir.clone())?;

    match cli.command {
        Commands::Init => init(&settings),
        Commands::Crawl { bank, workers } => crawl(settings, bank.as_deref(), workers).await,
        Commands::Locate => locate(settings).await,
        Commands::Import { file } => import(&settings, &file),
        Commands::Cards { bank } => cards(&settings, bank.as_deref()),
    }
}

fn init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_dirs()?;
    let settings_path = write_default_settings(&settings.data_dir)?;
    let store = CardStore::new(settings.database_path());
    store.init()?;
    println!(
        "{} data directory {}",
        style("Initialized").green().bold(),
        settings.data_dir.display()
    );
    println!("  settings: {}", settings_path.display());
    println!("  database: {}", store.path().display());
    Ok(())
}

async fn crawl(settings: Settings, bank: Option<&str>, workers: usize) -> anyhow::Result<()> {
    let workers = workers.max(1);
    let orchestrator = CrawlOrchestrator::new(settings);
    let report = orchestrator.run(bank, workers).await?;

    println!(
        "{} {}/{} banks, {} records extracted, {} persisted",
        style("Crawl finished:").green().bold(),
        report.banks_succeeded(),
        report.banks_attempted,
        report.records_extracted,
        report.records_persisted
    );
    if report.records_skipped > 0 {
        println!(
            "  {} {} records skipped at persistence",
            style("!").yellow(),
            report.records_skipped
        );
    }
    for (bank, reason) in &report.banks_failed {
        println!("  {} {}: {}", style("✗").red(), bank, reason);
    }
    Ok(())
}

async fn locate(settings: Settings) -> anyhow::Result<()> {
    let total = settings.banks.len();
    let orchestrator = CrawlOrchestrator::new(settings);
    let located = orchestrator.locate().await?;

    println!(
        "{} {}/{} credit-card pages",
        style("Located").green().bold(),
        located.len(),
        total
    );
    for page in &located {
        println!("  {} {} ({})", page.bank_name, page.url, page.discovery_method);
    }
    Ok(())
}

fn import(settings: &Settings, file: &PathBuf) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)?;
    let records: Vec<RawCardRecord> = serde_json::from_str(&raw)?;

    let store = CardStore::new(settings.database_path());
    store.init()?;
    let outcome = persist_records(&store, &records);

    println!(
        "{} {} records, {} skipped",
        style("Imported").green().bold(),
        outcome.persisted,
        outcome.skipped
    );
    Ok(())
}

fn cards(settings: &Settings, bank: Option<&str>) -> anyhow::Result<()> {
    let store = CardStore::new(settings.database_path());
    store.init()?;
    let cards = store.list(bank)?;
    if cards.is_empty() {
        println!("No cards stored yet. Run {} first.", style("crawl").cyan());
        return Ok(());
    }

    let mut current_bank = String::new();
    for card in &cards {
        if card.bank != current_bank {
            current_bank = card.bank.clone();
            println!("\n{}", style(&current_bank).bold());
        }
        let level = card.level.as_deref().unwrap_or("-");
        let fee = card
            .annual_fee
            .regular
            .as_deref()
            .or(card.annual_fee.first_year.as_deref())
            .unwrap_or("-");
        println!("  {}  [{}]  年费: {}", card.name, level, fee);
    }
    println!("\n{} cards total", cards.len());
    Ok(())
}
