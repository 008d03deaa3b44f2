//! Tally CLI
//!
//! Command-line interface for local store maintenance:
//! - Print a starter configuration
//! - Seed a fresh store with example metrics
//! - Export / import CSV
//! - Purge all data

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use tally::config::{self, Config};
use tally::store::{MetricSpec, Store, UnitSpec, UnitType};
use tally::transfer;

#[derive(Parser)]
#[command(name = "tally")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Personal metric tracking over an embedded store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Store database file (defaults to the configured path)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print a starter config.toml to stdout
    Config,

    /// Create a handful of example categories and metrics
    Seed,

    /// Export everything as CSV
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a CSV export, creating missing metrics
    Import {
        /// CSV file to read
        file: PathBuf,
    },

    /// Delete all categories, metrics, entries and change events
    Purge {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "tally=warn".to_string()),
        )
        .init();

    let cli = Cli::parse();

    let db_path = cli
        .db
        .unwrap_or_else(|| PathBuf::from(Config::load_default().store.db_path));

    match cli.command {
        Commands::Config => {
            print!("{}", config::generate_default_config());
        }
        Commands::Seed => {
            let store = open(&db_path)?;
            seed(&store)?;
            println!("Seeded example metrics in {}", db_path.display());
        }
        Commands::Export { output } => {
            let store = open(&db_path)?;
            let csv = transfer::export_csv(&store)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, csv)?;
                    println!("Exported to {}", path.display());
                }
                None => print!("{}", csv),
            }
        }
        Commands::Import { file } => {
            let store = open(&db_path)?;
            let data = std::fs::read_to_string(&file)?;
            let report = transfer::import_csv(&store, &data)?;
            println!(
                "Imported {} entries, {} change events ({} metrics created)",
                report.entries_imported, report.changes_imported, report.metrics_created
            );
            for error in &report.errors {
                eprintln!("line {}: {}", error.line, error.message);
            }
        }
        Commands::Purge { yes } => {
            if !yes && !confirm(&format!("Delete ALL data in {}?", db_path.display()))? {
                println!("Aborted");
                return Ok(());
            }
            let store = open(&db_path)?;
            store.purge()?;
            println!("Purged {}", db_path.display());
        }
    }

    Ok(())
}

fn open(path: &Path) -> anyhow::Result<Store> {
    Ok(Store::open(path)?)
}

/// Ask a yes/no question on stdin
fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn seed(store: &Store) -> anyhow::Result<()> {
    let body = store.ensure_category("body")?;
    let mind = store.ensure_category("mind")?;

    let examples = [
        MetricSpec {
            name: "weight".to_string(),
            description: Some("Morning weight".to_string()),
            category_id: Some(body.id),
            unit: UnitSpec::new(UnitType::Float).name("kg"),
        },
        MetricSpec {
            name: "steps".to_string(),
            description: None,
            category_id: Some(body.id),
            unit: UnitSpec::new(UnitType::Integer).name("count"),
        },
        MetricSpec {
            name: "mood".to_string(),
            description: Some("Subjective mood score".to_string()),
            category_id: Some(mind.id),
            unit: UnitSpec::new(UnitType::IntegerRange).name("score").range(1, 10),
        },
    ];

    let today = chrono::Utc::now().date_naive();
    for spec in &examples {
        match store.create_metric(spec) {
            Ok(metric) => {
                // A few days of demo data so stats have something to chew on
                let demo = match metric.name.as_str() {
                    "weight" => [82.1, 81.8, 81.4],
                    "steps" => [7200.0, 10450.0, 8900.0],
                    _ => [6.0, 7.0, 8.0],
                };
                for (i, value) in demo.iter().enumerate() {
                    let date = today - chrono::Duration::days((demo.len() - 1 - i) as i64);
                    store.add_entry(metric.id, *value, date, None)?;
                }
                println!("Created metric '{}' with {} demo entries", metric.name, demo.len());
            }
            Err(tally::store::StoreError::DuplicateName { name, .. }) => {
                println!("Metric '{}' already exists, skipping", name)
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
