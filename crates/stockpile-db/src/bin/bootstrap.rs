//! # Store Bootstrapper
//!
//! Initializes a Stockpile database: creates the tables and inserts the
//! baseline rows, then prints what each table holds.
//!
//! ## Usage
//! ```bash
//! # Configure from STOCKPILE_* environment variables
//! cargo run -p stockpile-db --bin bootstrap
//!
//! # Specific database file
//! cargo run -p stockpile-db --bin bootstrap -- --db ./data/stockpile.db
//!
//! # Schema only, no seed rows
//! cargo run -p stockpile-db --bin bootstrap -- --no-seed
//! ```
//!
//! Running it again against the same file changes nothing.

use std::env;

use stockpile_db::schema::TABLE_NAMES;
use stockpile_db::{Database, DbConfig, DbTarget};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut config = DbConfig::from_env()?;

    let args: Vec<String> = env::args().skip(1).collect();
    match parse_args(&args, &mut config) {
        Ok(Command::Run) => {}
        Ok(Command::Help) => {
            print!("{}", USAGE);
            return Ok(());
        }
        Err(message) => {
            eprintln!("{}", message);
            eprintln!();
            eprint!("{}", USAGE);
            std::process::exit(2);
        }
    }

    println!("Stockpile Store Bootstrapper");
    println!("============================");
    match &config.target {
        DbTarget::Memory => println!("Database: :memory:"),
        DbTarget::File(path) => println!("Database: {}", path.display()),
    }
    println!("Seed:     {}", config.seed);
    println!();

    let start = std::time::Instant::now();
    let db = Database::connect(config).await?;

    println!("✓ Initialized in {:?}", start.elapsed());
    println!("✓ Bootstrap runs: {}", db.bootstrap_runs());
    println!();

    for table in TABLE_NAMES {
        let sql = format!("SELECT COUNT(*) AS n FROM {}", table);
        let count = match db.query_one(&sql, &[]).await? {
            Some(row) => row.i64("n")?,
            None => 0,
        };
        println!("  {:<10} {:>6} rows", table, count);
    }

    println!();
    println!("✓ Bootstrap complete!");

    Ok(())
}

const USAGE: &str = "\
Stockpile Store Bootstrapper

Usage: bootstrap [OPTIONS]

Options:
  -d, --db <PATH>    Database file path (default: $STOCKPILE_DB_PATH or ./stockpile.db)
      --memory       Bootstrap a throwaway in-memory store
      --no-seed      Create tables only
  -h, --help         Show this help message
";

#[derive(Debug, PartialEq)]
enum Command {
    Run,
    Help,
}

/// Applies command-line overrides on top of the environment configuration.
fn parse_args(args: &[String], config: &mut DbConfig) -> Result<Command, String> {
    let mut args = args.iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" | "-d" => match args.next() {
                Some(path) if !path.starts_with('-') => {
                    config.target = DbTarget::File(path.into());
                }
                _ => return Err(format!("{} requires a <PATH> value", arg)),
            },
            "--memory" => config.target = DbTarget::Memory,
            "--no-seed" => config.seed = false,
            "--help" | "-h" => return Ok(Command::Help),
            other => return Err(format!("Unknown option: {}", other)),
        }
    }
    Ok(Command::Run)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,stockpile=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
