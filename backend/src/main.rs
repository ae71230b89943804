//! Tradeflow CLI - BACI trade data to summary CSV tables
//!
//! # Main Commands
//!
//! ```bash
//! tradeflow run                      # Load, normalize, write every report
//! tradeflow run --jobs 8             # Same, 8 countries at a time
//! tradeflow general                  # World-level reports only
//! tradeflow interactive              # Per-country interactive tree only
//! tradeflow country-specific         # Bespoke country recipes only
//! ```
//!
//! # Data Commands
//!
//! ```bash
//! tradeflow normalize                # Build the fact-table cache
//! tradeflow cache info               # List cache files
//! tradeflow cache clear              # Delete cache files
//! tradeflow years                    # Yearly files present in the data dir
//! tradeflow countries                # Rewrite available_countries.json
//! tradeflow label in.csv --country-format country_iso3
//! ```

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tradeflow::logs::spawn_json_sink;
use tradeflow::parser::{decode_content, detect_delimiter, detect_encoding, parse_table};
use tradeflow::report::interactive::write_available_countries;
use tradeflow::report::writer::write_table;
use tradeflow::transform::mapper::make_human_readable_str;
use tradeflow::{
    build_fact_table, discover_years, loader, run, save_table, CacheRegistry, Config, Lookups,
    RunOptions, Stages, WriteOptions,
};

#[derive(Parser)]
#[command(name = "tradeflow")]
#[command(about = "Turn BACI trade data into summary CSV tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// First data year (default: TRADEFLOW_FIRST_YEAR or 1995)
    #[arg(long, global = true)]
    first_year: Option<u16>,

    /// Last data year, also the reference year (default: TRADEFLOW_LAST_YEAR or 2023)
    #[arg(long, global = true)]
    last_year: Option<u16>,

    /// BACI release directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Directory with GDP, CPI and the HS nomenclature
    #[arg(long, global = true)]
    other_data_dir: Option<PathBuf>,

    /// Root of the generated CSV tree
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Also write the run log as JSON lines to this file
    #[arg(long, global = true)]
    log_json: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write every report
    Run {
        /// Concurrent per-country jobs
        #[arg(short, long, default_value = "1")]
        jobs: usize,
    },

    /// World-level reports
    General,

    /// Per-country interactive reports
    Interactive {
        /// Concurrent per-country jobs
        #[arg(short, long, default_value = "1")]
        jobs: usize,
    },

    /// Bespoke country recipes
    CountrySpecific {
        /// Only the recipes of this ISO3 code
        #[arg(long)]
        only: Option<String>,
    },

    /// Build the normalized fact-table cache
    Normalize,

    /// Manage table caches
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// List years with a yearly trade file
    Years,

    /// Rewrite available_countries.json from the interactive tree
    Countries,

    /// Replace codes with labels in a CSV file
    Label {
        /// Input CSV file
        input: PathBuf,

        /// country_name, country_iso2 or country_iso3
        #[arg(long)]
        country_format: Option<String>,

        /// hscode or description
        #[arg(long)]
        product_format: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cache files
    Info,

    /// Delete cache files
    Clear,
}

type CmdResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = build_config(&cli);

    let sink = match &cli.log_json {
        Some(path) => {
            let (tx, rx) = tokio::sync::oneshot::channel();
            match spawn_json_sink(path, rx).await {
                Ok(handle) => Some((tx, handle)),
                Err(e) => {
                    eprintln!("⚠️  Could not open log file {}: {}", path.display(), e);
                    None
                }
            }
        }
        None => None,
    };

    let result = match cli.command {
        Commands::Run { jobs } => cmd_run(&config, Stages::ALL, jobs, None).await,

        Commands::General => cmd_run(&config, Stages::GENERAL, 1, None).await,

        Commands::Interactive { jobs } => cmd_run(&config, Stages::INTERACTIVE, jobs, None).await,

        Commands::CountrySpecific { only } => cmd_run(&config, Stages::COUNTRY_SPECIFIC, 1, only).await,

        Commands::Normalize => cmd_normalize(&config),

        Commands::Cache { action } => cmd_cache(&config, action),

        Commands::Years => cmd_years(&config),

        Commands::Countries => cmd_countries(&config),

        Commands::Label {
            input,
            country_format,
            product_format,
            output,
        } => cmd_label(
            &config,
            &input,
            country_format.as_deref(),
            product_format.as_deref(),
            output.as_deref(),
        ),
    };

    if let Some((tx, handle)) = sink {
        let _ = tx.send(());
        let _ = handle.await;
    }

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// Environment (and `.env`) first, then command-line overrides.
fn build_config(cli: &Cli) -> Config {
    let mut config = Config::from_env();
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(dir) = &cli.other_data_dir {
        config.other_data_dir = dir.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if cli.first_year.is_some() || cli.last_year.is_some() {
        let first = cli.first_year.or(config.years.first().copied()).unwrap_or(config.reference_year);
        let last = cli.last_year.unwrap_or(config.reference_year);
        config = config.with_years(first, last);
    }
    config
}

async fn cmd_run(config: &Config, stages: Stages, jobs: usize, only_country: Option<String>) -> CmdResult {
    eprintln!("📄 Data: {}", config.data_dir.display());
    eprintln!(
        "   Years: {}-{} (reference {})",
        config.years.first().copied().unwrap_or_default(),
        config.years.last().copied().unwrap_or_default(),
        config.reference_year
    );
    eprintln!("   Output: {}", config.output_dir.display());

    let opts = RunOptions {
        stages,
        jobs,
        only_country,
    };
    let summary = run(config, &opts).await?;
    let total = summary.total();

    eprintln!("\n📊 {} flows", summary.flows);
    eprintln!("   ✅ Written: {}", total.written);
    if total.failed > 0 {
        eprintln!("   ❌ Failed: {}", total.failed);
    }
    if total.skipped > 0 {
        eprintln!("   ⚠️  Skipped: {}", total.skipped);
    }
    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_normalize(config: &Config) -> CmdResult {
    eprintln!("⚙️  Normalizing {} year(s)", config.years.len());
    let count = build_fact_table(config)?;
    eprintln!("✅ {} flows cached", count);
    Ok(())
}

fn cmd_cache(config: &Config, action: CacheAction) -> CmdResult {
    let registry = CacheRegistry::new([&config.data_dir, &config.other_data_dir]);

    match action {
        CacheAction::Info => {
            let entries = registry.list();
            if entries.is_empty() {
                eprintln!("📋 No cache files yet.");
                eprintln!("   Use 'tradeflow normalize' to build the fact-table cache.");
                return Ok(());
            }

            eprintln!("📋 Cache files ({}):\n", entries.len());
            for entry in entries {
                println!("  💾 {}", entry.path.display());
                println!("     Size: {:.1} MiB", entry.size_bytes as f64 / (1024.0 * 1024.0));
                if let Some(modified) = entry.modified {
                    println!("     Modified: {}", modified.to_rfc3339());
                }
            }
        }

        CacheAction::Clear => {
            let removed = registry.clear()?;
            eprintln!("🗑️  Removed {} cache file(s)", removed);
        }
    }

    Ok(())
}

fn cmd_years(config: &Config) -> CmdResult {
    let years = discover_years(&config.data_dir)?;
    eprintln!("📅 {} yearly file(s) in {}", years.len(), config.data_dir.display());
    for year in years {
        let marker = if config.years.contains(&year) { "✓" } else { " " };
        println!("  {} {}", marker, year);
    }
    Ok(())
}

fn cmd_countries(config: &Config) -> CmdResult {
    let dir = config.interactive_dir();
    let names = write_available_countries(&dir)?;
    eprintln!("✅ Found {} countries, written to {}", names.len(), dir.join("available_countries.json").display());
    Ok(())
}

fn cmd_label(
    config: &Config,
    input: &Path,
    country_format: Option<&str>,
    product_format: Option<&str>,
    output: Option<&Path>,
) -> CmdResult {
    eprintln!("🏷️  Labelling: {}", input.display());

    let bytes = fs::read(input)?;
    let content = decode_content(&bytes, &detect_encoding(&bytes));
    let table = parse_table(&content, detect_delimiter(&content))?;
    eprintln!("   {} rows, columns: {}", table.len(), table.columns().join(", "));

    let countries = loader::load_required(&config.country_codes_path())?;
    let chapters = loader::load_chapters(config)?;
    let lookups = Lookups::new(&countries, &chapters);
    let labelled = make_human_readable_str(table, &lookups, country_format, product_format)?;

    match output {
        Some(path) => {
            save_table(&labelled, path, WriteOptions::default())?;
            eprintln!("💾 Output written to: {}", path.display());
        }
        None => write_table(&labelled, std::io::stdout().lock(), WriteOptions::default())?,
    }
    Ok(())
}
