//! # Tradeflow - international trade summary tables
//!
//! Tradeflow turns the BACI HS92 bilateral trade dataset (country × country ×
//! product × year) into the summary CSV tables behind a trade visualization
//! front-end.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ BACI yearly │────▶│  Loader +   │────▶│ Normalizer  │────▶│ Aggregator/ │────▶│ Mapper +    │
//! │  CSV files  │     │ bin. cache  │     │ (chapters)  │     │   Ranker    │     │ CSV writers │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tradeflow::{run, Config, RunOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env();
//!     let summary = run(&config, &RunOptions::default()).await.unwrap();
//!     println!("Wrote {} files", summary.total().written);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Paths, data years, chapter groups
//! - [`error`] - Hierarchical error types
//! - [`models`] - Trade records, reference rows, aggregates, tables
//! - [`parser`] - CSV parsing with auto-detection
//! - [`cache`] - Binary table cache
//! - [`loader`] - Input loading and the fact table
//! - [`transform`] - Normalize, aggregate, rank, label
//! - [`report`] - General, interactive and country-specific reports
//! - [`pipeline`] - Run orchestration
//! - [`logs`] - Log broadcasting

// Core modules
pub mod config;
pub mod error;
pub mod logs;
pub mod models;

// Input
pub mod cache;
pub mod loader;
pub mod parser;

// Transformation
pub mod transform;

// Output
pub mod pipeline;
pub mod report;

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{Config, FOOD_CHAPTERS, FUEL_CHAPTER};

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    AggregateError,
    CsvError,
    LoadError,
    MappingError,
    NormalizeError,
    PipelineError,
    PipelineResult,
    WriteError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    Cell,
    ChapterRef,
    CountryCode,
    CountryRef,
    RankedRow,
    RawTradeRecord,
    Table,
    TradeFlow,
    TradeRole,
};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content,
    detect_delimiter,
    detect_encoding,
    parse_bytes_auto,
    parse_csv_file_auto,
    ParseResult,
};

// =============================================================================
// Re-exports - Cache
// =============================================================================

pub use cache::{CacheEntry, CacheRegistry};

// =============================================================================
// Re-exports - Loader
// =============================================================================

pub use loader::{discover_years, load_all_data, Dataset};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    make_human_readable,
    normalize,
    top_n_with_other,
    CountryFormat,
    Lookups,
    ProductFormat,
};

// =============================================================================
// Re-exports - Reports
// =============================================================================

pub use report::{save_table, try_save_table, ReportTally, WriteOptions};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use pipeline::{build_fact_table, run, run_on_dataset, RunOptions, RunSummary, Stages};
