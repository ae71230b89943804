//! Error types for the tradeflow pipeline.
//!
//! One enum per layer, mirroring the order data flows through the run:
//!
//! - [`CsvError`] - decoding and parsing input CSV files
//! - [`LoadError`] - locating inputs and the binary table cache
//! - [`NormalizeError`] - raw symbolic columns to semantic trade flows
//! - [`AggregateError`] - GDP/CPI normalization preconditions
//! - [`MappingError`] - code to human-readable label translation
//! - [`WriteError`] - CSV/JSON output
//! - [`PipelineError`] - top-level orchestration
//!
//! Every lower-level error converts into [`PipelineError`] through `From`,
//! so `?` works across layer boundaries.

use std::path::PathBuf;

use thiserror::Error;

// =============================================================================
// CSV Parsing Errors
// =============================================================================

/// Errors while decoding and parsing a CSV file.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Row could not be deserialized into the expected record.
    #[error("Line {line}: {message}")]
    ParseError { line: u64, message: String },

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        CsvError::ParseError {
            line,
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Loading Errors
// =============================================================================

/// Errors while locating input tables or reading the binary cache.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Neither the CSV nor its cache exists.
    #[error("Input not found: {0}")]
    NotFound(PathBuf),

    /// The table exists but holds no rows.
    #[error("Input table is empty: {0}")]
    EmptyInput(PathBuf),

    /// CSV parsing failed.
    #[error("{path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: CsvError,
    },

    /// Cache file could not be (de)serialized.
    #[error("Cache error for {path}: {message}")]
    Cache { path: PathBuf, message: String },

    /// IO error.
    #[error("Load IO error: {0}")]
    IoError(#[from] std::io::Error),
}

// =============================================================================
// Normalization Errors
// =============================================================================

/// Errors while converting raw trade records into trade flows.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// A raw symbolic column (`t`, `i`, `j`, `k`, `v`, `q`) is absent.
    #[error("Missing raw column '{symbol}' ({name})")]
    MissingColumn { symbol: String, name: String },

    /// Product code too short to derive a chapter.
    #[error("Product code '{0}' has no 2-digit chapter")]
    InvalidProductCode(String),
}

// =============================================================================
// Aggregation Errors
// =============================================================================

/// Errors from aggregations that carry preconditions.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// Inflation target year missing from the CPI table.
    #[error("Target year {0} not found in CPI data")]
    TargetYearMissing(u16),

    /// CPI and nominal series must cover the same years.
    #[error("CPI and nominal series have different lengths - {cpi} vs ({nominal})")]
    LengthMismatch { cpi: usize, nominal: usize },

    /// A year present in the nominal series has no CPI value.
    #[error("No CPI value for year {0}")]
    CpiYearMissing(u16),
}

// =============================================================================
// Mapping Errors
// =============================================================================

/// Errors from human-readable mapping.
#[derive(Debug, Error)]
pub enum MappingError {
    /// Called without any format.
    #[error("Called without specifying any format")]
    NoFormat,

    /// Unknown country format string.
    #[error("Country format {0} is invalid")]
    InvalidCountryFormat(String),

    /// Unknown product format string.
    #[error("Product format {0} is invalid")]
    InvalidProductFormat(String),

    /// Country format requested but the table has no country column.
    #[error("No expected column in {0:?}")]
    NoCountryColumn(Vec<String>),

    /// Product format requested but the table has no chapter column.
    #[error("No column product_chapter in {0:?}")]
    NoChapterColumn(Vec<String>),

    /// Code without a lookup entry.
    #[error("Code {0} not found in lookup table")]
    MissingCode(String),

    /// Label without a reverse lookup entry.
    #[error("Label {0} not found in lookup table")]
    MissingLabel(String),
}

// =============================================================================
// Write Errors
// =============================================================================

/// Errors while persisting output files.
#[derive(Debug, Error)]
pub enum WriteError {
    /// IO error (directory creation, file open).
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV serialization error.
    #[error("CSV error writing {path}: {message}")]
    Csv { path: PathBuf, message: String },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input loading error.
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// Normalization error.
    #[error("Normalize error: {0}")]
    Normalize(#[from] NormalizeError),

    /// Aggregation error.
    #[error("Aggregate error: {0}")]
    Aggregate(#[from] AggregateError),

    /// Mapping error.
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// Write error.
    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    /// Some per-country jobs failed; every other job ran to completion.
    #[error("{} country job(s) failed: {}", .0.len(), .0.join("; "))]
    CountriesFailed(Vec<String>),

    /// A worker task panicked or was cancelled.
    #[error("Worker task failed: {0}")]
    Worker(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for mapping operations.
pub type MappingResult<T> = Result<T, MappingError>;

/// Result type for write operations.
pub type WriteResult<T> = Result<T, WriteError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let load_err = LoadError::EmptyInput(PathBuf::from("cpi.csv"));
        let pipeline_err: PipelineError = load_err.into();
        assert!(pipeline_err.to_string().contains("cpi.csv"));

        let mapping_err = MappingError::MissingCode("999".into());
        let pipeline_err: PipelineError = mapping_err.into();
        assert!(pipeline_err.to_string().contains("999"));
    }

    #[test]
    fn test_invalid_format_names_value() {
        let err = MappingError::InvalidCountryFormat("country_iso4".into());
        assert!(err.to_string().contains("country_iso4"));
    }

    #[test]
    fn test_countries_failed_lists_all() {
        let err = PipelineError::CountriesFailed(vec!["FRA: disk full".into(), "DEU: disk full".into()]);
        let msg = err.to_string();
        assert!(msg.starts_with("2 country job(s) failed"));
        assert!(msg.contains("FRA"));
        assert!(msg.contains("DEU"));
    }
}
