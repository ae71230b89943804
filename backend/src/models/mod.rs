//! Domain models for the tradeflow pipeline.
//!
//! - [`RawTradeRecord`] - one row of a yearly BACI file (symbolic columns)
//! - [`TradeFlow`] - normalized fact row, one per (year, exporter, importer, chapter)
//! - [`CountryRef`], [`ChapterRef`], [`ProductRef`] - reference tables
//! - [`GdpPoint`], [`CountryGdpPoint`], [`CpiPoint`] - macro series
//! - [`Totals`], [`CountryTotals`], [`ChapterTotals`], [`CountryChapterFlow`] - aggregates
//! - [`RankedRow`] - one row of a top-N+Other table
//! - [`Table`] - column-ordered table handed to the mapper and writer

pub mod table;

use serde::{Deserialize, Serialize};

pub use table::{Cell, Table};

/// Numeric country code as used by BACI (ISO 3166 numeric, with BACI extras).
pub type CountryCode = u32;

// =============================================================================
// Trade Records
// =============================================================================

/// One row of a yearly BACI file.
///
/// `v` is in thousands of USD, `q` in metric tons. BACI leaves `q` blank
/// (or `NA`) when the quantity is unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTradeRecord {
    pub t: u16,
    pub i: CountryCode,
    pub j: CountryCode,
    pub k: String,
    pub v: f64,
    #[serde(default, deserialize_with = "deserialize_optional_float")]
    pub q: Option<f64>,
}

/// Normalized trade flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeFlow {
    pub year: u16,
    pub exporter: CountryCode,
    pub importer: CountryCode,
    pub product_chapter: String,
    pub value_trln_usd: f64,
    pub quantity_mln_metric_tons: f64,
}

/// Which side of a flow a country is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeRole {
    Exporter,
    Importer,
}

impl TradeRole {
    /// The country on this side of `flow`.
    pub fn of(self, flow: &TradeFlow) -> CountryCode {
        match self {
            TradeRole::Exporter => flow.exporter,
            TradeRole::Importer => flow.importer,
        }
    }

    /// Column name used in output tables.
    pub fn column(self) -> &'static str {
        match self {
            TradeRole::Exporter => "exporter",
            TradeRole::Importer => "importer",
        }
    }
}

// =============================================================================
// Reference Tables
// =============================================================================

/// Country reference row (`country_codes_V202501.csv`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryRef {
    pub country_code: CountryCode,
    pub country_name: String,
    pub country_iso2: String,
    pub country_iso3: String,
}

/// Product chapter reference row (`harmonized-system_22.csv`, 2-char codes only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterRef {
    pub section: String,
    pub hscode: String,
    pub description: String,
}

/// HS92 product row (`product_codes_HS92_V202501.csv`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRef {
    pub code: String,
    pub description: String,
}

/// World nominal GDP for one year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GdpPoint {
    pub year: u16,
    pub world_nominal_gdp: f64,
}

/// Nominal GDP of one country for one year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CountryGdpPoint {
    pub year: u16,
    pub country_code: CountryCode,
    pub gdp_nominal: f64,
}

/// Consumer price index for one year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpiPoint {
    pub year: u16,
    pub cpi: f64,
}

// =============================================================================
// Aggregates
// =============================================================================

/// Summed value and quantity for one year.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Totals {
    pub year: u16,
    pub value_trln_usd: f64,
    pub quantity_mln_metric_tons: f64,
}

/// Summed value and quantity for one (year, country).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountryTotals {
    pub year: u16,
    pub country: CountryCode,
    pub value_trln_usd: f64,
    pub quantity_mln_metric_tons: f64,
}

/// Summed value and quantity for one (year, chapter).
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterTotals {
    pub year: u16,
    pub product_chapter: String,
    pub value_trln_usd: f64,
    pub quantity_mln_metric_tons: f64,
}

/// One country's imports and exports for one (year, chapter).
#[derive(Debug, Clone, PartialEq)]
pub struct CountryChapterFlow {
    pub year: u16,
    pub product_chapter: String,
    pub imports_trln_usd: f64,
    pub imports_mln_metric_tons: f64,
    pub exports_trln_usd: f64,
    pub exports_mln_metric_tons: f64,
}

impl CountryChapterFlow {
    pub fn balance_trln_usd(&self) -> f64 {
        self.exports_trln_usd - self.imports_trln_usd
    }

    pub fn balance_mln_metric_tons(&self) -> f64 {
        self.exports_mln_metric_tons - self.imports_mln_metric_tons
    }
}

/// Entity label of a ranked row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Entity {
    Country(CountryCode),
    Chapter(String),
    /// Synthetic row ("Other", "Food Related").
    Label(String),
}

impl Entity {
    /// Cell written for this entity before human-readable mapping.
    pub fn to_cell(&self) -> Cell {
        match self {
            Entity::Country(code) => Cell::Int(i64::from(*code)),
            Entity::Chapter(chapter) => Cell::Text(chapter.clone()),
            Entity::Label(label) => Cell::Text(label.clone()),
        }
    }
}

/// One row of a top-N+Other table.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedRow {
    pub year: u16,
    /// Set when the partition is (year, chapter).
    pub product_chapter: Option<String>,
    pub entity: Entity,
    pub value_trln_usd: f64,
    pub quantity_mln_metric_tons: f64,
}

fn deserialize_optional_float<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let s = raw.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("na") || s.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    s.parse::<f64>()
        .map(Some)
        .map_err(|_| serde::de::Error::custom(format!("invalid quantity '{}'", s)))
}
