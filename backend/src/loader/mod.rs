//! Input loading.
//!
//! Reads the reference tables, the macro series and every configured yearly
//! trade file, normalizing the latter into one fact table. Each table goes
//! through the binary cache ([`crate::cache`]); the normalized fact table has
//! its own cache (`BACI_HS92_all.bin`) so later runs skip the yearly files.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{cache_path_for, load_csv_or_cached, load_or_build};
use crate::config::{Config, DATAFILE_PREFIX, DATAFILE_SUFFIX};
use crate::error::{LoadError, LoadResult, PipelineError, PipelineResult};
use crate::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::models::{ChapterRef, CountryGdpPoint, CountryRef, CpiPoint, GdpPoint, ProductRef, RawTradeRecord, TradeFlow};
use crate::parser::{decode_content, detect_delimiter, detect_encoding, parse_records, read_headers};
use crate::transform::mapper::Lookups;
use crate::transform::normalize::{normalize, rename_symbols};

/// GDP files are in billions of USD; the pipeline works in trillions.
const GDP_SCALE: f64 = 1_000.0;

/// Every input of a run, loaded and normalized.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// Normalized fact table, shared with per-country workers.
    pub flows: Arc<Vec<TradeFlow>>,
    /// 2-digit HS chapters only.
    pub chapters: Vec<ChapterRef>,
    pub products: Vec<ProductRef>,
    pub countries: Vec<CountryRef>,
    /// World nominal GDP in trillions of USD.
    pub gdp: Vec<GdpPoint>,
    /// Per-country nominal GDP in trillions of USD, when available.
    pub country_gdp: Option<Vec<CountryGdpPoint>>,
    pub cpi: Vec<CpiPoint>,
}

impl Dataset {
    /// Lookup tables for label mapping.
    pub fn lookups(&self) -> Lookups {
        Lookups::new(&self.countries, &self.chapters)
    }
}

/// Load a reference table and assert it holds rows.
pub fn load_required<T>(path: &Path) -> LoadResult<Vec<T>>
where
    T: Serialize + DeserializeOwned,
{
    let rows = load_csv_or_cached(path)?;
    if rows.is_empty() {
        return Err(LoadError::EmptyInput(path.to_path_buf()));
    }
    Ok(rows)
}

/// Years with a yearly trade file in `data_dir`, ascending.
pub fn discover_years(data_dir: &Path) -> LoadResult<Vec<u16>> {
    let year_file = Regex::new(&format!(
        r"^{}(\d{{4}}){}$",
        regex::escape(DATAFILE_PREFIX),
        regex::escape(DATAFILE_SUFFIX)
    ))
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let mut years: Vec<u16> = fs::read_dir(data_dir)?
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name();
            let caps = year_file.captures(name.to_str()?)?;
            caps.get(1)?.as_str().parse().ok()
        })
        .collect();
    years.sort_unstable();
    years.dedup();
    Ok(years)
}

/// Parse and normalize one yearly file.
fn read_year_file(path: &Path) -> PipelineResult<Vec<TradeFlow>> {
    log_info(format!("Loading CSV: {}", path.display()));
    let bytes = fs::read(path).map_err(LoadError::from)?;
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let content = decode_content(&bytes, &detect_encoding(&bytes));
    let delimiter = detect_delimiter(&content);
    let headers = read_headers(&content, delimiter).map_err(csv_err)?;
    rename_symbols(&headers)?;

    let records: Vec<RawTradeRecord> = parse_records(&content, delimiter).map_err(csv_err)?;
    if records.is_empty() {
        return Err(LoadError::EmptyInput(path.to_path_buf()).into());
    }
    log_info_indent(format!("{} raw records", records.len()), 1);

    Ok(normalize(&records)?)
}

/// Normalized flows of one year, through that year's cache.
pub fn load_year(config: &Config, year: u16) -> PipelineResult<Vec<TradeFlow>> {
    let path = config.year_file(year);
    let cache_path = cache_path_for(&path);
    if !path.exists() && !cache_path.exists() {
        return Err(LoadError::NotFound(path).into());
    }
    load_or_build(&cache_path, || read_year_file(&path))
}

/// The normalized multi-year fact table.
///
/// An existing fact-table cache is used as-is, whatever years it holds.
pub fn load_fact_table(config: &Config) -> PipelineResult<Vec<TradeFlow>> {
    let cache_path = config.all_data_cache_path();
    let flows = load_or_build(&cache_path, || {
        let mut flows = Vec::new();
        for &year in &config.years {
            let year_flows = load_year(config, year)?;
            log_info_indent(format!("{}: {} flows", year, year_flows.len()), 1);
            flows.extend(year_flows);
        }
        Ok::<_, PipelineError>(flows)
    })?;

    if flows.is_empty() {
        return Err(LoadError::EmptyInput(cache_path).into());
    }
    Ok(flows)
}

/// HS chapters from the expanded nomenclature (rows with a 2-char code).
pub fn load_chapters(config: &Config) -> LoadResult<Vec<ChapterRef>> {
    let path = config.expanded_product_codes_path();
    let chapters: Vec<ChapterRef> = load_required::<ChapterRef>(&path)?
        .into_iter()
        .filter(|c| c.hscode.chars().count() == 2)
        .collect();
    if chapters.is_empty() {
        return Err(LoadError::EmptyInput(path));
    }
    Ok(chapters)
}

/// World GDP, converted to trillions.
pub fn load_gdp(config: &Config) -> LoadResult<Vec<GdpPoint>> {
    Ok(load_required::<GdpPoint>(&config.gdp_path())?
        .into_iter()
        .map(|g| GdpPoint {
            world_nominal_gdp: g.world_nominal_gdp / GDP_SCALE,
            ..g
        })
        .collect())
}

/// Per-country GDP, converted to trillions. `None` when the file is absent.
pub fn load_country_gdp(config: &Config) -> LoadResult<Option<Vec<CountryGdpPoint>>> {
    match load_required::<CountryGdpPoint>(&config.country_gdp_path()) {
        Ok(rows) => Ok(Some(
            rows.into_iter()
                .map(|g| CountryGdpPoint {
                    gdp_nominal: g.gdp_nominal / GDP_SCALE,
                    ..g
                })
                .collect(),
        )),
        Err(LoadError::NotFound(path)) => {
            log_warning(format!("Optional input not found: {}", path.display()));
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Load every input of a run.
pub fn load_all_data(config: &Config) -> PipelineResult<Dataset> {
    let countries = load_required(&config.country_codes_path())?;
    let products = load_required(&config.product_codes_path())?;
    let chapters = load_chapters(config)?;
    let flows = load_fact_table(config)?;
    let gdp = load_gdp(config)?;
    let country_gdp = load_country_gdp(config)?;
    let cpi = load_required(&config.cpi_path())?;

    log_success(format!(
        "Loaded {} flows, {} countries, {} chapters",
        flows.len(),
        countries.len(),
        chapters.len()
    ));

    Ok(Dataset {
        flows: Arc::new(flows),
        chapters,
        products,
        countries,
        gdp,
        country_gdp,
        cpi,
    })
}
