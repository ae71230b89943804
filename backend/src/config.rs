//! Run configuration.
//!
//! Static defaults for the BACI HS92 release layout, overridable through
//! environment variables (a `.env` file is honoured) and CLI flags.

use std::env;
use std::path::{Path, PathBuf};

/// BACI release the file names below belong to.
pub const BACI_RELEASE: &str = "V202501";

/// Prefix of the yearly trade files (`BACI_HS92_Y2023_V202501.csv`).
pub const DATAFILE_PREFIX: &str = "BACI_HS92_Y";

/// Suffix of the yearly trade files.
pub const DATAFILE_SUFFIX: &str = "_V202501.csv";

/// Country reference table (inside the data dir).
pub const COUNTRY_CODES_FILE: &str = "country_codes_V202501.csv";

/// HS92 product reference table (inside the data dir).
pub const PRODUCT_CODES_FILE: &str = "product_codes_HS92_V202501.csv";

/// Expanded HS22 nomenclature with sections (inside the other-data dir).
pub const EXPANDED_PRODUCT_CODES_FILE: &str = "harmonized-system_22.csv";

/// World nominal GDP, billions of USD (inside the other-data dir).
pub const GDP_FILE: &str = "world-gdp-nominal.csv";

/// Per-country nominal GDP, billions of USD. Optional.
pub const COUNTRY_GDP_FILE: &str = "country-gdp-nominal.csv";

/// US CPI (inside the other-data dir).
pub const CPI_FILE: &str = "cpi.csv";

/// Cache name of the normalized multi-year fact table.
pub const ALL_DATA_CACHE: &str = "BACI_HS92_all";

/// First and last year of the default data range.
pub const FIRST_YEAR: u16 = 1995;
pub const LAST_YEAR: u16 = 2023;

/// Raw symbol → semantic column name.
pub const SYMBOL_TO_COLNAME: [(&str, &str); 6] = [
    ("t", "year"),
    ("i", "exporter"),
    ("j", "importer"),
    ("k", "product"),
    ("v", "value"),
    ("q", "quantity"),
];

/// Food related HS chapters.
pub const FOOD_CHAPTERS: [&str; 18] = [
    "02", "03", "04", "07", "08", "09", "10", "11", "12", "13", "14", "15", "16", "17", "18",
    "19", "20", "21",
];

/// Mineral fuels, oils and products of their distillation.
pub const FUEL_CHAPTER: &str = "27";

/// Cereals.
pub const CEREAL_CHAPTER: &str = "10";

/// Check membership in [`FOOD_CHAPTERS`].
pub fn is_food_chapter(chapter: &str) -> bool {
    FOOD_CHAPTERS.contains(&chapter)
}

/// Paths and year range for one run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the BACI release (yearly files + reference tables).
    pub data_dir: PathBuf,
    /// Directory holding GDP, CPI and the expanded nomenclature.
    pub other_data_dir: PathBuf,
    /// Root of the generated CSV tree.
    pub output_dir: PathBuf,
    /// Years to load, ascending.
    pub years: Vec<u16>,
    /// Year used by single-year reports.
    pub reference_year: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_root(".")
    }
}

impl Config {
    /// Default layout under a project root:
    /// `<root>/data/BACI_HS92_V202501`, `<root>/data`, `<root>/web/public/data`.
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let other_data_dir = root.join("data");
        Self {
            data_dir: other_data_dir.join(format!("BACI_HS92_{}", BACI_RELEASE)),
            other_data_dir,
            output_dir: root.join("web").join("public").join("data"),
            years: (FIRST_YEAR..=LAST_YEAR).collect(),
            reference_year: LAST_YEAR,
        }
    }

    /// Defaults overridden by `TRADEFLOW_*` environment variables.
    pub fn from_env() -> Self {
        // Try loading .env file
        let _ = dotenvy::dotenv();

        let mut config = Self::default();
        if let Ok(dir) = env::var("TRADEFLOW_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("TRADEFLOW_OTHER_DATA_DIR") {
            config.other_data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("TRADEFLOW_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }

        let first = env_year("TRADEFLOW_FIRST_YEAR").unwrap_or(FIRST_YEAR);
        let last = env_year("TRADEFLOW_LAST_YEAR").unwrap_or(LAST_YEAR);
        config = config.with_years(first, last);
        config
    }

    /// Restrict the run to `first..=last`; the reference year follows `last`.
    pub fn with_years(mut self, first: u16, last: u16) -> Self {
        self.years = (first..=last).collect();
        self.reference_year = last;
        self
    }

    /// Path of the yearly trade CSV for `year`.
    pub fn year_file(&self, year: u16) -> PathBuf {
        self.data_dir
            .join(format!("{}{}{}", DATAFILE_PREFIX, year, DATAFILE_SUFFIX))
    }

    pub fn country_codes_path(&self) -> PathBuf {
        self.data_dir.join(COUNTRY_CODES_FILE)
    }

    pub fn product_codes_path(&self) -> PathBuf {
        self.data_dir.join(PRODUCT_CODES_FILE)
    }

    pub fn expanded_product_codes_path(&self) -> PathBuf {
        self.other_data_dir.join(EXPANDED_PRODUCT_CODES_FILE)
    }

    pub fn gdp_path(&self) -> PathBuf {
        self.other_data_dir.join(GDP_FILE)
    }

    pub fn country_gdp_path(&self) -> PathBuf {
        self.other_data_dir.join(COUNTRY_GDP_FILE)
    }

    pub fn cpi_path(&self) -> PathBuf {
        self.other_data_dir.join(CPI_FILE)
    }

    /// Cache file of the normalized multi-year fact table.
    pub fn all_data_cache_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.bin", ALL_DATA_CACHE))
    }

    /// Root of the per-country interactive tree.
    pub fn interactive_dir(&self) -> PathBuf {
        self.output_dir.join("interactive")
    }

    /// Root of the bespoke country recipes.
    pub fn country_specific_dir(&self) -> PathBuf {
        self.output_dir.join("country_specific")
    }
}

fn env_year(key: &str) -> Option<u16> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_years() {
        let config = Config::default();
        assert_eq!(config.years.first(), Some(&1995));
        assert_eq!(config.years.last(), Some(&2023));
        assert_eq!(config.years.len(), 29);
        assert_eq!(config.reference_year, 2023);
    }

    #[test]
    fn test_year_file_name() {
        let config = Config::with_root("/srv");
        assert_eq!(
            config.year_file(2001),
            PathBuf::from("/srv/data/BACI_HS92_V202501/BACI_HS92_Y2001_V202501.csv")
        );
    }

    #[test]
    fn test_with_years_moves_reference_year() {
        let config = Config::default().with_years(2020, 2022);
        assert_eq!(config.years, vec![2020, 2021, 2022]);
        assert_eq!(config.reference_year, 2022);
    }

    #[test]
    fn test_food_chapters() {
        assert!(is_food_chapter("10"));
        assert!(!is_food_chapter("27"));
        assert!(!is_food_chapter("01"));
    }
}
