//! Numeric codes → human-readable labels.
//!
//! Country columns (`exporter`, `importer`, `country`) map through the
//! country reference table, the `product_chapter` column through the HS
//! chapter table. Synthetic ranking labels ("Other", "Food Related") pass
//! through untouched; any other code without a lookup entry is an error.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{MappingError, MappingResult};
use crate::models::{Cell, ChapterRef, CountryCode, CountryRef, Table};
use crate::transform::rank::{FOOD_RELATED_LABEL, OTHER_LABEL};

/// Columns holding country codes.
pub const COUNTRY_COLUMNS: [&str; 3] = ["exporter", "importer", "country"];

/// Column holding chapter codes.
pub const CHAPTER_COLUMN: &str = "product_chapter";

/// Country label format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CountryFormat {
    Name,
    Iso2,
    Iso3,
}

impl CountryFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountryFormat::Name => "country_name",
            CountryFormat::Iso2 => "country_iso2",
            CountryFormat::Iso3 => "country_iso3",
        }
    }

    fn pick<'a>(&self, country: &'a CountryRef) -> &'a str {
        match self {
            CountryFormat::Name => &country.country_name,
            CountryFormat::Iso2 => &country.country_iso2,
            CountryFormat::Iso3 => &country.country_iso3,
        }
    }
}

impl FromStr for CountryFormat {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "country_name" => Ok(CountryFormat::Name),
            "country_iso2" => Ok(CountryFormat::Iso2),
            "country_iso3" => Ok(CountryFormat::Iso3),
            other => Err(MappingError::InvalidCountryFormat(other.to_string())),
        }
    }
}

impl fmt::Display for CountryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product chapter label format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductFormat {
    Hscode,
    Description,
}

impl ProductFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductFormat::Hscode => "hscode",
            ProductFormat::Description => "description",
        }
    }

    fn pick<'a>(&self, chapter: &'a ChapterRef) -> &'a str {
        match self {
            ProductFormat::Hscode => &chapter.hscode,
            ProductFormat::Description => &chapter.description,
        }
    }
}

impl FromStr for ProductFormat {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hscode" => Ok(ProductFormat::Hscode),
            "description" => Ok(ProductFormat::Description),
            other => Err(MappingError::InvalidProductFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ProductFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_synthetic(label: &str) -> bool {
    label == OTHER_LABEL || label == FOOD_RELATED_LABEL
}

/// Read-only lookup tables, built once per run.
#[derive(Debug, Clone, Default)]
pub struct Lookups {
    countries: HashMap<CountryCode, CountryRef>,
    chapters: HashMap<String, ChapterRef>,
}

impl Lookups {
    pub fn new(countries: &[CountryRef], chapters: &[ChapterRef]) -> Self {
        Self {
            countries: countries.iter().map(|c| (c.country_code, c.clone())).collect(),
            chapters: chapters.iter().map(|c| (c.hscode.clone(), c.clone())).collect(),
        }
    }

    /// Label of a single country code.
    pub fn country_label(&self, code: CountryCode, fmt: CountryFormat) -> MappingResult<&str> {
        self.countries
            .get(&code)
            .map(|c| fmt.pick(c))
            .ok_or_else(|| MappingError::MissingCode(code.to_string()))
    }

    /// Reverse of [`Lookups::country_label`].
    pub fn country_code_for(&self, label: &str, fmt: CountryFormat) -> MappingResult<CountryCode> {
        self.countries
            .values()
            .filter(|c| fmt.pick(c) == label)
            .map(|c| c.country_code)
            .min()
            .ok_or_else(|| MappingError::MissingLabel(label.to_string()))
    }

    /// Label of a single 2-digit chapter.
    pub fn chapter_label(&self, chapter: &str, fmt: ProductFormat) -> MappingResult<&str> {
        self.chapters
            .get(chapter)
            .map(|c| fmt.pick(c))
            .ok_or_else(|| MappingError::MissingCode(chapter.to_string()))
    }

    /// Reverse of [`Lookups::chapter_label`].
    pub fn chapter_for(&self, label: &str, fmt: ProductFormat) -> MappingResult<&str> {
        self.chapters
            .values()
            .filter(|c| fmt.pick(c) == label)
            .map(|c| c.hscode.as_str())
            .min()
            .ok_or_else(|| MappingError::MissingLabel(label.to_string()))
    }

    fn map_country_cell(&self, cell: &Cell, fmt: CountryFormat) -> MappingResult<Cell> {
        let code = match cell {
            Cell::Int(v) => CountryCode::try_from(*v).map_err(|_| MappingError::MissingCode(v.to_string()))?,
            Cell::Text(s) if is_synthetic(s) => return Ok(cell.clone()),
            Cell::Text(s) => s
                .trim()
                .parse::<CountryCode>()
                .map_err(|_| MappingError::MissingCode(s.clone()))?,
            other => return Err(MappingError::MissingCode(other.to_string())),
        };
        self.country_label(code, fmt).map(Cell::from)
    }

    fn map_chapter_cell(&self, cell: &Cell, fmt: ProductFormat) -> MappingResult<Cell> {
        let chapter = match cell {
            Cell::Text(s) if is_synthetic(s) => return Ok(cell.clone()),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Int(v) => format!("{:02}", v),
            other => return Err(MappingError::MissingCode(other.to_string())),
        };
        self.chapter_label(&chapter, fmt).map(Cell::from)
    }
}

/// Replace codes in `table` with labels.
///
/// Fails when no format is requested, when a requested format has no column
/// to apply to, or when a code has no lookup entry.
pub fn make_human_readable(
    mut table: Table,
    lookups: &Lookups,
    country_fmt: Option<CountryFormat>,
    product_fmt: Option<ProductFormat>,
) -> MappingResult<Table> {
    if country_fmt.is_none() && product_fmt.is_none() {
        return Err(MappingError::NoFormat);
    }

    if let Some(fmt) = country_fmt {
        let mut converted = false;
        for column in COUNTRY_COLUMNS {
            converted |= table.try_map_column(column, |cell| lookups.map_country_cell(cell, fmt))?;
        }
        if !converted {
            return Err(MappingError::NoCountryColumn(table.columns().to_vec()));
        }
    }

    if let Some(fmt) = product_fmt {
        let converted =
            table.try_map_column(CHAPTER_COLUMN, |cell| lookups.map_chapter_cell(cell, fmt))?;
        if !converted {
            return Err(MappingError::NoChapterColumn(table.columns().to_vec()));
        }
    }

    Ok(table)
}

/// [`make_human_readable`] with formats given as strings (CLI input).
pub fn make_human_readable_str(
    table: Table,
    lookups: &Lookups,
    country_fmt: Option<&str>,
    product_fmt: Option<&str>,
) -> MappingResult<Table> {
    let country_fmt = country_fmt.map(str::parse).transpose()?;
    let product_fmt = product_fmt.map(str::parse).transpose()?;
    make_human_readable(table, lookups, country_fmt, product_fmt)
}
