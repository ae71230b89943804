//! Bespoke per-country recipes under `<output>/country_specific/<ISO3>/`.
//!
//! | Recipe | Country | Content |
//! |--------|---------|---------|
//! | `SAU/cereals.csv` | Saudi Arabia | chapter 10 imports, exports, balance |
//! | `UKR/cereal_exports.csv` | Ukraine | chapter 10 exports and share of world cereal exports |
//! | `USA/fuel_trade.csv` | United States | chapter 27 imports, exports, balance |
//! | `CHN/fuel_trade.csv` | China | chapter 27 trade plus share of the rest of the world's imports |
//! | `CHN/top15_sources.csv` | China | top 15 chapter 27 suppliers in the reference year |
//! | `YEM/food_vs_gdp.csv` | Yemen | food imports as % of GDP |

use std::collections::HashMap;

use crate::config::{Config, CEREAL_CHAPTER, FUEL_CHAPTER};
use crate::error::PipelineResult;
use crate::loader::Dataset;
use crate::logs::{log_info, log_success, log_warning};
use crate::models::{Cell, CountryChapterFlow, CountryCode, Table, TradeFlow, TradeRole};
use crate::report::writer::{try_save_table, WriteOptions};
use crate::report::ReportTally;
use crate::transform::aggregate::{
    country_chapter_series, food_totals_by_country, safe_ratio, total_trade,
};
use crate::transform::mapper::{make_human_readable, CountryFormat, Lookups};
use crate::transform::rank::{partners_of, ranked_table};

pub const SAUDI_ARABIA: CountryCode = 682;
pub const UKRAINE: CountryCode = 804;
pub const USA: CountryCode = 842;
pub const CHINA: CountryCode = 156;
pub const YEMEN: CountryCode = 887;

/// Suppliers kept in China's fuel source ranking.
pub const TOP_FUEL_SOURCES: usize = 15;

/// Inputs of a recipe.
pub struct RecipeInputs<'a> {
    pub dataset: &'a Dataset,
    pub lookups: &'a Lookups,
    pub reference_year: u16,
}

/// A recipe returns `None` when an optional input is missing.
pub type RecipeFn = fn(&RecipeInputs<'_>) -> PipelineResult<Option<Table>>;

/// One bespoke output file.
pub struct Recipe {
    pub iso3: &'static str,
    pub file: &'static str,
    pub build: RecipeFn,
}

pub const RECIPES: [Recipe; 6] = [
    Recipe { iso3: "SAU", file: "cereals.csv", build: saudi_cereals },
    Recipe { iso3: "UKR", file: "cereal_exports.csv", build: ukraine_cereal_exports },
    Recipe { iso3: "USA", file: "fuel_trade.csv", build: usa_fuel_trade },
    Recipe { iso3: "CHN", file: "fuel_trade.csv", build: china_fuel_trade },
    Recipe { iso3: "CHN", file: "top15_sources.csv", build: china_fuel_sources },
    Recipe { iso3: "YEM", file: "food_vs_gdp.csv", build: yemen_food_vs_gdp },
];

/// year, imports, exports and balance in value and weight.
pub fn trade_balance_table(series: &[CountryChapterFlow]) -> Table {
    let mut table = Table::new([
        "year",
        "imports_trln_USD",
        "imports_mln_metric_tons",
        "exports_trln_USD",
        "exports_mln_metric_tons",
        "balance_trln_USD",
        "balance_mln_metric_tons",
    ]);
    for row in series {
        table.push(vec![
            Cell::from(row.year),
            Cell::Float(row.imports_trln_usd),
            Cell::Float(row.imports_mln_metric_tons),
            Cell::Float(row.exports_trln_usd),
            Cell::Float(row.exports_mln_metric_tons),
            Cell::Float(row.balance_trln_usd()),
            Cell::Float(row.balance_mln_metric_tons()),
        ]);
    }
    table
}

fn chapter_flows<'a>(flows: &'a [TradeFlow], chapter: &'a str) -> impl Iterator<Item = &'a TradeFlow> + Clone {
    flows.iter().filter(move |f| f.product_chapter == chapter)
}

/// World (value, quantity) per year for one chapter.
fn world_by_year(flows: &[TradeFlow], chapter: &str) -> HashMap<u16, (f64, f64)> {
    total_trade(chapter_flows(flows, chapter))
        .into_iter()
        .map(|t| (t.year, (t.value_trln_usd, t.quantity_mln_metric_tons)))
        .collect()
}

pub fn saudi_cereals(inputs: &RecipeInputs<'_>) -> PipelineResult<Option<Table>> {
    let series = country_chapter_series(inputs.dataset.flows.iter(), SAUDI_ARABIA, CEREAL_CHAPTER);
    Ok(Some(trade_balance_table(&series)))
}

pub fn usa_fuel_trade(inputs: &RecipeInputs<'_>) -> PipelineResult<Option<Table>> {
    let series = country_chapter_series(inputs.dataset.flows.iter(), USA, FUEL_CHAPTER);
    Ok(Some(trade_balance_table(&series)))
}

/// Ukraine's cereal exports and their share of world cereal exports.
pub fn ukraine_cereal_exports(inputs: &RecipeInputs<'_>) -> PipelineResult<Option<Table>> {
    let flows = inputs.dataset.flows.as_slice();
    let world = world_by_year(flows, CEREAL_CHAPTER);
    let series = country_chapter_series(flows.iter(), UKRAINE, CEREAL_CHAPTER);

    let mut table = Table::new([
        "year",
        "value_trln_USD",
        "quantity_mln_metric_tons",
        "ratio_total_exp_usd",
        "ratio_total_exp_weight",
    ]);
    for row in &series {
        let (world_value, world_quantity) = world.get(&row.year).copied().unwrap_or((0.0, 0.0));
        table.push(vec![
            Cell::from(row.year),
            Cell::Float(row.exports_trln_usd),
            Cell::Float(row.exports_mln_metric_tons),
            Cell::from(safe_ratio(row.exports_trln_usd, world_value)),
            Cell::from(safe_ratio(row.exports_mln_metric_tons, world_quantity)),
        ]);
    }
    Ok(Some(table))
}

/// China's fuel trade plus its imports relative to everyone else's.
pub fn china_fuel_trade(inputs: &RecipeInputs<'_>) -> PipelineResult<Option<Table>> {
    let flows = inputs.dataset.flows.as_slice();
    let world = world_by_year(flows, FUEL_CHAPTER);
    let series = country_chapter_series(flows.iter(), CHINA, FUEL_CHAPTER);

    let base = trade_balance_table(&series);
    let mut table = Table::new(
        base.columns()
            .iter()
            .cloned()
            .chain(["ratio_of_total_imports_usd".to_string(), "ratio_of_total_imports_weight".to_string()]),
    );
    for (row, flow) in base.rows().iter().zip(&series) {
        let (world_value, world_quantity) = world.get(&flow.year).copied().unwrap_or((0.0, 0.0));
        let mut cells = row.clone();
        cells.push(Cell::from(safe_ratio(flow.imports_trln_usd, world_value - flow.imports_trln_usd)));
        cells.push(Cell::from(safe_ratio(
            flow.imports_mln_metric_tons,
            world_quantity - flow.imports_mln_metric_tons,
        )));
        table.push(cells);
    }
    Ok(Some(table))
}

/// Top chapter 27 suppliers of China in the reference year, plus Other.
pub fn china_fuel_sources(inputs: &RecipeInputs<'_>) -> PipelineResult<Option<Table>> {
    let year = inputs.reference_year;
    let fuel = chapter_flows(&inputs.dataset.flows, FUEL_CHAPTER).filter(|f| f.year == year);
    let rows = partners_of(fuel, CHINA, TradeRole::Exporter, TOP_FUEL_SOURCES);
    Ok(Some(make_human_readable(
        ranked_table(&rows, "exporter"),
        inputs.lookups,
        Some(CountryFormat::Iso3),
        None,
    )?))
}

/// Yemen's food imports as % of its GDP; `None` without country GDP data.
pub fn yemen_food_vs_gdp(inputs: &RecipeInputs<'_>) -> PipelineResult<Option<Table>> {
    let Some(country_gdp) = inputs.dataset.country_gdp.as_ref() else {
        return Ok(None);
    };
    let gdp: HashMap<u16, f64> = country_gdp
        .iter()
        .filter(|g| g.country_code == YEMEN)
        .map(|g| (g.year, g.gdp_nominal))
        .collect();

    let food = food_totals_by_country(&inputs.dataset.flows);
    let mut table = Table::new(["year", "imports_pcnt_gdp"]);
    for imports in food.imports.iter().filter(|i| i.country == YEMEN) {
        let pct = gdp
            .get(&imports.year)
            .and_then(|g| safe_ratio(imports.value_trln_usd, *g))
            .map(|r| r * 100.0);
        table.push(vec![Cell::from(imports.year), Cell::from(pct)]);
    }
    Ok(Some(table))
}

/// Run the recipes, optionally only those of one ISO3 code.
pub fn run_country_specific(
    dataset: &Dataset,
    lookups: &Lookups,
    config: &Config,
    only: Option<&str>,
) -> PipelineResult<ReportTally> {
    let inputs = RecipeInputs {
        dataset,
        lookups,
        reference_year: config.reference_year,
    };
    let out = config.country_specific_dir();
    let mut tally = ReportTally::default();

    for recipe in RECIPES.iter().filter(|r| only.map_or(true, |iso3| r.iso3.eq_ignore_ascii_case(iso3))) {
        log_info(format!("Recipe {}/{}", recipe.iso3, recipe.file));
        match (recipe.build)(&inputs)? {
            Some(table) => {
                let path = out.join(recipe.iso3).join(recipe.file);
                tally.record(try_save_table(&table, &path, WriteOptions::default()));
            }
            None => {
                log_warning(format!(
                    "Skipped {}/{}: country GDP data not available",
                    recipe.iso3, recipe.file
                ));
                tally.skipped += 1;
            }
        }
    }

    log_success(format!(
        "Country-specific reports: {} written, {} failed, {} skipped",
        tally.written, tally.failed, tally.skipped
    ));
    Ok(tally)
}
