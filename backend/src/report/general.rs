//! World-level reports written to the output root.

use std::collections::HashSet;

use crate::config::{Config, FUEL_CHAPTER};
use crate::error::{AggregateError, MappingResult, PipelineResult};
use crate::loader::Dataset;
use crate::logs::{log_info, log_success};
use crate::models::{Cell, ChapterTotals, CountryTotals, CpiPoint, GdpPoint, Table, Totals};
use crate::report::writer::{try_save_table, WriteOptions};
use crate::report::{round2, ReportTally};
use crate::transform::aggregate::{
    adjust_for_inflation, filter_chapters, food_totals_by_country, top_surplus_deficit_shares,
    total_trade, totals_by_country, totals_per_chapter, trade_as_pct_of_gdp, BalanceShares,
};
use crate::transform::mapper::{make_human_readable, CountryFormat, Lookups, ProductFormat};
use crate::transform::rank::{chapter_totals_for_year, ranked_table};

/// Chapters kept in the single-year chapter ranking.
pub const TOP_CHAPTERS: usize = 20;

/// Countries kept in the surplus/deficit share tables.
pub const TOP_BALANCE_COUNTRIES: usize = 5;

/// Balance per (year, country ISO3) in billions of USD, optionally for one year.
pub fn absolute_balance_table(
    balance: &[CountryTotals],
    year: Option<u16>,
    lookups: &Lookups,
) -> MappingResult<Table> {
    let mut table = Table::new(["year", "country", "value_bln_USD", "quantity_mln_metric_tons"]);
    for row in balance.iter().filter(|b| year.map_or(true, |y| b.year == y)) {
        table.push(vec![
            Cell::from(row.year),
            Cell::from(row.country),
            Cell::Float(round2(row.value_trln_usd * 1_000.0)),
            Cell::Float(row.quantity_mln_metric_tons),
        ]);
    }
    make_human_readable(table, lookups, Some(CountryFormat::Iso3), None)
}

/// World trade as % of world GDP, indexed by year.
pub fn trade_pct_gdp_table(total: &[Totals], gdp: &[GdpPoint]) -> Table {
    let mut table = Table::new(["year", "trade_pcn_gdp"]).with_index("year");
    for ratio in trade_as_pct_of_gdp(total, gdp) {
        table.push(vec![Cell::from(ratio.year), Cell::from(ratio.value)]);
    }
    table
}

/// Yearly tonnage in billions of metric tons.
///
/// The column keeps its `quantity_mln_metric_tons` header.
pub fn tonnage_table(total: &[Totals]) -> Table {
    let mut table = Table::new(["year", "quantity_mln_metric_tons"]);
    for t in total {
        table.push(vec![
            Cell::from(t.year),
            Cell::Float(round2(t.quantity_mln_metric_tons / 1_000.0)),
        ]);
    }
    table
}

/// Nominal world trade and its value in `target_year` dollars.
pub fn real_trade_table(
    total: &[Totals],
    cpi: &[CpiPoint],
    target_year: u16,
) -> Result<Table, AggregateError> {
    let years: HashSet<u16> = total.iter().map(|t| t.year).collect();
    let cpi: Vec<CpiPoint> = cpi.iter().filter(|c| years.contains(&c.year)).copied().collect();
    let nominal: Vec<(u16, f64)> = total.iter().map(|t| (t.year, t.value_trln_usd)).collect();

    let mut table = Table::new(["year", "nominal_trln_USD", "real_trln_USD"]);
    for row in adjust_for_inflation(&nominal, &cpi, target_year)? {
        table.push(vec![Cell::from(row.year), Cell::Float(row.nominal), Cell::Float(row.real)]);
    }
    Ok(table)
}

/// `year` + one column per ranked country (ISO3).
pub fn balance_shares_table(shares: &BalanceShares, lookups: &Lookups) -> MappingResult<Table> {
    let mut columns = vec!["year".to_string()];
    for &code in &shares.countries {
        columns.push(lookups.country_label(code, CountryFormat::Iso3)?.to_string());
    }

    let mut table = Table::new(columns);
    for (year, values) in &shares.rows {
        let mut cells = vec![Cell::from(*year)];
        cells.extend(values.iter().map(|v| Cell::from(*v)));
        table.push(cells);
    }
    Ok(table)
}

/// Every (year, chapter) total with chapter descriptions.
pub fn chapter_totals_table(chapter_totals: &[ChapterTotals], lookups: &Lookups) -> MappingResult<Table> {
    let mut table = Table::new(["year", "product_chapter", "value_trln_USD", "quantity_mln_metric_tons"]);
    for row in chapter_totals {
        table.push(vec![
            Cell::from(row.year),
            Cell::from(row.product_chapter.as_str()),
            Cell::Float(row.value_trln_usd),
            Cell::Float(row.quantity_mln_metric_tons),
        ]);
    }
    make_human_readable(table, lookups, None, Some(ProductFormat::Description))
}

/// Top chapters of one year, food chapters merged, plus Other.
pub fn top_chapters_table(
    chapter_totals: &[ChapterTotals],
    year: u16,
    n: usize,
    lookups: &Lookups,
) -> MappingResult<Table> {
    let rows = chapter_totals_for_year(chapter_totals, year, n, true);
    make_human_readable(
        ranked_table(&rows, "product_chapter"),
        lookups,
        None,
        Some(ProductFormat::Description),
    )
}

/// Write every world-level report.
///
/// Aggregation and mapping errors stop the stage; individual file writes
/// that fail are logged and counted.
pub fn run_general(dataset: &Dataset, lookups: &Lookups, config: &Config) -> PipelineResult<ReportTally> {
    let out = &config.output_dir;
    let year = config.reference_year;
    let flows = dataset.flows.as_slice();
    let mut tally = ReportTally::default();
    let opts = WriteOptions::default();

    log_info("Computing country balances");
    let balance = totals_by_country(flows).balance;
    let table = absolute_balance_table(&balance, None, lookups)?;
    tally.record(try_save_table(&table, &out.join("absolute_deficit_all_years.csv"), opts));
    let table = absolute_balance_table(&balance, Some(year), lookups)?;
    tally.record(try_save_table(&table, &out.join(format!("absolute_deficit_{}.csv", year)), opts));

    let food_balance = food_totals_by_country(flows).balance;
    let table = absolute_balance_table(&food_balance, Some(year), lookups)?;
    tally.record(try_save_table(&table, &out.join(format!("absolute_food_deficit_{}.csv", year)), opts));

    let fuel_balance = totals_by_country(filter_chapters(flows, &[FUEL_CHAPTER]).collect::<Vec<_>>()).balance;
    let table = absolute_balance_table(&fuel_balance, Some(year), lookups)?;
    tally.record(try_save_table(&table, &out.join(format!("absolute_fuel_deficit_{}.csv", year)), opts));

    log_info("Computing world totals");
    let total = total_trade(flows);
    tally.record(try_save_table(
        &trade_pct_gdp_table(&total, &dataset.gdp),
        &out.join("goods_trade_as_pcnt_gdp.csv"),
        WriteOptions::with_index(),
    ));
    tally.record(try_save_table(&tonnage_table(&total), &out.join("goods_trade_tonnage.csv"), opts));
    let table = real_trade_table(&total, &dataset.cpi, year)?;
    tally.record(try_save_table(&table, &out.join(format!("goods_trade_real_{}.csv", year)), opts));

    let (surplus, deficit) = top_surplus_deficit_shares(&balance, year, TOP_BALANCE_COUNTRIES);
    tally.record(try_save_table(
        &balance_shares_table(&surplus, lookups)?,
        &out.join("top_surplus_countries_pcnt.csv"),
        opts,
    ));
    tally.record(try_save_table(
        &balance_shares_table(&deficit, lookups)?,
        &out.join("top_deficit_countries_pcnt.csv"),
        opts,
    ));

    log_info("Computing chapter totals");
    let chapter_totals = totals_per_chapter(flows);
    tally.record(try_save_table(
        &chapter_totals_table(&chapter_totals, lookups)?,
        &out.join("chapter_totals.csv"),
        opts,
    ));
    tally.record(try_save_table(
        &top_chapters_table(&chapter_totals, year, TOP_CHAPTERS, lookups)?,
        &out.join(format!("chapter_totals_{}.csv", year)),
        opts,
    ));

    log_success(format!("General reports: {} written, {} failed", tally.written, tally.failed));
    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChapterRef, CountryRef};

    fn lookups() -> Lookups {
        let countries = [(682, "SAU"), (804, "UKR"), (156, "CHN")]
            .iter()
            .map(|&(code, iso3)| CountryRef {
                country_code: code,
                country_name: iso3.to_lowercase(),
                country_iso2: iso3[..2].to_string(),
                country_iso3: iso3.to_string(),
            })
            .collect::<Vec<_>>();
        let chapters = [("10", "Cereals"), ("27", "Mineral fuels"), ("84", "Machinery")]
            .iter()
            .map(|&(code, desc)| ChapterRef {
                section: "X".into(),
                hscode: code.into(),
                description: desc.into(),
            })
            .collect::<Vec<_>>();
        Lookups::new(&countries, &chapters)
    }

    fn totals(year: u16, value: f64, quantity: f64) -> Totals {
        Totals {
            year,
            value_trln_usd: value,
            quantity_mln_metric_tons: quantity,
        }
    }

    #[test]
    fn test_absolute_balance_in_billions() {
        let balance = vec![
            CountryTotals { year: 2022, country: 682, value_trln_usd: 0.5, quantity_mln_metric_tons: 1.0 },
            CountryTotals { year: 2023, country: 682, value_trln_usd: 0.0123456, quantity_mln_metric_tons: 1.0 },
            CountryTotals { year: 2023, country: 804, value_trln_usd: -0.002, quantity_mln_metric_tons: -1.0 },
        ];
        let table = absolute_balance_table(&balance, Some(2023), &lookups()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "country"), Some(&Cell::Text("SAU".into())));
        assert_eq!(table.get(0, "value_bln_USD"), Some(&Cell::Float(12.35)));
        assert_eq!(table.get(1, "value_bln_USD"), Some(&Cell::Float(-2.0)));
    }

    #[test]
    fn test_trade_pct_gdp_zero_gdp_is_empty() {
        let total = vec![totals(2022, 25.0, 1.0), totals(2023, 24.0, 1.0)];
        let gdp = vec![
            GdpPoint { year: 2022, world_nominal_gdp: 100.0 },
            GdpPoint { year: 2023, world_nominal_gdp: 0.0 },
        ];
        let table = trade_pct_gdp_table(&total, &gdp);
        assert_eq!(table.index(), Some("year"));
        assert_eq!(table.get(0, "trade_pcn_gdp"), Some(&Cell::Float(25.0)));
        assert_eq!(table.get(1, "trade_pcn_gdp"), Some(&Cell::Empty));
    }

    #[test]
    fn test_tonnage_in_billions() {
        let table = tonnage_table(&[totals(2023, 1.0, 12_345.678)]);
        assert_eq!(table.get(0, "quantity_mln_metric_tons"), Some(&Cell::Float(12.35)));
    }

    #[test]
    fn test_real_trade_ignores_cpi_outside_data_years() {
        let total = vec![totals(2022, 10.0, 1.0), totals(2023, 12.0, 1.0)];
        let cpi = vec![
            CpiPoint { year: 2021, cpi: 90.0 },
            CpiPoint { year: 2022, cpi: 100.0 },
            CpiPoint { year: 2023, cpi: 110.0 },
        ];
        let table = real_trade_table(&total, &cpi, 2023).unwrap();
        assert_eq!(table.len(), 2);
        let real = table.get(0, "real_trln_USD").and_then(Cell::as_f64).unwrap();
        assert!((real - 11.0).abs() < 1e-8);
    }

    #[test]
    fn test_real_trade_missing_target() {
        let total = vec![totals(2023, 12.0, 1.0)];
        let cpi = vec![CpiPoint { year: 2023, cpi: 110.0 }];
        assert!(matches!(
            real_trade_table(&total, &cpi, 2024),
            Err(AggregateError::TargetYearMissing(2024))
        ));
    }

    #[test]
    fn test_balance_shares_header_uses_iso3() {
        let shares = BalanceShares {
            countries: vec![156, 682],
            rows: vec![(2023, vec![Some(60.0), None])],
        };
        let table = balance_shares_table(&shares, &lookups()).unwrap();
        assert_eq!(table.columns(), &["year", "CHN", "SAU"]);
        assert_eq!(table.get(0, "SAU"), Some(&Cell::Empty));
    }

    #[test]
    fn test_top_chapters_with_descriptions() {
        let chapter_totals = vec![
            ChapterTotals { year: 2023, product_chapter: "27".into(), value_trln_usd: 3.0, quantity_mln_metric_tons: 1.0 },
            ChapterTotals { year: 2023, product_chapter: "84".into(), value_trln_usd: 2.0, quantity_mln_metric_tons: 1.0 },
            ChapterTotals { year: 2023, product_chapter: "10".into(), value_trln_usd: 1.0, quantity_mln_metric_tons: 1.0 },
        ];
        let table = top_chapters_table(&chapter_totals, 2023, 1, &lookups()).unwrap();
        let labels: Vec<String> = table
            .rows()
            .iter()
            .map(|r| r[table.column_index("product_chapter").unwrap()].to_string())
            .collect();
        assert_eq!(labels, vec!["Mineral fuels", "Other"]);
    }
}
