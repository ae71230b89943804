//! Grouped sums over trade flows.
//!
//! Every function takes an iterator of borrowed flows so callers can slice
//! the fact table (`flows.iter().filter(..)`) without copying it. Results
//! are sorted by their grouping key.
//!
//! All divisions go through [`safe_ratio`]: a zero or non-finite denominator
//! yields `None`, which reports write as an empty cell.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::is_food_chapter;
use crate::error::AggregateError;
use crate::models::{
    ChapterTotals, CountryChapterFlow, CountryCode, CountryTotals, CpiPoint, GdpPoint,
    Totals, TradeFlow, TradeRole,
};

/// `num / den`, or `None` when the denominator is zero or either side is not finite.
pub fn safe_ratio(num: f64, den: f64) -> Option<f64> {
    if den == 0.0 || !den.is_finite() || !num.is_finite() {
        None
    } else {
        Some(num / den)
    }
}

/// Keep flows whose chapter is in `chapters`.
pub fn filter_chapters<'a, I>(flows: I, chapters: &'a [&'a str]) -> impl Iterator<Item = &'a TradeFlow>
where
    I: IntoIterator<Item = &'a TradeFlow>,
    I::IntoIter: 'a,
{
    flows
        .into_iter()
        .filter(move |f| chapters.contains(&f.product_chapter.as_str()))
}

/// Keep food related flows.
pub fn food_only<'a, I>(flows: I) -> impl Iterator<Item = &'a TradeFlow>
where
    I: IntoIterator<Item = &'a TradeFlow>,
    I::IntoIter: 'a,
{
    flows.into_iter().filter(|f| is_food_chapter(&f.product_chapter))
}

/// Exports, imports and balance per (year, country).
#[derive(Debug, Clone, Default)]
pub struct CountryBalances {
    pub exports: Vec<CountryTotals>,
    pub imports: Vec<CountryTotals>,
    /// Exports minus imports; a country with flows on only one side counts
    /// zero on the other.
    pub balance: Vec<CountryTotals>,
}

fn sum_by_country<'a>(
    flows: impl IntoIterator<Item = &'a TradeFlow>,
    role: TradeRole,
) -> BTreeMap<(u16, CountryCode), (f64, f64)> {
    let mut sums = BTreeMap::new();
    for flow in flows {
        let entry = sums.entry((flow.year, role.of(flow))).or_insert((0.0, 0.0));
        entry.0 += flow.value_trln_usd;
        entry.1 += flow.quantity_mln_metric_tons;
    }
    sums
}

fn to_country_totals(sums: &BTreeMap<(u16, CountryCode), (f64, f64)>) -> Vec<CountryTotals> {
    sums.iter()
        .map(|(&(year, country), &(value, quantity))| CountryTotals {
            year,
            country,
            value_trln_usd: value,
            quantity_mln_metric_tons: quantity,
        })
        .collect()
}

/// Total exports, imports and balance for every (year, country).
pub fn totals_by_country<'a>(flows: impl IntoIterator<Item = &'a TradeFlow> + Clone) -> CountryBalances {
    let exp = sum_by_country(flows.clone(), TradeRole::Exporter);
    let imp = sum_by_country(flows, TradeRole::Importer);

    let keys: BTreeSet<(u16, CountryCode)> = exp.keys().chain(imp.keys()).copied().collect();
    let balance = keys
        .into_iter()
        .map(|key| {
            let (ev, eq) = exp.get(&key).copied().unwrap_or((0.0, 0.0));
            let (iv, iq) = imp.get(&key).copied().unwrap_or((0.0, 0.0));
            CountryTotals {
                year: key.0,
                country: key.1,
                value_trln_usd: ev - iv,
                quantity_mln_metric_tons: eq - iq,
            }
        })
        .collect();

    CountryBalances {
        exports: to_country_totals(&exp),
        imports: to_country_totals(&imp),
        balance,
    }
}

/// [`totals_by_country`] restricted to food chapters.
pub fn food_totals_by_country(flows: &[TradeFlow]) -> CountryBalances {
    totals_by_country(food_only(flows).collect::<Vec<_>>())
}

/// World trade per year.
pub fn total_trade<'a>(flows: impl IntoIterator<Item = &'a TradeFlow>) -> Vec<Totals> {
    let mut sums: BTreeMap<u16, (f64, f64)> = BTreeMap::new();
    for flow in flows {
        let entry = sums.entry(flow.year).or_insert((0.0, 0.0));
        entry.0 += flow.value_trln_usd;
        entry.1 += flow.quantity_mln_metric_tons;
    }
    sums.into_iter()
        .map(|(year, (value, quantity))| Totals {
            year,
            value_trln_usd: value,
            quantity_mln_metric_tons: quantity,
        })
        .collect()
}

/// Trade per (year, chapter), sorted by year ascending then value descending
/// (chapter ascending on ties).
pub fn totals_per_chapter<'a>(flows: impl IntoIterator<Item = &'a TradeFlow>) -> Vec<ChapterTotals> {
    let mut sums: BTreeMap<(u16, &'a str), (f64, f64)> = BTreeMap::new();
    for flow in flows {
        let entry = sums
            .entry((flow.year, flow.product_chapter.as_str()))
            .or_insert((0.0, 0.0));
        entry.0 += flow.value_trln_usd;
        entry.1 += flow.quantity_mln_metric_tons;
    }

    let mut rows: Vec<ChapterTotals> = sums
        .into_iter()
        .map(|((year, chapter), (value, quantity))| ChapterTotals {
            year,
            product_chapter: chapter.to_string(),
            value_trln_usd: value,
            quantity_mln_metric_tons: quantity,
        })
        .collect();

    rows.sort_by(|a, b| {
        a.year
            .cmp(&b.year)
            .then(b.value_trln_usd.total_cmp(&a.value_trln_usd))
            .then_with(|| a.product_chapter.cmp(&b.product_chapter))
    });
    rows
}

/// Imports and exports of `country` per (year, chapter).
///
/// A (year, chapter) with flows on only one side counts zero on the other.
pub fn country_chapter_flows<'a>(
    flows: impl IntoIterator<Item = &'a TradeFlow>,
    country: CountryCode,
) -> Vec<CountryChapterFlow> {
    let mut sums: BTreeMap<(u16, &'a str), [f64; 4]> = BTreeMap::new();
    for flow in flows {
        let is_import = flow.importer == country;
        let is_export = flow.exporter == country;
        if !is_import && !is_export {
            continue;
        }
        let entry = sums
            .entry((flow.year, flow.product_chapter.as_str()))
            .or_insert([0.0; 4]);
        if is_import {
            entry[0] += flow.value_trln_usd;
            entry[1] += flow.quantity_mln_metric_tons;
        }
        if is_export {
            entry[2] += flow.value_trln_usd;
            entry[3] += flow.quantity_mln_metric_tons;
        }
    }

    sums.into_iter()
        .map(|((year, chapter), [iv, iq, ev, eq])| CountryChapterFlow {
            year,
            product_chapter: chapter.to_string(),
            imports_trln_usd: iv,
            imports_mln_metric_tons: iq,
            exports_trln_usd: ev,
            exports_mln_metric_tons: eq,
        })
        .collect()
}

/// Per-year imports/exports of `country` for a single chapter.
pub fn country_chapter_series<'a>(
    flows: impl IntoIterator<Item = &'a TradeFlow>,
    country: CountryCode,
    chapter: &str,
) -> Vec<CountryChapterFlow> {
    country_chapter_flows(
        flows.into_iter().filter(|f| f.product_chapter == chapter),
        country,
    )
}

/// Shares of the largest surplus and deficit countries.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceShares {
    /// Countries in rank order (largest surplus / largest deficit first).
    pub countries: Vec<CountryCode>,
    /// Per year: each country's balance as % of that year's total
    /// surplus (or deficit), `None` when the country has no balance that
    /// year or the total is zero.
    pub rows: Vec<(u16, Vec<Option<f64>>)>,
}

/// Top `keep_n` surplus and deficit countries in `ref_year`, with their
/// share of total surplus / total deficit for every year.
pub fn top_surplus_deficit_shares(
    balance: &[CountryTotals],
    ref_year: u16,
    keep_n: usize,
) -> (BalanceShares, BalanceShares) {
    let mut ref_balances: Vec<(CountryCode, f64)> = balance
        .iter()
        .filter(|b| b.year == ref_year)
        .map(|b| (b.country, b.value_trln_usd))
        .collect();

    ref_balances.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    let top_surplus: Vec<CountryCode> = ref_balances.iter().take(keep_n).map(|b| b.0).collect();

    ref_balances.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    let top_deficit: Vec<CountryCode> = ref_balances.iter().take(keep_n).map(|b| b.0).collect();

    let mut by_year: BTreeMap<u16, HashMap<CountryCode, f64>> = BTreeMap::new();
    for b in balance {
        by_year.entry(b.year).or_default().insert(b.country, b.value_trln_usd);
    }

    let shares = |countries: Vec<CountryCode>, surplus: bool| {
        let rows = by_year
            .iter()
            .map(|(&year, values)| {
                let total: f64 = values
                    .values()
                    .filter(|v| if surplus { **v >= 0.0 } else { **v < 0.0 })
                    .sum();
                let cells = countries
                    .iter()
                    .map(|c| values.get(c).and_then(|v| safe_ratio(*v, total)).map(|r| r * 100.0))
                    .collect();
                (year, cells)
            })
            .collect();
        BalanceShares { countries, rows }
    };

    (shares(top_surplus, true), shares(top_deficit, false))
}

/// One year of a ratio series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearRatio {
    pub year: u16,
    pub value: Option<f64>,
}

/// World trade value as a percentage of world nominal GDP, per trade year.
pub fn trade_as_pct_of_gdp(total: &[Totals], gdp: &[GdpPoint]) -> Vec<YearRatio> {
    let gdp_by_year: HashMap<u16, f64> = gdp.iter().map(|g| (g.year, g.world_nominal_gdp)).collect();
    total
        .iter()
        .map(|t| YearRatio {
            year: t.year,
            value: gdp_by_year
                .get(&t.year)
                .and_then(|g| safe_ratio(t.value_trln_usd, *g))
                .map(|r| r * 100.0),
        })
        .collect()
}

/// A nominal value and its CPI-adjusted counterpart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InflationAdjusted {
    pub year: u16,
    pub nominal: f64,
    pub real: f64,
}

/// Express `nominal` in `target_year` dollars:
/// `real = nominal × cpi(target_year) / cpi(year)`.
///
/// Fails when the target year has no CPI, when the two series differ in
/// length, or when a nominal year has no CPI.
pub fn adjust_for_inflation(
    nominal: &[(u16, f64)],
    cpi: &[CpiPoint],
    target_year: u16,
) -> Result<Vec<InflationAdjusted>, AggregateError> {
    let cpi_by_year: HashMap<u16, f64> = cpi.iter().map(|c| (c.year, c.cpi)).collect();
    let target_cpi = *cpi_by_year
        .get(&target_year)
        .ok_or(AggregateError::TargetYearMissing(target_year))?;

    if nominal.len() != cpi.len() {
        return Err(AggregateError::LengthMismatch {
            cpi: cpi.len(),
            nominal: nominal.len(),
        });
    }

    nominal
        .iter()
        .map(|&(year, value)| {
            let year_cpi = *cpi_by_year
                .get(&year)
                .ok_or(AggregateError::CpiYearMissing(year))?;
            Ok(InflationAdjusted {
                year,
                nominal: value,
                real: safe_ratio(target_cpi, year_cpi).map_or(f64::NAN, |f| value * f),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(year: u16, exp: u32, imp: u32, ch: &str, v: f64, q: f64) -> TradeFlow {
        TradeFlow {
            year,
            exporter: exp,
            importer: imp,
            product_chapter: ch.to_string(),
            value_trln_usd: v,
            quantity_mln_metric_tons: q,
        }
    }

    fn fixture() -> Vec<TradeFlow> {
        vec![
            flow(2023, 682, 804, "10", 5.0, 2.0),
            flow(2023, 804, 682, "10", 3.0, 1.0),
        ]
    }

    #[test]
    fn test_example_balance() {
        let flows = fixture();
        let balances = totals_by_country(&flows);
        let sau = balances.balance.iter().find(|b| b.country == 682).unwrap();
        assert_eq!(sau.value_trln_usd, 2.0);
        assert_eq!(sau.quantity_mln_metric_tons, 1.0);
        let ukr = balances.balance.iter().find(|b| b.country == 804).unwrap();
        assert_eq!(ukr.value_trln_usd, -2.0);

        let sau_imports = balances.imports.iter().find(|b| b.country == 682).unwrap();
        assert_eq!(sau_imports.value_trln_usd, 3.0);
    }

    #[test]
    fn test_balance_outer_join() {
        let flows = vec![flow(2023, 1, 2, "27", 4.0, 1.0)];
        let balances = totals_by_country(&flows);
        assert_eq!(balances.balance.len(), 2);
        assert_eq!(balances.balance[0].value_trln_usd, 4.0);
        assert_eq!(balances.balance[1].value_trln_usd, -4.0);
    }

    #[test]
    fn test_food_rollup_conserves_chapters() {
        let flows = vec![
            flow(2022, 1, 2, "10", 1.5, 0.5),
            flow(2022, 1, 2, "02", 0.25, 0.5),
            flow(2022, 1, 2, "27", 9.0, 9.0),
            flow(2023, 3, 2, "21", 0.75, 0.25),
            flow(2023, 1, 3, "10", 2.0, 1.0),
        ];
        let food = total_trade(food_only(&flows));
        for year in [2022u16, 2023] {
            let per_chapter: f64 = totals_per_chapter(&flows)
                .iter()
                .filter(|c| c.year == year && is_food_chapter(&c.product_chapter))
                .map(|c| c.value_trln_usd)
                .sum();
            let rollup = food.iter().find(|t| t.year == year).unwrap();
            assert_eq!(rollup.value_trln_usd, per_chapter);
        }

        let food_balances = food_totals_by_country(&flows);
        assert!(food_balances.exports.iter().all(|e| e.value_trln_usd < 9.0));
    }

    #[test]
    fn test_totals_per_chapter_order() {
        let flows = vec![
            flow(2023, 1, 2, "10", 1.0, 0.0),
            flow(2023, 1, 2, "27", 5.0, 0.0),
            flow(2022, 1, 2, "10", 2.0, 0.0),
        ];
        let chapters = totals_per_chapter(&flows);
        let order: Vec<(u16, &str)> = chapters
            .iter()
            .map(|c| (c.year, c.product_chapter.as_str()))
            .collect();
        assert_eq!(order, vec![(2022, "10"), (2023, "27"), (2023, "10")]);
    }

    #[test]
    fn test_country_chapter_flows() {
        let flows = fixture();
        let sau = country_chapter_flows(&flows, 682);
        assert_eq!(sau.len(), 1);
        assert_eq!(sau[0].exports_trln_usd, 5.0);
        assert_eq!(sau[0].imports_trln_usd, 3.0);
        assert_eq!(sau[0].balance_trln_usd(), 2.0);
        assert!(country_chapter_series(&flows, 682, "27").is_empty());
    }

    #[test]
    fn test_surplus_deficit_shares() {
        let balance = vec![
            CountryTotals { year: 2023, country: 1, value_trln_usd: 3.0, quantity_mln_metric_tons: 0.0 },
            CountryTotals { year: 2023, country: 2, value_trln_usd: 1.0, quantity_mln_metric_tons: 0.0 },
            CountryTotals { year: 2023, country: 3, value_trln_usd: -4.0, quantity_mln_metric_tons: 0.0 },
        ];
        let (surplus, deficit) = top_surplus_deficit_shares(&balance, 2023, 1);
        assert_eq!(surplus.countries, vec![1]);
        assert!((surplus.rows[0].1[0].unwrap() - 75.0).abs() < 1e-8);
        assert_eq!(deficit.countries, vec![3]);
        assert!((deficit.rows[0].1[0].unwrap() - 100.0).abs() < 1e-8);
    }

    #[test]
    fn test_trade_as_pct_of_gdp_guards_zero() {
        let totals = vec![
            Totals { year: 2022, value_trln_usd: 25.0, quantity_mln_metric_tons: 0.0 },
            Totals { year: 2023, value_trln_usd: 24.0, quantity_mln_metric_tons: 0.0 },
        ];
        let gdp = vec![
            GdpPoint { year: 2022, world_nominal_gdp: 100.0 },
            GdpPoint { year: 2023, world_nominal_gdp: 0.0 },
        ];
        let ratio = trade_as_pct_of_gdp(&totals, &gdp);
        assert!((ratio[0].value.unwrap() - 25.0).abs() < 1e-8);
        assert_eq!(ratio[1].value, None);
    }

    #[test]
    fn test_adjust_for_inflation() {
        let cpi = vec![CpiPoint { year: 2022, cpi: 100.0 }, CpiPoint { year: 2023, cpi: 125.0 }];
        let adjusted = adjust_for_inflation(&[(2022, 10.0), (2023, 10.0)], &cpi, 2023).unwrap();
        assert!((adjusted[0].real - 12.5).abs() < 1e-8);
        assert!((adjusted[1].real - 10.0).abs() < 1e-8);
    }

    #[test]
    fn test_adjust_for_inflation_errors() {
        let cpi = vec![CpiPoint { year: 2022, cpi: 100.0 }];
        assert!(matches!(
            adjust_for_inflation(&[(2022, 1.0)], &cpi, 2023),
            Err(AggregateError::TargetYearMissing(2023))
        ));
        assert!(matches!(
            adjust_for_inflation(&[(2022, 1.0), (2023, 1.0)], &cpi, 2022),
            Err(AggregateError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_safe_ratio() {
        assert_eq!(safe_ratio(1.0, 0.0), None);
        assert_eq!(safe_ratio(1.0, f64::NAN), None);
        assert_eq!(safe_ratio(1.0, 4.0), Some(0.25));
    }
}
