//! Top-N plus "Other" rankings.
//!
//! Within a partition (a year, or a year × chapter) entities are ranked by
//! value descending, ties broken by entity ascending. The first `n` are kept
//! as-is and the remainder is folded into one synthetic row. A partition
//! with `n` entities or fewer gets no synthetic row at all, so the rows of a
//! partition always sum to the partition total.

use std::collections::{BTreeMap, HashMap};

use crate::config::is_food_chapter;
use crate::models::{Cell, ChapterTotals, CountryCode, Entity, RankedRow, Table, TradeFlow, TradeRole};

/// Label of the row aggregating everything outside the top N.
pub const OTHER_LABEL: &str = "Other";

/// Label of the merged food chapters.
pub const FOOD_RELATED_LABEL: &str = "Food Related";

/// An entity with its value and quantity inside one partition.
#[derive(Debug, Clone, PartialEq)]
pub struct RankEntry {
    pub entity: Entity,
    pub value_trln_usd: f64,
    pub quantity_mln_metric_tons: f64,
}

/// Rank `entries` and fold everything past the first `n` into `other_label`.
pub fn top_n_with_other(mut entries: Vec<RankEntry>, n: usize, other_label: &str) -> Vec<RankEntry> {
    entries.sort_by(|a, b| {
        b.value_trln_usd
            .total_cmp(&a.value_trln_usd)
            .then_with(|| a.entity.cmp(&b.entity))
    });

    if entries.len() <= n {
        return entries;
    }

    let rest = entries.split_off(n);
    let (value, quantity) = rest.iter().fold((0.0, 0.0), |(v, q), e| {
        (v + e.value_trln_usd, q + e.quantity_mln_metric_tons)
    });
    entries.push(RankEntry {
        entity: Entity::Label(other_label.to_string()),
        value_trln_usd: value,
        quantity_mln_metric_tons: quantity,
    });
    entries
}

fn rank_partition(
    year: u16,
    product_chapter: Option<&str>,
    sums: HashMap<Entity, (f64, f64)>,
    n: usize,
) -> impl Iterator<Item = RankedRow> {
    let entries = sums
        .into_iter()
        .map(|(entity, (value, quantity))| RankEntry {
            entity,
            value_trln_usd: value,
            quantity_mln_metric_tons: quantity,
        })
        .collect();
    let product_chapter = product_chapter.map(str::to_string);

    top_n_with_other(entries, n, OTHER_LABEL)
        .into_iter()
        .map(move |e| RankedRow {
            year,
            product_chapter: product_chapter.clone(),
            entity: e.entity,
            value_trln_usd: e.value_trln_usd,
            quantity_mln_metric_tons: e.quantity_mln_metric_tons,
        })
}

fn add(sums: &mut HashMap<Entity, (f64, f64)>, entity: Entity, value: f64, quantity: f64) {
    let entry = sums.entry(entity).or_insert((0.0, 0.0));
    entry.0 += value;
    entry.1 += quantity;
}

/// Top-`n` chapters (+ Other) for every year of `chapter_totals`.
///
/// With `merge_food`, all food chapters are first collapsed into a single
/// "Food Related" entity that competes for a top-`n` slot like any chapter.
pub fn chapter_totals_all_years(
    chapter_totals: &[ChapterTotals],
    n: usize,
    merge_food: bool,
) -> Vec<RankedRow> {
    let mut by_year: BTreeMap<u16, HashMap<Entity, (f64, f64)>> = BTreeMap::new();
    for row in chapter_totals {
        let entity = if merge_food && is_food_chapter(&row.product_chapter) {
            Entity::Label(FOOD_RELATED_LABEL.to_string())
        } else {
            Entity::Chapter(row.product_chapter.clone())
        };
        add(
            by_year.entry(row.year).or_default(),
            entity,
            row.value_trln_usd,
            row.quantity_mln_metric_tons,
        );
    }

    by_year
        .into_iter()
        .flat_map(|(year, sums)| rank_partition(year, None, sums, n))
        .collect()
}

/// [`chapter_totals_all_years`] restricted to one year.
pub fn chapter_totals_for_year(
    chapter_totals: &[ChapterTotals],
    year: u16,
    n: usize,
    merge_food: bool,
) -> Vec<RankedRow> {
    let rows: Vec<ChapterTotals> = chapter_totals
        .iter()
        .filter(|c| c.year == year)
        .cloned()
        .collect();
    chapter_totals_all_years(&rows, n, merge_food)
}

/// Top-`n` partners on the `role` side per (year, chapter).
pub fn top_partners_all_years<'a>(
    flows: impl IntoIterator<Item = &'a TradeFlow>,
    role: TradeRole,
    n: usize,
) -> Vec<RankedRow> {
    let mut partitions: BTreeMap<(u16, &'a str), HashMap<Entity, (f64, f64)>> = BTreeMap::new();
    for flow in flows {
        add(
            partitions
                .entry((flow.year, flow.product_chapter.as_str()))
                .or_default(),
            Entity::Country(role.of(flow)),
            flow.value_trln_usd,
            flow.quantity_mln_metric_tons,
        );
    }

    partitions
        .into_iter()
        .flat_map(|((year, chapter), sums)| rank_partition(year, Some(chapter), sums, n))
        .collect()
}

/// [`top_partners_all_years`] filtered to one year and/or one chapter.
pub fn top_partners<'a>(
    flows: impl IntoIterator<Item = &'a TradeFlow>,
    role: TradeRole,
    year: Option<u16>,
    chapter: Option<&str>,
    n: usize,
) -> Vec<RankedRow> {
    top_partners_all_years(
        flows.into_iter().filter(|f| {
            year.map_or(true, |y| f.year == y)
                && chapter.map_or(true, |c| f.product_chapter == c)
        }),
        role,
        n,
    )
}

/// Top-`n` partners on the `role` side per year, all chapters together.
pub fn top_partners_by_year<'a>(
    flows: impl IntoIterator<Item = &'a TradeFlow>,
    role: TradeRole,
    n: usize,
) -> Vec<RankedRow> {
    let mut partitions: BTreeMap<u16, HashMap<Entity, (f64, f64)>> = BTreeMap::new();
    for flow in flows {
        add(
            partitions.entry(flow.year).or_default(),
            Entity::Country(role.of(flow)),
            flow.value_trln_usd,
            flow.quantity_mln_metric_tons,
        );
    }

    partitions
        .into_iter()
        .flat_map(|(year, sums)| rank_partition(year, None, sums, n))
        .collect()
}

/// Partners of one country: rank the `role` side of flows whose other side
/// is `country`.
pub fn partners_of<'a>(
    flows: impl IntoIterator<Item = &'a TradeFlow>,
    country: CountryCode,
    role: TradeRole,
    n: usize,
) -> Vec<RankedRow> {
    let counterpart = match role {
        TradeRole::Exporter => TradeRole::Importer,
        TradeRole::Importer => TradeRole::Exporter,
    };
    top_partners_by_year(
        flows.into_iter().filter(|f| counterpart.of(f) == country),
        role,
        n,
    )
}

/// Long-format table: `year`, [`product_chapter`,] `entity_column`, value, quantity.
pub fn ranked_table(rows: &[RankedRow], entity_column: &str) -> Table {
    let with_chapter = rows.iter().any(|r| r.product_chapter.is_some()) && entity_column != "product_chapter";
    let mut columns = vec!["year"];
    if with_chapter {
        columns.push("product_chapter");
    }
    columns.extend([entity_column, "value_trln_USD", "quantity_mln_metric_tons"]);

    let mut table = Table::new(columns);
    for row in rows {
        let mut cells = vec![Cell::from(row.year)];
        if with_chapter {
            cells.push(row.product_chapter.clone().map(Cell::Text).unwrap_or(Cell::Empty));
        }
        cells.push(row.entity.to_cell());
        cells.push(Cell::Float(row.value_trln_usd));
        cells.push(Cell::Float(row.quantity_mln_metric_tons));
        table.push(cells);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(values: &[(u32, f64)]) -> Vec<RankEntry> {
        values
            .iter()
            .map(|&(code, v)| RankEntry {
                entity: Entity::Country(code),
                value_trln_usd: v,
                quantity_mln_metric_tons: v / 2.0,
            })
            .collect()
    }

    fn flow(year: u16, exp: u32, imp: u32, ch: &str, v: f64) -> TradeFlow {
        TradeFlow {
            year,
            exporter: exp,
            importer: imp,
            product_chapter: ch.to_string(),
            value_trln_usd: v,
            quantity_mln_metric_tons: v * 2.0,
        }
    }

    #[test]
    fn test_n2_of_5_appends_other() {
        let ranked = top_n_with_other(
            entries(&[(1, 1.0), (2, 5.0), (3, 3.0), (4, 2.0), (5, 4.0)]),
            2,
            OTHER_LABEL,
        );
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].entity, Entity::Country(2));
        assert_eq!(ranked[1].entity, Entity::Country(5));
        assert_eq!(ranked[2].entity, Entity::Label("Other".into()));
        assert_eq!(ranked[2].value_trln_usd, 6.0);
        assert_eq!(ranked[2].quantity_mln_metric_tons, 3.0);
    }

    #[test]
    fn test_n5_of_5_has_no_other() {
        let ranked = top_n_with_other(
            entries(&[(1, 1.0), (2, 5.0), (3, 3.0), (4, 2.0), (5, 4.0)]),
            5,
            OTHER_LABEL,
        );
        assert_eq!(ranked.len(), 5);
        assert!(ranked.iter().all(|r| matches!(r.entity, Entity::Country(_))));
    }

    #[test]
    fn test_ties_broken_by_entity() {
        let ranked = top_n_with_other(entries(&[(9, 1.0), (3, 1.0), (5, 1.0)]), 2, OTHER_LABEL);
        assert_eq!(ranked[0].entity, Entity::Country(3));
        assert_eq!(ranked[1].entity, Entity::Country(5));
    }

    #[test]
    fn test_empty_partition() {
        assert!(top_n_with_other(Vec::new(), 3, OTHER_LABEL).is_empty());
    }

    #[test]
    fn test_partner_partitions_conserve_totals() {
        let flows = vec![
            flow(2022, 1, 10, "10", 0.5),
            flow(2022, 2, 10, "10", 1.25),
            flow(2022, 3, 11, "10", 2.0),
            flow(2022, 4, 12, "10", 0.75),
            flow(2022, 1, 13, "27", 4.0),
            flow(2023, 1, 10, "10", 1.5),
            flow(2023, 2, 14, "10", 0.25),
        ];
        let ranked = top_partners_all_years(&flows, TradeRole::Importer, 2);

        let mut expected: BTreeMap<(u16, String), f64> = BTreeMap::new();
        for f in &flows {
            *expected.entry((f.year, f.product_chapter.clone())).or_default() += f.value_trln_usd;
        }
        for ((year, chapter), total) in expected {
            let sum: f64 = ranked
                .iter()
                .filter(|r| r.year == year && r.product_chapter.as_deref() == Some(chapter.as_str()))
                .map(|r| r.value_trln_usd)
                .sum();
            assert!((sum - total).abs() < 1e-12, "partition {} {}", year, chapter);
        }

        // 2022/10 has 3 importers (10, 11, 12) → 2 ranked + Other
        let p: Vec<&RankedRow> = ranked
            .iter()
            .filter(|r| r.year == 2022 && r.product_chapter.as_deref() == Some("10"))
            .collect();
        assert_eq!(p.len(), 3);
        assert_eq!(p[0].entity, Entity::Country(11));
        assert_eq!(p[1].entity, Entity::Country(10));
    }

    #[test]
    fn test_chapter_ranking_merges_food() {
        let totals = vec![
            ChapterTotals { year: 2023, product_chapter: "27".into(), value_trln_usd: 3.0, quantity_mln_metric_tons: 1.0 },
            ChapterTotals { year: 2023, product_chapter: "10".into(), value_trln_usd: 1.0, quantity_mln_metric_tons: 1.0 },
            ChapterTotals { year: 2023, product_chapter: "02".into(), value_trln_usd: 1.5, quantity_mln_metric_tons: 1.0 },
            ChapterTotals { year: 2023, product_chapter: "84".into(), value_trln_usd: 2.0, quantity_mln_metric_tons: 1.0 },
            ChapterTotals { year: 2023, product_chapter: "85".into(), value_trln_usd: 0.5, quantity_mln_metric_tons: 1.0 },
        ];
        let ranked = chapter_totals_all_years(&totals, 2, true);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].entity, Entity::Chapter("27".into()));
        assert_eq!(ranked[1].entity, Entity::Label(FOOD_RELATED_LABEL.into()));
        assert_eq!(ranked[1].value_trln_usd, 2.5);
        assert_eq!(ranked[2].entity, Entity::Label(OTHER_LABEL.into()));
        assert_eq!(ranked[2].value_trln_usd, 2.5);

        let unmerged = chapter_totals_for_year(&totals, 2023, 5, false);
        assert_eq!(unmerged.len(), 5);
    }

    #[test]
    fn test_top_partners_filters() {
        let flows = vec![flow(2022, 1, 10, "10", 1.0), flow(2023, 1, 10, "27", 1.0)];
        let only = top_partners(&flows, TradeRole::Exporter, Some(2023), Some("27"), 5);
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].product_chapter.as_deref(), Some("27"));
    }

    #[test]
    fn test_partners_of_country() {
        let flows = vec![
            flow(2023, 1, 156, "27", 3.0),
            flow(2023, 2, 156, "27", 1.0),
            flow(2023, 2, 840, "27", 9.0),
        ];
        let sources = partners_of(&flows, 156, TradeRole::Exporter, 5);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].entity, Entity::Country(1));
        assert_eq!(sources[1].value_trln_usd, 1.0);
    }

    #[test]
    fn test_ranked_table_layout() {
        let flows = vec![flow(2023, 1, 10, "10", 1.0)];
        let table = ranked_table(&top_partners_all_years(&flows, TradeRole::Importer, 5), "importer");
        assert_eq!(
            table.columns(),
            &["year", "product_chapter", "importer", "value_trln_USD", "quantity_mln_metric_tons"]
        );
        assert_eq!(table.get(0, "importer"), Some(&Cell::Int(10)));
    }
}
