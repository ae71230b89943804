//! Transformation module.
//!
//! This module turns raw trade rows into report-ready tables:
//! - Normalize: symbol rename, unit conversion, chapter pre-aggregation
//! - Aggregate: group-and-sum, balances, GDP/CPI normalization
//! - Rank: top-N plus "Other"
//! - Mapper: codes to human-readable labels

pub mod aggregate;
pub mod mapper;
pub mod normalize;
pub mod rank;

pub use aggregate::{
    adjust_for_inflation, country_chapter_flows, country_chapter_series, filter_chapters,
    food_only, food_totals_by_country, safe_ratio, top_surplus_deficit_shares, total_trade,
    totals_by_country, totals_per_chapter, trade_as_pct_of_gdp, BalanceShares, CountryBalances,
    InflationAdjusted, YearRatio,
};
pub use mapper::{make_human_readable, make_human_readable_str, CountryFormat, Lookups, ProductFormat};
pub use normalize::{chapter_of, normalize, rename_symbols};
pub use rank::{
    chapter_totals_all_years, chapter_totals_for_year, partners_of, ranked_table,
    top_n_with_other, top_partners, top_partners_all_years, top_partners_by_year, RankEntry,
    FOOD_RELATED_LABEL, OTHER_LABEL,
};
