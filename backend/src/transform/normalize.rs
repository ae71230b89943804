//! Raw BACI rows → normalized trade flows.
//!
//! ```text
//! t,i,j,k,v,q                        year,exporter,importer,product_chapter,
//! 2023,682,804,100190,5000000,2e6  →  value_trln_USD,quantity_mln_metric_tons
//!                                    2023,682,804,"10",5.0,2.0
//! ```
//!
//! Values arrive in thousands of USD and are divided by 1e9 (trillions of
//! USD); quantities arrive in metric tons and are divided by 1e6 (millions of
//! metric tons). Rows are then re-summed per (year, exporter, importer,
//! chapter).

use std::collections::BTreeMap;

use crate::config::SYMBOL_TO_COLNAME;
use crate::error::NormalizeError;
use crate::models::{CountryCode, RawTradeRecord, TradeFlow};

/// Divisor turning thousands of USD into trillions of USD.
pub const VALUE_SCALE: f64 = 1_000.0 * 1_000.0 * 1_000.0;

/// Divisor turning metric tons into millions of metric tons.
pub const QUANTITY_SCALE: f64 = 1_000.0 * 1_000.0;

/// Digits of a full HS product code.
const HS_CODE_DIGITS: usize = 6;

/// Check the raw header and return the semantic names in header order.
///
/// Fails on the first raw symbol the header lacks.
pub fn rename_symbols(headers: &[String]) -> Result<Vec<String>, NormalizeError> {
    for (symbol, name) in SYMBOL_TO_COLNAME {
        if !headers.iter().any(|h| h == symbol) {
            return Err(NormalizeError::MissingColumn {
                symbol: symbol.to_string(),
                name: name.to_string(),
            });
        }
    }

    Ok(headers
        .iter()
        .map(|h| {
            SYMBOL_TO_COLNAME
                .iter()
                .find(|(symbol, _)| symbol == h)
                .map(|(_, name)| name.to_string())
                .unwrap_or_else(|| h.clone())
        })
        .collect())
}

/// 2-digit chapter of a product code.
///
/// Numeric codes stored without their leading zero (`10121` for `010121`)
/// are padded back to six digits first.
pub fn chapter_of(product_code: &str) -> Result<String, NormalizeError> {
    let code = product_code.trim();
    if code.is_empty() {
        return Err(NormalizeError::InvalidProductCode(product_code.to_string()));
    }
    let padded = if code.len() < HS_CODE_DIGITS && code.chars().all(|c| c.is_ascii_digit()) {
        format!("{:0>width$}", code, width = HS_CODE_DIGITS)
    } else {
        code.to_string()
    };

    padded
        .get(..2)
        .filter(|c| c.chars().count() == 2)
        .map(str::to_string)
        .ok_or_else(|| NormalizeError::InvalidProductCode(product_code.to_string()))
}

/// Thousands of USD → trillions of USD.
pub fn scale_value(value_thousands_usd: f64) -> f64 {
    value_thousands_usd / VALUE_SCALE
}

/// Metric tons → millions of metric tons.
pub fn scale_quantity(quantity_tons: f64) -> f64 {
    quantity_tons / QUANTITY_SCALE
}

/// Inverse of [`scale_value`].
pub fn unscale_value(value_trln_usd: f64) -> f64 {
    value_trln_usd * VALUE_SCALE
}

/// Inverse of [`scale_quantity`].
pub fn unscale_quantity(quantity_mln_metric_tons: f64) -> f64 {
    quantity_mln_metric_tons * QUANTITY_SCALE
}

type FlowKey = (u16, CountryCode, CountryCode, String);

/// Convert units, derive chapters and re-sum per (year, exporter, importer, chapter).
///
/// The output is sorted by that key. Missing quantities count as zero.
pub fn normalize(records: &[RawTradeRecord]) -> Result<Vec<TradeFlow>, NormalizeError> {
    let mut sums: BTreeMap<FlowKey, (f64, f64)> = BTreeMap::new();

    for record in records {
        let chapter = chapter_of(&record.k)?;
        let entry = sums
            .entry((record.t, record.i, record.j, chapter))
            .or_insert((0.0, 0.0));
        entry.0 += scale_value(record.v);
        entry.1 += scale_quantity(record.q.unwrap_or(0.0));
    }

    Ok(sums
        .into_iter()
        .map(|((year, exporter, importer, product_chapter), (value, quantity))| TradeFlow {
            year,
            exporter,
            importer,
            product_chapter,
            value_trln_usd: value,
            quantity_mln_metric_tons: quantity,
        })
        .collect())
}
