//! Report recipes.
//!
//! - [`general`] - world-level tables in the output root
//! - [`interactive`] - per-country tables for the interactive map
//! - [`country`] - bespoke per-country recipes
//! - [`writer`] - CSV/JSON output

pub mod country;
pub mod general;
pub mod interactive;
pub mod writer;

pub use writer::{save_table, try_save_table, write_json, WriteOptions};

/// Files written and failed by a report stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportTally {
    pub written: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ReportTally {
    /// Count the outcome of one [`try_save_table`] call.
    pub fn record(&mut self, written: bool) {
        if written {
            self.written += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn merge(&mut self, other: ReportTally) {
        self.written += other.written;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

/// Round to two decimals; values rounding to zero come out as `0.0`, never `-0.0`.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0 + 0.0
}
