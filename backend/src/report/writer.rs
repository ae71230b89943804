//! CSV and JSON output.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use serde::Serialize;

use crate::error::{WriteError, WriteResult};
use crate::logs::{log_error, log_info_indent};
use crate::models::Table;

/// Output options
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// Write the table's index column first.
    pub index: bool,
    /// Decimals for float cells.
    pub precision: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            index: false,
            precision: 8,
        }
    }
}

impl WriteOptions {
    pub fn with_index() -> Self {
        Self {
            index: true,
            ..Self::default()
        }
    }
}

fn ensure_parent(path: &Path) -> WriteResult<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).map_err(|source| WriteError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
    }
    Ok(())
}

/// Column order on disk: the index column first when requested, then the
/// remaining columns; without `index` the index column is dropped.
fn output_order(table: &Table, index: bool) -> Vec<usize> {
    let index_col = table.index().and_then(|name| table.column_index(name));
    let rest = (0..table.columns().len()).filter(|i| Some(*i) != index_col);
    match index_col {
        Some(idx) if index => std::iter::once(idx).chain(rest).collect(),
        _ => rest.collect(),
    }
}

/// Write `table` as CSV to any writer.
pub fn write_table<W: io::Write>(table: &Table, out: W, opts: WriteOptions) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);

    let order = output_order(table, opts.index);
    writer.write_record(order.iter().map(|&i| table.columns()[i].as_str()))?;
    for row in table.rows() {
        writer.write_record(order.iter().map(|&i| row[i].render(opts.precision)))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write `table` as UTF-8 CSV, creating parent directories.
pub fn save_table(table: &Table, path: &Path, opts: WriteOptions) -> WriteResult<()> {
    ensure_parent(path)?;
    let file = File::create(path).map_err(|source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    write_table(table, file, opts).map_err(|e| WriteError::Csv {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// [`save_table`], logging instead of failing.
///
/// Returns whether the file was written.
pub fn try_save_table(table: &Table, path: &Path, opts: WriteOptions) -> bool {
    match save_table(table, path, opts) {
        Ok(()) => {
            log_info_indent(format!("Wrote {} ({} rows)", path.display(), table.len()), 1);
            true
        }
        Err(e) => {
            log_error(format!("Could not save {}: {}", path.display(), e));
            false
        }
    }
}

/// Write `value` as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> WriteResult<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).map_err(|source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;
    use tempfile::tempdir;

    fn sample() -> Table {
        let mut table = Table::new(["year", "trade_pcn_gdp"]).with_index("year");
        table.push(vec![Cell::Int(2023), Cell::Float(22.5)]);
        table.push(vec![Cell::Int(2022), Cell::Empty]);
        table
    }

    #[test]
    fn test_save_creates_dirs_and_formats_floats() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        save_table(&sample(), &path, WriteOptions::with_index()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["year,trade_pcn_gdp", "2023,22.50000000", "2022,"]);
    }

    #[test]
    fn test_index_column_dropped_without_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        save_table(&sample(), &path, WriteOptions::default()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().next(), Some("trade_pcn_gdp"));
    }

    #[test]
    fn test_try_save_reports_failure() {
        let dir = tempdir().unwrap();
        // a file where a directory is expected
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        assert!(!try_save_table(&sample(), &blocker.join("out.csv"), WriteOptions::default()));
    }

    #[test]
    fn test_write_json_array() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("available_countries.json");
        write_json(&["CHN", "USA"], &path).unwrap();
        let parsed: Vec<String> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, vec!["CHN", "USA"]);
    }
}
