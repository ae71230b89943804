//! Column-ordered output table.
//!
//! Aggregates are computed on typed rows; reports convert them into a
//! [`Table`] right before label mapping and CSV output, since both of those
//! operate on columns by name.

use std::fmt;

/// One table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Text(String),
    /// Missing value (e.g. a ratio whose denominator was zero).
    Empty,
}

impl Cell {
    /// Render for CSV output, floats with `precision` decimals.
    pub fn render(&self, precision: usize) -> String {
        match self {
            Cell::Int(v) => v.to_string(),
            Cell::Float(v) if v.is_finite() => format!("{:.*}", precision, v),
            Cell::Float(_) | Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<Option<f64>> for Cell {
    fn from(v: Option<f64>) -> Self {
        v.map(Cell::Float).unwrap_or(Cell::Empty)
    }
}

impl From<u16> for Cell {
    fn from(v: u16) -> Self {
        Cell::Int(i64::from(v))
    }
}

impl From<u32> for Cell {
    fn from(v: u32) -> Self {
        Cell::Int(i64::from(v))
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Text(v)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Int(v) => write!(f, "{}", v),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Empty => Ok(()),
        }
    }
}

/// Ordered columns plus rows of cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
    /// Name of the index column, written first when requested.
    index: Option<String>,
}

impl Table {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            index: None,
        }
    }

    /// Mark `column` as the index (written only when the writer asks for it).
    pub fn with_index(mut self, column: impl Into<String>) -> Self {
        self.index = Some(column.into());
        self
    }

    /// Append a row; short rows are padded with [`Cell::Empty`].
    pub fn push(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Empty);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at (`row`, `column`).
    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Replace every cell of `column` with `f(cell)`.
    pub fn try_map_column<E>(
        &mut self,
        column: &str,
        mut f: impl FnMut(&Cell) -> Result<Cell, E>,
    ) -> Result<bool, E> {
        let Some(idx) = self.column_index(column) else {
            return Ok(false);
        };
        for row in &mut self.rows {
            row[idx] = f(&row[idx])?;
        }
        Ok(true)
    }
}
