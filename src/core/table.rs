use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::{QcError, Result};

/// Single value stored in a table column or index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Cell {
    /// Null and NaN both count as missing
    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Float(v) => Some(*v),
            Cell::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Cell::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Cell::Int(_) | Cell::Float(_) => 0,
            Cell::Timestamp(_) => 1,
            Cell::Text(_) => 2,
            Cell::Null => 3,
        }
    }

    /// Total order used for index sorting; missing values sort last
    pub fn total_cmp(&self, other: &Cell) -> Ordering {
        match (self, other) {
            (Cell::Int(a), Cell::Int(b)) => a.cmp(b),
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            (Cell::Timestamp(a), Cell::Timestamp(b)) => a.cmp(b),
            (a, b) if a.rank() == 0 && b.rank() == 0 => {
                let (x, y) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
                match (x.is_nan(), y.is_nan()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => x.total_cmp(&y),
                }
            }
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

// Non-finite floats are stored as Null so the JSON leaf encoding stays lossless.
impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        if v.is_finite() {
            Cell::Float(v)
        } else {
            Cell::Null
        }
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<usize> for Cell {
    fn from(v: usize) -> Self {
        Cell::Int(v as i64)
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

impl From<DateTime<Utc>> for Cell {
    fn from(v: DateTime<Utc>) -> Self {
        Cell::Timestamp(v)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Cell::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Cell>,
}

/// Column-oriented table with a (possibly named) row index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    index_name: Option<String>,
    index: Vec<Cell>,
    columns: Vec<Column>,
}

impl Table {
    /// Empty table with the given column set
    pub fn new<S: AsRef<str>>(column_names: &[S]) -> Self {
        Self {
            index_name: None,
            index: Vec::new(),
            columns: column_names
                .iter()
                .map(|name| Column {
                    name: name.as_ref().to_string(),
                    values: Vec::new(),
                })
                .collect(),
        }
    }

    pub fn with_index_name(mut self, name: impl Into<String>) -> Self {
        self.index_name = Some(name.into());
        self
    }

    /// Build a table from whole columns, validating lengths
    pub fn from_columns(
        index_name: Option<String>,
        index: Vec<Cell>,
        columns: Vec<Column>,
    ) -> Result<Self> {
        for column in &columns {
            if column.values.len() != index.len() {
                return Err(QcError::Schema(format!(
                    "column '{}' has {} values, index has {}",
                    column.name,
                    column.values.len(),
                    index.len()
                )));
            }
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(QcError::Schema(format!("duplicate column '{}'", column.name)));
            }
        }

        Ok(Self {
            index_name,
            index,
            columns,
        })
    }

    /// Append one row; `values` must match the column order
    pub fn push_row(&mut self, index: impl Into<Cell>, values: Vec<Cell>) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(QcError::Schema(format!(
                "row has {} values, table has {} columns",
                values.len(),
                self.columns.len()
            )));
        }

        self.index.push(index.into());
        for (column, value) in self.columns.iter_mut().zip(values) {
            column.values.push(value);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index_name(&self) -> Option<&str> {
        self.index_name.as_deref()
    }

    pub fn index(&self) -> &[Cell] {
        &self.index
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[Cell]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Values of row `i` in column order
    pub fn row(&self, i: usize) -> Option<Vec<&Cell>> {
        if i >= self.len() {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[i]).collect())
    }

    /// New table holding the given rows, in the given order
    pub fn take_rows(&self, rows: &[usize]) -> Table {
        Table {
            index_name: self.index_name.clone(),
            index: rows.iter().map(|&i| self.index[i].clone()).collect(),
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: rows.iter().map(|&i| c.values[i].clone()).collect(),
                })
                .collect(),
        }
    }

    /// Keep rows for which `keep(row)` holds
    pub fn filter_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&[&Cell]) -> bool,
    {
        let selected: Vec<usize> = (0..self.len())
            .filter(|&i| {
                let row: Vec<&Cell> = self.columns.iter().map(|c| &c.values[i]).collect();
                keep(&row)
            })
            .collect();
        self.take_rows(&selected)
    }

    /// Drop every row that has a missing value in any column
    pub fn drop_missing(&self) -> Table {
        self.filter_rows(|row| row.iter().all(|cell| !cell.is_missing()))
    }

    /// Stable sort of rows by index value
    pub fn sort_by_index(&self) -> Table {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| self.index[a].total_cmp(&self.index[b]));
        self.take_rows(&order)
    }

    pub fn is_sorted_by_index(&self) -> bool {
        self.index
            .windows(2)
            .all(|w| w[0].total_cmp(&w[1]) != Ordering::Greater)
    }
}
