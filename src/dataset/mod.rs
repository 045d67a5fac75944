//! In-memory tabular model shared by every pipeline stage
//!
//! A [`Dataset`] is an ordered list of named, typed columns of equal length.
//! `None` is the null marker in every column type. Readers produce datasets
//! from Arrow record batches, cleaning stages rewrite them, and the store
//! and exporters consume them.

mod arrow_convert;

use std::collections::HashSet;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

pub use arrow_convert::{ConversionError, dataset_from_batches, dataset_to_batch};

/// Logical type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Int,
    Float,
    Bool,
    Text,
    Date,
    Timestamp,
}

impl ColumnType {
    /// DuckDB type used when the column is persisted
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Int => "BIGINT",
            ColumnType::Float => "DOUBLE",
            ColumnType::Bool => "BOOLEAN",
            ColumnType::Text => "VARCHAR",
            ColumnType::Date => "DATE",
            ColumnType::Timestamp => "TIMESTAMP",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Int => "int",
            ColumnType::Float => "float",
            ColumnType::Bool => "bool",
            ColumnType::Text => "text",
            ColumnType::Date => "date",
            ColumnType::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

/// Column values, one vector per logical type
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
    Text(Vec<Option<String>>),
    Date(Vec<Option<NaiveDate>>),
    Timestamp(Vec<Option<NaiveDateTime>>),
}

impl ColumnData {
    /// Number of values (nulls included)
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
            ColumnData::Text(v) => v.len(),
            ColumnData::Date(v) => v.len(),
            ColumnData::Timestamp(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnData::Int(_) => ColumnType::Int,
            ColumnData::Float(_) => ColumnType::Float,
            ColumnData::Bool(_) => ColumnType::Bool,
            ColumnData::Text(_) => ColumnType::Text,
            ColumnData::Date(_) => ColumnType::Date,
            ColumnData::Timestamp(_) => ColumnType::Timestamp,
        }
    }

    /// Number of null values
    pub fn null_count(&self) -> usize {
        match self {
            ColumnData::Int(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Float(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Bool(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Text(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Date(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Timestamp(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    /// Borrow the value at `row`
    ///
    /// Panics if `row` is out of bounds, like slice indexing.
    pub fn cell(&self, row: usize) -> Cell<'_> {
        match self {
            ColumnData::Int(v) => v[row].map_or(Cell::Null, Cell::Int),
            ColumnData::Float(v) => v[row].map_or(Cell::Null, Cell::Float),
            ColumnData::Bool(v) => v[row].map_or(Cell::Null, Cell::Bool),
            ColumnData::Text(v) => v[row].as_deref().map_or(Cell::Null, Cell::Text),
            ColumnData::Date(v) => v[row].map_or(Cell::Null, Cell::Date),
            ColumnData::Timestamp(v) => v[row].map_or(Cell::Null, Cell::Timestamp),
        }
    }

    fn retain_mask(&mut self, keep: &[bool]) {
        fn retain<T>(values: &mut Vec<T>, keep: &[bool]) {
            let mut idx = 0;
            values.retain(|_| {
                let k = keep[idx];
                idx += 1;
                k
            });
        }

        match self {
            ColumnData::Int(v) => retain(v, keep),
            ColumnData::Float(v) => retain(v, keep),
            ColumnData::Bool(v) => retain(v, keep),
            ColumnData::Text(v) => retain(v, keep),
            ColumnData::Date(v) => retain(v, keep),
            ColumnData::Timestamp(v) => retain(v, keep),
        }
    }
}

/// Borrowed view of a single value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell<'a> {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(&'a str),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl<'a> Cell<'a> {
    /// Hashable identity of the value; floats compare by bit pattern
    fn key(self) -> CellKey<'a> {
        match self {
            Cell::Null => CellKey::Null,
            Cell::Int(v) => CellKey::Int(v),
            Cell::Float(v) => CellKey::Float(v.to_bits()),
            Cell::Bool(v) => CellKey::Bool(v),
            Cell::Text(v) => CellKey::Text(v),
            Cell::Date(v) => CellKey::Date(v),
            Cell::Timestamp(v) => CellKey::Timestamp(v),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum CellKey<'a> {
    Null,
    Int(i64),
    Float(u64),
    Bool(bool),
    Text(&'a str),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

/// A named column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Errors raised when assembling a dataset by hand
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
}

/// Ordered collection of equally sized columns
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    name: String,
    columns: Vec<Column>,
}

impl Dataset {
    /// Build a dataset, checking that every column has the same length
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Result<Self, DatasetError> {
        if let Some(first) = columns.first() {
            let expected = first.data.len();
            for column in &columns[1..] {
                if column.data.len() != expected {
                    return Err(DatasetError::LengthMismatch {
                        column: column.name.clone(),
                        expected,
                        actual: column.data.len(),
                    });
                }
            }
        }
        Ok(Self {
            name: name.into(),
            columns,
        })
    }

    /// Logical dataset name, used as the table name downstream
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.data.len())
    }

    /// Null cells across every column
    pub fn null_count(&self) -> usize {
        self.columns.iter().map(|c| c.data.null_count()).sum()
    }

    /// Borrow every value of one row, in column order
    pub fn row(&self, row: usize) -> Vec<Cell<'_>> {
        self.columns.iter().map(|c| c.data.cell(row)).collect()
    }

    /// Keep only the rows whose mask entry is `true`
    ///
    /// Returns the number of rows removed.
    pub fn retain_rows(&mut self, keep: &[bool]) -> usize {
        debug_assert_eq!(keep.len(), self.num_rows());
        let removed = keep.iter().filter(|k| !**k).count();
        if removed > 0 {
            for column in &mut self.columns {
                column.data.retain_mask(keep);
            }
        }
        removed
    }

    /// Mask marking the first occurrence of every distinct row
    pub fn first_occurrence_mask(&self) -> Vec<bool> {
        let rows = self.num_rows();
        let mut seen: HashSet<Vec<CellKey<'_>>> = HashSet::with_capacity(rows);
        let mut keep = Vec::with_capacity(rows);
        for row in 0..rows {
            let key: Vec<CellKey<'_>> = self
                .columns
                .iter()
                .map(|c| c.data.cell(row).key())
                .collect();
            keep.push(seen.insert(key));
        }
        keep
    }
}
