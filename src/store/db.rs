//! DuckDB-backed analytics store

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate};
use duckdb::types::{TimeUnit, Value};
use duckdb::{AccessMode, Config, Connection};
use tracing::{debug, info};

use super::error::StoreError;
use crate::dataset::{ColumnData, Dataset};

/// Quote an identifier for use in SQL text
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Embedded analytical store holding one table per cleaned dataset
pub struct AnalyticsStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl AnalyticsStore {
    /// Open or create a store at the given path, creating parent directories
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| StoreError::Open {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        debug!(path = %path.display(), "Opened store read-write");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an existing store without write access
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let open_error = |e: duckdb::Error| StoreError::Open {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        let config = Config::default()
            .access_mode(AccessMode::ReadOnly)
            .map_err(open_error)?;
        let conn = Connection::open_with_flags(path, config).map_err(open_error)?;
        debug!(path = %path.display(), "Opened store read-only");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory store (for testing)
    pub fn memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn, path: None })
    }

    /// Get the database path (if not in-memory)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Replace `dataset.name()` with the dataset contents in one transaction
    ///
    /// On failure the transaction is rolled back and any previous table of
    /// that name is left as it was. Returns the number of rows written.
    pub fn replace_table(&mut self, dataset: &Dataset) -> Result<usize, StoreError> {
        let table = dataset.name().to_string();
        if dataset.num_columns() == 0 {
            return Err(StoreError::EmptySchema(table));
        }

        let persist = |source: duckdb::Error| StoreError::Persistence {
            table: table.clone(),
            source,
        };

        let columns: Vec<String> = dataset
            .columns()
            .iter()
            .map(|c| format!("{} {}", quote_ident(&c.name), c.data.column_type().sql_type()))
            .collect();
        let ddl = format!(
            "CREATE OR REPLACE TABLE {} ({})",
            quote_ident(&table),
            columns.join(", ")
        );

        let tx = self.conn.transaction().map_err(persist)?;
        tx.execute_batch(&ddl).map_err(persist)?;
        {
            let mut appender = tx.appender(&table).map_err(persist)?;
            for row in 0..dataset.num_rows() {
                let values = dataset.columns().iter().map(|c| cell_value(&c.data, row));
                appender
                    .append_row(duckdb::appender_params_from_iter(values))
                    .map_err(persist)?;
            }
            appender.flush().map_err(persist)?;
        }
        tx.commit().map_err(persist)?;

        info!(table = %table, rows = dataset.num_rows(), "Replaced table");
        Ok(dataset.num_rows())
    }

    /// Names of all user tables, sorted
    pub fn table_names(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT table_name FROM information_schema.tables
             WHERE table_schema = 'main' ORDER BY table_name",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    /// Check that a table exists
    pub fn has_table(&self, table: &str) -> Result<bool, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables
             WHERE table_schema = 'main' AND table_name = ?1",
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn require_table(&self, table: &str) -> Result<(), StoreError> {
        if self.has_table(table)? {
            Ok(())
        } else {
            Err(StoreError::UnknownTable(table.to_string()))
        }
    }

    /// Number of rows in a table
    pub fn row_count(&self, table: &str) -> Result<i64, StoreError> {
        self.require_table(table)?;
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count)
    }

    /// Column names of a table, in table order
    pub fn column_names(&self, table: &str) -> Result<Vec<String>, StoreError> {
        self.require_table(table)?;
        let mut stmt = self.conn.prepare(
            "SELECT column_name FROM information_schema.columns
             WHERE table_schema = 'main' AND table_name = ?1 ORDER BY ordinal_position",
        )?;
        let rows = stmt.query_map([table], |row| row.get::<_, String>(0))?;
        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    /// First `limit` rows of a table as JSON objects
    pub fn preview(&self, table: &str, limit: usize) -> Result<Vec<serde_json::Value>, StoreError> {
        self.require_table(table)?;
        let sql = format!("SELECT * FROM {} LIMIT ?1", quote_ident(table));
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([limit as i64])?;

        // Column names are only known once the statement has run
        let column_count = rows.as_ref().map(|r| r.column_count()).unwrap_or(0);
        let column_names: Vec<String> = (0..column_count)
            .map(|i| {
                rows.as_ref()
                    .and_then(|r| r.column_name(i).ok())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("col{}", i))
            })
            .collect();

        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            let mut obj = serde_json::Map::new();
            for (i, name) in column_names.iter().enumerate() {
                let value: Value = row.get(i)?;
                obj.insert(name.clone(), value_to_json(value));
            }
            results.push(serde_json::Value::Object(obj));
        }
        Ok(results)
    }

    /// Checkpoint and close the store
    pub fn close(self) -> Result<(), StoreError> {
        if self.path.is_some() {
            self.conn.execute_batch("CHECKPOINT")?;
        }
        self.conn.close().map_err(|(_, e)| StoreError::from(e))?;
        debug!("Closed store");
        Ok(())
    }
}

fn unix_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

fn cell_value(data: &ColumnData, row: usize) -> Value {
    match data {
        ColumnData::Int(v) => v[row].map_or(Value::Null, Value::BigInt),
        ColumnData::Float(v) => v[row].map_or(Value::Null, Value::Double),
        ColumnData::Bool(v) => v[row].map_or(Value::Null, Value::Boolean),
        ColumnData::Text(v) => v[row].clone().map_or(Value::Null, Value::Text),
        ColumnData::Date(v) => v[row].map_or(Value::Null, |d| {
            Value::Date32((d - unix_epoch()).num_days() as i32)
        }),
        ColumnData::Timestamp(v) => v[row].map_or(Value::Null, |t| {
            Value::Timestamp(TimeUnit::Microsecond, t.and_utc().timestamp_micros())
        }),
    }
}

fn json_number(f: f64) -> serde_json::Value {
    serde_json::Number::from_f64(f)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

/// Convert a DuckDB value into JSON; dates render as ISO strings
fn value_to_json(value: Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(b),
        Value::TinyInt(n) => serde_json::Value::Number(n.into()),
        Value::SmallInt(n) => serde_json::Value::Number(n.into()),
        Value::Int(n) => serde_json::Value::Number(n.into()),
        Value::BigInt(n) => serde_json::Value::Number(n.into()),
        Value::UTinyInt(n) => serde_json::Value::Number(n.into()),
        Value::USmallInt(n) => serde_json::Value::Number(n.into()),
        Value::UInt(n) => serde_json::Value::Number(n.into()),
        Value::UBigInt(n) => serde_json::Value::Number(n.into()),
        Value::HugeInt(n) => i64::try_from(n)
            .map(|n| serde_json::Value::Number(n.into()))
            .unwrap_or_else(|_| serde_json::Value::String(n.to_string())),
        Value::Float(f) => json_number(f as f64),
        Value::Double(f) => json_number(f),
        Value::Text(s) => serde_json::Value::String(s),
        Value::Date32(days) => {
            let date = unix_epoch() + chrono::Duration::days(days as i64);
            serde_json::Value::String(date.format("%Y-%m-%d").to_string())
        }
        Value::Timestamp(unit, v) => {
            let micros = match unit {
                TimeUnit::Second => v.saturating_mul(1_000_000),
                TimeUnit::Millisecond => v.saturating_mul(1_000),
                TimeUnit::Microsecond => v,
                TimeUnit::Nanosecond => v / 1_000,
            };
            DateTime::from_timestamp_micros(micros)
                .map(|t| {
                    serde_json::Value::String(t.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string())
                })
                .unwrap_or(serde_json::Value::Null)
        }
        other => serde_json::Value::String(format!("{:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;
    use tempfile::TempDir;

    fn dataset(name: &str, ids: Vec<Option<i64>>) -> Dataset {
        let n = ids.len();
        let dates = (0..n)
            .map(|i| NaiveDate::from_ymd_opt(2024, 1, 1 + i as u32))
            .collect();
        Dataset::new(
            name,
            vec![
                Column::new("id", ColumnData::Int(ids)),
                Column::new("date", ColumnData::Date(dates)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_replace_table_overwrites() {
        let mut store = AnalyticsStore::memory().unwrap();
        store.replace_table(&dataset("t", vec![Some(1), Some(2), Some(3)])).unwrap();
        store.replace_table(&dataset("t", vec![Some(9)])).unwrap();

        assert_eq!(store.row_count("t").unwrap(), 1);
        assert_eq!(store.table_names().unwrap(), vec!["t".to_string()]);
    }

    #[test]
    fn test_preview_renders_dates() {
        let mut store = AnalyticsStore::memory().unwrap();
        store.replace_table(&dataset("t", vec![Some(1), None])).unwrap();

        let rows = store.preview("t", 5).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], serde_json::json!(1));
        assert_eq!(rows[0]["date"], serde_json::json!("2024-01-01"));
        assert_eq!(rows[1]["id"], serde_json::Value::Null);
    }

    #[test]
    fn test_unknown_table() {
        let store = AnalyticsStore::memory().unwrap();
        assert!(matches!(
            store.preview("missing", 5),
            Err(StoreError::UnknownTable(_))
        ));
        assert!(matches!(
            store.row_count("x\"; DROP TABLE t; --"),
            Err(StoreError::UnknownTable(_))
        ));
    }

    #[test]
    fn test_failed_replace_keeps_previous_table() {
        let mut store = AnalyticsStore::memory().unwrap();
        store.replace_table(&dataset("t", vec![Some(1), Some(2)])).unwrap();

        // Duplicate column names make CREATE TABLE fail inside the transaction
        let clash = Dataset::new(
            "t",
            vec![
                Column::new("vendor_id", ColumnData::Int(vec![Some(7)])),
                Column::new("vendor_id", ColumnData::Int(vec![Some(8)])),
            ],
        )
        .unwrap();
        match store.replace_table(&clash) {
            Err(StoreError::Persistence { table, .. }) => assert_eq!(table, "t"),
            other => panic!("expected persistence error, got {other:?}"),
        }

        assert_eq!(store.row_count("t").unwrap(), 2);
        assert_eq!(store.column_names("t").unwrap(), vec!["id", "date"]);
    }

    #[test]
    fn test_empty_schema_rejected() {
        let mut store = AnalyticsStore::memory().unwrap();
        let empty = Dataset::new("empty", vec![]).unwrap();
        assert!(matches!(
            store.replace_table(&empty),
            Err(StoreError::EmptySchema(_))
        ));
    }

    #[test]
    fn test_reopen_read_only() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("store.duckdb");

        let mut store = AnalyticsStore::open(&path).unwrap();
        store.replace_table(&dataset("t", vec![Some(1), Some(2)])).unwrap();
        store.close().unwrap();

        let reader = AnalyticsStore::open_read_only(&path).unwrap();
        assert_eq!(reader.row_count("t").unwrap(), 2);
        assert_eq!(reader.column_names("t").unwrap(), vec!["id", "date"]);
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("plain"), "\"plain\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
