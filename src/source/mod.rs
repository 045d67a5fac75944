//! Source reader
//!
//! Fetches a dataset from a local path or an HTTP(S) URL and decodes it. The
//! format is never taken from the file extension: readers are tried in a
//! fixed order (delimited text first, then Parquet) and the first one that
//! decodes the bytes wins.

mod error;

pub use error::SourceError;

use std::fmt;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use arrow::csv::ReaderBuilder;
use arrow::csv::reader::Format;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::{debug, info, warn};

use crate::dataset::{Dataset, dataset_from_batches};

const CSV_BATCH_SIZE: usize = 8192;

/// Where a dataset is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Url(String),
    Path(PathBuf),
}

impl SourceLocation {
    /// Classify a raw location string
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            SourceLocation::Url(trimmed.to_string())
        } else {
            SourceLocation::Path(PathBuf::from(trimmed))
        }
    }

    /// Logical dataset name used as the table name downstream
    ///
    /// `.../donations-state.csv.gz?raw=1` becomes `donations_state`.
    pub fn dataset_name(&self) -> String {
        let segment = match self {
            SourceLocation::Url(url) => {
                let without_query = url.split(['?', '#']).next().unwrap_or(url);
                without_query
                    .trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .unwrap_or(without_query)
                    .to_string()
            }
            SourceLocation::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let stem = segment.split('.').next().unwrap_or_default();
        stem.replace('-', "_")
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::Url(url) => f.write_str(url),
            SourceLocation::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Serialization formats the reader understands, in probing order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Parquet,
}

impl SourceFormat {
    pub const PROBE_ORDER: [SourceFormat; 2] = [SourceFormat::Csv, SourceFormat::Parquet];

    pub fn name(&self) -> &'static str {
        match self {
            SourceFormat::Csv => "csv",
            SourceFormat::Parquet => "parquet",
        }
    }
}

/// Fetch and decode a source into a dataset named after the location
pub fn read_source(location: &SourceLocation) -> Result<Dataset, SourceError> {
    let bytes = fetch(location)?;
    debug!(location = %location, bytes = bytes.len(), "Fetched source");

    let (format, mut dataset) = decode_bytes(&location.to_string(), bytes)?;
    dataset.set_name(location.dataset_name());

    info!(
        location = %location,
        format = format.name(),
        rows = dataset.num_rows(),
        columns = dataset.num_columns(),
        "Read source"
    );
    Ok(dataset)
}

/// Try every reader in order and return the first successful decode
pub fn decode_bytes(
    location: &str,
    bytes: Bytes,
) -> Result<(SourceFormat, Dataset), SourceError> {
    let mut last_error = String::from("no readers attempted");

    for format in SourceFormat::PROBE_ORDER {
        let attempt = match format {
            SourceFormat::Csv => read_csv(&bytes),
            SourceFormat::Parquet => read_parquet(bytes.clone()),
        };
        match attempt {
            Ok(dataset) => return Ok((format, dataset)),
            Err(e) => {
                debug!(location, format = format.name(), error = %e, "Reader rejected source");
                last_error = e;
            }
        }
    }

    warn!(location, error = %last_error, "No reader could decode source");
    Err(SourceError::UnsupportedFormat {
        location: location.to_string(),
        last_error,
    })
}

fn read_csv(bytes: &Bytes) -> Result<Dataset, String> {
    std::str::from_utf8(bytes).map_err(|e| format!("csv: input is not UTF-8: {e}"))?;
    if bytes.contains(&0) {
        return Err("csv: input contains NUL bytes".to_string());
    }

    let format = Format::default().with_header(true);
    let (schema, _) = format
        .infer_schema(Cursor::new(bytes.as_ref()), None)
        .map_err(|e| format!("csv: {e}"))?;
    if schema.fields().is_empty() {
        return Err("csv: no columns found".to_string());
    }

    let reader = ReaderBuilder::new(Arc::new(schema.clone()))
        .with_format(format)
        .with_batch_size(CSV_BATCH_SIZE)
        .build(Cursor::new(bytes.as_ref()))
        .map_err(|e| format!("csv: {e}"))?;
    let batches: Vec<RecordBatch> = reader
        .collect::<Result<_, _>>()
        .map_err(|e| format!("csv: {e}"))?;

    dataset_from_batches("", &schema, &batches).map_err(|e| format!("csv: {e}"))
}

fn read_parquet(bytes: Bytes) -> Result<Dataset, String> {
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(bytes).map_err(|e| format!("parquet: {e}"))?;
    let schema = builder.schema().clone();
    let reader = builder.build().map_err(|e| format!("parquet: {e}"))?;
    let batches: Vec<RecordBatch> = reader
        .collect::<Result<_, _>>()
        .map_err(|e| format!("parquet: {e}"))?;

    dataset_from_batches("", &schema, &batches).map_err(|e| format!("parquet: {e}"))
}

fn fetch(location: &SourceLocation) -> Result<Bytes, SourceError> {
    match location {
        SourceLocation::Path(path) => std::fs::read(path)
            .map(Bytes::from)
            .map_err(|source| SourceError::Io {
                location: location.to_string(),
                source,
            }),
        SourceLocation::Url(url) => fetch_url(url),
    }
}

#[cfg(feature = "remote")]
fn fetch_url(url: &str) -> Result<Bytes, SourceError> {
    let fetch_error = |e: reqwest::Error| SourceError::Fetch {
        location: url.to_string(),
        message: e.to_string(),
    };

    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(fetch_error)?;
    response.bytes().map_err(fetch_error)
}

#[cfg(not(feature = "remote"))]
fn fetch_url(url: &str) -> Result<Bytes, SourceError> {
    Err(SourceError::RemoteDisabled(url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ColumnData;

    #[test]
    fn test_parse_location() {
        assert!(matches!(
            SourceLocation::parse("https://example.org/a.csv"),
            SourceLocation::Url(_)
        ));
        assert!(matches!(
            SourceLocation::parse("HTTP://example.org/a.csv"),
            SourceLocation::Url(_)
        ));
        assert_eq!(
            SourceLocation::parse("data/a.csv"),
            SourceLocation::Path(PathBuf::from("data/a.csv"))
        );
    }

    #[test]
    fn test_dataset_name() {
        let cases = [
            (
                "https://raw.githubusercontent.com/MoH-Malaysia/data-darah-public/main/donations_facility.csv",
                "donations_facility",
            ),
            ("https://dub.sh/ds-data-granular", "ds_data_granular"),
            ("https://example.org/new-donors.csv.gz?raw=true", "new_donors"),
            ("/tmp/blood-2024.parquet", "blood_2024"),
        ];
        for (raw, expected) in cases {
            assert_eq!(SourceLocation::parse(raw).dataset_name(), expected, "{raw}");
        }
    }

    #[test]
    fn test_decode_csv() {
        let csv = "date,state,daily\n2024-01-01,Johor,10\n2024-01-02,Kedah,-3\n";
        let (format, ds) = decode_bytes("mem", Bytes::from(csv)).unwrap();
        assert_eq!(format, SourceFormat::Csv);
        assert_eq!(ds.num_rows(), 2);
        assert_eq!(
            ds.column("daily").unwrap().data,
            ColumnData::Int(vec![Some(10), Some(-3)])
        );
    }

    #[test]
    fn test_decode_garbage_reports_last_error() {
        let bytes = Bytes::from_static(&[0xff, 0xfe, 0x00, 0x01]);
        let err = decode_bytes("mem", bytes).unwrap_err();
        match err {
            SourceError::UnsupportedFormat { location, last_error } => {
                assert_eq!(location, "mem");
                assert!(last_error.starts_with("parquet"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let location = SourceLocation::parse("/nonexistent/dir/file.csv");
        assert!(matches!(
            read_source(&location),
            Err(SourceError::Io { .. })
        ));
    }
}
