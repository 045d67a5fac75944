//! Export cleaned datasets to files
//!
//! Supported formats:
//! - CSV, optionally gzip-compressed (`.csv.gz`)
//! - Parquet, optionally gzip-compressed pages

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use arrow::csv::WriterBuilder;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use flate2::write::GzEncoder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel};
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::{ConversionError, Dataset, dataset_to_batch};

/// File format for exported datasets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Parquet,
}

impl ExportFormat {
    pub fn extension(&self, compress: bool) -> &'static str {
        match (self, compress) {
            (ExportFormat::Csv, false) => "csv",
            (ExportFormat::Csv, true) => "csv.gz",
            (ExportFormat::Parquet, _) => "parquet",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "parquet" => Ok(ExportFormat::Parquet),
            other => Err(format!(
                "Unsupported export format '{other}'. Supported: csv, parquet"
            )),
        }
    }
}

/// Where and how cleaned datasets are written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Output directory, created if missing
    pub dir: PathBuf,
    #[serde(default)]
    pub format: ExportFormat,
    /// Gzip-compress the output
    #[serde(default)]
    pub compress: bool,
}

impl ExportConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            format: ExportFormat::default(),
            compress: false,
        }
    }

    pub fn with_format(mut self, format: ExportFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Output path for a dataset: `<dir>/<name>.<ext>`
    pub fn path_for(&self, dataset_name: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", dataset_name, self.format.extension(self.compress)))
    }
}

/// Errors that can occur during export
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),
}

/// Write a dataset according to `config`, returning the file written
pub fn export_dataset(dataset: &Dataset, config: &ExportConfig) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(&config.dir).map_err(|source| ExportError::Io {
        path: config.dir.clone(),
        source,
    })?;
    let path = config.path_for(dataset.name());
    write_dataset(dataset, &path, config.format, config.compress)?;

    info!(
        dataset = dataset.name(),
        path = %path.display(),
        rows = dataset.num_rows(),
        "Exported dataset"
    );
    Ok(path)
}

/// Write a dataset to an explicit path
pub fn write_dataset(
    dataset: &Dataset,
    path: &Path,
    format: ExportFormat,
    compress: bool,
) -> Result<(), ExportError> {
    let batch = dataset_to_batch(dataset)?;
    let file = File::create(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match format {
        ExportFormat::Csv if compress => {
            let encoder = GzEncoder::new(file, flate2::Compression::default());
            let encoder = write_csv(encoder, &batch)?;
            encoder.finish().map_err(|source| ExportError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }
        ExportFormat::Csv => {
            let mut file = write_csv(file, &batch)?;
            file.flush().map_err(|source| ExportError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }
        ExportFormat::Parquet => write_parquet(file, &batch, compress)?,
    }
    Ok(())
}

fn write_csv<W: Write>(sink: W, batch: &RecordBatch) -> Result<W, ExportError> {
    let mut writer = WriterBuilder::new().with_header(true).build(sink);
    writer.write(batch)?;
    Ok(writer.into_inner())
}

fn write_parquet(file: File, batch: &RecordBatch, compress: bool) -> Result<(), ExportError> {
    let compression = if compress {
        Compression::GZIP(GzipLevel::default())
    } else {
        Compression::UNCOMPRESSED
    };
    let props = WriterProperties::builder()
        .set_compression(compression)
        .build();

    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}
