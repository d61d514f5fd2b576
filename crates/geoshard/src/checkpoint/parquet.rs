//! Parquet-backed checkpoint store.
//!
//! The file holds exactly three columns:
//!
//! | column      | type      | nullable |
//! |-------------|-----------|----------|
//! | `address`   | `Utf8`    | no       |
//! | `latitude`  | `Float64` | yes      |
//! | `longitude` | `Float64` | yes      |
//!
//! Every persist rewrites the whole file through a temporary file in the
//! same directory followed by a rename, so readers only ever see the old or
//! the new table. Loading is lenient about physical types (`LargeUtf8`
//! addresses, any numeric coordinates) and ignores extra columns, so files
//! produced by other tooling can seed a run.

use crate::checkpoint::{CheckpointStore, CheckpointTable};
use crate::common::{Address, Coordinates, Error, GeocodeResult, Result};
use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::file::reader::ChunkReader;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

pub const ADDRESS_COLUMN: &str = "address";
pub const LATITUDE_COLUMN: &str = "latitude";
pub const LONGITUDE_COLUMN: &str = "longitude";

/// Canonical on-disk schema.
pub fn checkpoint_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(ADDRESS_COLUMN, DataType::Utf8, false),
        Field::new(LATITUDE_COLUMN, DataType::Float64, true),
        Field::new(LONGITUDE_COLUMN, DataType::Float64, true),
    ]))
}

/// Checkpoint store persisting to a single Parquet file.
#[derive(Debug, Clone)]
pub struct ParquetStore {
    path: PathBuf,
}

impl ParquetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CheckpointStore for ParquetStore {
    fn load(&self) -> Result<CheckpointTable> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No checkpoint at {}, starting empty", self.path.display());
                return Ok(CheckpointTable::new());
            }
            Err(e) => return Err(Error::io(&self.path, e)),
        };

        let table = CheckpointTable::from_rows(read_rows(file)?);
        tracing::debug!(
            "Loaded {} checkpoint rows from {}",
            table.len(),
            self.path.display()
        );
        Ok(table)
    }

    fn persist(&mut self, table: &CheckpointTable) -> Result<()> {
        let batch = encode(table)?;
        write_atomic(&self.path, &batch)
    }
}

/// Encodes the table as a single record batch in insertion order.
///
/// # Errors
///
/// Returns an error if the record batch cannot be assembled.
pub fn encode(table: &CheckpointTable) -> Result<RecordBatch> {
    let addresses = StringArray::from_iter_values(table.iter().map(|row| row.address.as_str()));
    let latitudes =
        Float64Array::from(table.iter().map(GeocodeResult::latitude).collect::<Vec<_>>());
    let longitudes =
        Float64Array::from(table.iter().map(GeocodeResult::longitude).collect::<Vec<_>>());

    let batch = RecordBatch::try_new(
        checkpoint_schema(),
        vec![
            Arc::new(addresses),
            Arc::new(latitudes),
            Arc::new(longitudes),
        ],
    )?;
    Ok(batch)
}

fn writer_properties() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_created_by(format!("geoshard {}", env!("CARGO_PKG_VERSION")))
        .build()
}

fn write_atomic(path: &Path, batch: &RecordBatch) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

    // Dropping the temp file on any early return removes it, leaving the
    // previous checkpoint untouched.
    let mut temp = NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
    {
        let mut writer =
            ArrowWriter::try_new(temp.as_file_mut(), batch.schema(), Some(writer_properties()))?;
        writer.write(batch)?;
        writer.close()?;
    }
    temp.as_file()
        .sync_all()
        .map_err(|e| Error::io(temp.path(), e))?;
    temp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}

fn read_rows<R: ChunkReader + 'static>(reader: R) -> Result<Vec<GeocodeResult>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(reader)?.build()?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch?;
        let addresses = column_as(&batch, ADDRESS_COLUMN, &DataType::Utf8)?;
        let latitudes = column_as(&batch, LATITUDE_COLUMN, &DataType::Float64)?;
        let longitudes = column_as(&batch, LONGITUDE_COLUMN, &DataType::Float64)?;

        let addresses = downcast::<StringArray>(&addresses, ADDRESS_COLUMN)?;
        let latitudes = downcast::<Float64Array>(&latitudes, LATITUDE_COLUMN)?;
        let longitudes = downcast::<Float64Array>(&longitudes, LONGITUDE_COLUMN)?;

        rows.reserve(batch.num_rows());
        for row in 0..batch.num_rows() {
            if addresses.is_null(row) {
                return Err(Error::CorruptCheckpoint {
                    reason: format!("null address in row {row}"),
                });
            }

            // A half-present or non-finite pair is as useless as an absent one.
            let coordinates = (!latitudes.is_null(row) && !longitudes.is_null(row))
                .then(|| Coordinates::new(latitudes.value(row), longitudes.value(row)))
                .filter(|c| c.latitude.is_finite() && c.longitude.is_finite());

            rows.push(GeocodeResult {
                address: Address::new(addresses.value(row)),
                coordinates,
            });
        }
    }
    Ok(rows)
}

fn column_as(batch: &RecordBatch, name: &str, data_type: &DataType) -> Result<ArrayRef> {
    let idx = batch
        .schema()
        .index_of(name)
        .map_err(|_| Error::CorruptCheckpoint {
            reason: format!("missing column `{name}`"),
        })?;

    let column = batch.column(idx);
    if column.data_type() == data_type {
        Ok(Arc::clone(column))
    } else {
        cast(column.as_ref(), data_type).map_err(|e| Error::CorruptCheckpoint {
            reason: format!("column `{name}` cannot be read as {data_type}: {e}"),
        })
    }
}

fn downcast<'a, T: 'static>(array: &'a ArrayRef, name: &str) -> Result<&'a T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| Error::CorruptCheckpoint {
            reason: format!("column `{name}` has an unexpected physical type"),
        })
}
