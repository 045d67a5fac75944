//! Conversion between Arrow record batches and [`Dataset`]

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Date32Array, Float64Array, Int64Array, StringArray,
    TimestampMicrosecondArray,
};
use arrow::compute::cast;
use arrow::datatypes::{
    DataType, Date32Type, Field, Float64Type, Int64Type, Schema, TimeUnit,
    TimestampMicrosecondType,
};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;

use super::{Column, ColumnData, ColumnType, Dataset};

/// Errors converting between Arrow and the in-memory model
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Column '{column}' has unsupported type {data_type}")]
    UnsupportedType { column: String, data_type: DataType },

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

fn unix_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Map an Arrow type onto the logical column type it is decoded as
fn logical_type(data_type: &DataType) -> Option<ColumnType> {
    match data_type {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => Some(ColumnType::Int),
        DataType::Float16
        | DataType::Float32
        | DataType::Float64
        | DataType::Decimal128(_, _)
        | DataType::Decimal256(_, _) => Some(ColumnType::Float),
        DataType::Boolean => Some(ColumnType::Bool),
        DataType::Date32 | DataType::Date64 => Some(ColumnType::Date),
        DataType::Timestamp(_, _) => Some(ColumnType::Timestamp),
        DataType::Null
        | DataType::Utf8
        | DataType::LargeUtf8
        | DataType::Utf8View
        | DataType::Dictionary(_, _)
        | DataType::Time32(_)
        | DataType::Time64(_) => Some(ColumnType::Text),
        _ => None,
    }
}

fn empty_column(column_type: ColumnType) -> ColumnData {
    match column_type {
        ColumnType::Int => ColumnData::Int(Vec::new()),
        ColumnType::Float => ColumnData::Float(Vec::new()),
        ColumnType::Bool => ColumnData::Bool(Vec::new()),
        ColumnType::Text => ColumnData::Text(Vec::new()),
        ColumnType::Date => ColumnData::Date(Vec::new()),
        ColumnType::Timestamp => ColumnData::Timestamp(Vec::new()),
    }
}

fn append_array(target: &mut ColumnData, array: &ArrayRef) -> Result<(), ArrowError> {
    match target {
        ColumnData::Int(values) => {
            let array = cast(array, &DataType::Int64)?;
            values.extend(array.as_primitive::<Int64Type>().iter());
        }
        ColumnData::Float(values) => {
            let array = cast(array, &DataType::Float64)?;
            values.extend(array.as_primitive::<Float64Type>().iter());
        }
        ColumnData::Bool(values) => {
            values.extend(array.as_boolean().iter());
        }
        ColumnData::Text(values) => {
            if array.data_type() == &DataType::Null {
                values.extend(std::iter::repeat_n(None, array.len()));
            } else {
                let array = cast(array, &DataType::Utf8)?;
                values.extend(array.as_string::<i32>().iter().map(|v| v.map(str::to_string)));
            }
        }
        ColumnData::Date(values) => {
            let array = cast(array, &DataType::Date32)?;
            let dates = array.as_primitive::<Date32Type>();
            values.extend((0..dates.len()).map(|i| {
                if dates.is_null(i) {
                    None
                } else {
                    dates.value_as_date(i)
                }
            }));
        }
        ColumnData::Timestamp(values) => {
            let array = cast(array, &DataType::Timestamp(TimeUnit::Microsecond, None))?;
            let stamps = array.as_primitive::<TimestampMicrosecondType>();
            values.extend((0..stamps.len()).map(|i| {
                if stamps.is_null(i) {
                    None
                } else {
                    stamps.value_as_datetime(i)
                }
            }));
        }
    }
    Ok(())
}

/// Decode record batches sharing `schema` into a dataset
pub fn dataset_from_batches(
    name: &str,
    schema: &Schema,
    batches: &[RecordBatch],
) -> Result<Dataset, ConversionError> {
    let mut columns = Vec::with_capacity(schema.fields().len());

    for (idx, field) in schema.fields().iter().enumerate() {
        let column_type =
            logical_type(field.data_type()).ok_or_else(|| ConversionError::UnsupportedType {
                column: field.name().clone(),
                data_type: field.data_type().clone(),
            })?;

        let mut data = empty_column(column_type);
        for batch in batches {
            append_array(&mut data, batch.column(idx))?;
        }
        columns.push(Column::new(field.name().clone(), data));
    }

    // Columns come from one schema, so they all have the batch row count.
    Ok(Dataset {
        name: name.to_string(),
        columns,
    })
}

fn column_array(data: &ColumnData) -> (DataType, ArrayRef) {
    match data {
        ColumnData::Int(values) => (
            DataType::Int64,
            Arc::new(Int64Array::from(values.clone())) as ArrayRef,
        ),
        ColumnData::Float(values) => (
            DataType::Float64,
            Arc::new(Float64Array::from(values.clone())) as ArrayRef,
        ),
        ColumnData::Bool(values) => (
            DataType::Boolean,
            Arc::new(BooleanArray::from(values.clone())) as ArrayRef,
        ),
        ColumnData::Text(values) => {
            let array: StringArray = values.iter().map(|v| v.as_deref()).collect();
            (DataType::Utf8, Arc::new(array) as ArrayRef)
        }
        ColumnData::Date(values) => {
            let epoch = unix_epoch();
            let days: Vec<Option<i32>> = values
                .iter()
                .map(|v| v.map(|d| (d - epoch).num_days() as i32))
                .collect();
            (DataType::Date32, Arc::new(Date32Array::from(days)) as ArrayRef)
        }
        ColumnData::Timestamp(values) => {
            let micros: Vec<Option<i64>> = values
                .iter()
                .map(|v| v.map(|t| t.and_utc().timestamp_micros()))
                .collect();
            (
                DataType::Timestamp(TimeUnit::Microsecond, None),
                Arc::new(TimestampMicrosecondArray::from(micros)) as ArrayRef,
            )
        }
    }
}

/// Encode a dataset as a single record batch
pub fn dataset_to_batch(dataset: &Dataset) -> Result<RecordBatch, ConversionError> {
    let mut fields = Vec::with_capacity(dataset.num_columns());
    let mut arrays = Vec::with_capacity(dataset.num_columns());

    for column in dataset.columns() {
        let (data_type, array) = column_array(&column.data);
        fields.push(Field::new(column.name.clone(), data_type, true));
        arrays.push(array);
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    #[test]
    fn test_from_batches_widens_integer_types() {
        let schema = Schema::new(vec![
            Field::new("small", DataType::Int32, true),
            Field::new("name", DataType::Utf8, true),
        ]);
        let batch = RecordBatch::try_new(
            Arc::new(schema.clone()),
            vec![
                Arc::new(arrow::array::Int32Array::from(vec![Some(1), None, Some(-3)])),
                Arc::new(StringArray::from(vec![Some("a"), Some("b"), None])),
            ],
        )
        .unwrap();

        let ds = dataset_from_batches("t", &schema, &[batch.clone(), batch]).unwrap();
        assert_eq!(ds.num_rows(), 6);
        assert_eq!(
            ds.column("small").unwrap().data,
            ColumnData::Int(vec![Some(1), None, Some(-3), Some(1), None, Some(-3)])
        );
    }

    #[test]
    fn test_roundtrip_temporal_columns() {
        let date = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
        let stamp = NaiveDateTime::parse_from_str("2021-03-01 10:30:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        let ds = Dataset::new(
            "t",
            vec![
                Column::new("d", ColumnData::Date(vec![Some(date), None])),
                Column::new("ts", ColumnData::Timestamp(vec![None, Some(stamp)])),
            ],
        )
        .unwrap();

        let batch = dataset_to_batch(&ds).unwrap();
        let back = dataset_from_batches("t", batch.schema().as_ref(), &[batch]).unwrap();
        assert_eq!(back, ds);
    }

    #[test]
    fn test_unsupported_type_is_reported() {
        let schema = Schema::new(vec![Field::new(
            "nested",
            DataType::List(Arc::new(Field::new("item", DataType::Int32, true))),
            true,
        )]);
        let err = dataset_from_batches("t", &schema, &[]).unwrap_err();
        assert!(matches!(err, ConversionError::UnsupportedType { .. }));
    }
}
