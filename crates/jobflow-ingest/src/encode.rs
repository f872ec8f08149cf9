//! Table encoders
//!
//! Parquet is the default since it is what the warehouse load job expects.
//! CSV and JSON Lines exist for quick inspection and for loaders that cannot
//! read Parquet.

use crate::error::{IngestError, Result};
use crate::tables::{ColumnData, TableFrame};
use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use jobflow_common::JobflowError;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_jsonlines::JsonLinesWriter;
use std::sync::Arc;

/// Output format for processed tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    #[default]
    Parquet,
    Csv,
    #[serde(rename = "jsonl")]
    JsonLines,
}

impl TableFormat {
    pub const ALL: [TableFormat; 3] = [TableFormat::Parquet, TableFormat::Csv, TableFormat::JsonLines];

    pub fn extension(&self) -> &'static str {
        match self {
            TableFormat::Parquet => "parquet",
            TableFormat::Csv => "csv",
            TableFormat::JsonLines => "jsonl",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            TableFormat::Parquet => "application/vnd.apache.parquet",
            TableFormat::Csv => "text/csv",
            TableFormat::JsonLines => "application/x-ndjson",
        }
    }
}

impl std::fmt::Display for TableFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for TableFormat {
    type Err = JobflowError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "parquet" | "pq" => Ok(TableFormat::Parquet),
            "csv" => Ok(TableFormat::Csv),
            "jsonl" | "jsonlines" | "ndjson" => Ok(TableFormat::JsonLines),
            other => Err(JobflowError::config(format!(
                "Invalid output format: {}. Must be 'parquet', 'csv' or 'jsonl'",
                other
            ))),
        }
    }
}

/// Encode a table frame into file bytes
pub fn encode(frame: &TableFrame, format: TableFormat) -> Result<Vec<u8>> {
    match format {
        TableFormat::Parquet => encode_parquet(frame),
        TableFormat::Csv => encode_csv(frame),
        TableFormat::JsonLines => encode_jsonl(frame),
    }
}

/// Encode the raw snapshot as a pretty-printed JSON array
pub fn encode_raw(records: &[Value]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(records)?)
}

/// Arrow schema matching the frame's columns, all nullable
pub fn arrow_schema(frame: &TableFrame) -> Schema {
    let fields: Vec<Field> = frame
        .columns
        .iter()
        .map(|column| {
            let data_type = match column.data {
                ColumnData::Text(_) => DataType::Utf8,
                ColumnData::Float(_) => DataType::Float64,
            };
            Field::new(column.name, data_type, true)
        })
        .collect();
    Schema::new(fields)
}

fn record_batch(frame: &TableFrame) -> Result<RecordBatch> {
    let schema = Arc::new(arrow_schema(frame));
    let arrays: Vec<ArrayRef> = frame
        .columns
        .iter()
        .map(|column| -> ArrayRef {
            match &column.data {
                ColumnData::Text(values) => Arc::new(StringArray::from(values.clone())),
                ColumnData::Float(values) => Arc::new(Float64Array::from(values.clone())),
            }
        })
        .collect();

    RecordBatch::try_new(schema, arrays)
        .map_err(|e| IngestError::Encode(format!("{} record batch: {}", frame.name, e)))
}

fn encode_parquet(frame: &TableFrame) -> Result<Vec<u8>> {
    let batch = record_batch(frame)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props))
        .map_err(|e| IngestError::Encode(format!("{} parquet writer: {}", frame.name, e)))?;
    writer
        .write(&batch)
        .map_err(|e| IngestError::Encode(format!("{} parquet write: {}", frame.name, e)))?;
    writer
        .close()
        .map_err(|e| IngestError::Encode(format!("{} parquet close: {}", frame.name, e)))?;

    Ok(buffer)
}

fn encode_csv(frame: &TableFrame) -> Result<Vec<u8>> {
    let csv_err = |e: csv::Error| IngestError::Encode(format!("{} csv: {}", frame.name, e));

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(frame.column_names()).map_err(csv_err)?;

    for row in 0..frame.num_rows() {
        let record: Vec<String> = frame
            .columns
            .iter()
            .map(|column| column.data.display(row).unwrap_or_default())
            .collect();
        writer.write_record(&record).map_err(csv_err)?;
    }

    writer
        .into_inner()
        .map_err(|e| IngestError::Encode(format!("{} csv flush: {}", frame.name, e.error())))
}

fn encode_jsonl(frame: &TableFrame) -> Result<Vec<u8>> {
    let mut writer = JsonLinesWriter::new(Vec::new());

    for row in 0..frame.num_rows() {
        let object: Map<String, Value> = frame
            .columns
            .iter()
            .map(|column| (column.name.to_string(), column.data.json(row)))
            .collect();
        writer.write(&object)?;
    }

    writer.flush()?;
    Ok(writer.into_inner())
}
