//! Tabular input: frames in pandas `split` orientation and plain record
//! files.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::document::Record;
use crate::errors::{EsError, Result};

/// `{"columns": [...], "index": [...], "data": [[...], ...]}`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Frame {
    columns: Vec<String>,
    #[serde(default)]
    index: Vec<Value>,
    data: Vec<Vec<Value>>,
}

impl Frame {
    pub fn new(columns: Vec<String>, data: Vec<Vec<Value>>) -> Self {
        let index = (0..data.len()).map(Value::from).collect();
        Self {
            columns,
            index,
            data,
        }
    }

    pub fn get_columns(&self) -> &Vec<String> {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row values in row order, without column names.
    pub fn to_rows(&self) -> Vec<Vec<Value>> {
        let mut rows = Vec::with_capacity(self.data.len());
        for (index, row) in self.data.iter().enumerate() {
            debug!("index: {}/{}", index, self.data.len());
            rows.push(row.clone());
        }
        rows
    }

    /// Rows keyed by column name. Values past the last column are dropped,
    /// missing trailing values leave their columns out.
    pub fn to_records(&self) -> Vec<Record> {
        self.data
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect::<Record>()
            })
            .collect()
    }
}

/// Accepts a JSON array of objects, a `split` frame, or JSON lines.
pub fn parse_records(content: &str) -> Result<Vec<Record>> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return match value {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(position, item)| into_record(item, position))
                .collect(),
            Value::Object(map) if map.contains_key("columns") && map.contains_key("data") => {
                let frame: Frame = serde_json::from_value(Value::Object(map))?;
                Ok(frame.to_records())
            }
            Value::Object(map) => Ok(vec![map]),
            other => Err(EsError::input(format!(
                "expected records, found {}",
                other
            ))),
        };
    }

    trimmed
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(position, line)| into_record(serde_json::from_str(line)?, position))
        .collect()
}

fn into_record(value: Value, position: usize) -> Result<Record> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(EsError::input(format!(
            "record {} is not an object: {}",
            position, other
        ))),
    }
}
