//! Document envelopes: the per-record JSON object that ends up indexed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// One input row: column name to value, in column order.
pub type Record = Map<String, Value>;

pub const FIELD_DOC_ID: &str = "doc_id";
pub const FIELD_TIMESTAMP: &str = "timestamp";
pub const FIELD_DATE_STR: &str = "date_str";
pub const FIELD_USERNAME: &str = "username";
pub const LIST_STR_SUFFIX: &str = "_str";
pub const LIST_SEPARATOR: &str = ", ";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Document {
    fields: Map<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_basic_info(
        &mut self,
        doc_id: &str,
        timestamp: &DateTime<Utc>,
        date_and_time: &str,
        username: Option<&str>,
    ) {
        self.insert(FIELD_DOC_ID, Value::String(doc_id.to_string()));
        self.insert(FIELD_TIMESTAMP, Value::String(timestamp.to_rfc3339()));
        self.insert(FIELD_DATE_STR, Value::String(date_str(date_and_time)));
        if let Some(username) = username.filter(|name| !name.is_empty()) {
            self.insert(FIELD_USERNAME, Value::String(username.to_string()));
        }
    }

    /// Copies a column verbatim. String lists are stored without their nulls
    /// and additionally joined under `<column>_str`.
    pub fn add_field(&mut self, column: &str, value: &Value) {
        match string_list(value) {
            Some(items) => {
                let joined = items.join(LIST_SEPARATOR);
                self.insert(
                    column,
                    Value::Array(items.into_iter().map(Value::String).collect()),
                );
                self.insert(&format!("{}{}", column, LIST_STR_SUFFIX), Value::String(joined));
            }
            None => self.insert(column, value.clone()),
        }
    }

    pub fn add_record(&mut self, record: &Record) {
        for (column, value) in record {
            self.add_field(column, value);
        }
    }

    pub fn insert(&mut self, field: &str, value: Value) {
        self.fields.insert(field.to_string(), value);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

pub fn date_str(date_and_time: &str) -> String {
    date_and_time.replace('-', "_")
}

/// `Some` when `value` is an array whose non-null entries are all strings.
pub fn string_list(value: &Value) -> Option<Vec<String>> {
    let items = value.as_array()?;
    let mut strings = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Null => continue,
            Value::String(text) => strings.push(text.clone()),
            _ => return None,
        }
    }
    Some(strings)
}
