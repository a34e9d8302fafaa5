use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

use crate::document::Document;

pub const BULK_OPER_INDEX: &str = "index";
pub const LEGACY_DOC_TYPE: &str = "_doc";

/// An index name paired with its own copy of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkRequestItem {
    index_name: String,
    source: Document,
}

#[derive(Serialize)]
struct BulkAction<'a> {
    index: ActionMeta<'a>,
}

#[skip_serializing_none]
#[derive(Serialize)]
struct ActionMeta<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_type")]
    doc_type: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BulkResponse {
    #[serde(default)]
    took: u64,
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<BulkResponseItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkResponseItem {
    #[serde(alias = "create", alias = "update", alias = "delete")]
    index: BulkItemResult,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BulkItemResult {
    #[serde(rename = "_index", default)]
    index: Option<String>,
    #[serde(rename = "_id", default)]
    id: Option<String>,
    status: u16,
    #[serde(rename = "_shards", default)]
    shards: Option<ShardStats>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ShardStats {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    successful: u64,
    #[serde(default)]
    failed: u64,
}

impl BulkRequestItem {
    pub fn new(index_name: impl Into<String>, source: &Document) -> Self {
        Self {
            index_name: index_name.into(),
            source: source.clone(),
        }
    }

    pub fn get_index_name(&self) -> &String {
        &self.index_name
    }
    pub fn get_source(&self) -> &Document {
        &self.source
    }

    pub fn write_ndjson(&self, buf: &mut String, doc_type: Option<&str>) -> serde_json::Result<()> {
        let action = BulkAction {
            index: ActionMeta {
                index: &self.index_name,
                doc_type,
            },
        };
        buf.push_str(&serde_json::to_string(&action)?);
        buf.push('\n');
        buf.push_str(&serde_json::to_string(&self.source)?);
        buf.push('\n');
        Ok(())
    }
}

/// Request body for `POST /_bulk`.
pub fn to_ndjson(items: &[BulkRequestItem], doc_type: Option<&str>) -> serde_json::Result<String> {
    let mut body = String::new();
    for item in items {
        item.write_ndjson(&mut body, doc_type)?;
    }
    Ok(body)
}

impl BulkResponse {
    pub fn new(items: Vec<BulkResponseItem>) -> Self {
        let errors = items.iter().any(|item| !item.result().is_success());
        Self {
            took: 0,
            errors,
            items,
        }
    }

    pub fn get_took(&self) -> u64 {
        self.took
    }
    pub fn has_errors(&self) -> bool {
        self.errors
    }
    pub fn get_items(&self) -> &Vec<BulkResponseItem> {
        &self.items
    }
}

impl BulkResponseItem {
    pub fn new(result: BulkItemResult) -> Self {
        Self { index: result }
    }

    pub fn result(&self) -> &BulkItemResult {
        &self.index
    }
}

impl ShardStats {
    pub fn get_total(&self) -> u64 {
        self.total
    }
    pub fn get_successful(&self) -> u64 {
        self.successful
    }
    pub fn get_failed(&self) -> u64 {
        self.failed
    }
}

impl BulkItemResult {
    pub fn created(index: &str) -> Self {
        Self {
            index: Some(index.to_string()),
            id: None,
            status: 201,
            shards: Some(ShardStats {
                total: 1,
                successful: 1,
                failed: 0,
            }),
            error: None,
        }
    }

    pub fn rejected(index: &str, status: u16, reason: &str) -> Self {
        Self {
            index: Some(index.to_string()),
            id: None,
            status,
            shards: None,
            error: Some(serde_json::json!({ "type": "rejected", "reason": reason })),
        }
    }

    pub fn get_index(&self) -> &Option<String> {
        &self.index
    }
    pub fn get_id(&self) -> &Option<String> {
        &self.id
    }
    pub fn get_status(&self) -> u16 {
        self.status
    }
    pub fn is_created(&self) -> bool {
        self.status == 201
    }
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
    pub fn get_shards(&self) -> &Option<ShardStats> {
        &self.shards
    }
    pub fn get_shards_failed(&self) -> u64 {
        self.shards.as_ref().map(ShardStats::get_failed).unwrap_or(0)
    }

    pub fn error_reason(&self) -> String {
        match &self.error {
            Some(error) => error
                .get("reason")
                .and_then(|reason| reason.as_str())
                .map(|reason| reason.to_string())
                .unwrap_or_else(|| error.to_string()),
            None => String::default(),
        }
    }
}
