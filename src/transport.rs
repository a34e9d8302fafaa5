//! The seam between the helpers and the cluster.
//!
//! [`crate::es_client::EsClient`] is the real implementation; tests swap in
//! an in-memory one.

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::Result;
use crate::models::bulk::{BulkRequestItem, BulkResponse};

#[async_trait]
pub trait SearchTransport: Send + Sync {
    /// Liveness check. Unreachable clusters answer `Ok(false)`.
    async fn ping(&self) -> Result<bool>;

    async fn index_exists(&self, index: &str) -> Result<bool>;

    /// Deletes unconditionally; a missing index is an error.
    async fn delete_index(&self, index: &str) -> Result<()>;

    /// Sends one `_bulk` request. Per-item failures are in the response,
    /// only failures of the request itself are `Err`.
    async fn bulk(
        &self,
        items: &[BulkRequestItem],
        timeout: Option<Duration>,
    ) -> Result<BulkResponse>;
}
