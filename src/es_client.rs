use std::time::Duration;

use async_trait::async_trait;
use human_bytes::human_bytes;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, info};

use crate::conf::{BasicAuth, DeploymentMode};
use crate::errors::{EsError, Result};
use crate::models::bulk::{self, BulkRequestItem, BulkResponse, LEGACY_DOC_TYPE};
use crate::models::server_info::ServerInfo;
use crate::transport::SearchTransport;

/// A live session against one cluster, produced by
/// [`crate::connection::connect`].
#[derive(Debug, Clone)]
pub struct EsClient {
    mode: DeploymentMode,
    url: String,
    auth: Option<BasicAuth>,
    http_client: Client,
    server_info: Option<ServerInfo>,
}

fn inject_auth(request_builder: RequestBuilder, auth: &Option<BasicAuth>) -> RequestBuilder {
    if let Some(auth) = auth {
        request_builder.basic_auth(auth.get_username(), Some(auth.get_password()))
    } else {
        request_builder
    }
}

async fn status_error(response: Response, url: String) -> EsError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    EsError::Status { status, url, body }
}

impl EsClient {
    pub fn new(
        mode: DeploymentMode,
        url: impl Into<String>,
        auth: Option<BasicAuth>,
        http_client: Client,
    ) -> Self {
        Self {
            mode,
            url: url.into().trim_end_matches('/').to_string(),
            auth,
            http_client,
            server_info: None,
        }
    }

    pub fn get_mode(&self) -> DeploymentMode {
        self.mode
    }
    pub fn get_url(&self) -> &String {
        &self.url
    }
    pub fn get_server_info(&self) -> &Option<ServerInfo> {
        &self.server_info
    }
    pub(crate) fn set_server_info(&mut self, server_info: ServerInfo) {
        self.server_info = Some(server_info);
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.url, path.trim_start_matches('/'))
    }

    fn doc_type(&self) -> Option<&'static str> {
        match &self.server_info {
            Some(info) if info.requires_doc_type() => Some(LEGACY_DOC_TYPE),
            _ => None,
        }
    }

    async fn call_get(&self, path: &str) -> Result<String> {
        let url = self.endpoint(path);
        let request_builder = inject_auth(self.http_client.get(&url), &self.auth);
        let response = request_builder.send().await?;
        if !response.status().is_success() {
            return Err(status_error(response, url).await);
        }
        Ok(response.text().await?)
    }

    pub async fn server_info(&self) -> Result<ServerInfo> {
        let body = self.call_get("/").await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn print_server_info(&self, prefix: &str) {
        match self.server_info().await {
            Ok(server_info) => info!(
                "{}: hostname={}, name={}, uuid={:?}, version={}, lucene={}",
                prefix,
                server_info.get_hostname(),
                server_info.get_name(),
                server_info.get_uuid(),
                server_info.get_version(),
                server_info.get_lucene_version()
            ),
            Err(err) => info!("{}: server info unavailable ({})", prefix, err),
        }
    }
}

#[async_trait]
impl SearchTransport for EsClient {
    async fn ping(&self) -> Result<bool> {
        let request_builder = inject_auth(self.http_client.head(&self.url), &self.auth);
        match request_builder.send().await {
            Ok(response) => {
                debug!("Ping {} answered {}", self.url, response.status());
                Ok(response.status().is_success())
            }
            Err(err) => {
                debug!("Ping {} failed: {}", self.url, err);
                Ok(false)
            }
        }
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        let url = self.endpoint(index);
        let request_builder = inject_auth(self.http_client.head(&url), &self.auth);
        let response = request_builder.send().await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            status if status == StatusCode::NOT_FOUND => Ok(false),
            _ => Err(status_error(response, url).await),
        }
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        let url = self.endpoint(index);
        let request_builder = inject_auth(self.http_client.delete(&url), &self.auth);
        let response = request_builder.send().await?;
        if !response.status().is_success() {
            return Err(status_error(response, url).await);
        }
        Ok(())
    }

    async fn bulk(
        &self,
        items: &[BulkRequestItem],
        timeout: Option<Duration>,
    ) -> Result<BulkResponse> {
        let url = self.endpoint("_bulk");
        let body = bulk::to_ndjson(items, self.doc_type())?;
        debug!(
            "Bulk request with {} docs, payload {}",
            items.len(),
            human_bytes(body.len() as f64)
        );

        let mut request_builder = self
            .http_client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body);
        if let Some(timeout) = timeout {
            request_builder = request_builder.timeout(timeout);
        }
        let request_builder = inject_auth(request_builder, &self.auth);

        let response = request_builder.send().await?;
        if !response.status().is_success() {
            return Err(status_error(response, url).await);
        }
        Ok(response.json::<BulkResponse>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_paths() {
        let client = EsClient::new(
            DeploymentMode::OnPrem,
            "http://localhost:9200/",
            None,
            Client::new(),
        );
        assert_eq!(client.get_url(), "http://localhost:9200");
        assert_eq!(client.endpoint("logs"), "http://localhost:9200/logs");
        assert_eq!(client.endpoint("/_bulk"), "http://localhost:9200/_bulk");
        assert_eq!(client.doc_type(), None);
    }

    #[tokio::test]
    async fn ping_of_unreachable_cluster_is_false() {
        let client = EsClient::new(
            DeploymentMode::OnPrem,
            "http://127.0.0.1:1",
            None,
            Client::builder()
                .timeout(Duration::from_secs(2))
                .build()
                .unwrap(),
        );
        assert!(!client.ping().await.unwrap());
    }
}
