//! Connection factory for on-prem and cloud clusters.
//!
//! A [`DeploymentMode`] picks a [`Connector`]; [`connect`] builds the HTTP
//! client through it, pings the cluster and retries the whole handshake with
//! a fixed wait until the attempts run out.

use std::path::PathBuf;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Certificate, Client};
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;
use tracing::{debug, error, info, warn};

use crate::conf::{
    BasicAuth, Config, DeploymentMode, UrlProtocol, DEFAULT_CA_CERTS, DEFAULT_ES_PORT,
    DEFAULT_KIBANA_PORT,
};
use crate::errors::{EsError, Result};
use crate::es_client::EsClient;
use crate::transport::SearchTransport;

const AUTH_TIMEOUT: Duration = Duration::from_secs(60);
const ANONYMOUS_TIMEOUT: Duration = Duration::from_secs(20);
const CLOUD_TIMEOUT: Duration = Duration::from_secs(10);
const CLOUD_DEFAULT_PORT: u16 = 443;

#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    hostname: String,
    port: Option<u16>,
    kibana_port: Option<u16>,
    protocol: UrlProtocol,
    username: Option<String>,
    password: Option<String>,
    ca_certs: PathBuf,
    retry_attempts: usize,
    retry_wait: Duration,
}

impl ConnectionSettings {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            port: Some(DEFAULT_ES_PORT),
            kibana_port: Some(DEFAULT_KIBANA_PORT),
            protocol: UrlProtocol::default(),
            username: None,
            password: None,
            ca_certs: PathBuf::from(DEFAULT_CA_CERTS),
            retry_attempts: 3,
            retry_wait: Duration::from_secs(180),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            hostname: config.get_hostname().clone(),
            port: config.get_port(),
            kibana_port: config.get_kibana_port(),
            protocol: config.get_protocol(),
            username: config.get_username().clone(),
            password: config.get_password().clone(),
            ca_certs: config.get_ca_certs().clone(),
            retry_attempts: config.get_retry_attempts(),
            retry_wait: Duration::from_secs(config.get_retry_wait_secs()),
        }
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    pub fn with_protocol(mut self, protocol: UrlProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_ca_certs(mut self, ca_certs: impl Into<PathBuf>) -> Self {
        self.ca_certs = ca_certs.into();
        self
    }

    pub fn with_retry(mut self, attempts: usize, wait: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_wait = wait;
        self
    }

    pub fn get_hostname(&self) -> &String {
        &self.hostname
    }
    pub fn get_port(&self) -> Option<u16> {
        self.port
    }
    pub fn get_kibana_port(&self) -> Option<u16> {
        self.kibana_port
    }
    pub fn get_protocol(&self) -> UrlProtocol {
        self.protocol
    }

    pub fn elasticsearch_url(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}", self.protocol, self.hostname, port),
            None => format!("{}://{}", self.protocol, self.hostname),
        }
    }

    fn credentials(&self) -> Option<BasicAuth> {
        BasicAuth::from_parts(self.username.as_deref(), self.password.as_deref())
    }
}

/// Builds the HTTP side of a connection for one deployment mode. Nothing
/// here touches the network.
pub trait Connector: Sync {
    fn mode(&self) -> DeploymentMode;

    /// The endpoint named in logs and in [`EsError::Connection`].
    fn target(&self, settings: &ConnectionSettings) -> Result<String>;

    fn build(&self, settings: &ConnectionSettings) -> Result<EsClient>;
}

pub struct OnPremConnector;

pub struct CloudConnector;

static ON_PREM: OnPremConnector = OnPremConnector;
static CLOUD: CloudConnector = CloudConnector;

pub fn connector_for(mode: DeploymentMode) -> &'static dyn Connector {
    match mode {
        DeploymentMode::OnPrem => &ON_PREM,
        DeploymentMode::Cloud => &CLOUD,
    }
}

impl Connector for OnPremConnector {
    fn mode(&self) -> DeploymentMode {
        DeploymentMode::OnPrem
    }

    fn target(&self, settings: &ConnectionSettings) -> Result<String> {
        Ok(settings.elasticsearch_url())
    }

    fn build(&self, settings: &ConnectionSettings) -> Result<EsClient> {
        let url = settings.elasticsearch_url();
        let auth = settings.credentials();
        let http_client = match &auth {
            Some(_) => {
                let mut builder = Client::builder()
                    .danger_accept_invalid_certs(true)
                    .timeout(AUTH_TIMEOUT);
                if settings.ca_certs.is_file() {
                    let pem = std::fs::read(&settings.ca_certs)?;
                    builder = builder.add_root_certificate(Certificate::from_pem(&pem)?);
                } else {
                    debug!("CA certificate {:?} not found, skipping", settings.ca_certs);
                }
                builder.build()?
            }
            None => Client::builder().timeout(ANONYMOUS_TIMEOUT).build()?,
        };
        Ok(EsClient::new(self.mode(), url, auth, http_client))
    }
}

impl Connector for CloudConnector {
    fn mode(&self) -> DeploymentMode {
        DeploymentMode::Cloud
    }

    fn target(&self, settings: &ConnectionSettings) -> Result<String> {
        decode_cloud_id(&settings.hostname)
    }

    fn build(&self, settings: &ConnectionSettings) -> Result<EsClient> {
        let url = self.target(settings)?;
        let auth = settings
            .credentials()
            .ok_or_else(|| EsError::config("cloud connections need a username and a password"))?;
        let http_client = Client::builder().timeout(CLOUD_TIMEOUT).build()?;
        Ok(EsClient::new(self.mode(), url, Some(auth), http_client))
    }
}

/// Splits an optional `:port` suffix off one segment of a cloud id payload.
fn split_port(segment: &str) -> Result<(&str, Option<u16>)> {
    match segment.rsplit_once(':') {
        Some((name, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|e| EsError::cloud_id(format!("bad port {:?}: {}", port, e)))?;
            Ok((name, Some(port)))
        }
        None => Ok((segment, None)),
    }
}

/// Turns `name:base64(host[:port]$es_id[:port]$kibana_id)` into the cluster
/// URL. A port on the host wins over one on the cluster id; 443 otherwise.
pub fn decode_cloud_id(cloud_id: &str) -> Result<String> {
    let (_, encoded) = cloud_id
        .split_once(':')
        .ok_or_else(|| EsError::cloud_id("expected <name>:<base64 payload>"))?;
    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|e| EsError::cloud_id(e.to_string()))?;
    let payload = String::from_utf8(decoded).map_err(|e| EsError::cloud_id(e.to_string()))?;

    let mut parts = payload.split('$');
    let (host, host_port) = split_port(parts.next().unwrap_or_default())?;
    let (es_id, es_port) = split_port(parts.next().unwrap_or_default())?;
    if host.is_empty() || es_id.is_empty() {
        return Err(EsError::cloud_id("payload has no host or cluster id"));
    }

    let port = host_port.or(es_port).unwrap_or(CLOUD_DEFAULT_PORT);
    Ok(format!("https://{}.{}:{}", es_id, host, port))
}

async fn handshake(connector: &dyn Connector, settings: &ConnectionSettings, target: &str) -> Result<EsClient> {
    let mut client = connector.build(settings)?;
    if !client.ping().await? {
        error!("Elasticsearch {} connection failed", connector.mode());
        return Err(EsError::Connection {
            url: target.to_string(),
        });
    }

    info!("Elasticsearch {} connection successful", connector.mode());
    match client.server_info().await {
        Ok(server_info) => {
            info!(
                "Connected to cluster={} node={} version={}",
                server_info.get_name(),
                server_info.get_hostname(),
                server_info.get_version()
            );
            client.set_server_info(server_info);
        }
        Err(err) => warn!("Could not read server info from {}: {}", target, err),
    }
    Ok(client)
}

/// Opens a checked connection. Configuration errors fail at once; failed
/// handshakes are retried `retry_attempts` times in total.
pub async fn connect(mode: DeploymentMode, settings: &ConnectionSettings) -> Result<EsClient> {
    let connector = connector_for(mode);
    let target = connector.target(settings)?;
    if mode == DeploymentMode::Cloud && settings.credentials().is_none() {
        return Err(EsError::config("cloud connections need a username and a password"));
    }

    let retries = settings.retry_attempts.max(1) - 1;
    let strategy = FixedInterval::new(settings.retry_wait).take(retries);
    info!(
        "Connecting to Elasticsearch {} on {} (attempts={}, wait={:?})",
        mode,
        target,
        retries + 1,
        settings.retry_wait
    );

    Retry::start(strategy, || handshake(connector, settings, &target)).await
}
