use std::fmt;
use std::path::{Path, PathBuf};

use twelf::reexports::serde::{Deserialize, Serialize};
use twelf::{config, Layer};

use crate::errors::{EsError, Result};

pub const DEFAULT_ES_PORT: u16 = 9200;
pub const DEFAULT_KIBANA_PORT: u16 = 5602;
pub const DEFAULT_CA_CERTS: &str = "/etc/elasticsearch/certs/http_ca.crt";
pub const ENV_PREFIX: &str = "ESBULK_";

#[config]
#[derive(Debug, Default)]
pub struct Config {
    #[serde(default)]
    mode: DeploymentMode,
    hostname: String,
    #[serde(default = "default_port")]
    port: Option<u16>,
    #[serde(default = "default_kibana_port")]
    kibana_port: Option<u16>,
    #[serde(default)]
    protocol: UrlProtocol,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default = "default_ca_certs")]
    ca_certs: PathBuf,
    #[serde(default = "default_retry_attempts")]
    retry_attempts: usize,
    #[serde(default = "default_retry_wait_secs")]
    retry_wait_secs: u64,
    #[serde(default = "default_chunk_size")]
    chunk_size: usize,
    #[serde(default = "default_pause_secs")]
    pause_secs: u64,
    #[serde(default = "default_chunk_size")]
    stream_chunk_size: usize,
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
    #[serde(default = "default_true")]
    quick: bool,
}

/// Where the cluster lives. Each variant has its own connector, see
/// [`crate::connection::connector_for`].
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentMode {
    #[default]
    #[serde(alias = "onprem", alias = "on-prem")]
    OnPrem,
    Cloud,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UrlProtocol {
    Http,
    #[default]
    Https,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    username: String,
    password: String,
}

fn default_port() -> Option<u16> {
    Some(DEFAULT_ES_PORT)
}

fn default_kibana_port() -> Option<u16> {
    Some(DEFAULT_KIBANA_PORT)
}

fn default_ca_certs() -> PathBuf {
    PathBuf::from(DEFAULT_CA_CERTS)
}

fn default_retry_attempts() -> usize {
    3
}

fn default_retry_wait_secs() -> u64 {
    180
}

fn default_chunk_size() -> usize {
    1000
}

fn default_pause_secs() -> u64 {
    1
}

fn default_request_timeout_secs() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Loads the file (TOML, or JSON when the extension says so) and then
    /// lets `ESBULK_*` environment variables override it, so credentials
    /// never have to live in the file.
    pub fn load(path: &Path) -> Result<Self> {
        let file_layer = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Layer::Json(path.to_path_buf()),
            _ => Layer::Toml(path.to_path_buf()),
        };
        Self::with_layers(&[file_layer, Layer::Env(Some(ENV_PREFIX.to_string()))])
            .map_err(|e| EsError::config(format!("failed to load {:?}: {}", path, e)))
    }

    pub fn get_mode(&self) -> DeploymentMode {
        self.mode
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
    pub fn get_username(&self) -> &Option<String> {
        &self.username
    }
    pub fn get_password(&self) -> &Option<String> {
        &self.password
    }
    pub fn get_ca_certs(&self) -> &PathBuf {
        &self.ca_certs
    }
    pub fn get_retry_attempts(&self) -> usize {
        self.retry_attempts
    }
    pub fn get_retry_wait_secs(&self) -> u64 {
        self.retry_wait_secs
    }
    pub fn get_chunk_size(&self) -> usize {
        self.chunk_size
    }
    pub fn get_pause_secs(&self) -> u64 {
        self.pause_secs
    }
    pub fn get_stream_chunk_size(&self) -> usize {
        self.stream_chunk_size
    }
    pub fn get_request_timeout_secs(&self) -> u64 {
        self.request_timeout_secs
    }
    pub fn is_quick(&self) -> bool {
        self.quick
    }
}

impl UrlProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlProtocol::Http => "http",
            UrlProtocol::Https => "https",
        }
    }
}

impl fmt::Display for UrlProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DeploymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentMode::OnPrem => "on-prem",
            DeploymentMode::Cloud => "cloud",
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Both halves must be present and non-empty, otherwise there is no auth.
    pub fn from_parts(username: Option<&str>, password: Option<&str>) -> Option<Self> {
        match (username, password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(Self::new(username, password))
            }
            _ => None,
        }
    }

    pub fn get_username(&self) -> &String {
        &self.username
    }
    pub fn get_password(&self) -> &String {
        &self.password
    }
}
