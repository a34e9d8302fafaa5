//! Connection factory and bulk-loading helpers for Elasticsearch.

pub mod conf;
pub mod connection;
pub mod document;
pub mod errors;
pub mod es_client;
pub mod frame;
pub mod indices;
pub mod loader;
pub mod logging;
pub mod models;
pub mod transport;

pub use conf::{Config, DeploymentMode, UrlProtocol};
pub use connection::{connect, ConnectionSettings};
pub use document::{Document, Record};
pub use errors::{EsError, Result};
pub use es_client::EsClient;
pub use loader::{BasicInfo, BulkLoader, LoadReport, LoaderOptions, SubmitMode};
pub use transport::SearchTransport;
