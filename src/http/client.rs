//! HTTP client abstraction.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Request headers, ordered for stable logging.
pub type Headers = BTreeMap<String, String>;

/// Query string parameters in the order they should be sent.
pub type Params = Vec<(String, String)>;

/// Errors raised by [`HttpClient`] implementations.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("expected a file from {url} but got a JSON body")]
    UnexpectedJson { url: String },

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

/// The subset of HTTP the game-record wrappers and resource sync need.
///
/// Implementations handle timeouts and transport retries internally; callers
/// see either a decoded JSON body or an error.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issue a GET request and decode the body as JSON.
    async fn get(
        &self,
        url: &str,
        headers: &Headers,
        params: &[(String, String)],
        follow_redirects: bool,
    ) -> Result<Value, HttpError>;

    /// Issue a POST request with a JSON body and decode the response as JSON.
    async fn post(&self, url: &str, headers: &Headers, json: &Value) -> Result<Value, HttpError>;

    /// Download `url` to `save_path`, creating parent directories.
    ///
    /// With `exclude_json` set, a response whose content type is JSON is
    /// treated as an error page and not written.
    async fn download(&self, url: &str, save_path: &Path, exclude_json: bool)
        -> Result<(), HttpError>;
}
