//! `reqwest`-backed [`HttpClient`].

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{redirect, Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, warn};

use super::client::{Headers, HttpClient, HttpError};
use crate::config::HttpConfig;

/// HTTP client with a per-request timeout and bounded transport retries.
pub struct ReqwestClient {
    /// Client that follows redirects
    following: Client,
    /// Client that returns redirects to the caller
    direct: Client,
    retries: u32,
    retry_delay: Duration,
}

impl ReqwestClient {
    /// Build a client from configuration.
    pub fn new(config: &HttpConfig) -> Result<Self, HttpError> {
        let timeout = Duration::from_secs(config.timeout_secs);

        let following = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        let direct = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;

        Ok(Self {
            following,
            direct,
            retries: config.retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    /// Send a request, retrying transport failures up to the configured count.
    async fn send<F>(&self, url: &str, build: F) -> Result<Response, HttpError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        return Err(HttpError::Status {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }
                    return Ok(response);
                }
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    warn!(url = %url, attempt = attempt, error = %e, "Request failed, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    return Err(HttpError::Request {
                        url: url.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    async fn decode(url: &str, response: Response) -> Result<Value, HttpError> {
        response.json::<Value>().await.map_err(|e| HttpError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

/// Convert header pairs, skipping any that are not valid HTTP headers.
fn header_map(headers: &Headers) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => warn!(header = %name, "Skipping invalid header"),
        }
    }
    map
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("json"))
        .unwrap_or(false)
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(
        &self,
        url: &str,
        headers: &Headers,
        params: &[(String, String)],
        follow_redirects: bool,
    ) -> Result<Value, HttpError> {
        let client = if follow_redirects {
            &self.following
        } else {
            &self.direct
        };
        let headers = header_map(headers);

        debug!(url = %url, params = params.len(), "GET");
        let response = self
            .send(url, || client.get(url).headers(headers.clone()).query(params))
            .await?;
        Self::decode(url, response).await
    }

    async fn post(&self, url: &str, headers: &Headers, json: &Value) -> Result<Value, HttpError> {
        let headers = header_map(headers);

        debug!(url = %url, "POST");
        let response = self
            .send(url, || self.following.post(url).headers(headers.clone()).json(json))
            .await?;
        Self::decode(url, response).await
    }

    async fn download(
        &self,
        url: &str,
        save_path: &Path,
        exclude_json: bool,
    ) -> Result<(), HttpError> {
        debug!(url = %url, path = %save_path.display(), "Downloading");
        let response = self.send(url, || self.following.get(url)).await?;

        if exclude_json && is_json(&response) {
            return Err(HttpError::UnexpectedJson {
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| HttpError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let write_err = |source| HttpError::Write {
            path: save_path.display().to_string(),
            source,
        };
        if let Some(parent) = save_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        tokio::fs::write(save_path, &bytes).await.map_err(write_err)?;
        Ok(())
    }
}
