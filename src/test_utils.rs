//! Test doubles for the HTTP client and the records collaborators.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::http::{Headers, HttpClient, HttpError, Params};
use crate::records::{Cookie, CookiePool, RequestSigner};

/// A request seen by [`MockHttp`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub cookie: Option<String>,
    pub params: Params,
    pub body: Option<Value>,
}

/// In-memory HTTP client.
///
/// `get`/`post` pop queued responses and fall back to `{"retcode": 0}`.
/// `download` serves bodies registered with [`MockHttp::serve_file`] and,
/// like the real client, refuses JSON bodies when `exclude_json` is set.
#[derive(Default)]
pub struct MockHttp {
    requests: Mutex<Vec<RecordedRequest>>,
    responses: Mutex<VecDeque<Result<Value, String>>>,
    files: Mutex<HashMap<String, Result<Vec<u8>, String>>>,
}

impl MockHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_json(&self, value: Value) {
        self.responses.lock().push_back(Ok(value));
    }

    pub fn fail_next(&self, message: &str) {
        self.responses.lock().push_back(Err(message.to_string()));
    }

    pub fn serve_file(&self, url: &str, body: &[u8]) {
        self.files.lock().insert(url.to_string(), Ok(body.to_vec()));
    }

    pub fn fail_file(&self, url: &str, message: &str) {
        self.files
            .lock()
            .insert(url.to_string(), Err(message.to_string()));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn downloads(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == "DOWNLOAD")
            .map(|r| r.url.clone())
            .collect()
    }

    fn next_response(&self, url: &str) -> Result<Value, HttpError> {
        match self.responses.lock().pop_front() {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(HttpError::Request {
                url: url.to_string(),
                message,
            }),
            None => Ok(json!({"retcode": 0, "message": "OK", "data": {}})),
        }
    }
}

#[async_trait]
impl HttpClient for MockHttp {
    async fn get(
        &self,
        url: &str,
        headers: &Headers,
        params: &[(String, String)],
        _follow_redirects: bool,
    ) -> Result<Value, HttpError> {
        self.requests.lock().push(RecordedRequest {
            method: "GET",
            url: url.to_string(),
            cookie: headers.get("Cookie").cloned(),
            params: params.to_vec(),
            body: None,
        });
        self.next_response(url)
    }

    async fn post(&self, url: &str, headers: &Headers, json: &Value) -> Result<Value, HttpError> {
        self.requests.lock().push(RecordedRequest {
            method: "POST",
            url: url.to_string(),
            cookie: headers.get("Cookie").cloned(),
            params: Vec::new(),
            body: Some(json.clone()),
        });
        self.next_response(url)
    }

    async fn download(
        &self,
        url: &str,
        save_path: &Path,
        exclude_json: bool,
    ) -> Result<(), HttpError> {
        self.requests.lock().push(RecordedRequest {
            method: "DOWNLOAD",
            url: url.to_string(),
            cookie: None,
            params: Vec::new(),
            body: None,
        });

        let served = self.files.lock().get(url).cloned();
        let body = match served {
            Some(Ok(body)) => body,
            Some(Err(message)) => {
                return Err(HttpError::Request {
                    url: url.to_string(),
                    message,
                })
            }
            None => return Err(HttpError::Status {
                url: url.to_string(),
                status: 404,
            }),
        };

        if exclude_json && serde_json::from_slice::<Value>(&body).is_ok() {
            return Err(HttpError::UnexpectedJson {
                url: url.to_string(),
            });
        }

        let write_err = |source| HttpError::Write {
            path: save_path.display().to_string(),
            source,
        };
        if let Some(parent) = save_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        tokio::fs::write(save_path, body).await.map_err(write_err)
    }
}

/// Signer that only attaches the cookie.
pub struct StaticSigner;

impl RequestSigner for StaticSigner {
    fn headers(&self, _query: Option<&str>, _body: Option<&Value>, cookie: &str) -> Headers {
        let mut headers = Headers::new();
        headers.insert("Cookie".to_string(), cookie.to_string());
        headers.insert("DS".to_string(), "test".to_string());
        headers
    }
}

/// Scripted cookie pool.
#[derive(Default)]
pub struct MockPool {
    public: Mutex<VecDeque<String>>,
    always_public: Option<String>,
    own: HashMap<String, String>,
    rejected: HashSet<String>,
    touched: Mutex<Vec<String>>,
}

impl MockPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out these public cookies once each, in order.
    pub fn with_public(self, cookies: &[&str]) -> Self {
        self.public
            .lock()
            .extend(cookies.iter().map(|c| c.to_string()));
        self
    }

    pub fn push_public(&self, cookie: &str) {
        self.public.lock().push_back(cookie.to_string());
    }

    /// Hand out the same public cookie forever.
    pub fn always_public(mut self, cookie: &str) -> Self {
        self.always_public = Some(cookie.to_string());
        self
    }

    pub fn with_own(mut self, uid: &str, cookie: &str) -> Self {
        self.own.insert(uid.to_string(), cookie.to_string());
        self
    }

    /// Fail validation for these cookies.
    pub fn rejecting(mut self, cookies: &[&str]) -> Self {
        self.rejected.extend(cookies.iter().map(|c| c.to_string()));
        self
    }

    pub fn touched(&self) -> Vec<String> {
        self.touched.lock().clone()
    }
}

#[async_trait]
impl CookiePool for MockPool {
    async fn public_cookie(&self, _user_id: &str, _uid: &str, _action: &str) -> Option<Cookie> {
        if let Some(cookie) = &self.always_public {
            return Some(Cookie::new(cookie.clone()));
        }
        self.public.lock().pop_front().map(Cookie::new)
    }

    async fn own_cookie(&self, uid: &str, _action: &str) -> Option<Cookie> {
        self.own.get(uid).map(|c| Cookie {
            cookie: c.clone(),
            owner: Some(uid.to_string()),
        })
    }

    async fn touch_cookie(&self, _cookie: &Cookie, uid: &str) {
        self.touched.lock().push(uid.to_string());
    }

    async fn validate(&self, _data: &Value, cookie: &Cookie, _uid: &str) -> bool {
        !self.rejected.contains(&cookie.cookie)
    }
}
