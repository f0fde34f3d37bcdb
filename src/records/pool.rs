//! Collaborator seams for the game-record wrappers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::Headers;

/// A session cookie handed out by the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Raw `Cookie` header value
    pub cookie: String,
    /// Account that owns the cookie, when known
    #[serde(default)]
    pub owner: Option<String>,
}

impl Cookie {
    pub fn new(cookie: impl Into<String>) -> Self {
        Self {
            cookie: cookie.into(),
            owner: None,
        }
    }
}

/// Source of session cookies for upstream requests.
///
/// The pool owns cookie rotation and the policy for retiring cookies that
/// fail validation; the wrappers only ask for one and report back.
#[async_trait]
pub trait CookiePool: Send + Sync {
    /// A cookie from the shared pool usable by `user_id` to look up `uid`.
    async fn public_cookie(&self, user_id: &str, uid: &str, action: &str) -> Option<Cookie>;

    /// The cookie bound to `uid` itself.
    async fn own_cookie(&self, uid: &str, action: &str) -> Option<Cookie>;

    /// Record that `cookie` was just used for `uid`.
    async fn touch_cookie(&self, cookie: &Cookie, uid: &str);

    /// Inspect a response envelope and decide whether `cookie` produced a
    /// usable answer. Implementations retire or cool down bad cookies here.
    async fn validate(&self, data: &Value, cookie: &Cookie, uid: &str) -> bool;
}

/// Builds the signed header set for an upstream request.
pub trait RequestSigner: Send + Sync {
    /// Headers for a request signed over either a query string or a JSON body.
    fn headers(&self, query: Option<&str>, body: Option<&Value>, cookie: &str) -> Headers;
}
