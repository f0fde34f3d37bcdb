//! Game-record API wrappers.

use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::pool::{CookiePool, RequestSigner};
use crate::config::RecordsConfig;
use crate::http::{HttpClient, HttpError, Params};

/// Message shown when no public cookie can serve a lookup.
pub const NO_PUBLIC_COOKIE: &str = "No usable cookie is available right now. Possible causes:\n\
1. every public cookie has reached its daily query limit\n\
2. the public pool is empty or all of its cookies have expired\n\
Ask an admin to add a public cookie.";

/// Errors raised by the game-record wrappers.
#[derive(Debug, Error)]
pub enum RecordsError {
    #[error("invalid uid {0:?}: expected a non-empty string of digits")]
    InvalidUid(String),

    #[error(transparent)]
    Http(#[from] HttpError),
}

/// Outcome of a lookup that reached the point of choosing a cookie.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// The upstream response envelope
    Data(Value),
    /// A user-facing explanation of why no data could be fetched
    Unavailable(String),
}

impl Lookup {
    pub fn is_data(&self) -> bool {
        matches!(self, Lookup::Data(_))
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Lookup::Data(value) => Some(value),
            Lookup::Unavailable(_) => None,
        }
    }
}

/// Game server region for an account id.
pub fn server_for(uid: &str) -> &'static str {
    if uid.starts_with('5') {
        "cn_qd01"
    } else {
        "cn_gf01"
    }
}

/// Extract the account id from a raw cookie string.
///
/// Looks for `account_id=` followed by at least six digits and keeps at most
/// twelve of them.
pub fn account_id_from_cookie(cookie: &str) -> Option<String> {
    const MARKER: &str = "account_id=";

    cookie.match_indices(MARKER).find_map(|(start, _)| {
        let digits: String = cookie[start + MARKER.len()..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .take(12)
            .collect();
        (digits.len() >= 6).then_some(digits)
    })
}

fn validate_uid(uid: &str) -> Result<(), RecordsError> {
    if uid.is_empty() || !uid.chars().all(|c| c.is_ascii_digit()) {
        return Err(RecordsError::InvalidUid(uid.to_string()));
    }
    Ok(())
}

fn no_own_cookie(uid: &str, feature: &str) -> String {
    format!("Account {uid} has no bound cookie; bind one to use {feature}.")
}

fn params(pairs: &[(&str, &str)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// How a request is sent and signed.
enum Method {
    /// Signed over `query`, sent with `params`
    Get { query: String, params: Params },
    /// Signed over and sent with `body`
    Post { body: Value },
}

struct Endpoint {
    url: String,
    method: Method,
}

/// Thin wrappers over the game-record endpoints.
pub struct RecordsApi {
    http: Arc<dyn HttpClient>,
    pool: Arc<dyn CookiePool>,
    signer: Arc<dyn RequestSigner>,
    config: RecordsConfig,
}

impl RecordsApi {
    pub fn new(
        http: Arc<dyn HttpClient>,
        pool: Arc<dyn CookiePool>,
        signer: Arc<dyn RequestSigner>,
        config: RecordsConfig,
    ) -> Self {
        Self {
            http,
            pool,
            signer,
            config,
        }
    }

    /// Spiral abyss record. `schedule_type` is `"1"` for the current period
    /// and `"2"` for the previous one.
    pub async fn abyss(
        &self,
        user_id: &str,
        uid: &str,
        schedule_type: &str,
    ) -> Result<Lookup, RecordsError> {
        validate_uid(uid)?;
        let server = server_for(uid);
        let endpoint = Endpoint {
            url: format!("{}/game_record/app/genshin/api/spiralAbyss", self.config.takumi_base),
            method: Method::Get {
                query: format!("role_id={uid}&schedule_type={schedule_type}&server={server}"),
                params: params(&[
                    ("schedule_type", schedule_type),
                    ("role_id", uid),
                    ("server", server),
                ]),
            },
        };
        self.query_public(user_id, uid, "abyss", &endpoint).await
    }

    /// Player summary card.
    pub async fn player_card(&self, user_id: &str, uid: &str) -> Result<Lookup, RecordsError> {
        validate_uid(uid)?;
        let server = server_for(uid);
        let endpoint = Endpoint {
            url: format!("{}/game_record/app/genshin/api/index", self.config.takumi_base),
            method: Method::Get {
                query: format!("role_id={uid}&server={server}"),
                params: params(&[("server", server), ("role_id", uid)]),
            },
        };
        self.query_public(user_id, uid, "player card", &endpoint).await
    }

    /// Detailed character list.
    pub async fn character_detail(
        &self,
        user_id: &str,
        uid: &str,
    ) -> Result<Lookup, RecordsError> {
        validate_uid(uid)?;
        let endpoint = Endpoint {
            url: format!("{}/game_record/app/genshin/api/character", self.config.takumi_base),
            method: Method::Post {
                body: json!({
                    "server": server_for(uid),
                    "role_id": uid,
                    "character_ids": [],
                }),
            },
        };
        self.query_public(user_id, uid, "character detail", &endpoint)
            .await
    }

    /// Real-time note. Requires the account's own cookie; not validated.
    pub async fn daily_note(&self, uid: &str) -> Result<Lookup, RecordsError> {
        validate_uid(uid)?;
        let server = server_for(uid);
        let endpoint = Endpoint {
            url: format!("{}/game_record/app/genshin/api/dailyNote", self.config.takumi_base),
            method: Method::Get {
                query: format!("role_id={uid}&server={server}"),
                params: params(&[("server", server), ("role_id", uid)]),
            },
        };
        self.query_own(uid, "daily note", &endpoint, false).await
    }

    /// Talent levels for one character. Requires the account's own cookie.
    pub async fn skill_detail(
        &self,
        uid: &str,
        character_id: &str,
    ) -> Result<Lookup, RecordsError> {
        validate_uid(uid)?;
        let server = server_for(uid);
        let endpoint = Endpoint {
            url: format!(
                "{}/event/e20200928calculate/v1/sync/avatar/detail",
                self.config.takumi_base
            ),
            method: Method::Get {
                query: format!("uid={uid}&region={server}&avatar_id={character_id}"),
                params: params(&[
                    ("region", server),
                    ("uid", uid),
                    ("avatar_id", character_id),
                ]),
            },
        };
        self.query_own(uid, "skill detail", &endpoint, false).await
    }

    /// Monthly ledger. Requires the account's own cookie.
    pub async fn month_info(&self, uid: &str, month: u32) -> Result<Lookup, RecordsError> {
        validate_uid(uid)?;
        let server = server_for(uid);
        let month = month.to_string();
        let endpoint = Endpoint {
            url: format!("{}/event/ys_ledger/monthInfo", self.config.ledger_base),
            method: Method::Get {
                query: format!("month={month}&bind_uid={uid}&bind_region={server}"),
                params: params(&[
                    ("month", month.as_str()),
                    ("bind_uid", uid),
                    ("bind_region", server),
                ]),
            },
        };
        self.query_own(uid, "monthly ledger", &endpoint, true).await
    }

    /// Game-record card for the account a raw cookie belongs to.
    ///
    /// Returns `None` if the cookie carries no account id.
    pub async fn bind_game(&self, cookie: &str) -> Result<Option<(Value, String)>, RecordsError> {
        let Some(account_id) = account_id_from_cookie(cookie) else {
            debug!("Cookie has no account id");
            return Ok(None);
        };

        let endpoint = Endpoint {
            url: format!(
                "{}/game_record/card/wapi/getGameRecordCard",
                self.config.takumi_base
            ),
            method: Method::Get {
                query: format!("uid={account_id}"),
                params: params(&[("uid", account_id.as_str())]),
            },
        };
        let data = self.send(&endpoint, cookie).await?;
        Ok(Some((data, account_id)))
    }

    async fn send(&self, endpoint: &Endpoint, cookie: &str) -> Result<Value, RecordsError> {
        let data = match &endpoint.method {
            Method::Get { query, params } => {
                let headers = self.signer.headers(Some(query.as_str()), None, cookie);
                self.http.get(&endpoint.url, &headers, params, false).await?
            }
            Method::Post { body } => {
                let headers = self.signer.headers(None, Some(body), cookie);
                self.http.post(&endpoint.url, &headers, body).await?
            }
        };
        Ok(data)
    }

    /// Try public cookies until one yields a valid response, the pool runs
    /// dry, or the attempt budget is spent.
    async fn query_public(
        &self,
        user_id: &str,
        uid: &str,
        action: &str,
        endpoint: &Endpoint,
    ) -> Result<Lookup, RecordsError> {
        for attempt in 1..=self.config.max_cookie_attempts {
            let Some(cookie) = self.pool.public_cookie(user_id, uid, action).await else {
                info!(uid = %uid, action = %action, "No public cookie available");
                return Ok(Lookup::Unavailable(NO_PUBLIC_COOKIE.to_string()));
            };

            let data = self.send(endpoint, &cookie.cookie).await?;
            if self.pool.validate(&data, &cookie, uid).await {
                debug!(uid = %uid, action = %action, attempt = attempt, "Lookup succeeded");
                return Ok(Lookup::Data(data));
            }

            warn!(
                uid = %uid,
                action = %action,
                attempt = attempt,
                "Cookie rejected, trying another"
            );
        }

        warn!(
            uid = %uid,
            action = %action,
            attempts = self.config.max_cookie_attempts,
            "Cookie attempts exhausted"
        );
        Ok(Lookup::Unavailable(NO_PUBLIC_COOKIE.to_string()))
    }

    async fn query_own(
        &self,
        uid: &str,
        action: &str,
        endpoint: &Endpoint,
        validate: bool,
    ) -> Result<Lookup, RecordsError> {
        let Some(cookie) = self.pool.own_cookie(uid, action).await else {
            info!(uid = %uid, action = %action, "No bound cookie");
            return Ok(Lookup::Unavailable(no_own_cookie(uid, action)));
        };
        self.pool.touch_cookie(&cookie, uid).await;

        let data = self.send(endpoint, &cookie.cookie).await?;
        if validate && !self.pool.validate(&data, &cookie, uid).await {
            warn!(uid = %uid, action = %action, "Bound cookie rejected");
            return Ok(Lookup::Unavailable(format!(
                "The cookie bound to account {uid} was rejected; bind it again to use {action}."
            )));
        }
        Ok(Lookup::Data(data))
    }
}

impl std::fmt::Debug for RecordsApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordsApi")
            .field("config", &self.config)
            .finish()
    }
}
