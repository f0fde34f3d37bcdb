//! Memoized game-record lookups.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::api::{Lookup, RecordsApi, RecordsError};
use crate::cache::{CacheArgs, CacheKey, Memoized};
use crate::clock::{system_clock, SharedClock};
use crate::config::CacheConfig;

/// Arguments for an abyss lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbyssQuery {
    pub user_id: String,
    pub uid: String,
    /// `"1"` for the current period, `"2"` for the previous one
    pub schedule_type: String,
}

impl AbyssQuery {
    pub fn new(user_id: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            uid: uid.into(),
            schedule_type: "1".to_string(),
        }
    }

    /// Ask for the previous abyss period instead of the current one.
    pub fn previous(mut self) -> Self {
        self.schedule_type = "2".to_string();
        self
    }
}

impl CacheArgs for AbyssQuery {
    fn cache_key(&self) -> CacheKey {
        CacheKey::new()
            .arg("user_id", &self.user_id)
            .arg("uid", &self.uid)
            .arg("schedule_type", &self.schedule_type)
    }
}

/// Arguments for lookups keyed by requesting user and account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerQuery {
    pub user_id: String,
    pub uid: String,
}

impl PlayerQuery {
    pub fn new(user_id: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            uid: uid.into(),
        }
    }
}

impl CacheArgs for PlayerQuery {
    fn cache_key(&self) -> CacheKey {
        CacheKey::new()
            .arg("user_id", &self.user_id)
            .arg("uid", &self.uid)
    }
}

/// Arguments for a talent lookup on one character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillQuery {
    pub uid: String,
    pub character_id: String,
}

impl SkillQuery {
    pub fn new(uid: impl Into<String>, character_id: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            character_id: character_id.into(),
        }
    }
}

impl CacheArgs for SkillQuery {
    fn cache_key(&self) -> CacheKey {
        CacheKey::new()
            .arg("uid", &self.uid)
            .arg("character_id", &self.character_id)
    }
}

/// Arguments for a monthly ledger lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthQuery {
    pub uid: String,
    /// Calendar month, 1 through 12
    pub month: u32,
}

impl MonthQuery {
    pub fn new(uid: impl Into<String>, month: u32) -> Self {
        Self {
            uid: uid.into(),
            month,
        }
    }
}

impl CacheArgs for MonthQuery {
    fn cache_key(&self) -> CacheKey {
        CacheKey::new().arg("uid", &self.uid).arg("month", self.month)
    }
}

type Cached<A> = Memoized<A, Lookup, RecordsError>;

/// [`RecordsApi`] with one private TTL cache per cached endpoint.
///
/// Only [`Lookup::Data`] results are cached, so a "no cookie" message is
/// never replayed once a cookie becomes available.
pub struct RecordsService {
    api: Arc<RecordsApi>,
    abyss: Cached<AbyssQuery>,
    player_card: Cached<PlayerQuery>,
    character_detail: Cached<PlayerQuery>,
    skill_detail: Cached<SkillQuery>,
    month_info: Cached<MonthQuery>,
}

fn cached<A, F, Fut>(name: &str, config: &CacheConfig, clock: &SharedClock, func: F) -> Cached<A>
where
    A: CacheArgs + Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Lookup, RecordsError>> + Send + 'static,
{
    Memoized::new(Duration::from_secs(config.ttl_secs), func)
        .named(name)
        .cache_if(Lookup::is_data)
        .single_flight(config.single_flight)
        .with_clock(clock.clone())
}

impl RecordsService {
    pub fn new(api: Arc<RecordsApi>, config: &CacheConfig) -> Self {
        Self::with_clock(api, config, system_clock())
    }

    pub fn with_clock(api: Arc<RecordsApi>, config: &CacheConfig, clock: SharedClock) -> Self {
        let a = api.clone();
        let abyss = cached("abyss", config, &clock, move |q: AbyssQuery| {
            let api = a.clone();
            async move { api.abyss(&q.user_id, &q.uid, &q.schedule_type).await }
        });

        let a = api.clone();
        let player_card = cached("player_card", config, &clock, move |q: PlayerQuery| {
            let api = a.clone();
            async move { api.player_card(&q.user_id, &q.uid).await }
        });

        let a = api.clone();
        let character_detail = cached("character_detail", config, &clock, move |q: PlayerQuery| {
            let api = a.clone();
            async move { api.character_detail(&q.user_id, &q.uid).await }
        });

        let a = api.clone();
        let skill_detail = cached("skill_detail", config, &clock, move |q: SkillQuery| {
            let api = a.clone();
            async move { api.skill_detail(&q.uid, &q.character_id).await }
        });

        let a = api.clone();
        let month_info = cached("month_info", config, &clock, move |q: MonthQuery| {
            let api = a.clone();
            async move { api.month_info(&q.uid, q.month).await }
        });

        Self {
            api,
            abyss,
            player_card,
            character_detail,
            skill_detail,
            month_info,
        }
    }

    pub async fn abyss(&self, query: AbyssQuery) -> Result<Lookup, RecordsError> {
        self.abyss.call(query).await
    }

    pub async fn player_card(&self, query: PlayerQuery) -> Result<Lookup, RecordsError> {
        self.player_card.call(query).await
    }

    pub async fn character_detail(&self, query: PlayerQuery) -> Result<Lookup, RecordsError> {
        self.character_detail.call(query).await
    }

    pub async fn skill_detail(&self, query: SkillQuery) -> Result<Lookup, RecordsError> {
        self.skill_detail.call(query).await
    }

    pub async fn month_info(&self, query: MonthQuery) -> Result<Lookup, RecordsError> {
        self.month_info.call(query).await
    }

    /// Real-time notes change constantly and are never cached.
    pub async fn daily_note(&self, uid: &str) -> Result<Lookup, RecordsError> {
        self.api.daily_note(uid).await
    }

    pub async fn bind_game(&self, cookie: &str) -> Result<Option<(Value, String)>, RecordsError> {
        self.api.bind_game(cookie).await
    }

    /// Drop every cached lookup.
    pub fn clear(&self) {
        self.abyss.clear();
        self.player_card.clear();
        self.character_detail.clear();
        self.skill_detail.clear();
        self.month_info.clear();
    }
}
