//! Resource manifest entries and local file validation.

use std::path::{Component, Path, PathBuf};

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

/// One file listed in the remote manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the resource root, `/`-separated
    pub path: String,
    /// Whether the local copy must match `hash`
    #[serde(default)]
    pub lock: bool,
    /// Lowercase MD5 hex digest of the expected contents
    #[serde(default)]
    pub hash: String,
}

/// State of the local copy of a manifest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalState {
    /// Present and acceptable
    Intact,
    /// Present but locked with a mismatching hash
    Stale,
    /// Not on disk
    Missing,
}

impl ManifestEntry {
    /// Resolve the entry beneath `root`.
    ///
    /// Returns `None` for absolute paths or paths that climb out of `root`.
    pub fn local_path(&self, root: &Path) -> Option<PathBuf> {
        let relative = Path::new(&self.path);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe || self.path.is_empty() {
            return None;
        }
        Some(root.join(relative))
    }

    /// Non-JSON resources must not be saved from a JSON error body.
    pub fn exclude_json(&self) -> bool {
        !self.path.ends_with(".json")
    }

    /// Inspect the local copy at `path`.
    pub async fn local_state(&self, path: &Path) -> LocalState {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return LocalState::Missing;
        }
        if !self.lock {
            return LocalState::Intact;
        }
        match tokio::fs::read(path).await {
            Ok(bytes) if md5_hex(&bytes).eq_ignore_ascii_case(&self.hash) => LocalState::Intact,
            _ => LocalState::Stale,
        }
    }
}

/// Lowercase hex MD5 digest of `bytes`.
pub fn md5_hex(bytes: &[u8]) -> String {
    format!("{:x}", Md5::digest(bytes))
}
