//! Best-effort resource synchronization against a remote manifest.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::manifest::{LocalState, ManifestEntry};
use crate::config::ResourcesConfig;
use crate::http::{Headers, HttpClient, HttpError};

/// Why the manifest could not be read.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("manifest is not a list of resources: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Outcome of one resource check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// The manifest could not be fetched or decoded; nothing was checked
    pub manifest_failed: bool,
    /// Entries whose local copy was already acceptable
    pub intact: usize,
    /// Paths fetched during this run
    pub downloaded: Vec<String>,
    /// Paths that could not be refreshed
    pub failed: Vec<String>,
}

impl SyncReport {
    /// Whether every listed resource is present and valid after the run.
    pub fn is_complete(&self) -> bool {
        !self.manifest_failed && self.failed.is_empty()
    }
}

/// Keeps a local resource directory in line with a remote manifest.
pub struct ResourceSync {
    http: Arc<dyn HttpClient>,
    config: ResourcesConfig,
}

impl ResourceSync {
    pub fn new(http: Arc<dyn HttpClient>, config: ResourcesConfig) -> Self {
        Self { http, config }
    }

    /// Check every manifest entry and download what is missing or stale.
    ///
    /// Never fails: a manifest that cannot be read ends the run early, and
    /// individual download failures are recorded and skipped.
    pub async fn check_resources(&self) -> SyncReport {
        info!(dir = %self.config.local_dir, "Checking resources");

        let manifest = match self.fetch_manifest().await {
            Ok(manifest) => manifest,
            Err(e) => {
                info!(
                    error = %e,
                    "Failed to read the resource manifest, try a different mirror"
                );
                return SyncReport {
                    manifest_failed: true,
                    ..SyncReport::default()
                };
            }
        };

        let root = PathBuf::from(&self.config.local_dir);
        let interval = Duration::from_millis(self.config.download_interval_ms);
        let mut report = SyncReport::default();

        for entry in &manifest {
            let Some(path) = entry.local_path(&root) else {
                warn!(path = %entry.path, "Skipping manifest entry outside the resource root");
                report.failed.push(entry.path.clone());
                continue;
            };

            match entry.local_state(&path).await {
                LocalState::Intact => {
                    report.intact += 1;
                    continue;
                }
                LocalState::Stale => {
                    debug!(path = %entry.path, "Hash mismatch, replacing");
                    if let Err(e) = tokio::fs::remove_file(&path).await {
                        warn!(path = %entry.path, error = %e, "Failed to remove stale resource");
                        report.failed.push(entry.path.clone());
                        continue;
                    }
                }
                LocalState::Missing => {}
            }

            let url = format!("{}{}/{}", self.config.proxy, self.config.base_url, entry.path);
            match self.http.download(&url, &path, entry.exclude_json()).await {
                Ok(()) => {
                    debug!(path = %entry.path, "Downloaded resource");
                    report.downloaded.push(entry.path.clone());
                    if !interval.is_zero() {
                        tokio::time::sleep(interval).await;
                    }
                }
                Err(e) => {
                    warn!(
                        path = %entry.path,
                        error = %e,
                        "Failed to download resource, try a different mirror"
                    );
                    report.failed.push(entry.path.clone());
                }
            }
        }

        if report.downloaded.is_empty() && report.failed.is_empty() {
            info!(intact = report.intact, "Resources intact, nothing to download");
        } else {
            info!(
                downloaded = report.downloaded.len(),
                failed = report.failed.len(),
                intact = report.intact,
                "Resource download finished"
            );
        }
        report
    }

    async fn fetch_manifest(&self) -> Result<Vec<ManifestEntry>, ManifestError> {
        let url = format!("{}{}", self.config.proxy, self.config.manifest_url);
        let value = self.http.get(&url, &Headers::new(), &[], true).await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::manifest::md5_hex;
    use crate::test_utils::MockHttp;
    use serde_json::json;
    use tempfile::TempDir;

    const BASE: &str = "https://res.example/main";

    fn sync(http: Arc<MockHttp>, dir: &TempDir, proxy: &str) -> ResourceSync {
        let config = ResourcesConfig {
            local_dir: dir.path().display().to_string(),
            manifest_url: "https://res.example/main/resources_list.json".to_string(),
            base_url: BASE.to_string(),
            proxy: proxy.to_string(),
            download_interval_ms: 0,
        };
        ResourceSync::new(http, config)
    }

    #[tokio::test]
    async fn test_downloads_missing_files() {
        let dir = TempDir::new().unwrap();
        let http = Arc::new(MockHttp::new());
        http.respond_json(json!([
            {"path": "img/a.png", "lock": true, "hash": md5_hex(b"png-a")},
            {"path": "data/b.json", "lock": false, "hash": ""}
        ]));
        http.serve_file(&format!("{BASE}/img/a.png"), b"png-a");
        http.serve_file(&format!("{BASE}/data/b.json"), b"{}");

        let report = sync(http.clone(), &dir, "").check_resources().await;

        assert!(report.is_complete());
        assert_eq!(report.downloaded, vec!["img/a.png", "data/b.json"]);
        assert_eq!(std::fs::read(dir.path().join("img/a.png")).unwrap(), b"png-a");
    }

    #[tokio::test]
    async fn test_intact_and_unlocked_files_are_left_alone() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("good.png"), b"good").unwrap();
        std::fs::write(dir.path().join("loose.png"), b"anything").unwrap();

        let http = Arc::new(MockHttp::new());
        http.respond_json(json!([
            {"path": "good.png", "lock": true, "hash": md5_hex(b"good")},
            {"path": "loose.png", "lock": false, "hash": md5_hex(b"other")}
        ]));

        let report = sync(http.clone(), &dir, "").check_resources().await;

        assert_eq!(report.intact, 2);
        assert!(report.downloaded.is_empty());
        assert!(http.downloads().is_empty());
    }

    #[tokio::test]
    async fn test_stale_locked_file_is_replaced() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("icon.png"), b"old").unwrap();

        let http = Arc::new(MockHttp::new());
        http.respond_json(json!([
            {"path": "icon.png", "lock": true, "hash": md5_hex(b"new")}
        ]));
        http.serve_file(&format!("{BASE}/icon.png"), b"new");

        let report = sync(http, &dir, "").check_resources().await;

        assert_eq!(report.downloaded, vec!["icon.png"]);
        assert_eq!(std::fs::read(dir.path().join("icon.png")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_download_failure_continues_with_next_file() {
        let dir = TempDir::new().unwrap();
        let http = Arc::new(MockHttp::new());
        http.respond_json(json!([
            {"path": "broken.png", "lock": false, "hash": ""},
            {"path": "fine.png", "lock": false, "hash": ""}
        ]));
        http.fail_file(&format!("{BASE}/broken.png"), "connection reset");
        http.serve_file(&format!("{BASE}/fine.png"), b"ok");

        let report = sync(http, &dir, "").check_resources().await;

        assert!(!report.is_complete());
        assert_eq!(report.failed, vec!["broken.png"]);
        assert_eq!(report.downloaded, vec!["fine.png"]);
    }

    #[tokio::test]
    async fn test_json_error_body_is_not_saved_as_image() {
        let dir = TempDir::new().unwrap();
        let http = Arc::new(MockHttp::new());
        http.respond_json(json!([
            {"path": "img/a.png", "lock": false, "hash": ""},
            {"path": "data/b.json", "lock": false, "hash": ""}
        ]));
        http.serve_file(&format!("{BASE}/img/a.png"), br#"{"retcode": -1}"#);
        http.serve_file(&format!("{BASE}/data/b.json"), br#"{"retcode": 0}"#);

        let report = sync(http, &dir, "").check_resources().await;

        assert_eq!(report.failed, vec!["img/a.png"]);
        assert_eq!(report.downloaded, vec!["data/b.json"]);
        assert!(!dir.path().join("img/a.png").exists());
    }

    #[tokio::test]
    async fn test_manifest_failure_is_swallowed() {
        let dir = TempDir::new().unwrap();
        let http = Arc::new(MockHttp::new());
        http.fail_next("dns failure");

        let report = sync(http.clone(), &dir, "").check_resources().await;

        assert!(report.manifest_failed);
        assert!(http.downloads().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_manifest_is_swallowed() {
        let dir = TempDir::new().unwrap();
        let http = Arc::new(MockHttp::new());
        http.respond_json(json!({"retcode": 0}));

        let report = sync(http, &dir, "").check_resources().await;

        assert!(report.manifest_failed);
    }

    #[tokio::test]
    async fn test_proxy_prefix_applies_to_all_urls() {
        let dir = TempDir::new().unwrap();
        let proxy = "https://mirror.example/";
        let http = Arc::new(MockHttp::new());
        http.respond_json(json!([{"path": "a.png", "lock": false, "hash": ""}]));
        http.serve_file(&format!("{proxy}{BASE}/a.png"), b"a");

        let report = sync(http.clone(), &dir, proxy).check_resources().await;

        assert!(report.is_complete());
        let requests = http.requests();
        assert_eq!(
            requests[0].url,
            "https://mirror.example/https://res.example/main/resources_list.json"
        );
        assert_eq!(http.downloads(), vec![format!("{proxy}{BASE}/a.png")]);
    }

    #[tokio::test]
    async fn test_entries_outside_root_are_refused() {
        let dir = TempDir::new().unwrap();
        let http = Arc::new(MockHttp::new());
        http.respond_json(json!([{"path": "../escape.png", "lock": false, "hash": ""}]));

        let report = sync(http.clone(), &dir, "").check_resources().await;

        assert_eq!(report.failed, vec!["../escape.png"]);
        assert!(http.downloads().is_empty());
    }
}
