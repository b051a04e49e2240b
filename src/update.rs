use crate::backend::BackendError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

pub const CACHE_PREFIX: &str = "rollcall-cache";

/// Precached by the service worker on install.
pub const ASSET_LIST: &[&str] = &[
    "/",
    "/index.html",
    "/manifest.json",
    "/favicon.ico",
    "/logo192.png",
    "/logo512.png",
    "/static/js/main.js",
    "/static/css/main.css",
];

fn asset_digest() -> String {
    let mut hasher = Sha256::new();
    for asset in ASSET_LIST {
        hasher.update(asset.as_bytes());
        hasher.update(b"\n");
    }
    hasher
        .finalize()
        .iter()
        .take(4)
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Changes whenever the app version or the precached asset set changes.
pub fn cache_name(version: &str) -> String {
    format!("{}-v{}-{}", CACHE_PREFIX, version.trim(), asset_digest())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetManifest {
    pub version: String,
    pub cache_name: String,
    pub assets: Vec<&'static str>,
}

pub fn asset_manifest(version: &str) -> AssetManifest {
    AssetManifest {
        version: version.to_string(),
        cache_name: cache_name(version),
        assets: ASSET_LIST.to_vec(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum VersionCheck {
    #[serde(rename_all = "camelCase")]
    FirstSeen { version: String, cache_name: String },
    Unchanged,
    /// Clients should drop old caches and reload.
    #[serde(rename_all = "camelCase")]
    Changed {
        previous: String,
        current: String,
        cache_name: String,
    },
}

#[derive(Debug, Clone)]
pub struct VersionWatcher {
    current: Option<String>,
    poll_interval: Duration,
}

impl VersionWatcher {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            current: None,
            poll_interval,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn observe(&mut self, version: &str) -> VersionCheck {
        let version = version.trim().to_string();
        match self.current.replace(version.clone()) {
            None => VersionCheck::FirstSeen {
                cache_name: cache_name(&version),
                version,
            },
            Some(previous) if previous == version => VersionCheck::Unchanged,
            Some(previous) => {
                tracing::info!(%previous, current = %version, "new app version published");
                VersionCheck::Changed {
                    previous,
                    cache_name: cache_name(&version),
                    current: version,
                }
            }
        }
    }
}

pub fn fetch_remote_version(url: &str, timeout: Duration) -> Result<String, BackendError> {
    let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
    let resp = client
        .get(url)
        .header("cache-control", "no-cache")
        .send()?;
    if !resp.status().is_success() {
        return Err(BackendError::Http {
            status: resp.status().as_u16(),
            message: format!("version endpoint {}", url),
        });
    }
    let info: VersionInfo = resp
        .json()
        .map_err(|e| BackendError::Decode(e.to_string()))?;
    Ok(info.version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_name_tracks_version() {
        let a = cache_name("1.0.0");
        assert!(a.starts_with("rollcall-cache-v1.0.0-"));
        assert_eq!(a.len(), "rollcall-cache-v1.0.0-".len() + 8);
        assert_ne!(a, cache_name("1.0.1"));
        assert_eq!(a, cache_name(" 1.0.0 "));
    }

    #[test]
    fn watcher_reports_transitions() {
        let mut w = VersionWatcher::new(Duration::from_secs(60));
        assert!(matches!(w.observe("1.0.0"), VersionCheck::FirstSeen { .. }));
        assert_eq!(w.observe("1.0.0"), VersionCheck::Unchanged);
        match w.observe("1.1.0") {
            VersionCheck::Changed {
                previous,
                current,
                cache_name: name,
            } => {
                assert_eq!(previous, "1.0.0");
                assert_eq!(current, "1.1.0");
                assert_eq!(name, cache_name("1.1.0"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(w.current(), Some("1.1.0"));
    }
}
