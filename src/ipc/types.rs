use crate::attendance::AttendanceSession;
use crate::backend::HttpBackend;
use crate::config::Config;
use crate::update::VersionWatcher;
use rusqlite::Connection;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: Config,
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub http: Option<HttpBackend>,
    pub session: Option<AttendanceSession>,
    pub versions: VersionWatcher,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http = match &config.api {
            Some(api) => Some(HttpBackend::new(&api.base_url, api.token.clone(), api.timeout)?),
            None => None,
        };
        let versions = VersionWatcher::new(config.version_poll_interval);
        Ok(Self {
            config,
            workspace: None,
            db: None,
            http,
            session: None,
            versions,
        })
    }
}
