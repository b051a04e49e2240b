mod http;
mod sqlite;

pub use http::HttpBackend;
pub use sqlite::SqliteBackend;

use crate::attendance::record::AttendanceRecord;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("backend responded {status}: {message}")]
    Http { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("malformed backend payload: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn code(&self) -> &'static str {
        match self {
            BackendError::NotFound(_) => "not_found",
            BackendError::Http { .. } | BackendError::Transport(_) => "network_error",
            BackendError::Database(_) => "db_query_failed",
            BackendError::Decode(_) => "network_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterStudent {
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_code: Option<String>,
}

/// Everything needed to open a draft: the class cutoff, who is on the roster and whatever
/// attendance was already persisted for the day.
#[derive(Debug, Clone)]
pub struct SessionRoster {
    pub class_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub students: Vec<RosterStudent>,
    pub records: Vec<AttendanceRecord>,
}

pub trait AttendanceBackend {
    fn open_session(&self, class_id: &str, date: NaiveDate) -> Result<SessionRoster, BackendError>;

    /// One call per save; returns how many records the backend accepted.
    fn patch_attendances(
        &self,
        class_id: &str,
        date: NaiveDate,
        updates: &[AttendanceRecord],
    ) -> Result<usize, BackendError>;

    fn describe(&self) -> &'static str;
}
