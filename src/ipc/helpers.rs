use super::error::HandlerErr;
use crate::attendance::{AttendanceSession, AttendanceStatus};
use crate::backend::{AttendanceBackend, HttpBackend, SqliteBackend};
use chrono::{DateTime, FixedOffset, Local, NaiveDate};
use rusqlite::Connection;

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Trimmed; empty strings count as absent.
pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn get_status(params: &serde_json::Value, key: &str) -> Result<AttendanceStatus, HandlerErr> {
    let raw = get_required_str(params, key)?;
    AttendanceStatus::parse(&raw)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown status: {}", raw)))
}

pub fn get_date(params: &serde_json::Value) -> Result<NaiveDate, HandlerErr> {
    match get_optional_str(params, "date") {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map_err(|_| HandlerErr::bad_params("date must be YYYY-MM-DD")),
        None => Ok(Local::now().date_naive()),
    }
}

/// `at` is an RFC 3339 instant; the offset decides the local time-of-day.
pub fn get_at(params: &serde_json::Value) -> Result<DateTime<FixedOffset>, HandlerErr> {
    match get_optional_str(params, "at") {
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map_err(|_| HandlerErr::bad_params("at must be an RFC 3339 timestamp")),
        None => {
            let now = Local::now();
            Ok(now.with_timezone(now.offset()))
        }
    }
}

pub fn require_db(db: Option<&Connection>) -> Result<&Connection, HandlerErr> {
    db.ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn require_session(
    session: Option<&mut AttendanceSession>,
) -> Result<&mut AttendanceSession, HandlerErr> {
    session.ok_or_else(|| HandlerErr::new("no_session", "open an attendance session first"))
}

/// The REST service when configured, otherwise the open workspace.
pub fn backend<'a>(
    db: Option<&'a Connection>,
    http: Option<&'a HttpBackend>,
) -> Result<Box<dyn AttendanceBackend + 'a>, HandlerErr> {
    if let Some(http) = http {
        return Ok(Box::new(http.clone()));
    }
    Ok(Box::new(SqliteBackend::new(require_db(db)?)))
}
