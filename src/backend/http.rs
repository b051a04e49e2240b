use super::{AttendanceBackend, BackendError, RosterStudent, SessionRoster};
use crate::attendance::record::{AttendanceRecord, AttendanceStatus, ViolationKind};
use crate::attendance::scan::parse_cutoff;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// REST attendance service, bearer-token authenticated.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    token: Option<String>,
    client: Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RosterPayload {
    start_time: String,
    #[serde(default)]
    students: Vec<RosterStudent>,
    #[serde(default)]
    attendances: Vec<AttendanceRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AttendanceUpdate<'a> {
    class_id: &'a str,
    date: NaiveDate,
    student_id: &'a str,
    status: AttendanceStatus,
    attributes: &'a BTreeMap<String, bool>,
    violations: &'a BTreeSet<ViolationKind>,
    teachers_note: &'a str,
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct PatchReply {
    updated: Option<usize>,
}

impl HttpBackend {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to create HTTP client: {}", e))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
            client,
        })
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn check(resp: Response, what: &str) -> Result<Response, BackendError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status.as_u16() == 404 {
            return Err(BackendError::NotFound(what.to_string()));
        }
        let message = resp.text().unwrap_or_default();
        Err(BackendError::Http {
            status: status.as_u16(),
            message: if message.is_empty() {
                status.to_string()
            } else {
                message
            },
        })
    }
}

impl AttendanceBackend for HttpBackend {
    fn open_session(&self, class_id: &str, date: NaiveDate) -> Result<SessionRoster, BackendError> {
        let url = format!("{}/classes/{}", self.base_url, class_id);
        tracing::debug!(%url, %date, "fetching roster");
        let resp = self
            .authorized(self.client.post(&url))
            .json(&json!({ "date": date }))
            .send()?;
        let payload: RosterPayload = Self::check(resp, "class")?
            .json()
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        let start_time = parse_cutoff(&payload.start_time).ok_or_else(|| {
            BackendError::Decode(format!("bad startTime {:?}", payload.start_time))
        })?;
        Ok(SessionRoster {
            class_id: class_id.to_string(),
            date,
            start_time,
            students: payload.students,
            records: payload.attendances,
        })
    }

    fn patch_attendances(
        &self,
        class_id: &str,
        date: NaiveDate,
        updates: &[AttendanceRecord],
    ) -> Result<usize, BackendError> {
        let body: Vec<AttendanceUpdate<'_>> = updates
            .iter()
            .map(|r| AttendanceUpdate {
                class_id,
                date,
                student_id: &r.student_id,
                status: r.status,
                attributes: &r.attributes,
                violations: &r.violations,
                teachers_note: &r.teachers_note,
                timestamp: r.timestamp,
            })
            .collect();
        let url = format!("{}/attendances/", self.base_url);
        tracing::info!(%url, count = body.len(), "patching attendances");
        let resp = self
            .authorized(self.client.patch(&url))
            .json(&json!({ "updates": body }))
            .send()?;
        let resp = Self::check(resp, "attendances")?;
        let text = resp.text()?;
        let updated = serde_json::from_str::<PatchReply>(&text)
            .ok()
            .and_then(|r| r.updated)
            .unwrap_or(updates.len());
        Ok(updated)
    }

    fn describe(&self) -> &'static str {
        "rest"
    }
}
