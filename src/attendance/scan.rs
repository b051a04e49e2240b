use super::record::AttendanceStatus;
use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_SCAN_COOLDOWN: Duration = Duration::from_millis(1000);
pub const DEFAULT_CAMERA_MAX_RETRIES: u32 = 3;
pub const DEFAULT_CAMERA_RETRY_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ScanOutcome {
    #[serde(rename_all = "camelCase")]
    Marked {
        student_id: String,
        status: AttendanceStatus,
    },
    #[serde(rename_all = "camelCase")]
    AlreadyMarked {
        student_id: String,
        status: AttendanceStatus,
    },
    NotRecognized { token: String, message: String },
    CoolingDown,
}

/// Strictly after the cutoff is late; the cutoff minute itself is on time.
pub fn classify(scanned_at: NaiveTime, cutoff: NaiveTime) -> AttendanceStatus {
    if scanned_at > cutoff {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    }
}

/// Accepts "HH:MM" or "HH:MM:SS".
pub fn parse_cutoff(raw: &str) -> Option<NaiveTime> {
    let t = raw.trim();
    NaiveTime::parse_from_str(t, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M:%S"))
        .ok()
}

/// Drops tokens that arrive within the cooldown window of the last accepted one, so a code
/// held in front of the camera produces a single dispatch.
#[derive(Debug, Clone)]
pub struct ScanGate {
    cooldown: Duration,
    last_accepted: Option<DateTime<Utc>>,
}

impl ScanGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_accepted: None,
        }
    }

    pub fn accept(&mut self, at: DateTime<Utc>) -> bool {
        if let Some(last) = self.last_accepted {
            let elapsed = at.signed_duration_since(last);
            if elapsed >= chrono::Duration::zero()
                && elapsed.to_std().map(|e| e < self.cooldown).unwrap_or(false)
            {
                return false;
            }
        }
        self.last_accepted = Some(at);
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum CameraDecision {
    #[serde(rename_all = "camelCase")]
    Retry { attempt: u32, delay_ms: u64 },
    GiveUp { message: String },
}

#[derive(Debug, Clone)]
pub struct CameraRetry {
    max_retries: u32,
    delay: Duration,
    attempts: u32,
}

impl CameraRetry {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            delay,
            attempts: 0,
        }
    }

    pub fn on_error(&mut self, error: &str) -> CameraDecision {
        if self.attempts >= self.max_retries {
            tracing::warn!(attempts = self.attempts, error, "camera unavailable, giving up");
            return CameraDecision::GiveUp {
                message: "Camera unavailable. Allow camera access in the browser settings, \
                          check that no other app is using it, then reopen the scanner."
                    .to_string(),
            };
        }
        self.attempts += 1;
        tracing::debug!(attempt = self.attempts, error, "retrying camera");
        CameraDecision::Retry {
            attempt: self.attempts,
            delay_ms: self.delay.as_millis() as u64,
        }
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}
