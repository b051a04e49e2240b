use super::dirty::DirtyTracker;
use super::draft::{reduce, DraftAction, DraftState};
use super::record::{AttendanceRecord, AttendanceStatus};
use super::scan::{classify, CameraDecision, CameraRetry, ScanGate, ScanOutcome};
use crate::backend::{RosterStudent, SessionRoster};
use crate::config::ScanConfig;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("student {0} is not on this roster")]
    UnknownStudent(String),
    #[error("student {0} appears more than once on the roster")]
    DuplicateStudent(String),
    #[error("scan code {0} is assigned to more than one student")]
    DuplicateScanCode(String),
    #[error("student {0} is not present or late; attribute and violation flags are disabled")]
    NotAttending(String),
}

impl DraftError {
    pub fn code(&self) -> &'static str {
        match self {
            DraftError::UnknownStudent(_) => "not_found",
            DraftError::DuplicateStudent(_) | DraftError::DuplicateScanCode(_) => "conflict",
            DraftError::NotAttending(_) => "not_attending",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView<'a> {
    pub class_id: &'a str,
    pub date: NaiveDate,
    pub start_time: String,
    pub select_all: bool,
    pub has_unsaved_changes: bool,
    pub dirty_count: usize,
    pub dirty_student_ids: Vec<&'a str>,
    pub students: &'a [RosterStudent],
    pub records: &'a [AttendanceRecord],
}

/// One open class-day: the roster, the working draft and its dirty tracking. Dropped when
/// the user navigates away, which also tears down the scanner state.
#[derive(Debug)]
pub struct AttendanceSession {
    class_id: String,
    date: NaiveDate,
    cutoff: NaiveTime,
    students: Vec<RosterStudent>,
    scan_index: HashMap<String, String>,
    draft: DraftState,
    tracker: DirtyTracker,
    save_in_flight: bool,
    gate: ScanGate,
    camera: CameraRetry,
}

impl AttendanceSession {
    pub fn open(roster: SessionRoster, scan: &ScanConfig) -> Result<Self, DraftError> {
        let mut seen = HashSet::new();
        for s in &roster.students {
            if !seen.insert(s.id.as_str()) {
                return Err(DraftError::DuplicateStudent(s.id.clone()));
            }
        }

        let mut persisted: HashMap<String, AttendanceRecord> = roster
            .records
            .into_iter()
            .map(|r| (r.student_id.clone(), r))
            .collect();
        let records: Vec<AttendanceRecord> = roster
            .students
            .iter()
            .map(|s| {
                let mut r = persisted
                    .remove(&s.id)
                    .unwrap_or_else(|| AttendanceRecord::unmarked(s.id.clone()));
                r.is_selected = false;
                r
            })
            .collect();
        if !persisted.is_empty() {
            tracing::debug!(
                orphaned = persisted.len(),
                "ignoring persisted records for students no longer on the roster"
            );
        }

        let mut scan_index = HashMap::new();
        for s in &roster.students {
            scan_index.insert(s.id.clone(), s.id.clone());
        }
        // Badge codes win over raw ids when both could match.
        let mut codes = HashSet::new();
        for s in &roster.students {
            let Some(code) = s.scan_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) else {
                continue;
            };
            if !codes.insert(code) {
                return Err(DraftError::DuplicateScanCode(code.to_string()));
            }
            if let Some(owner) = scan_index.insert(code.to_string(), s.id.clone()) {
                if owner != s.id {
                    tracing::warn!(
                        code,
                        shadowed = %owner,
                        student = %s.id,
                        "scan code equals another student's id; the code wins"
                    );
                }
            }
        }

        let tracker = DirtyTracker::new(&records);
        Ok(Self {
            class_id: roster.class_id,
            date: roster.date,
            cutoff: roster.start_time,
            students: roster.students,
            scan_index,
            draft: DraftState {
                records,
                select_all: false,
            },
            tracker,
            save_in_flight: false,
            gate: ScanGate::new(scan.cooldown),
            camera: CameraRetry::new(scan.camera_max_retries, scan.camera_retry_delay),
        })
    }

    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn cutoff(&self) -> NaiveTime {
        self.cutoff
    }

    pub fn records(&self) -> &[AttendanceRecord] {
        &self.draft.records
    }

    pub fn record(&self, student_id: &str) -> Option<&AttendanceRecord> {
        self.draft
            .records
            .iter()
            .find(|r| r.student_id == student_id)
    }

    pub fn tracker(&self) -> &DirtyTracker {
        &self.tracker
    }

    pub fn dirty_count(&self) -> usize {
        self.tracker.len()
    }

    /// Validates the action against the roster, runs the reducer and refreshes dirty state.
    pub fn dispatch(&mut self, action: DraftAction) -> Result<(), DraftError> {
        if let Some(id) = action.target() {
            let Some(record) = self.record(id) else {
                return Err(DraftError::UnknownStudent(id.to_string()));
            };
            let flags = matches!(
                action,
                DraftAction::SetAttributes { .. } | DraftAction::ToggleViolation { .. }
            );
            if flags && !record.status.is_attending() {
                return Err(DraftError::NotAttending(id.to_string()));
            }
        }

        let state = std::mem::take(&mut self.draft);
        self.draft = reduce(state, &action);

        match action.target() {
            Some(id) => {
                if let Some(record) = self
                    .draft
                    .records
                    .iter()
                    .find(|r| r.student_id == id)
                {
                    self.tracker.observe(record);
                }
            }
            None => self.tracker.observe_all(&self.draft.records),
        }
        tracing::trace!(action = action.name(), dirty = self.tracker.len(), "draft updated");
        Ok(())
    }

    pub fn scan(&mut self, token: &str, at: DateTime<FixedOffset>) -> ScanOutcome {
        if !self.gate.accept(at.with_timezone(&Utc)) {
            return ScanOutcome::CoolingDown;
        }
        self.camera.reset();

        let token = token.trim();
        let Some(student_id) = self.scan_index.get(token).cloned() else {
            tracing::info!(token, "scanned code not recognized");
            return ScanOutcome::NotRecognized {
                token: token.to_string(),
                message: format!("Code \"{}\" is not recognized for this class", token),
            };
        };

        let current = self
            .record(&student_id)
            .map(|r| r.status)
            .unwrap_or(AttendanceStatus::Unmarked);
        if current.is_attending() {
            return ScanOutcome::AlreadyMarked {
                student_id,
                status: current,
            };
        }

        let status = classify(at.time(), self.cutoff);
        // The id came from the roster index, so dispatch cannot miss.
        let _ = self.dispatch(DraftAction::SetStatus {
            student_id: student_id.clone(),
            status,
            at: at.with_timezone(&Utc),
        });
        ScanOutcome::Marked { student_id, status }
    }

    pub fn camera_error(&mut self, error: &str) -> CameraDecision {
        self.camera.on_error(error)
    }

    pub(crate) fn begin_save(&mut self) -> bool {
        if self.save_in_flight {
            return false;
        }
        self.save_in_flight = true;
        true
    }

    pub(crate) fn end_save(&mut self) {
        self.save_in_flight = false;
    }

    pub(crate) fn dirty_records(&self) -> Vec<AttendanceRecord> {
        self.draft
            .records
            .iter()
            .filter(|r| self.tracker.is_dirty(&r.student_id))
            .cloned()
            .collect()
    }

    pub(crate) fn commit(&mut self, saved: &[AttendanceRecord]) {
        self.tracker.commit(saved);
    }

    pub fn view(&self) -> SessionView<'_> {
        SessionView {
            class_id: &self.class_id,
            date: self.date,
            start_time: self.cutoff.format("%H:%M").to_string(),
            select_all: self.draft.select_all,
            has_unsaved_changes: !self.tracker.is_empty(),
            dirty_count: self.tracker.len(),
            dirty_student_ids: self.tracker.ids().iter().map(String::as_str).collect(),
            students: &self.students,
            records: &self.draft.records,
        }
    }
}
