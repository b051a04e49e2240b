use super::record::{AttendanceRecord, AttendanceStatus, ViolationKind};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Working copy of one class session. Records keep roster order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftState {
    pub records: Vec<AttendanceRecord>,
    pub select_all: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DraftAction {
    SetStatus {
        student_id: String,
        status: AttendanceStatus,
        at: DateTime<Utc>,
    },
    SetAttributes {
        student_id: String,
        attributes: BTreeMap<String, bool>,
    },
    ToggleViolation {
        student_id: String,
        kind: ViolationKind,
    },
    SetNote {
        student_id: String,
        text: String,
    },
    ToggleSelected {
        student_id: String,
    },
    ToggleSelectAll,
    ApplyBulkStatus {
        status: AttendanceStatus,
        at: DateTime<Utc>,
    },
}

impl DraftAction {
    /// The single record an action touches, or None when it may touch every record.
    pub fn target(&self) -> Option<&str> {
        match self {
            DraftAction::SetStatus { student_id, .. }
            | DraftAction::SetAttributes { student_id, .. }
            | DraftAction::ToggleViolation { student_id, .. }
            | DraftAction::SetNote { student_id, .. }
            | DraftAction::ToggleSelected { student_id } => Some(student_id),
            DraftAction::ToggleSelectAll | DraftAction::ApplyBulkStatus { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DraftAction::SetStatus { .. } => "setStatus",
            DraftAction::SetAttributes { .. } => "setAttributes",
            DraftAction::ToggleViolation { .. } => "toggleViolation",
            DraftAction::SetNote { .. } => "setNote",
            DraftAction::ToggleSelected { .. } => "toggleSelected",
            DraftAction::ToggleSelectAll => "toggleSelectAll",
            DraftAction::ApplyBulkStatus { .. } => "applyBulkStatus",
        }
    }
}

fn set_status(record: &mut AttendanceRecord, status: AttendanceStatus, at: DateTime<Utc>) {
    record.status = status;
    record.timestamp = Some(at);
    if status.is_attending() {
        record.is_selected = false;
    } else {
        record.attributes.clear();
        record.violations.clear();
    }
}

fn with_record(
    mut state: DraftState,
    student_id: &str,
    f: impl FnOnce(&mut AttendanceRecord),
) -> DraftState {
    if let Some(record) = state
        .records
        .iter_mut()
        .find(|r| r.student_id == student_id)
    {
        f(record);
    }
    state
}

/// Applies one action. Unknown ids and disallowed mutations leave the state unchanged.
pub fn reduce(state: DraftState, action: &DraftAction) -> DraftState {
    match action {
        DraftAction::SetStatus {
            student_id,
            status,
            at,
        } => with_record(state, student_id, |r| set_status(r, *status, *at)),
        DraftAction::SetAttributes {
            student_id,
            attributes,
        } => with_record(state, student_id, |r| {
            if r.status.is_attending() {
                for (name, value) in attributes {
                    r.attributes.insert(name.clone(), *value);
                }
            }
        }),
        DraftAction::ToggleViolation { student_id, kind } => {
            with_record(state, student_id, |r| {
                if r.status.is_attending() && !r.violations.remove(kind) {
                    r.violations.insert(*kind);
                }
            })
        }
        DraftAction::SetNote { student_id, text } => {
            with_record(state, student_id, |r| r.teachers_note = text.clone())
        }
        DraftAction::ToggleSelected { student_id } => with_record(state, student_id, |r| {
            if !r.status.is_attending() {
                r.is_selected = !r.is_selected;
            }
        }),
        DraftAction::ToggleSelectAll => {
            let mut state = state;
            let select = !state.select_all;
            for r in state.records.iter_mut() {
                r.is_selected = select && !r.status.is_attending();
            }
            state.select_all = select;
            state
        }
        DraftAction::ApplyBulkStatus { status, at } => {
            let mut state = state;
            for r in state.records.iter_mut() {
                if r.is_selected && r.status != AttendanceStatus::Present {
                    set_status(r, *status, *at);
                }
                r.is_selected = false;
            }
            state.select_all = false;
            state
        }
    }
}
