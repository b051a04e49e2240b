use crate::attendance::{save, AttendanceSession, DraftAction, ViolationKind};
use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::helpers::{backend, get_at, get_date, get_required_str, get_status, require_session};
use crate::ipc::types::{AppState, Request};
use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;

fn session_json(session: &AttendanceSession) -> Result<serde_json::Value, HandlerErr> {
    Ok(serde_json::to_value(session.view())?)
}

fn change_json(session: &AttendanceSession, student_id: &str) -> serde_json::Value {
    json!({
        "record": session.record(student_id),
        "dirtyCount": session.dirty_count(),
        "hasUnsavedChanges": session.dirty_count() > 0
    })
}

fn attendance_open(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let date = get_date(params)?;
    let roster = {
        let backend = backend(state.db.as_ref(), state.http.as_ref())?;
        backend.open_session(&class_id, date)?
    };
    let session = AttendanceSession::open(roster, &state.config.scan)?;

    let discarded = state
        .session
        .replace(session)
        .map(|previous| previous.dirty_count())
        .unwrap_or(0);
    if discarded > 0 {
        tracing::warn!(discarded, "opening a new session discarded unsaved attendance");
    }
    let Some(session) = state.session.as_ref() else {
        return Err(HandlerErr::new("no_session", "session was not opened"));
    };
    tracing::info!(%class_id, %date, students = session.records().len(), "attendance session opened");
    let mut view = session_json(session)?;
    view["discardedUnsaved"] = json!(discarded);
    Ok(view)
}

fn attendance_state(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let session = require_session(state.session.as_mut())?;
    session_json(session)
}

/// Runs one single-record action and reports the touched record.
fn dispatch_one(state: &mut AppState, action: DraftAction) -> Result<serde_json::Value, HandlerErr> {
    let session = require_session(state.session.as_mut())?;
    let student_id = action.target().unwrap_or_default().to_string();
    session.dispatch(action)?;
    Ok(change_json(session, &student_id))
}

/// Runs an action that may touch every record and reports the whole session.
fn dispatch_all(state: &mut AppState, action: DraftAction) -> Result<serde_json::Value, HandlerErr> {
    let session = require_session(state.session.as_mut())?;
    session.dispatch(action)?;
    session_json(session)
}

fn set_status(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let action = DraftAction::SetStatus {
        student_id: get_required_str(params, "studentId")?,
        status: get_status(params, "status")?,
        at: get_at(params)?.with_timezone(&Utc),
    };
    dispatch_one(state, action)
}

fn set_attributes(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let Some(raw) = params.get("attributes").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("missing attributes"));
    };
    let mut attributes = BTreeMap::new();
    for (name, value) in raw {
        let Some(flag) = value.as_bool() else {
            return Err(HandlerErr::bad_params(format!(
                "attribute {} must be a boolean",
                name
            )));
        };
        attributes.insert(name.clone(), flag);
    }
    dispatch_one(
        state,
        DraftAction::SetAttributes {
            student_id,
            attributes,
        },
    )
}

fn toggle_violation(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let raw = get_required_str(params, "kind")?;
    let kind = ViolationKind::parse(&raw)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown violation kind: {}", raw)))?;
    dispatch_one(state, DraftAction::ToggleViolation { student_id, kind })
}

fn set_note(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let text = params
        .get("note")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params("missing note"))?;
    dispatch_one(state, DraftAction::SetNote { student_id, text })
}

fn toggle_selected(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    dispatch_one(state, DraftAction::ToggleSelected { student_id })
}

fn apply_bulk_status(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let action = DraftAction::ApplyBulkStatus {
        status: get_status(params, "status")?,
        at: get_at(params)?.with_timezone(&Utc),
    };
    dispatch_all(state, action)
}

fn attendance_save(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let AppState {
        db, http, session, ..
    } = state;
    let session = require_session(session.as_mut())?;
    let backend = backend(db.as_ref(), http.as_ref())?;
    let report = save(session, backend.as_ref())?;
    Ok(json!({
        "saved": report.saved,
        "accepted": report.accepted,
        "dirtyCount": session.dirty_count()
    }))
}

fn attendance_close(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let discarded = state
        .session
        .take()
        .map(|s| s.dirty_count())
        .unwrap_or(0);
    if discarded > 0 {
        tracing::warn!(discarded, "attendance session closed with unsaved changes");
    }
    Ok(json!({ "discardedUnsaved": discarded }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let p = &req.params;
    let result = match req.method.as_str() {
        "attendance.open" => attendance_open(state, p),
        "attendance.state" => attendance_state(state),
        "attendance.setStatus" => set_status(state, p),
        "attendance.setAttributes" => set_attributes(state, p),
        "attendance.toggleViolation" => toggle_violation(state, p),
        "attendance.setNote" => set_note(state, p),
        "attendance.toggleSelected" => toggle_selected(state, p),
        "attendance.toggleSelectAll" => dispatch_all(state, DraftAction::ToggleSelectAll),
        "attendance.applyBulkStatus" => apply_bulk_status(state, p),
        "attendance.save" => attendance_save(state),
        "attendance.close" => attendance_close(state),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
