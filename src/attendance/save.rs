use super::record::AttendanceStatus;
use super::session::AttendanceSession;
use crate::backend::{AttendanceBackend, BackendError};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("a teacher's note is required for excused-permission: {}", .student_ids.join(", "))]
    MissingNote { student_ids: Vec<String> },
    #[error("a save is already in progress")]
    InFlight,
    #[error(transparent)]
    Network(#[from] BackendError),
}

impl SaveError {
    pub fn code(&self) -> &'static str {
        match self {
            SaveError::MissingNote { .. } => "validation_failed",
            SaveError::InFlight => "save_in_flight",
            SaveError::Network(_) => "network_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReport {
    pub saved: usize,
    pub accepted: usize,
}

/// Persists every dirty record in one backend call. Validation failures and backend errors
/// leave the draft and its dirty set exactly as they were.
pub fn save(
    session: &mut AttendanceSession,
    backend: &dyn AttendanceBackend,
) -> Result<SaveReport, SaveError> {
    let updates = session.dirty_records();
    if updates.is_empty() {
        return Ok(SaveReport {
            saved: 0,
            accepted: 0,
        });
    }

    let missing: Vec<String> = updates
        .iter()
        .filter(|r| r.status == AttendanceStatus::ExcusedPermission && r.has_blank_note())
        .map(|r| r.student_id.clone())
        .collect();
    if !missing.is_empty() {
        return Err(SaveError::MissingNote {
            student_ids: missing,
        });
    }

    // Requests are serial today; the gate holds once a save can outlive its request.
    if !session.begin_save() {
        return Err(SaveError::InFlight);
    }
    let result = backend.patch_attendances(session.class_id(), session.date(), &updates);
    session.end_save();

    match result {
        Ok(accepted) => {
            session.commit(&updates);
            tracing::info!(
                class_id = session.class_id(),
                date = %session.date(),
                saved = updates.len(),
                backend = backend.describe(),
                "attendance saved"
            );
            Ok(SaveReport {
                saved: updates.len(),
                accepted,
            })
        }
        Err(e) => {
            tracing::warn!(error = %e, dirty = session.dirty_count(), "attendance save failed");
            Err(SaveError::Network(e))
        }
    }
}
