use super::{AttendanceBackend, BackendError, RosterStudent, SessionRoster};
use crate::attendance::record::{AttendanceRecord, AttendanceStatus};
use crate::attendance::scan::parse_cutoff;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension};

/// Workspace-local attendance store, used when no REST base URL is configured.
pub struct SqliteBackend<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteBackend<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn list_students(&self, class_id: &str) -> Result<Vec<RosterStudent>, BackendError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, last_name, first_name, scan_code
             FROM students
             WHERE class_id = ? AND active = 1
             ORDER BY sort_order",
        )?;
        let students = stmt
            .query_map([class_id], |r| {
                let last: String = r.get(1)?;
                let first: String = r.get(2)?;
                Ok(RosterStudent {
                    id: r.get(0)?,
                    display_name: format!("{}, {}", last, first),
                    scan_code: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(students)
    }

    fn list_records(
        &self,
        class_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, BackendError> {
        let mut stmt = self.conn.prepare(
            "SELECT student_id, status, attributes, violations, teachers_note, updated_at
             FROM attendance_records
             WHERE class_id = ? AND session_date = ?",
        )?;
        let rows = stmt
            .query_map((class_id, date.to_string()), |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, Option<String>>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut out = Vec::with_capacity(rows.len());
        for (student_id, status, attributes, violations, note, updated_at) in rows {
            let status = AttendanceStatus::parse(&status)
                .ok_or_else(|| BackendError::Decode(format!("unknown status {:?}", status)))?;
            out.push(AttendanceRecord {
                student_id,
                status,
                attributes: serde_json::from_str(&attributes)
                    .map_err(|e| BackendError::Decode(e.to_string()))?,
                violations: serde_json::from_str(&violations)
                    .map_err(|e| BackendError::Decode(e.to_string()))?,
                teachers_note: note,
                timestamp: updated_at
                    .as_deref()
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|t| t.with_timezone(&Utc)),
                is_selected: false,
            });
        }
        Ok(out)
    }
}

impl AttendanceBackend for SqliteBackend<'_> {
    fn open_session(&self, class_id: &str, date: NaiveDate) -> Result<SessionRoster, BackendError> {
        let start_time: Option<String> = self
            .conn
            .query_row(
                "SELECT start_time FROM classes WHERE id = ?",
                [class_id],
                |r| r.get(0),
            )
            .optional()?;
        let Some(start_time) = start_time else {
            return Err(BackendError::NotFound("class".to_string()));
        };
        let start_time = parse_cutoff(&start_time)
            .ok_or_else(|| BackendError::Decode(format!("bad start_time {:?}", start_time)))?;

        Ok(SessionRoster {
            class_id: class_id.to_string(),
            date,
            start_time,
            students: self.list_students(class_id)?,
            records: self.list_records(class_id, date)?,
        })
    }

    fn patch_attendances(
        &self,
        class_id: &str,
        date: NaiveDate,
        updates: &[AttendanceRecord],
    ) -> Result<usize, BackendError> {
        let tx = self.conn.unchecked_transaction()?;
        let session_date = date.to_string();
        for r in updates {
            let attributes = serde_json::to_string(&r.attributes)
                .map_err(|e| BackendError::Decode(e.to_string()))?;
            let violations = serde_json::to_string(&r.violations)
                .map_err(|e| BackendError::Decode(e.to_string()))?;
            tx.execute(
                "INSERT INTO attendance_records(
                    class_id, session_date, student_id, status, attributes, violations,
                    teachers_note, updated_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(class_id, session_date, student_id) DO UPDATE SET
                   status = excluded.status,
                   attributes = excluded.attributes,
                   violations = excluded.violations,
                   teachers_note = excluded.teachers_note,
                   updated_at = excluded.updated_at",
                (
                    class_id,
                    &session_date,
                    &r.student_id,
                    r.status.as_str(),
                    &attributes,
                    &violations,
                    &r.teachers_note,
                    r.timestamp.map(|t| t.to_rfc3339()),
                ),
            )?;
        }
        tx.commit()?;
        Ok(updates.len())
    }

    fn describe(&self) -> &'static str {
        "workspace"
    }
}
