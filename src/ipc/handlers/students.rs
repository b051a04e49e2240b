use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_str, require_db};
use crate::ipc::types::{AppState, Request};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn write_failed(e: rusqlite::Error) -> HandlerErr {
    if let rusqlite::Error::SqliteFailure(f, _) = &e {
        if f.code == rusqlite::ErrorCode::ConstraintViolation {
            return HandlerErr {
                code: "conflict",
                message: "scanCode is already used by another student in this class".to_string(),
                details: None,
            };
        }
    }
    HandlerErr {
        code: "db_update_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "students" })),
    }
}

fn class_exists(conn: &Connection, class_id: &str) -> Result<bool, HandlerErr> {
    Ok(conn
        .query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some())
}

fn students_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let last_name = get_required_str(params, "lastName")?.trim().to_string();
    let first_name = get_required_str(params, "firstName")?.trim().to_string();
    if last_name.is_empty() || first_name.is_empty() {
        return Err(HandlerErr::bad_params("firstName/lastName must not be empty"));
    }
    let scan_code = get_optional_str(params, "scanCode");
    if !class_exists(conn, &class_id)? {
        return Err(HandlerErr::new("not_found", "class not found"));
    }

    let sort_order: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM students WHERE class_id = ?",
        [&class_id],
        |r| r.get(0),
    )?;
    let student_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, class_id, last_name, first_name, scan_code, active, sort_order, updated_at)
         VALUES(?, ?, ?, ?, ?, 1, ?, ?)",
        (
            &student_id,
            &class_id,
            &last_name,
            &first_name,
            &scan_code,
            sort_order,
            Utc::now().to_rfc3339(),
        ),
    )
    .map_err(write_failed)?;
    Ok(json!({ "studentId": student_id }))
}

fn students_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let include_inactive = params
        .get("includeInactive")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if !class_exists(conn, &class_id)? {
        return Err(HandlerErr::new("not_found", "class not found"));
    }
    let mut stmt = conn.prepare(
        "SELECT id, last_name, first_name, scan_code, active, sort_order
         FROM students
         WHERE class_id = ? AND (active = 1 OR ?)
         ORDER BY sort_order",
    )?;
    let students = stmt
        .query_map((&class_id, include_inactive), |r| {
            let last: String = r.get(1)?;
            let first: String = r.get(2)?;
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "lastName": last,
                "firstName": first,
                "displayName": format!("{}, {}", last, first),
                "scanCode": r.get::<_, Option<String>>(3)?,
                "active": r.get::<_, i64>(4)? != 0,
                "sortOrder": r.get::<_, i64>(5)?
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "students": students }))
}

fn students_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let exists = conn
        .query_row("SELECT 1 FROM students WHERE id = ?", [&student_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some();
    if !exists {
        return Err(HandlerErr::new("not_found", "student not found"));
    }

    let tx = conn.unchecked_transaction()?;
    if let Some(v) = get_optional_str(params, "lastName") {
        tx.execute("UPDATE students SET last_name = ? WHERE id = ?", (&v, &student_id))
            .map_err(write_failed)?;
    }
    if let Some(v) = get_optional_str(params, "firstName") {
        tx.execute("UPDATE students SET first_name = ? WHERE id = ?", (&v, &student_id))
            .map_err(write_failed)?;
    }
    // scanCode: string sets it, null or "" clears it, absent leaves it alone.
    if let Some(v) = params.get("scanCode") {
        let code = v.as_str().map(str::trim).filter(|s| !s.is_empty());
        tx.execute("UPDATE students SET scan_code = ? WHERE id = ?", (code, &student_id))
            .map_err(write_failed)?;
    }
    if let Some(active) = params.get("active").and_then(|v| v.as_bool()) {
        tx.execute(
            "UPDATE students SET active = ? WHERE id = ?",
            (active as i64, &student_id),
        )
        .map_err(write_failed)?;
    }
    tx.execute(
        "UPDATE students SET updated_at = ? WHERE id = ?",
        (Utc::now().to_rfc3339(), &student_id),
    )
    .map_err(write_failed)?;
    tx.commit()?;
    Ok(json!({ "ok": true }))
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    reply(
        &req.id,
        require_db(state.db.as_ref()).and_then(|conn| students_create(conn, &req.params)),
    )
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    reply(
        &req.id,
        require_db(state.db.as_ref()).and_then(|conn| students_list(conn, &req.params)),
    )
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    reply(
        &req.id,
        require_db(state.db.as_ref()).and_then(|conn| students_update(conn, &req.params)),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.create" => Some(handle_students_create(state, req)),
        "students.list" => Some(handle_students_list(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        _ => None,
    }
}
