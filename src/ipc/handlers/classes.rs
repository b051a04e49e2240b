use crate::attendance::scan::parse_cutoff;
use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_str, require_db};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn get_start_time(params: &serde_json::Value) -> Result<Option<String>, HandlerErr> {
    let Some(raw) = get_optional_str(params, "startTime") else {
        return Ok(None);
    };
    let t = parse_cutoff(&raw)
        .ok_or_else(|| HandlerErr::bad_params("startTime must be HH:MM"))?;
    Ok(Some(t.format("%H:%M").to_string()))
}

fn classes_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?.trim().to_string();
    if name.is_empty() {
        return Err(HandlerErr::bad_params("name must not be empty"));
    }
    let start_time = get_start_time(params)?.unwrap_or_else(|| "08:00".to_string());
    let class_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO classes(id, name, start_time) VALUES(?, ?, ?)",
        (&class_id, &name, &start_time),
    )
    .map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "classes" })),
    })?;
    tracing::info!(%class_id, %name, "class created");
    Ok(json!({ "classId": class_id }))
}

fn classes_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.name, c.start_time,
                (SELECT COUNT(*) FROM students s WHERE s.class_id = c.id AND s.active = 1)
         FROM classes c
         ORDER BY c.name",
    )?;
    let classes = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
                "startTime": r.get::<_, String>(2)?,
                "studentCount": r.get::<_, i64>(3)?
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "classes": classes }))
}

fn classes_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let name = get_optional_str(params, "name");
    let start_time = get_start_time(params)?;
    if name.is_none() && start_time.is_none() {
        return Err(HandlerErr::bad_params("nothing to update"));
    }
    let n = conn.execute(
        "UPDATE classes
         SET name = COALESCE(?, name), start_time = COALESCE(?, start_time)
         WHERE id = ?",
        (&name, &start_time, &class_id),
    )?;
    if n == 0 {
        return Err(HandlerErr::new("not_found", "class not found"));
    }
    Ok(json!({ "ok": true }))
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    reply(
        &req.id,
        require_db(state.db.as_ref()).and_then(|conn| classes_create(conn, &req.params)),
    )
}

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    reply(&req.id, require_db(state.db.as_ref()).and_then(classes_list))
}

fn handle_classes_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    reply(
        &req.id,
        require_db(state.db.as_ref()).and_then(|conn| classes_update(conn, &req.params)),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.create" => Some(handle_classes_create(state, req)),
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.update" => Some(handle_classes_update(state, req)),
        _ => None,
    }
}
