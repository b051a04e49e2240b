use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::helpers::{get_at, get_required_str, require_session};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn scan_token(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let token = get_required_str(params, "token")?;
    let at = get_at(params)?;
    let session = require_session(state.session.as_mut())?;
    let outcome = session.scan(&token, at);
    let mut result = serde_json::to_value(&outcome)?;
    result["dirtyCount"] = json!(session.dirty_count());
    Ok(result)
}

fn camera_error(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let message = get_required_str(params, "message")?;
    let session = require_session(state.session.as_mut())?;
    Ok(serde_json::to_value(session.camera_error(&message))?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "scan.token" => scan_token(state, &req.params),
        "scan.cameraError" => camera_error(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
