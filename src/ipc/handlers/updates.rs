use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::helpers::get_optional_str;
use crate::ipc::types::{AppState, Request};
use crate::update::{fetch_remote_version, VersionCheck};
use serde_json::json;
use std::time::Duration;

const VERSION_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// The client calls this on its poll timer, passing the version it read itself or letting the
/// daemon fetch the configured version endpoint.
fn update_check(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let version = match get_optional_str(params, "version") {
        Some(v) => v,
        None => {
            let Some(url) = state.config.version_url.as_deref() else {
                return Err(HandlerErr::bad_params(
                    "missing version and no version endpoint is configured",
                ));
            };
            fetch_remote_version(url, VERSION_FETCH_TIMEOUT)?
        }
    };
    let check = state.versions.observe(&version);
    let reload = matches!(check, VersionCheck::Changed { .. });
    let mut result = serde_json::to_value(&check)?;
    result["reloadRequired"] = json!(reload);
    result["pollIntervalSecs"] = json!(state.versions.poll_interval().as_secs());
    Ok(result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "update.check" => Some(reply(&req.id, update_check(state, &req.params))),
        _ => None,
    }
}
