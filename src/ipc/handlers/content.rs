use crate::content::{self, ContentCollection};
use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::helpers::{get_required_str, require_db};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Map, Value};

fn get_collection(params: &Value) -> Result<ContentCollection, HandlerErr> {
    let raw = get_required_str(params, "collection")?;
    ContentCollection::parse(&raw)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown collection: {}", raw)))
}

fn get_object(params: &Value, key: &str) -> Result<Map<String, Value>, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_object())
        .cloned()
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an object", key)))
}

fn content_list(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let collection = get_collection(params)?;
    let listing = content::list(state.db.as_ref(), collection);
    Ok(json!({
        "collection": collection,
        "source": listing.source,
        "items": listing.items
    }))
}

fn content_create(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let collection = get_collection(params)?;
    let item = get_object(params, "item")?;
    let conn = require_db(state.db.as_ref())?;
    Ok(json!({ "item": content::create(conn, collection, item)? }))
}

fn content_update(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let collection = get_collection(params)?;
    let id = get_required_str(params, "id")?;
    let fields = get_object(params, "fields")?;
    let conn = require_db(state.db.as_ref())?;
    Ok(json!({ "item": content::update(conn, collection, &id, fields)? }))
}

fn content_delete(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let collection = get_collection(params)?;
    let id = get_required_str(params, "id")?;
    let conn = require_db(state.db.as_ref())?;
    content::delete(conn, collection, &id)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "content.list" => content_list(state, &req.params),
        "content.create" => content_create(state, &req.params),
        "content.update" => content_update(state, &req.params),
        "content.delete" => content_delete(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
