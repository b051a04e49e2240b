use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use uuid::Uuid;

const SNAPSHOT_JSON: &str = include_str!("../assets/content_snapshot.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentCollection {
    Features,
    Releases,
    Announcements,
    Faqs,
}

impl ContentCollection {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "features" => Some(ContentCollection::Features),
            "releases" => Some(ContentCollection::Releases),
            "announcements" => Some(ContentCollection::Announcements),
            "faqs" => Some(ContentCollection::Faqs),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentCollection::Features => "features",
            ContentCollection::Releases => "releases",
            ContentCollection::Announcements => "announcements",
            ContentCollection::Faqs => "faqs",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentSource {
    Store,
    Snapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentListing {
    pub source: ContentSource,
    pub items: Vec<Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("{collection} item {id} not found")]
    NotFound { collection: &'static str, id: String },
    #[error("{collection} item {id} already exists")]
    Conflict { collection: &'static str, id: String },
    #[error("item id must be a non-empty string")]
    BadId,
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("stored item is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl ContentError {
    pub fn code(&self) -> &'static str {
        match self {
            ContentError::NotFound { .. } => "not_found",
            ContentError::Conflict { .. } => "conflict",
            ContentError::BadId => "bad_params",
            ContentError::Database(_) | ContentError::Corrupt(_) => "db_query_failed",
        }
    }
}

fn snapshot() -> &'static Map<String, Value> {
    static SNAPSHOT: OnceLock<Map<String, Value>> = OnceLock::new();
    SNAPSHOT.get_or_init(|| match serde_json::from_str::<Value>(SNAPSHOT_JSON) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            tracing::warn!("bundled content snapshot is unreadable; serving empty lists");
            Map::new()
        }
    })
}

pub fn snapshot_items(collection: ContentCollection) -> Vec<Value> {
    snapshot()
        .get(collection.as_str())
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

fn stored_items(conn: &Connection, collection: ContentCollection) -> Result<Vec<Value>, ContentError> {
    let mut stmt =
        conn.prepare("SELECT body FROM content_items WHERE collection = ? ORDER BY rowid")?;
    let bodies = stmt
        .query_map([collection.as_str()], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    bodies
        .iter()
        .map(|b| serde_json::from_str(b).map_err(ContentError::from))
        .collect()
}

/// Lists a collection from the workspace, falling back to the bundled snapshot when there is
/// no workspace, the read fails or the collection has never been written.
pub fn list(conn: Option<&Connection>, collection: ContentCollection) -> ContentListing {
    let stored = match conn {
        Some(conn) => match stored_items(conn, collection) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(collection = collection.as_str(), error = %e, "content read failed");
                Vec::new()
            }
        },
        None => Vec::new(),
    };
    if stored.is_empty() {
        return ContentListing {
            source: ContentSource::Snapshot,
            items: snapshot_items(collection),
        };
    }
    ContentListing {
        source: ContentSource::Store,
        items: stored,
    }
}

fn load(
    conn: &Connection,
    collection: ContentCollection,
    id: &str,
) -> Result<Option<Map<String, Value>>, ContentError> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM content_items WHERE collection = ? AND id = ?",
            (collection.as_str(), id),
            |r| r.get(0),
        )
        .optional()?;
    match body {
        Some(b) => Ok(Some(serde_json::from_str(&b)?)),
        None => Ok(None),
    }
}

fn write(
    conn: &Connection,
    collection: ContentCollection,
    id: &str,
    item: &Map<String, Value>,
) -> Result<(), ContentError> {
    let body = serde_json::to_string(item)?;
    conn.execute(
        "INSERT INTO content_items(collection, id, body, updated_at)
         VALUES(?, ?, ?, ?)
         ON CONFLICT(collection, id) DO UPDATE SET
           body = excluded.body,
           updated_at = excluded.updated_at",
        (collection.as_str(), id, &body, Utc::now().to_rfc3339()),
    )?;
    Ok(())
}

pub fn create(
    conn: &Connection,
    collection: ContentCollection,
    mut item: Map<String, Value>,
) -> Result<Value, ContentError> {
    let id = match item.get("id") {
        None | Some(Value::Null) => Uuid::new_v4().to_string(),
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(_) => return Err(ContentError::BadId),
    };
    if load(conn, collection, &id)?.is_some() {
        return Err(ContentError::Conflict {
            collection: collection.as_str(),
            id,
        });
    }
    item.insert("id".to_string(), Value::String(id.clone()));
    write(conn, collection, &id, &item)?;
    tracing::info!(collection = collection.as_str(), %id, "content item created");
    Ok(Value::Object(item))
}

/// Shallow merge: top-level keys in `fields` replace the stored ones; `id` cannot change.
pub fn update(
    conn: &Connection,
    collection: ContentCollection,
    id: &str,
    fields: Map<String, Value>,
) -> Result<Value, ContentError> {
    let Some(mut item) = load(conn, collection, id)? else {
        return Err(ContentError::NotFound {
            collection: collection.as_str(),
            id: id.to_string(),
        });
    };
    for (k, v) in fields {
        if k != "id" {
            item.insert(k, v);
        }
    }
    write(conn, collection, id, &item)?;
    Ok(Value::Object(item))
}

pub fn delete(conn: &Connection, collection: ContentCollection, id: &str) -> Result<(), ContentError> {
    let n = conn.execute(
        "DELETE FROM content_items WHERE collection = ? AND id = ?",
        (collection.as_str(), id),
    )?;
    if n == 0 {
        return Err(ContentError::NotFound {
            collection: collection.as_str(),
            id: id.to_string(),
        });
    }
    Ok(())
}
