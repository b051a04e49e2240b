use crate::attendance::{DraftError, SaveError};
use crate::backend::BackendError;
use crate::content::ContentError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

pub fn reply(id: &str, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(result) => ok(id, result),
        Err(error) => error.response(id),
    }
}

impl From<rusqlite::Error> for HandlerErr {
    fn from(e: rusqlite::Error) -> Self {
        HandlerErr::new("db_query_failed", e.to_string())
    }
}

impl From<DraftError> for HandlerErr {
    fn from(e: DraftError) -> Self {
        HandlerErr::new(e.code(), e.to_string())
    }
}

impl From<BackendError> for HandlerErr {
    fn from(e: BackendError) -> Self {
        let details = match &e {
            BackendError::Http { status, .. } => Some(json!({ "status": status })),
            _ => None,
        };
        HandlerErr {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

impl From<SaveError> for HandlerErr {
    fn from(e: SaveError) -> Self {
        let details = match &e {
            SaveError::MissingNote { student_ids } => Some(json!({ "studentIds": student_ids })),
            SaveError::Network(BackendError::Http { status, .. }) => {
                Some(json!({ "status": status }))
            }
            _ => None,
        };
        HandlerErr {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

impl From<serde_json::Error> for HandlerErr {
    fn from(e: serde_json::Error) -> Self {
        HandlerErr::new("internal", format!("could not encode result: {}", e))
    }
}

impl From<ContentError> for HandlerErr {
    fn from(e: ContentError) -> Self {
        HandlerErr::new(e.code(), e.to_string())
    }
}
