//! Wire format helpers. Every success response is
//! `{"success": true, "data": ...}`; errors carry
//! `{"success": false, "error", "code"}` via `ApiError`.

use axum::response::Json;
use serde::Serialize;
use serde_json::{json, Value};

pub fn success<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

pub fn success_message(message: impl Into<String>) -> Json<Value> {
    Json(json!({ "success": true, "message": message.into() }))
}
