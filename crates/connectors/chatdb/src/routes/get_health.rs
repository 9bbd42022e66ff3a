use axum::Json;
use serde_json::{json, Value};

/// Process liveness. Touches no database.
pub async fn get_health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}
