// src/common/response.rs

use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::common::{error::AppError, extract::Json};

/// `{"success": true, "data": ...}`
pub fn success<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

/// Comma separated ids from a query string, e.g. `productIds=a,b`.
pub fn parse_uuid_list(raw: &str, field: &str) -> Result<Vec<Uuid>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|_| AppError::invalid(format!("{} contains an invalid id: {}", field, s)))
        })
        .collect()
}
