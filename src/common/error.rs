// src/common/error.rs

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::collections::BTreeMap;
use validator::{ValidationErrors, ValidationErrorsKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation failed")]
    ValidationError(#[from] validator::ValidationErrors),

    // Malformed input outside the derive validators (bodies, dates, line items)
    #[error("{0}")]
    InvalidInput(String),

    // Workflow transition not allowed from the current status
    #[error("{0}")]
    StateConflict(String),

    #[error("Subscription is already active")]
    AlreadyActive,

    #[error("{0}")]
    InvalidState(String),

    // Absent or owned by another tenant. Both look the same to the caller.
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Invalid or missing authentication token")]
    InvalidToken,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::InvalidInput(_)
            | AppError::StateConflict(_)
            | AppError::AlreadyActive
            | AppError::InvalidState(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::JwtError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        AppError::InvalidInput(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match self {
            // Every offending field is echoed back with its messages
            AppError::ValidationError(errors) => {
                let mut details = BTreeMap::new();
                collect_field_errors("", &errors, &mut details);
                let fields: Vec<&str> = details.keys().map(String::as_str).collect();
                json!({
                    "error": format!("Invalid field(s): {}", fields.join(", ")),
                    "details": details,
                })
            }
            e if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!("Internal server error: {}", e);
                json!({ "error": "An unexpected error occurred." })
            }
            e => json!({ "error": e.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

// Flattens nested errors into paths such as `items[0].physical_stock`.
fn collect_field_errors(prefix: &str, errors: &ValidationErrors, out: &mut BTreeMap<String, Vec<String>>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                let messages = field_errors
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                out.insert(path, messages);
            }
            ValidationErrorsKind::Struct(inner) => collect_field_errors(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_field_errors(&format!("{}[{}]", path, index), inner, out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn taxonomy_maps_to_http_status() {
        assert_eq!(AppError::invalid("quantity").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::StateConflict("not pending".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::AlreadyActive.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::not_found("Transfer").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Forbidden("disabled".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AppError::InvalidToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::InternalServerError(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[derive(Validate)]
    struct Count {
        #[validate(range(min = 0))]
        physical_stock: i32,
    }

    #[derive(Validate)]
    struct Counts {
        #[validate(nested)]
        items: Vec<Count>,
    }

    #[test]
    fn nested_validation_errors_keep_their_path() {
        let counts = Counts {
            items: vec![Count { physical_stock: 4 }, Count { physical_stock: -1 }],
        };
        let errors = counts.validate().unwrap_err();

        let mut details = BTreeMap::new();
        collect_field_errors("", &errors, &mut details);
        assert_eq!(details.keys().collect::<Vec<_>>(), vec!["items[1].physical_stock"]);
    }

    #[test]
    fn not_found_message_names_the_entity() {
        assert_eq!(AppError::not_found("Purchase order").to_string(), "Purchase order not found");
    }
}
