use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::models::BookingStatus;

/// Field name to the list of messages describing what is wrong with it.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("validation failed")]
    Validation(FieldErrors),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("cannot {action} a booking that is {current}")]
    InvalidTransition {
        action: &'static str,
        current: BookingStatus,
    },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    DependencyUnavailable(String),

    #[error("insufficient balance")]
    InsufficientBalance { available: f64, requested: f64 },

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a validation failure on a single field.
    pub fn field(name: &str, message: impl Into<String>) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(name.to_string(), vec![message.into()]);
        AppError::Validation(fields)
    }

    pub fn booking_not_found() -> Self {
        AppError::NotFound("booking not found".to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_)
            | AppError::DependencyUnavailable(_)
            | AppError::InsufficientBalance { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidTransition { .. } | AppError::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                (to_camel_case(field), messages)
            })
            .collect();
        AppError::Validation(fields)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::field("body", rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "database failure");
                serde_json::json!({ "error": "internal server error" })
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal failure");
                serde_json::json!({ "error": "internal server error" })
            }
            AppError::Validation(fields) => {
                serde_json::json!({ "error": self.to_string(), "fields": fields })
            }
            AppError::InvalidTransition { current, .. } => {
                serde_json::json!({ "error": self.to_string(), "currentStatus": current })
            }
            AppError::InsufficientBalance {
                available,
                requested,
            } => serde_json::json!({
                "error": self.to_string(),
                "availableBalance": available,
                "requestedAmount": requested,
            }),
            _ => serde_json::json!({ "error": self.to_string() }),
        };

        (status, axum::Json(body)).into_response()
    }
}

// Request DTOs are camelCase on the wire while validator reports Rust field names.
fn to_camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case_field_names() {
        assert_eq!(to_camel_case("duration_value"), "durationValue");
        assert_eq!(to_camel_case("rating"), "rating");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::booking_not_found().status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::InvalidTransition {
                action: "start",
                current: BookingStatus::Pending
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::field("amount", "bad").status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_transition_message_names_current_status() {
        let err = AppError::InvalidTransition {
            action: "start",
            current: BookingStatus::Pending,
        };
        assert_eq!(err.to_string(), "cannot start a booking that is pending");
    }
}
