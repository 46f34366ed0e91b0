use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

/// Errors produced by the payables core.
#[derive(Debug, Error)]
pub enum PayablesError {
    /// A field failed validation. Never silently coerced.
    #[error("Validation error on `{field}`: {message}")]
    Validation { field: String, message: String },

    /// The target is absent from the caller's tenant scope.
    ///
    /// Records owned by another tenant surface as this variant as well.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    /// Recurrence expansion stopped after `created` of `requested` siblings
    /// were persisted. The persisted siblings are not rolled back.
    #[error("Recurrence expansion failed after {created} of {requested} bills: {source}")]
    PartialBatch {
        created: usize,
        requested: usize,
        created_ids: Vec<Uuid>,
        #[source]
        source: Box<PayablesError>,
    },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl PayablesError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        PayablesError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        PayablesError::NotFound { entity, id }
    }
}

pub type Result<T, E = PayablesError> = std::result::Result<T, E>;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    requested: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_ids: Option<Vec<Uuid>>,
}

impl ErrorBody {
    fn message(error: String) -> Self {
        Self {
            error,
            field: None,
            created: None,
            requested: None,
            created_ids: None,
        }
    }
}

impl IntoResponse for PayablesError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            PayablesError::Validation { field, message } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorBody {
                    field: Some(field),
                    ..ErrorBody::message(message)
                },
            ),
            PayablesError::NotFound { .. } => {
                (StatusCode::NOT_FOUND, ErrorBody::message(self.to_string()))
            }
            PayablesError::PartialBatch {
                created,
                requested,
                created_ids,
                source,
            } => {
                error!("Recurrence expansion aborted: {}", source);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        created: Some(created),
                        requested: Some(requested),
                        created_ids: Some(created_ids),
                        ..ErrorBody::message("Recurrence expansion incomplete".to_string())
                    },
                )
            }
            PayablesError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ErrorBody::message("Unauthorized".to_string()),
            ),
            PayablesError::Config(_) | PayablesError::Database(_) => {
                error!("Internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::message("Internal server error".to_string()),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_maps_to_422() {
        let response = PayablesError::validation("amount_paid", "must not be negative").into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let response = PayablesError::not_found("Bill", Uuid::new_v4()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_partial_batch_reports_counts_in_message() {
        let err = PayablesError::PartialBatch {
            created: 2,
            requested: 5,
            created_ids: vec![Uuid::new_v4(), Uuid::new_v4()],
            source: Box::new(PayablesError::Config("boom".to_string())),
        };
        assert!(err.to_string().contains("after 2 of 5 bills"));
    }
}
