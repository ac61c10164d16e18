use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::{
    repository::{RepositoryError, UniqueField},
    validation::camel_case,
};

/// FieldError
///
/// A single rejected input field, reported back inside the `errors` array of a
/// validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// ApiError
///
/// The single error type of the HTTP layer. Every handler and extractor returns
/// it, and it renders itself as the `{"status":"error", ...}` envelope.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation failed on {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// ErrorResponse
///
/// Wire shape of every error returned by the API.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    /// Underlying cause of a 500. Only filled in debug builds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            errors: None,
            details: None,
        }
    }

    fn server_error(cause: String) -> Self {
        Self {
            details: cfg!(debug_assertions).then_some(cause),
            ..Self::new("Error interno del servidor")
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Conflict(UniqueField::Email) => {
                Self::bad_request("El email ya está registrado")
            }
            RepositoryError::Conflict(UniqueField::Rut) => {
                Self::bad_request("El RUT ya está registrado")
            }
            RepositoryError::Conflict(UniqueField::Sku) => Self::bad_request("El SKU ya está en uso"),
            RepositoryError::Database(e) => Self::Database(e),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let field = camel_case(&field);
                errs.iter().map(move |err| FieldError {
                    field: field.clone(),
                    message: err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| err.code.to_string()),
                })
            })
            .collect();
        // HashMap iteration order is random; keep responses deterministic.
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        Self::Validation(fields)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match self {
            Self::Validation(fields) => {
                tracing::debug!(?fields, "request rejected by validation");
                ErrorResponse {
                    errors: Some(fields),
                    ..ErrorResponse::new("Errores de validación")
                }
            }
            Self::Database(e) => {
                tracing::error!(error = ?e, "database error");
                ErrorResponse::server_error(e.to_string())
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                ErrorResponse::server_error(msg)
            }
            Self::BadRequest(message)
            | Self::Unauthorized(message)
            | Self::Forbidden(message)
            | Self::NotFound(message) => ErrorResponse::new(message),
        };

        (status, Json(body)).into_response()
    }
}
