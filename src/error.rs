use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Query failed while trying to {context}: {source}")]
    DataSource {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Stored data is malformed: {0}")]
    MalformedData(String),
}

impl AppError {
    pub fn data_source(context: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| AppError::DataSource { context, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedPayload(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DataSource { .. } | AppError::MalformedData(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn return_code(&self) -> &'static str {
        match self {
            AppError::MalformedPayload(_) => "INVALID_REQUEST",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::DataSource { .. } | AppError::MalformedData(_) => "SERVER_ERROR",
        }
    }

    /// Renders the error body. Server-side failures are logged under a fresh
    /// reference and only that reference leaves the process unless `expose`.
    pub fn into_response_with(self, expose: bool) -> Response {
        let status = self.status();
        let return_code = self.return_code();

        let body = if status.is_server_error() {
            let error_id = Uuid::new_v4();
            error!(%error_id, error = %self, "Request failed");

            let message = if expose {
                self.to_string()
            } else {
                "Internal server error".to_string()
            };
            json!({ "return_code": return_code, "message": message, "error_id": error_id })
        } else {
            warn!(return_code, error = %self, "Request rejected");
            json!({ "return_code": return_code, "message": self.to_string() })
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::MalformedPayload(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.into_response_with(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_error_kind() {
        let validation = AppError::Validation("group_id is required".into());
        assert_eq!(validation.status(), StatusCode::BAD_REQUEST);
        assert_eq!(validation.return_code(), "VALIDATION_ERROR");

        let missing = AppError::NotFound("no product".into());
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.return_code(), "NOT_FOUND");

        let failed = AppError::data_source("load brands")(sqlx::Error::RowNotFound);
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failed.return_code(), "SERVER_ERROR");
        assert!(failed.to_string().contains("load brands"));
    }
}
