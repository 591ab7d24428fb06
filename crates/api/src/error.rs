use axum::{
    Json,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::QueryRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid file format. Support JPEG, PNG, BMP, WEBP.")]
    UnsupportedMediaType { content_type: Option<String> },

    #[error("Missing multipart field `{0}`")]
    MissingField(&'static str),

    #[error("Malformed multipart body")]
    Multipart(#[from] MultipartError),

    #[error("Expected a multipart/form-data body")]
    NotMultipart(#[from] MultipartRejection),

    #[error("Invalid query string")]
    Query(#[from] QueryRejection),

    #[error("Configuration not loaded")]
    NotLoaded,

    #[error("Config not loaded properly")]
    ConfigIncomplete,

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    detail: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnsupportedMediaType { .. } => StatusCode::BAD_REQUEST,
            ApiError::Multipart(e) => e.status(),
            ApiError::NotMultipart(rejection) => rejection.status(),
            ApiError::Query(rejection) => rejection.status(),
            ApiError::MissingField(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotLoaded | ApiError::ConfigIncomplete | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn detail(&self) -> String {
        match self {
            ApiError::UnsupportedMediaType { content_type } => format!(
                "received content type {}",
                content_type.as_deref().unwrap_or("<none>")
            ),
            ApiError::Multipart(e) => e.body_text(),
            ApiError::NotMultipart(rejection) => rejection.body_text(),
            ApiError::Query(rejection) => rejection.body_text(),
            ApiError::Internal(e) => format!("{e:#}"),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, detail = %self.detail(), "Request failed");
        } else {
            tracing::warn!(error = %self, "Request rejected");
        }

        let body = ErrorBody {
            error: self.to_string(),
            detail: self.detail(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        let unsupported = ApiError::UnsupportedMediaType {
            content_type: Some("text/plain".to_string()),
        };
        assert_eq!(unsupported.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::MissingField("file").status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(ApiError::NotLoaded.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ApiError::ConfigIncomplete.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_error_keeps_cause_in_detail() {
        let err = ApiError::from(anyhow::anyhow!("decode failed").context("reading upload"));

        assert_eq!(err.to_string(), "Internal server error");
        assert_eq!(err.detail(), "reading upload: decode failed");
    }
}
