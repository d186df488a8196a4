use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Request-level error taxonomy. Every variant is recoverable at the request
/// boundary and maps to a structured JSON response.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation { field: &'static str, message: String },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Требуется аутентификация")]
    AuthenticationRequired,

    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("export error: {0}")]
    Export(#[from] rust_xlsxwriter::XlsxError),
}

impl ApiError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ApiError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn task_not_found() -> Self {
        ApiError::NotFound("Задача не найдена или не принадлежит пользователю".to_string())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            ApiError::Database(_) | ApiError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ApiError::Validation { field, message } => {
                json!({ "field": field, "detail": message })
            }
            // Do not leak driver internals to the client.
            ApiError::Database(e) => {
                log::error!("Database error: {}", e);
                json!({ "detail": "Внутренняя ошибка сервера" })
            }
            ApiError::Export(e) => {
                log::error!("Export error: {}", e);
                json!({ "detail": "Внутренняя ошибка сервера" })
            }
            other => json!({ "detail": other.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(
            ApiError::validation("title", "слишком коротко").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::task_not_found().status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Conflict("Задача уже выполнена".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::AuthenticationRequired.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn validation_body_names_the_field() {
        let err = ApiError::validation("text", "Комментарий должен содержать минимум 5 символов");
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
