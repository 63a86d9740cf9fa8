use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::diagnostics::{ErrorCode, ParserError};

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Parser error: {0}")]
    Parser(#[from] ParserError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// HTTP status for a parser failure.
pub fn parser_status(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::FileNotProvided | ErrorCode::FileEmpty => StatusCode::BAD_REQUEST,
        ErrorCode::FileTooLarge | ErrorCode::MemoryLimitExceeded => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorCode::FileTypeUnsupported => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ErrorCode::PdfInvalidFormat
        | ErrorCode::PdfPasswordProtected
        | ErrorCode::PdfNoTextContent
        | ErrorCode::PdfExtractionFailed
        | ErrorCode::OcrProcessingFailed
        | ErrorCode::DocxParsingFailed
        | ErrorCode::TextExtractionFailed
        | ErrorCode::InsufficientData
        | ErrorCode::ContactInfoMissing => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::TimeoutExceeded => StatusCode::GATEWAY_TIMEOUT,
        ErrorCode::OcrInitializationFailed | ErrorCode::UnknownError => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, recoverable) = match &self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                true,
            ),
            AppError::Parser(err) => {
                let status = parser_status(err.code);
                if status.is_server_error() {
                    tracing::error!(code = %err.code, context = ?err.context, "Parser error: {}", err.message);
                } else {
                    tracing::warn!(code = %err.code, "Parser error: {}", err.message);
                }
                (status, err.code.as_str(), err.user_message.clone(), err.recoverable)
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    false,
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
                "recoverable": recoverable
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use serde_json::Value;

    use super::*;

    async fn body_of(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(parser_status(ErrorCode::FileEmpty), StatusCode::BAD_REQUEST);
        assert_eq!(parser_status(ErrorCode::FileTooLarge), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            parser_status(ErrorCode::FileTypeUnsupported),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            parser_status(ErrorCode::PdfPasswordProtected),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(parser_status(ErrorCode::TimeoutExceeded), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            parser_status(ErrorCode::UnknownError),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_parser_error_body_uses_user_message() {
        let err = ParserError::new(ErrorCode::DocxParsingFailed, "zip: bad central directory");
        let (status, body) = body_of(err.into()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "DOCX_PARSING_FAILED");
        assert_eq!(body["error"]["recoverable"], true);
        assert!(!body["error"]["message"].as_str().unwrap().contains("zip"));
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let (status, body) = body_of(AppError::Internal(anyhow::anyhow!("secret path"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "An internal server error occurred");
    }
}
