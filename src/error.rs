use thiserror::Error;
use actix_web::{ResponseError, HttpResponse, http::StatusCode};
use serde_json::json;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WebSocketError),

    #[error("AI error: {0}")]
    Ai(#[from] AiError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::Database(DatabaseError::NotFound),
            _ => Error::Database(DatabaseError::QueryError(err.to_string())),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        Error::Auth(AuthError::InvalidToken)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Ai(AiError::RequestFailed(err.to_string()))
    }
}

impl ResponseError for Error {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = self.to_string();
        let response = json!({
            "error": {
                "status": status.as_u16(),
                "message": message
            }
        });
        HttpResponse::build(status).json(response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::Chat(e) => match e {
                ChatError::RoomNotFound => StatusCode::NOT_FOUND,
                ChatError::CodeSpaceExhausted => StatusCode::SERVICE_UNAVAILABLE,
                ChatError::UnboundSession => StatusCode::BAD_REQUEST,
            },
            Error::Auth(e) => match e {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
                AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
                AuthError::Unauthorized => StatusCode::FORBIDDEN,
                AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            },
            Error::Ai(e) => match e {
                AiError::ModelLoading => StatusCode::SERVICE_UNAVAILABLE,
                AiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::BAD_GATEWAY,
            },
            Error::Upload(UploadError::TypeNotAllowed(_)) => StatusCode::BAD_REQUEST,
            Error::Upload(UploadError::InvalidFilename) => StatusCode::BAD_REQUEST,
            Error::Upload(UploadError::TooLarge) => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Upload(UploadError::NotFound) => StatusCode::NOT_FOUND,
            Error::Upload(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(DatabaseError::NotFound) => StatusCode::NOT_FOUND,
            Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Errors produced by the room/session coordination core. None of these are
/// fatal: the offending operation is rejected and the registry stays
/// consistent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("Room not found")]
    RoomNotFound,

    #[error("No free room code available")]
    CodeSpaceExhausted,

    #[error("Connection has no active room binding")]
    UnboundSession,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Rate limited")]
    RateLimited,
}

#[derive(Error, Debug)]
pub enum WebSocketError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Message sending failed: {0}")]
    SendError(String),

    #[error("Invalid message format: {0}")]
    InvalidFormat(String),
}

#[derive(Error, Debug)]
pub enum AiError {
    #[error("Inference request failed: {0}")]
    RequestFailed(String),

    #[error("Model is still loading, retry shortly")]
    ModelLoading,

    #[error("Inference API rate limited")]
    RateLimited,

    #[error("Unexpected inference response: {0}")]
    ResponseError(String),
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("File type not allowed: {0}")]
    TypeNotAllowed(String),

    #[error("Invalid filename")]
    InvalidFilename,

    #[error("File exceeds maximum size")]
    TooLarge,

    #[error("File not found")]
    NotFound,

    #[error("Storage error: {0}")]
    StorageError(String),
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record")]
    Duplicate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let app_err: Error = io_err.into();
        assert!(matches!(app_err, Error::Internal(_)));

        let config_err = config::ConfigError::NotFound(String::from("key not found"));
        let app_err: Error = config_err.into();
        assert!(matches!(app_err, Error::Config(_)));

        let db_err = sqlx::Error::RowNotFound;
        let app_err: Error = db_err.into();
        assert!(matches!(app_err, Error::Database(DatabaseError::NotFound)));
    }

    #[test]
    fn test_error_status_codes() {
        let err = Error::Chat(ChatError::RoomNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = Error::Chat(ChatError::CodeSpaceExhausted);
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let err = Error::Chat(ChatError::UnboundSession);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = Error::Auth(AuthError::InvalidCredentials);
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err = Error::Ai(AiError::RateLimited);
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);

        let err = Error::Validation("invalid input".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_display() {
        let err = Error::Chat(ChatError::RoomNotFound);
        assert_eq!(err.to_string(), "Chat error: Room not found");

        let err = Error::Auth(AuthError::InvalidCredentials);
        assert_eq!(err.to_string(), "Authentication error: Invalid credentials");

        let err = Error::Upload(UploadError::TypeNotAllowed("exe".to_string()));
        assert_eq!(err.to_string(), "Upload error: File type not allowed: exe");
    }
}
