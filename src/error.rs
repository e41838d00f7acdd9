use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::{json, Value as JsonValue};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid value for `{field}`: {message}")]
    InvalidField { field: String, message: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Mail delivery failed: {0}")]
    Mail(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let (status, token, message, fields): (StatusCode, &str, String, Option<JsonValue>) =
            match self {
                Error::InvalidField { field, message } => {
                    let summary = format!("Invalid value for `{}`", field);
                    let mut detail = serde_json::Map::new();
                    detail.insert(field, json!([message]));
                    (
                        StatusCode::BAD_REQUEST,
                        "validation_error",
                        summary,
                        Some(JsonValue::Object(detail)),
                    )
                }
                Error::Validation(err) => {
                    let fields = serde_json::to_value(&err).ok();
                    (
                        StatusCode::BAD_REQUEST,
                        "validation_error",
                        err.to_string(),
                        fields,
                    )
                }
                Error::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
                Error::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
                Error::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
                Error::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
                Error::Mail(msg) => (
                    StatusCode::BAD_GATEWAY,
                    "mail_error",
                    format!("Mail delivery failed: {}", msg),
                    None,
                ),
                Error::Database(err) => {
                    tracing::error!(error = ?err, "database error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal_error",
                        "An unexpected error occurred".to_string(),
                        None,
                    )
                }
                other => {
                    tracing::error!(error = ?other, "unhandled error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal_error",
                        "An unexpected error occurred".to_string(),
                        None,
                    )
                }
            };

        let mut body = json!({
            "success": false,
            "error": token,
            "message": message,
        });
        if let Some(fields) = fields {
            body["fields"] = fields;
        }
        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            other => Error::Database(other),
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::invalid_field("body", rejection.body_text())
    }
}

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        Error::invalid_field("path", rejection.body_text())
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        Error::invalid_field("query", rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: Error) -> (StatusCode, JsonValue) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn invalid_field_reports_field_detail() {
        let (status, body) = render(Error::invalid_field("category", "unknown value `x`")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["fields"]["category"][0], "unknown value `x`");
    }

    #[tokio::test]
    async fn row_not_found_maps_to_404() {
        let (status, body) = render(Error::from(sqlx::Error::RowNotFound)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, body) = render(Error::Internal("pool exhausted".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "An unexpected error occurred");
    }
}
