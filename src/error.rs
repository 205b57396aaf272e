// Error types for the engine and their conversion into HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

// Listing repository failures. Only total unavailability is expected in practice.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("listing repository unavailable: {0}")]
    Unavailable(String),
    #[error("listing repository query failed: {0}")]
    Query(String),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("reference data unavailable: {0}")]
    Unavailable(String),
}

// Raised by cache stores; always absorbed at the cache boundary
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Raised by audit sinks; logged and dropped by the history recorder
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit sink I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("audit sink write error: {0}")]
    Csv(#[from] csv::Error),
    #[error("audit record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("audit task failed: {0}")]
    Task(String),
}

// The errors a search can actually fail with
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

// Define a custom application error type
#[derive(Debug)]
pub enum AppError {
    InternalServerError(anyhow::Error),
    ServiceUnavailable(String),
    NotFound(String),
}

// Implement conversion from anyhow::Error for easier error propagation
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::InternalServerError(error)
    }
}

impl From<SearchError> for AppError {
    fn from(error: SearchError) -> Self {
        match error {
            SearchError::Repository(RepositoryError::Unavailable(message))
            | SearchError::Catalog(CatalogError::Unavailable(message)) => {
                AppError::ServiceUnavailable(message)
            }
            other => AppError::InternalServerError(anyhow::Error::new(other)),
        }
    }
}

// Implement IntoResponse for AppError to convert errors into HTTP responses
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(e) => {
                // Log the detailed error here
                tracing::error!("Internal server error: {:?}", e);
                // Don't expose internal details to the client
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::ServiceUnavailable(message) => {
                tracing::error!("Search backend unavailable: {}", message);
                (StatusCode::SERVICE_UNAVAILABLE, "Search is temporarily unavailable".to_string())
            }
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message),
        };

        (status, Json(json!({ "error": error_message }))).into_response()
    }
}
