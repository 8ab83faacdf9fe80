// SPDX-License-Identifier: AGPL-3.0-or-later

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::data_store::DataStoreError;
use crate::db::errors::StoreError;
use crate::reconcile::OrderError;

/// Represents all the ways a request can fail within the service.
///
/// Every variant maps onto one HTTP status code; the mapping lives in the
/// `IntoResponse` implementation below so handlers can simply return
/// `Result<_, AppError>`.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// An aggregate or child referenced by id does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A proposed sibling ordering violates the contiguity invariant.
    #[error(transparent)]
    InvalidOrder(#[from] OrderError),

    /// A database constraint failed (unique vanity url, dangling foreign key).
    #[error("database constraint violated: {0}")]
    IntegrityViolation(String),

    /// A domain rule was violated, e.g. publishing without a vanity url.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The request is missing the identity of the calling user.
    #[error("missing user identity")]
    Unauthenticated,

    /// The calling user does not own the addressed resource.
    #[error("not the owner of this interview")]
    Forbidden,

    /// Error returned from an external data store provider.
    #[error(transparent)]
    DataStore(#[from] DataStoreError),

    /// Unexpected internal failure.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(entity) => AppError::NotFound(entity.to_string()),
            StoreError::InvalidOrder(err) => AppError::InvalidOrder(err),
            StoreError::IntegrityViolation(detail) => AppError::IntegrityViolation(detail),
            StoreError::Validation(detail) => AppError::Validation(detail),
            StoreError::Database(err) => AppError::Internal(err.into()),
            StoreError::InvalidRow(err) => AppError::Internal(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidOrder(_)
            | AppError::IntegrityViolation(_)
            | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::DataStore(err) => err.status_code(),
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let detail = self.to_string();
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
