// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::reconcile::OrderError;

/// `SqlStore` errors.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The requested row does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A screen or action carried an order the sequence cannot accept.
    #[error(transparent)]
    InvalidOrder(#[from] OrderError),

    /// A unique or foreign key constraint was violated.
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// The aggregate is in a state the store refuses to persist.
    #[error("{0}")]
    Validation(String),

    /// Error which originated in `sqlx`.
    #[error("error in database: {0}")]
    Database(sqlx::Error),

    /// Error when a stored row could not be converted to its typed model.
    #[error("invalid row in database: {0}")]
    InvalidRow(#[from] anyhow::Error),
}

/// Distinguish constraint violations from other database failures so the
/// HTTP layer can report them as client errors.
impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_error) = &error {
            let message = db_error.message();
            if message.contains("UNIQUE") || message.contains("FOREIGN KEY") {
                return StoreError::IntegrityViolation(message.to_string());
            }
        }

        StoreError::Database(error)
    }
}
