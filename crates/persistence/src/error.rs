//! Mapping of sqlx errors onto store errors.

use domain::store::StoreError;

/// PostgreSQL error code for unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Converts a sqlx error into the domain's store error.
pub fn store_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                StoreError::Conflict(db_err.message().to_string())
            } else {
                StoreError::Internal(format!("Database error: {}", db_err))
            }
        }
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
        _ => StoreError::Internal(format!("Database error: {}", err)),
    }
}
