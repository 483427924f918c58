use thiserror::Error;

use crate::{db_types::PayoutId, traits::PayoutDbError};

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Database query error: {0}")]
    QueryError(String),
    #[error("Cannot process duplicate payout {0}")]
    DuplicatePayout(PayoutId),
}

impl From<SqliteDatabaseError> for PayoutDbError {
    fn from(err: SqliteDatabaseError) -> Self {
        PayoutDbError::DatabaseError(err.to_string())
    }
}
