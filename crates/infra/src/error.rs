//! Store error model.
//!
//! These are infrastructure failures, not part of the user-visible auth
//! taxonomy; the API layer maps them to opaque 500 responses.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("corrupt row: {0}")]
    CorruptRow(String),

    #[error("store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn corrupt_row(msg: impl Into<String>) -> Self {
        Self::CorruptRow(msg.into())
    }
}
