//! Error Types for the Client Store

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("UNIQUE constraint failed: clients.email ({email} is already registered)")]
    Duplicate { email: String },

    #[error("Client not found")]
    NotFound(i64),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store task failed: {0}")]
    Task(String),
}
