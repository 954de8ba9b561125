//! Errors a chat turn can run into

use crate::db::DbError;
use crate::state_machine::Field;
use thiserror::Error;

/// None of these end a conversation. Parse problems and unknown commands are
/// answered in the dialog; storage problems leave the session where it was.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Could not read a value for {field}")]
    ParseFailure { field: Field },
    #[error("Message did not match any command")]
    UnknownIntent,
    #[error("Storage failure: {0}")]
    PersistenceFailure(#[from] DbError),
    #[error("Session not found: {0}")]
    SessionNotFound(String),
}
