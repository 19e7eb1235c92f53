use crate::query::ParseError;
use crate::storage::UnknownFieldError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error(transparent)]
    UnknownField(#[from] UnknownFieldError),

    #[error("Type mismatch on field '{field}': {reason}")]
    TypeMismatch { field: String, reason: String },

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Record store is not ready")]
    NotReady,
}

pub type EngineResult<T> = Result<T, QueryError>;
