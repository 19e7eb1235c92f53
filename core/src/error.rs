use crate::storage::IngestionError;
use thiserror::Error;

pub type SalesResult<T> = Result<T, SalesError>;

#[derive(Error, Debug)]
pub enum SalesError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ingestion error: {0}")]
    Ingestion(#[from] IngestionError),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connection limit reached")]
    ConnectionLimit,

    #[error("Operation timed out")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}
