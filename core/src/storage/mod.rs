//! Storage layer: ingestion of flat rows into an immutable record snapshot

pub mod ingest;
pub mod record;
pub mod store;

pub use ingest::{IngestionError, IngestionResult, load_csv, normalize_date, read_records};
pub use record::{NOT_RETURNED, SalesField, SalesRecord, UnknownFieldError};
pub use store::{INDEXED_FIELDS, RecordStore};
