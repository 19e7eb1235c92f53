//! Immutable record snapshot with precomputed value indices.

use crate::storage::ingest::{self, IngestionError, IngestionResult};
use crate::storage::record::{SalesField, SalesRecord, UnknownFieldError};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Fields that get a value → positions index at build time.
pub const INDEXED_FIELDS: [SalesField; 4] = [
    SalesField::Region,
    SalesField::Category,
    SalesField::CustomerId,
    SalesField::State,
];

/// Positions of every record holding a given value, in store order.
#[derive(Debug, Default)]
struct ValueIndex {
    positions: HashMap<String, Vec<usize>>,
}

impl ValueIndex {
    fn build(records: &[SalesRecord], field: SalesField) -> Self {
        let mut positions: HashMap<String, Vec<usize>> = HashMap::new();
        for (position, record) in records.iter().enumerate() {
            positions
                .entry(record.text(field).into_owned())
                .or_default()
                .push(position);
        }
        Self { positions }
    }

    fn get(&self, value: &str) -> &[usize] {
        self.positions.get(value).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// The in-memory collection of all sales records.
///
/// Built once and never mutated. Indices are derived from the snapshot in
/// the same constructor, so they cannot drift from it.
#[derive(Debug)]
pub struct RecordStore {
    records: Vec<SalesRecord>,
    indices: HashMap<SalesField, ValueIndex>,
}

impl RecordStore {
    /// Ingest the CSV file at `path` and build the store.
    pub fn load(path: impl AsRef<Path>) -> IngestionResult<Self> {
        let path = path.as_ref();
        let records = ingest::load_csv(path)?;
        Self::build(records, &path.display().to_string())
    }

    pub fn from_reader<R: Read>(reader: R) -> IngestionResult<Self> {
        let records = ingest::read_records(reader)?;
        Self::build(records, "<reader>")
    }

    pub fn from_records(records: Vec<SalesRecord>) -> IngestionResult<Self> {
        Self::build(records, "<memory>")
    }

    fn build(records: Vec<SalesRecord>, source: &str) -> IngestionResult<Self> {
        if records.is_empty() {
            return Err(IngestionError::Empty(source.to_string()));
        }

        let indices = INDEXED_FIELDS
            .iter()
            .map(|&field| (field, ValueIndex::build(&records, field)))
            .collect();

        tracing::info!(
            records = records.len(),
            indexed_fields = INDEXED_FIELDS.len(),
            "Record store ready"
        );

        Ok(Self { records, indices })
    }

    /// Full snapshot in ingestion order.
    pub fn all(&self) -> &[SalesRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Exact string-equality filter on a field named by the caller.
    pub fn by_field(
        &self,
        field_name: &str,
        value: &str,
    ) -> Result<Vec<&SalesRecord>, UnknownFieldError> {
        let field = SalesField::resolve(field_name)?;
        Ok(self.matching(field, value))
    }

    /// Records whose textual `field` equals `value`, in store order.
    pub fn matching(&self, field: SalesField, value: &str) -> Vec<&SalesRecord> {
        match self.indices.get(&field) {
            Some(index) => index
                .get(value)
                .iter()
                .map(|&position| &self.records[position])
                .collect(),
            None => self
                .records
                .iter()
                .filter(|record| record.text(field) == value)
                .collect(),
        }
    }

    pub fn is_indexed(&self, field: SalesField) -> bool {
        self.indices.contains_key(&field)
    }
}
