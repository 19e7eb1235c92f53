//! Flat-file ingestion
//!
//! Turns a headed CSV export into [`SalesRecord`]s. This is a one-shot
//! formatting step: it discards sparse rows, normalizes dates and applies
//! the numeric defaults, and nothing more.

use crate::storage::record::{SalesField, SalesRecord};
use chrono::NaiveDate;
use csv::StringRecord;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Date layouts tried in order; the first that parses wins.
pub const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y", "%m-%d-%Y"];

/// Rows with fewer populated cells than this are dropped.
pub const MIN_POPULATED_FIELDS: usize = 5;

const PROGRESS_INTERVAL: usize = 1000;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Failed to read data source '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed CSV input: {0}")]
    Csv(#[from] csv::Error),

    #[error("Data source '{0}' contains no records")]
    Empty(String),

    #[error("Record store has already been loaded")]
    AlreadyLoaded,
}

pub type IngestionResult<T> = Result<T, IngestionError>;

/// Read every record from the CSV file at `path`.
pub fn load_csv(path: impl AsRef<Path>) -> IngestionResult<Vec<SalesRecord>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| IngestionError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!("Loading sales records from {}", path.display());
    read_records(file)
}

/// Read every record from a headed CSV stream.
///
/// May return an empty vector; the store decides whether that is fatal.
pub fn read_records<R: Read>(reader: R) -> IngestionResult<Vec<SalesRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let columns: Vec<Option<SalesField>> = headers.iter().map(SalesField::parse).collect();

    let unmapped: Vec<&str> = headers
        .iter()
        .zip(&columns)
        .filter(|(_, field)| field.is_none())
        .map(|(name, _)| name)
        .collect();
    if !unmapped.is_empty() {
        tracing::warn!("Ignoring unrecognized columns: {}", unmapped.join(", "));
    }

    let mut records = Vec::new();
    let mut discarded = 0usize;

    for row in reader.records() {
        let row = row?;

        if populated_fields(&row) < MIN_POPULATED_FIELDS {
            discarded += 1;
            continue;
        }

        records.push(record_from_row(&columns, &row));

        if records.len() % PROGRESS_INTERVAL == 0 {
            tracing::debug!("Processed {} records...", records.len());
        }
    }

    if discarded > 0 {
        tracing::debug!("Discarded {} sparse rows", discarded);
    }
    tracing::info!("Ingested {} sales records", records.len());

    Ok(records)
}

fn populated_fields(row: &StringRecord) -> usize {
    row.iter().filter(|value| !value.is_empty()).count()
}

fn record_from_row(columns: &[Option<SalesField>], row: &StringRecord) -> SalesRecord {
    let mut record = SalesRecord::default();

    for (column, value) in columns.iter().zip(row.iter()) {
        if let Some(field) = column {
            assign(&mut record, *field, value);
        }
    }

    record
}

fn assign(record: &mut SalesRecord, field: SalesField, raw: &str) {
    let raw = raw.trim();
    match field {
        SalesField::RowId => record.row_id = parse_integer(raw),
        SalesField::OrderId => record.order_id = raw.to_string(),
        SalesField::OrderDate => record.order_date = normalize_date(raw),
        SalesField::ShipDate => record.ship_date = normalize_date(raw),
        SalesField::ShipMode => record.ship_mode = raw.to_string(),
        SalesField::CustomerId => record.customer_id = raw.to_string(),
        SalesField::CustomerName => record.customer_name = raw.to_string(),
        SalesField::Segment => record.segment = raw.to_string(),
        SalesField::Country => record.country = raw.to_string(),
        SalesField::City => record.city = raw.to_string(),
        SalesField::State => record.state = raw.to_string(),
        SalesField::PostalCode => record.postal_code = raw.to_string(),
        SalesField::Region => record.region = raw.to_string(),
        SalesField::SalesRep => record.sales_rep = raw.to_string(),
        SalesField::ProductId => record.product_id = raw.to_string(),
        SalesField::Category => record.category = raw.to_string(),
        SalesField::SubCategory => record.sub_category = raw.to_string(),
        SalesField::ProductName => record.product_name = raw.to_string(),
        SalesField::Returned => record.returned = raw.to_string(),
        SalesField::Sales => record.sales = parse_decimal(raw),
        SalesField::Quantity => record.quantity = parse_integer(raw),
        SalesField::Discount => record.discount = parse_decimal(raw),
        SalesField::Profit => record.profit = parse_decimal(raw),
    }
}

/// Normalize a date to `YYYY-MM-DD`, or return the input unchanged.
pub fn normalize_date(raw: &str) -> String {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// Blank, malformed and non-finite input all read as zero.
pub fn parse_decimal(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

/// Integral floats such as `"2.0"` are accepted; anything else reads as zero.
pub fn parse_integer(raw: &str) -> i64 {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<i64>() {
        return value;
    }

    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && value.fract() == 0.0)
        .filter(|value| *value >= i64::MIN as f64 && *value < i64::MAX as f64)
        .map(|value| value as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Row ID,Order ID,Order Date,Ship Date,Ship Mode,Customer ID,Customer Name,Segment,Country,City,State,Postal Code,Region,Retail Sales People,Product ID,Category,Sub-Category,Product Name,Returned,Sales,Quantity,Discount,Profit";

    fn csv(rows: &[&str]) -> String {
        let mut text = String::from(HEADER);
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text
    }

    #[test]
    fn test_normalize_date_tries_formats_in_order() {
        assert_eq!(normalize_date("2016-11-08"), "2016-11-08");
        assert_eq!(normalize_date("08/11/2016"), "2016-11-08");
        // Day-first wins when both readings are valid.
        assert_eq!(normalize_date("05/06/2017"), "2017-06-05");
        // Only month-first parses here.
        assert_eq!(normalize_date("12/31/2015"), "2015-12-31");
        assert_eq!(normalize_date("08-11-2016"), "2016-11-08");
        assert_eq!(normalize_date("12-31-2015"), "2015-12-31");
        assert_eq!(normalize_date(" 2016-11-08 "), "2016-11-08");
    }

    #[test]
    fn test_normalize_date_passes_unparseable_input_through() {
        assert_eq!(normalize_date("sometime in 2016"), "sometime in 2016");
        assert_eq!(normalize_date(""), "");
    }

    #[test]
    fn test_numeric_defaults() {
        assert_eq!(parse_decimal("261.96"), 261.96);
        assert_eq!(parse_decimal(""), 0.0);
        assert_eq!(parse_decimal("n/a"), 0.0);
        assert_eq!(parse_decimal("NaN"), 0.0);
        assert_eq!(parse_decimal("inf"), 0.0);
        assert_eq!(parse_decimal("-3.5"), -3.5);
        assert_eq!(parse_integer("42"), 42);
        assert_eq!(parse_integer("2.5"), 0);
        assert_eq!(parse_integer(""), 0);
    }

    #[test]
    fn test_integral_floats_parse_as_integers() {
        assert_eq!(parse_integer("2.0"), 2);
        assert_eq!(parse_integer(" 7.00 "), 7);
        assert_eq!(parse_integer("-3.0"), -3);
        assert_eq!(parse_integer("1e3"), 1000);
        assert_eq!(parse_integer("NaN"), 0);
        assert_eq!(parse_integer("1e300"), 0);

        let input = "Row ID,Region,Sales,Quantity,Profit\n4.0,East,12.5,3.0,1";
        let records = read_records(input.as_bytes()).unwrap();
        assert_eq!(records[0].row_id, 4);
        assert_eq!(records[0].quantity, 3);
    }

    #[test]
    fn test_read_records_maps_every_column() {
        let input = csv(&[
            "1,CA-2016-152156,08/11/2016,11/11/2016,Second Class,CG-12520,Claire Gute,Consumer,United States,Henderson,Kentucky,42420,South,Cassandra Brandow,FUR-BO-10001798,Furniture,Bookcases,Bush Somerset Collection Bookcase,Not,261.96,2,0,41.9136",
        ]);

        let records = read_records(input.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.row_id, 1);
        assert_eq!(record.order_id, "CA-2016-152156");
        assert_eq!(record.order_date, "2016-11-08");
        assert_eq!(record.ship_date, "2016-11-11");
        assert_eq!(record.customer_id, "CG-12520");
        assert_eq!(record.state, "Kentucky");
        assert_eq!(record.postal_code, "42420");
        assert_eq!(record.region, "South");
        assert_eq!(record.sales_rep, "Cassandra Brandow");
        assert_eq!(record.sub_category, "Bookcases");
        assert_eq!(record.returned, "Not");
        assert_eq!(record.sales, 261.96);
        assert_eq!(record.quantity, 2);
        assert_eq!(record.discount, 0.0);
        assert_eq!(record.profit, 41.9136);
    }

    #[test]
    fn test_sparse_rows_are_discarded() {
        let input = csv(&[
            "1,A,,,,,,,,,,,South,,,,,,,100,1,0,10",
            "2,,,,,,,,,,,,,,,,,,,,,,",
            ",,,,,,,,,,,,West,,,,,,,,,,",
        ]);

        let records = read_records(input.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].row_id, 1);
    }

    #[test]
    fn test_short_rows_default_missing_fields() {
        let input = "Row ID,Region,Sales,Profit,Category,Quantity\n9,East,12.5,-1,Technology,x";

        let records = read_records(input.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].region, "East");
        assert_eq!(records[0].quantity, 0);
        assert_eq!(records[0].customer_name, "");
        assert_eq!(records[0].discount, 0.0);
    }

    #[test]
    fn test_header_only_input_yields_no_records() {
        let records = read_records(HEADER.as_bytes()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let err = load_csv("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, IngestionError::Io { .. }));
    }
}
