use crate::storage::SalesRecord;
use serde::{Deserialize, Serialize};

/// Accumulated totals for one group-by key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub sum_sales: f64,
    pub sum_profit: f64,
    pub count: u64,
}

impl GroupStats {
    pub(crate) fn add(&mut self, record: &SalesRecord) {
        self.sum_sales += record.sales;
        self.sum_profit += record.profit;
        self.count += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductTotal {
    #[serde(rename = "product")]
    pub product_name: String,
    pub total_sales: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSales {
    pub state: String,
    pub sales: f64,
    pub profit: f64,
    pub count: u64,
}

/// Outcome of an ad-hoc expression. Filters borrow from the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation<'a> {
    Records(Vec<&'a SalesRecord>),
    Sum(f64),
    Count(u64),
}

impl<'a> Evaluation<'a> {
    pub fn records(&self) -> Option<&[&'a SalesRecord]> {
        match self {
            Evaluation::Records(records) => Some(records),
            _ => None,
        }
    }
}
