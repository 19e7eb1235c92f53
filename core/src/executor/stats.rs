//! Group-by aggregation over the full snapshot.
//!
//! Every call is a fresh scan in store order; nothing is cached between
//! calls.

use crate::executor::result::{GroupStats, ProductTotal, StateSales};
use crate::storage::{RecordStore, SalesField, UnknownFieldError};
use std::collections::{BTreeMap, HashMap};

pub struct StatsAggregator<'a> {
    store: &'a RecordStore,
}

impl<'a> StatsAggregator<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        Self { store }
    }

    /// Totals keyed by the textual value of `field_name`. Records with an
    /// empty value land under the `""` key.
    pub fn group_by(
        &self,
        field_name: &str,
    ) -> Result<BTreeMap<String, GroupStats>, UnknownFieldError> {
        let field = SalesField::resolve(field_name)?;
        Ok(self.group_by_field(field))
    }

    pub fn group_by_field(&self, field: SalesField) -> BTreeMap<String, GroupStats> {
        let mut groups: BTreeMap<String, GroupStats> = BTreeMap::new();

        for record in self.store.all() {
            let key = record.text(field);
            match groups.get_mut(key.as_ref()) {
                Some(stats) => stats.add(record),
                None => groups.entry(key.into_owned()).or_default().add(record),
            }
        }

        groups
    }

    /// The `limit` best-selling products, highest total first. Equal totals
    /// keep the order in which the products were first seen.
    pub fn top_products(&self, limit: i64) -> Vec<ProductTotal> {
        if limit <= 0 {
            return Vec::new();
        }

        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut totals: Vec<ProductTotal> = Vec::new();

        for record in self.store.all() {
            match positions.get(record.product_name.as_str()) {
                Some(&position) => totals[position].total_sales += record.sales,
                None => {
                    positions.insert(&record.product_name, totals.len());
                    totals.push(ProductTotal {
                        product_name: record.product_name.clone(),
                        total_sales: record.sales,
                    });
                }
            }
        }

        // sort_by is stable, which preserves first-seen order on ties
        totals.sort_by(|a, b| b.total_sales.total_cmp(&a.total_sales));
        totals.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        totals
    }

    pub fn by_state(&self) -> Vec<StateSales> {
        self.group_by_field(SalesField::State)
            .into_iter()
            .map(|(state, stats)| StateSales {
                state,
                sales: stats.sum_sales,
                profit: stats.sum_profit,
                count: stats.count,
            })
            .collect()
    }

    /// Grand totals over the whole store.
    pub fn totals(&self) -> GroupStats {
        let mut totals = GroupStats::default();
        for record in self.store.all() {
            totals.add(record);
        }
        totals
    }
}
