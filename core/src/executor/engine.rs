use super::*;
use crate::storage::{IngestionError, IngestionResult, RecordStore, SalesRecord};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EnginePhase {
    Unloaded = 0,
    Loading = 1,
    Ready = 2,
    Failed = 3,
}

impl EnginePhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => EnginePhase::Unloaded,
            1 => EnginePhase::Loading,
            2 => EnginePhase::Ready,
            _ => EnginePhase::Failed,
        }
    }
}

/// Entry point for every transport.
///
/// The store is published once through a [`OnceLock`]; after that every
/// operation is a lock-free read and the engine can be shared freely across
/// threads behind an `Arc`.
#[derive(Debug)]
pub struct QueryEngine {
    phase: AtomicU8,
    store: OnceLock<RecordStore>,
}

impl QueryEngine {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(EnginePhase::Unloaded as u8),
            store: OnceLock::new(),
        }
    }

    /// A ready engine over an already built store.
    pub fn from_store(store: RecordStore) -> Self {
        let engine = Self::new();
        engine.store.get_or_init(|| store);
        engine
            .phase
            .store(EnginePhase::Ready as u8, Ordering::Release);
        engine
    }

    pub fn load(&self, path: impl AsRef<Path>) -> IngestionResult<()> {
        let path = path.as_ref();
        self.load_with(|| RecordStore::load(path))
    }

    /// Run `build` and publish its store. Only the first call on an
    /// unloaded engine does any work.
    pub fn load_with<F>(&self, build: F) -> IngestionResult<()>
    where
        F: FnOnce() -> IngestionResult<RecordStore>,
    {
        self.phase
            .compare_exchange(
                EnginePhase::Unloaded as u8,
                EnginePhase::Loading as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| IngestionError::AlreadyLoaded)?;

        match build() {
            Ok(store) => {
                let totals = StatsAggregator::new(&store).totals();
                if self.store.set(store).is_err() {
                    self.set_phase(EnginePhase::Failed);
                    return Err(IngestionError::AlreadyLoaded);
                }
                self.set_phase(EnginePhase::Ready);
                tracing::info!(
                    records = totals.count,
                    total_sales = totals.sum_sales,
                    total_profit = totals.sum_profit,
                    "Query engine ready"
                );
                Ok(())
            }
            Err(e) => {
                self.set_phase(EnginePhase::Failed);
                tracing::error!("Failed to load record store: {}", e);
                Err(e)
            }
        }
    }

    fn set_phase(&self, phase: EnginePhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    pub fn phase(&self) -> EnginePhase {
        EnginePhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn is_ready(&self) -> bool {
        self.phase() == EnginePhase::Ready
    }

    pub fn store(&self) -> EngineResult<&RecordStore> {
        self.store.get().ok_or(QueryError::NotReady)
    }

    pub fn records_by_field(&self, field: &str, value: &str) -> EngineResult<Vec<&SalesRecord>> {
        let records = self.store()?.by_field(field, value)?;
        tracing::debug!(field, value, matches = records.len(), "Records by field");
        Ok(records)
    }

    pub fn stats_by(&self, field: &str) -> EngineResult<BTreeMap<String, GroupStats>> {
        let groups = StatsAggregator::new(self.store()?).group_by(field)?;
        tracing::debug!(field, groups = groups.len(), "Grouped stats");
        Ok(groups)
    }

    pub fn top_products(&self, limit: i64) -> EngineResult<Vec<ProductTotal>> {
        Ok(StatsAggregator::new(self.store()?).top_products(limit))
    }

    pub fn sales_by_state(&self) -> EngineResult<Vec<StateSales>> {
        Ok(StatsAggregator::new(self.store()?).by_state())
    }

    pub fn evaluate(&self, expression: &str) -> EngineResult<Evaluation<'_>> {
        let result = ExpressionEvaluator::new(self.store()?).evaluate(expression);
        if let Err(e) = &result {
            tracing::debug!(expression, "Expression rejected: {}", e);
        }
        result
    }
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new()
    }
}
