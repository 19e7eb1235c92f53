//! Query execution over a ready [`RecordStore`](crate::storage::RecordStore).

mod engine;
mod error;
mod evaluator;
mod result;
mod stats;

pub use engine::{EnginePhase, QueryEngine};
pub use error::{EngineResult, QueryError};
pub use evaluator::ExpressionEvaluator;
pub use result::{Evaluation, GroupStats, ProductTotal, StateSales};
pub use stats::StatsAggregator;
