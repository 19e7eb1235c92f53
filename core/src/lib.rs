//! Sales record query engine
//!
//! An immutable in-memory store of sales lines, grouped aggregates and a
//! small filter/aggregate expression language, served over two transports.

pub mod config;
pub mod error;
pub mod executor;
pub mod network;
pub mod query;
pub mod server;
pub mod storage;

pub use config::{Config, DataConfig, ServerConfig};
pub use error::{SalesError, SalesResult};
pub use executor::{
    EngineResult, EnginePhase, Evaluation, GroupStats, ProductTotal, QueryEngine, QueryError,
    StateSales,
};
pub use storage::{RecordStore, SalesField, SalesRecord};
