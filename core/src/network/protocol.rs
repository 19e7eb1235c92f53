use crate::executor::{Evaluation, GroupStats, ProductTotal, QueryEngine, QueryError, StateSales};
use crate::storage::SalesRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

// Constants
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024; // 16MB max message size

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    Ping,
    Heartbeat,
    GetRecordsByField { field: String, value: String },
    GetStats { field: String },
    GetTopProducts { limit: i64 },
    GetSalesByState,
    Evaluate { expression: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    Pong,
    HeartbeatAck,
    Records {
        records: Vec<SalesRecord>,
        total_count: usize,
    },
    Stats {
        groups: BTreeMap<String, GroupStats>,
    },
    TopProducts {
        products: Vec<ProductTotal>,
    },
    SalesByState {
        states: Vec<StateSales>,
    },
    Evaluation {
        result: EvaluationPayload,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
}

/// Owned, serializable form of an [`Evaluation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EvaluationPayload {
    Records(Vec<SalesRecord>),
    Sum(f64),
    Count(u64),
}

impl From<Evaluation<'_>> for EvaluationPayload {
    fn from(evaluation: Evaluation<'_>) -> Self {
        match evaluation {
            Evaluation::Records(records) => {
                EvaluationPayload::Records(records.into_iter().cloned().collect())
            }
            Evaluation::Sum(total) => EvaluationPayload::Sum(total),
            Evaluation::Count(count) => EvaluationPayload::Count(count),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    ParseError,
    UnknownField,
    TypeMismatch,
    NotReady,
    InternalError,
}

impl From<&QueryError> for ErrorCode {
    fn from(error: &QueryError) -> Self {
        match error {
            QueryError::Parse(_) => ErrorCode::ParseError,
            QueryError::UnknownField(_) => ErrorCode::UnknownField,
            QueryError::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            QueryError::NotReady => ErrorCode::NotReady,
        }
    }
}

/// Turns client messages into engine calls. Cheap to clone; every clone
/// shares the same engine.
#[derive(Debug, Clone)]
pub struct ProtocolHandler {
    engine: Arc<QueryEngine>,
}

impl ProtocolHandler {
    pub fn new(engine: Arc<QueryEngine>) -> Self {
        Self { engine }
    }

    pub fn handle_message(&self, message: ClientMessage) -> ServerMessage {
        let result = match message {
            ClientMessage::Ping => Ok(ServerMessage::Pong),
            ClientMessage::Heartbeat => Ok(ServerMessage::HeartbeatAck),
            ClientMessage::GetRecordsByField { field, value } => {
                self.handle_records_by_field(&field, &value)
            }
            ClientMessage::GetStats { field } => self
                .engine
                .stats_by(&field)
                .map(|groups| ServerMessage::Stats { groups }),
            ClientMessage::GetTopProducts { limit } => self
                .engine
                .top_products(limit)
                .map(|products| ServerMessage::TopProducts { products }),
            ClientMessage::GetSalesByState => self
                .engine
                .sales_by_state()
                .map(|states| ServerMessage::SalesByState { states }),
            ClientMessage::Evaluate { expression } => {
                self.engine
                    .evaluate(&expression)
                    .map(|evaluation| ServerMessage::Evaluation {
                        result: evaluation.into(),
                    })
            }
        };

        result.unwrap_or_else(|e| ServerMessage::Error {
            code: ErrorCode::from(&e),
            message: e.to_string(),
        })
    }

    fn handle_records_by_field(
        &self,
        field: &str,
        value: &str,
    ) -> Result<ServerMessage, QueryError> {
        let records: Vec<SalesRecord> = self
            .engine
            .records_by_field(field, value)?
            .into_iter()
            .cloned()
            .collect();

        Ok(ServerMessage::Records {
            total_count: records.len(),
            records,
        })
    }
}

impl ClientMessage {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        serde_json::from_slice(bytes).map_err(|e| e.to_string())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, String> {
        serde_json::to_vec(self).map_err(|e| e.to_string())
    }
}

impl ServerMessage {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        serde_json::from_slice(bytes).map_err(|e| e.to_string())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, String> {
        serde_json::to_vec(self).map_err(|e| e.to_string())
    }

    /// Encode for a single frame. A response that would exceed
    /// [`MAX_MESSAGE_SIZE`] is replaced by an `InternalError` so the
    /// client still gets a typed answer.
    pub fn to_frame_bytes(&self) -> Result<Vec<u8>, String> {
        let bytes = self.to_bytes()?;
        if bytes.len() <= MAX_MESSAGE_SIZE {
            return Ok(bytes);
        }

        tracing::warn!(
            "Response of {} bytes exceeds the {} byte frame limit",
            bytes.len(),
            MAX_MESSAGE_SIZE
        );
        ServerMessage::Error {
            code: ErrorCode::InternalError,
            message: format!(
                "Response too large: {} bytes exceeds the {} byte limit",
                bytes.len(),
                MAX_MESSAGE_SIZE
            ),
        }
        .to_bytes()
    }
}
