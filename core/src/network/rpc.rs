//! Line-delimited JSON-RPC 2.0
//!
//! One request object per line in, one response object per line out. Method
//! names follow the original XML-RPC surface, so `get_records_by_region` and
//! friends keep working for existing callers.

use crate::executor::{Evaluation, QueryEngine, QueryError};
use crate::storage::{SalesField, SalesRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

pub const JSONRPC_VERSION: &str = "2.0";

// Standard error codes
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

// Engine error codes
pub const QUERY_PARSE_ERROR: i64 = -32001;
pub const UNKNOWN_FIELD: i64 = -32002;
pub const TYPE_MISMATCH: i64 = -32003;
pub const NOT_READY: i64 = -32004;

pub const DEFAULT_TOP_PRODUCTS_LIMIT: i64 = 10;

pub const METHODS: [&str; 9] = [
    "get_records_by_region",
    "get_records_by_category",
    "get_customer_orders",
    "get_records_by_field",
    "get_stats",
    "get_top_products",
    "get_sales_by_state",
    "evaluate",
    "system.listMethods",
];

#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Value,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} ({code})")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }
}

impl From<QueryError> for RpcError {
    fn from(error: QueryError) -> Self {
        let code = match &error {
            QueryError::Parse(_) => QUERY_PARSE_ERROR,
            QueryError::UnknownField(_) => UNKNOWN_FIELD,
            QueryError::TypeMismatch { .. } => TYPE_MISMATCH,
            QueryError::NotReady => NOT_READY,
        };
        Self::new(code, error.to_string())
    }
}

/// Request parameters, given either by position or by name.
#[derive(Debug, Clone, Default)]
pub struct Params(Option<Value>);

impl Params {
    pub fn new(params: Option<Value>) -> Self {
        Self(params)
    }

    fn get(&self, position: usize, name: &str) -> Option<&Value> {
        match &self.0 {
            Some(Value::Array(items)) => items.get(position),
            Some(Value::Object(map)) => map.get(name),
            _ => None,
        }
    }

    fn string(&self, position: usize, name: &str) -> Result<String, RpcError> {
        match self.get(position, name) {
            Some(Value::String(value)) => Ok(value.clone()),
            Some(_) => Err(RpcError::invalid_params(format!(
                "Parameter '{}' must be a string",
                name
            ))),
            None => Err(RpcError::invalid_params(format!(
                "Missing parameter '{}'",
                name
            ))),
        }
    }

    fn optional_integer(&self, position: usize, name: &str) -> Result<Option<i64>, RpcError> {
        match self.get(position, name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value.as_i64().map(Some).ok_or_else(|| {
                RpcError::invalid_params(format!("Parameter '{}' must be an integer", name))
            }),
        }
    }
}

/// Decodes request lines and runs them against the engine.
#[derive(Debug, Clone)]
pub struct RpcDispatcher {
    engine: Arc<QueryEngine>,
}

impl RpcDispatcher {
    pub fn new(engine: Arc<QueryEngine>) -> Self {
        Self { engine }
    }

    /// Every line gets a response, including lines that are not valid JSON.
    pub fn handle_line(&self, line: &str) -> RpcResponse {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                return RpcResponse::failure(
                    Value::Null,
                    RpcError::new(PARSE_ERROR, format!("Parse error: {}", e)),
                );
            }
        };

        let id = value.get("id").cloned().unwrap_or(Value::Null);

        let request: RpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return RpcResponse::failure(
                    id,
                    RpcError::new(INVALID_REQUEST, format!("Invalid request: {}", e)),
                );
            }
        };

        if let Err(error) = validate(&request) {
            return RpcResponse::failure(id, error);
        }

        match self.dispatch(&request.method, Params::new(request.params)) {
            Ok(result) => RpcResponse::success(id, result),
            Err(error) => {
                tracing::debug!(method = %request.method, "RPC call failed: {}", error);
                RpcResponse::failure(id, error)
            }
        }
    }

    pub fn dispatch(&self, method: &str, params: Params) -> Result<Value, RpcError> {
        match method {
            "get_records_by_region" => {
                let region = params.string(0, "region")?;
                self.records(SalesField::Region.name(), &region)
            }
            "get_records_by_category" => {
                let category = params.string(0, "category")?;
                self.records(SalesField::Category.name(), &category)
            }
            "get_customer_orders" => {
                let customer_id = params.string(0, "customer_id")?;
                self.records(SalesField::CustomerId.name(), &customer_id)
            }
            "get_records_by_field" => {
                let field = params.string(0, "field")?;
                let value = params.string(1, "value")?;
                self.records(&field, &value)
            }
            "get_stats" => {
                let field = params.string(0, "field")?;
                to_json(&self.engine.stats_by(&field)?)
            }
            "get_top_products" => {
                let limit = params
                    .optional_integer(0, "limit")?
                    .unwrap_or(DEFAULT_TOP_PRODUCTS_LIMIT);
                to_json(&self.engine.top_products(limit)?)
            }
            "get_sales_by_state" => to_json(&self.engine.sales_by_state()?),
            "evaluate" => {
                let expression = params.string(0, "expression")?;
                evaluation_to_json(self.engine.evaluate(&expression)?)
            }
            "system.listMethods" => Ok(json!(METHODS)),
            _ => Err(RpcError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {}", method),
            )),
        }
    }

    fn records(&self, field: &str, value: &str) -> Result<Value, RpcError> {
        let records = self.engine.records_by_field(field, value)?;
        to_json(&records)
    }
}

fn validate(request: &RpcRequest) -> Result<(), RpcError> {
    if matches!(&request.jsonrpc, Some(version) if version != JSONRPC_VERSION) {
        return Err(RpcError::new(
            INVALID_REQUEST,
            "Unsupported jsonrpc version",
        ));
    }

    match &request.params {
        None | Some(Value::Null) | Some(Value::Array(_)) | Some(Value::Object(_)) => Ok(()),
        Some(_) => Err(RpcError::new(
            INVALID_REQUEST,
            "Params must be an array or an object",
        )),
    }
}

fn evaluation_to_json(evaluation: Evaluation<'_>) -> Result<Value, RpcError> {
    Ok(match evaluation {
        Evaluation::Records(records) => json!({
            "type": "records",
            "records": to_json::<Vec<&SalesRecord>>(&records)?,
        }),
        Evaluation::Sum(total) => json!({ "type": "sum", "value": total }),
        Evaluation::Count(count) => json!({ "type": "count", "value": count }),
    })
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::new(INTERNAL_ERROR, e.to_string()))
}
