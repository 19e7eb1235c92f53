//! Async client for the framed sales transport.

use sales_core::network::NetworkConnection;
use sales_core::network::protocol::{ClientMessage, ErrorCode, EvaluationPayload, ServerMessage};
use sales_core::{GroupStats, ProductTotal, SalesError, SalesRecord, StateSales};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpStream;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error(transparent)]
    Transport(#[from] SalesError),

    #[error("Server error ({code:?}): {message}")]
    Server { code: ErrorCode, message: String },

    #[error("Unexpected response from server: {0}")]
    UnexpectedResponse(String),

    #[error("Connection closed by server")]
    Closed,
}

pub type DriverResult<T> = Result<T, DriverError>;

pub struct SalesDriver {
    connection: Option<NetworkConnection>,
    server_address: String,
    request_timeout: Duration,
}

impl SalesDriver {
    pub fn new() -> Self {
        Self::with_server("127.0.0.1:50051")
    }

    pub fn with_server(address: impl Into<String>) -> Self {
        Self {
            connection: None,
            server_address: address.into(),
            request_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Open the connection and confirm the server answers a ping. Does
    /// nothing when already connected.
    pub async fn connect(&mut self) -> DriverResult<()> {
        if self.connection.is_some() {
            return Ok(());
        }

        let stream = TcpStream::connect(&self.server_address)
            .await
            .map_err(|e| {
                SalesError::Connection(format!(
                    "Failed to connect to {}: {}",
                    self.server_address, e
                ))
            })?;

        let mut connection = NetworkConnection::new(stream).with_read_timeout(self.request_timeout);
        connection.send_message(&ClientMessage::Ping).await?;

        match connection.read_response().await? {
            Some(ServerMessage::Pong) => {
                tracing::debug!("Connected to {}", self.server_address);
                self.connection = Some(connection);
                Ok(())
            }
            Some(ServerMessage::Error { code, message }) => {
                Err(DriverError::Server { code, message })
            }
            Some(response) => Err(DriverError::UnexpectedResponse(format!("{:?}", response))),
            None => Err(DriverError::Closed),
        }
    }

    /// Round-trip time of a ping.
    pub async fn ping(&mut self) -> DriverResult<Duration> {
        let start = Instant::now();
        match self.request(ClientMessage::Ping).await? {
            ServerMessage::Pong => Ok(start.elapsed()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn records_by_field(
        &mut self,
        field: &str,
        value: &str,
    ) -> DriverResult<Vec<SalesRecord>> {
        let message = ClientMessage::GetRecordsByField {
            field: field.to_string(),
            value: value.to_string(),
        };
        match self.request(message).await? {
            ServerMessage::Records { records, .. } => Ok(records),
            other => Err(unexpected(other)),
        }
    }

    pub async fn stats(&mut self, field: &str) -> DriverResult<BTreeMap<String, GroupStats>> {
        let message = ClientMessage::GetStats {
            field: field.to_string(),
        };
        match self.request(message).await? {
            ServerMessage::Stats { groups } => Ok(groups),
            other => Err(unexpected(other)),
        }
    }

    pub async fn top_products(&mut self, limit: i64) -> DriverResult<Vec<ProductTotal>> {
        match self.request(ClientMessage::GetTopProducts { limit }).await? {
            ServerMessage::TopProducts { products } => Ok(products),
            other => Err(unexpected(other)),
        }
    }

    pub async fn sales_by_state(&mut self) -> DriverResult<Vec<StateSales>> {
        match self.request(ClientMessage::GetSalesByState).await? {
            ServerMessage::SalesByState { states } => Ok(states),
            other => Err(unexpected(other)),
        }
    }

    pub async fn evaluate(&mut self, expression: &str) -> DriverResult<EvaluationPayload> {
        let message = ClientMessage::Evaluate {
            expression: expression.to_string(),
        };
        match self.request(message).await? {
            ServerMessage::Evaluation { result } => Ok(result),
            other => Err(unexpected(other)),
        }
    }

    pub async fn disconnect(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            let _ = connection.close().await;
        }
    }

    /// Send one message and read its reply. A transport failure drops the
    /// connection so the next call reconnects.
    async fn request(&mut self, message: ClientMessage) -> DriverResult<ServerMessage> {
        self.connect().await?;
        let Some(connection) = self.connection.as_mut() else {
            return Err(DriverError::Closed);
        };

        let result = async {
            connection.send_message(&message).await?;
            connection.read_response().await
        }
        .await;

        match result {
            Ok(Some(ServerMessage::Error { code, message })) => {
                Err(DriverError::Server { code, message })
            }
            Ok(Some(response)) => Ok(response),
            Ok(None) => {
                self.connection = None;
                Err(DriverError::Closed)
            }
            Err(e) => {
                self.connection = None;
                Err(e.into())
            }
        }
    }
}

impl Default for SalesDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn unexpected(response: ServerMessage) -> DriverError {
    DriverError::UnexpectedResponse(format!("{:?}", response))
}
