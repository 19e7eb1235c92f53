//! Framed transport sessions
//!
//! One task per client connection, bounded by a semaphore. Each request is
//! answered on the blocking pool so long scans never stall the reactor.

use crate::network::NetworkConnection;
use crate::network::protocol::{ClientMessage, ErrorCode, ProtocolHandler, ServerMessage};
use crate::{SalesError, SalesResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Connection manager
pub struct ConnectionManager {
    max_connections: Arc<Semaphore>,
    protocol_handler: ProtocolHandler,
    idle_timeout: Duration,
}

impl ConnectionManager {
    pub fn new(
        max_connections: usize,
        idle_timeout: Duration,
        protocol_handler: ProtocolHandler,
    ) -> Self {
        Self {
            max_connections: Arc::new(Semaphore::new(max_connections)),
            protocol_handler,
            idle_timeout,
        }
    }

    /// Serve one client until it disconnects, idles out or the server stops.
    pub async fn handle_connection(
        &self,
        socket: TcpStream,
        shutdown_token: CancellationToken,
    ) -> SalesResult<()> {
        // Acquire a connection permit
        let _permit = self
            .max_connections
            .acquire()
            .await
            .map_err(|_| SalesError::ConnectionLimit)?;

        let network_conn = NetworkConnection::new(socket).with_read_timeout(self.idle_timeout);
        let connection = Connection {
            id: Uuid::new_v4(),
            network_conn,
            protocol_handler: self.protocol_handler.clone(),
            shutdown_token,
        };
        connection.run().await
    }
}

/// Represents a single client connection
pub struct Connection {
    id: Uuid,
    network_conn: NetworkConnection,
    protocol_handler: ProtocolHandler,
    shutdown_token: CancellationToken,
}

impl Connection {
    /// Run the connection loop
    pub async fn run(mut self) -> SalesResult<()> {
        tracing::debug!("Connection {} started", self.id);

        loop {
            tokio::select! {
                message_result = self.network_conn.read_message() => {
                    match message_result {
                        Ok(Some(message)) => {
                            let response = self.handle_message(message).await?;
                            if let Err(e) = self.network_conn.send_response(&response).await {
                                tracing::warn!(
                                    "Connection {}: error sending response: {}",
                                    self.id,
                                    e
                                );
                                break;
                            }
                        }
                        Ok(None) => {
                            // Client disconnected
                            break;
                        }
                        Err(SalesError::Timeout) => {
                            tracing::debug!("Connection {} timed out due to inactivity", self.id);
                            let timeout_response = ServerMessage::Error {
                                code: ErrorCode::InternalError,
                                message: "Connection timed out due to inactivity".to_string(),
                            };
                            let _ = self.network_conn.send_response(&timeout_response).await;
                            break;
                        }
                        Err(e) => {
                            tracing::warn!("Connection {}: error reading message: {}", self.id, e);
                            let error_response = ServerMessage::Error {
                                code: ErrorCode::InternalError,
                                message: format!("Connection error: {}", e),
                            };
                            let _ = self.network_conn.send_response(&error_response).await;
                            break;
                        }
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    tracing::debug!("Connection {} shutdown requested", self.id);
                    break;
                }
            }
        }

        let _ = self.network_conn.close().await;
        tracing::debug!("Connection {} closed", self.id);
        Ok(())
    }

    async fn handle_message(&self, message: ClientMessage) -> SalesResult<ServerMessage> {
        let handler = self.protocol_handler.clone();
        tokio::task::spawn_blocking(move || handler.handle_message(message))
            .await
            .map_err(|e| SalesError::Internal(e.to_string()))
    }
}
