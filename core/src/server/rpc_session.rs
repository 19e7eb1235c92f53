//! JSON-RPC transport sessions

use crate::network::protocol::MAX_MESSAGE_SIZE;
use crate::network::rpc::RpcDispatcher;
use crate::{SalesError, SalesResult};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio_util::codec::{Framed, LinesCodec};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub struct RpcSessionManager {
    max_connections: Arc<Semaphore>,
    dispatcher: RpcDispatcher,
    idle_timeout: Duration,
}

impl RpcSessionManager {
    pub fn new(max_connections: usize, idle_timeout: Duration, dispatcher: RpcDispatcher) -> Self {
        Self {
            max_connections: Arc::new(Semaphore::new(max_connections)),
            dispatcher,
            idle_timeout,
        }
    }

    pub async fn handle_connection(
        &self,
        socket: TcpStream,
        shutdown_token: CancellationToken,
    ) -> SalesResult<()> {
        let _permit = self
            .max_connections
            .acquire()
            .await
            .map_err(|_| SalesError::ConnectionLimit)?;

        let id = Uuid::new_v4();
        let mut lines = Framed::new(socket, LinesCodec::new_with_max_length(MAX_MESSAGE_SIZE));
        tracing::debug!("RPC session {} started", id);

        loop {
            tokio::select! {
                next = tokio::time::timeout(self.idle_timeout, lines.next()) => {
                    let line = match next {
                        Err(_) => {
                            tracing::debug!("RPC session {} timed out due to inactivity", id);
                            break;
                        }
                        Ok(None) => break,
                        Ok(Some(Err(e))) => {
                            tracing::warn!("RPC session {}: error reading request: {}", id, e);
                            break;
                        }
                        Ok(Some(Ok(line))) => line,
                    };

                    if line.trim().is_empty() {
                        continue;
                    }

                    let dispatcher = self.dispatcher.clone();
                    let response =
                        tokio::task::spawn_blocking(move || dispatcher.handle_line(&line))
                            .await
                            .map_err(|e| SalesError::Internal(e.to_string()))?;
                    let text = serde_json::to_string(&response)
                        .map_err(|e| SalesError::Protocol(e.to_string()))?;

                    if let Err(e) = lines.send(text).await {
                        tracing::warn!("RPC session {}: error sending response: {}", id, e);
                        break;
                    }
                }
                _ = shutdown_token.cancelled() => {
                    tracing::debug!("RPC session {} shutdown requested", id);
                    break;
                }
            }
        }

        tracing::debug!("RPC session {} closed", id);
        Ok(())
    }
}
