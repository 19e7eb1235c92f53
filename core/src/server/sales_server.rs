//! Sales query server
//!
//! Owns both listeners and hands every accepted socket to the session
//! manager for its transport. Both transports share one [`QueryEngine`].

use crate::config::ServerConfig;
use crate::executor::QueryEngine;
use crate::network::{ProtocolHandler, RpcDispatcher};
use crate::server::{ConnectionManager, RpcSessionManager};
use crate::SalesResult;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

pub struct SalesServer {
    framed_listener: TcpListener,
    rpc_listener: TcpListener,
    connection_manager: Arc<ConnectionManager>,
    rpc_sessions: Arc<RpcSessionManager>,
    shutdown_token: CancellationToken,
}

impl SalesServer {
    /// Bind both listeners. Port 0 picks a free port; see
    /// [`framed_addr`](Self::framed_addr) and [`rpc_addr`](Self::rpc_addr).
    pub async fn bind(config: &ServerConfig, engine: Arc<QueryEngine>) -> SalesResult<Self> {
        let framed_listener = TcpListener::bind(config.framed_addr()).await?;
        let rpc_listener = TcpListener::bind(config.rpc_addr()).await?;

        let connection_manager = Arc::new(ConnectionManager::new(
            config.max_connections,
            config.idle_timeout(),
            ProtocolHandler::new(Arc::clone(&engine)),
        ));
        let rpc_sessions = Arc::new(RpcSessionManager::new(
            config.max_connections,
            config.idle_timeout(),
            RpcDispatcher::new(engine),
        ));

        Ok(Self {
            framed_listener,
            rpc_listener,
            connection_manager,
            rpc_sessions,
            shutdown_token: CancellationToken::new(),
        })
    }

    pub fn framed_addr(&self) -> SalesResult<SocketAddr> {
        Ok(self.framed_listener.local_addr()?)
    }

    pub fn rpc_addr(&self) -> SalesResult<SocketAddr> {
        Ok(self.rpc_listener.local_addr()?)
    }

    /// Get shutdown token for external shutdown coordination
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn shutdown(&self) {
        tracing::info!("Shutting down sales server...");
        self.shutdown_token.cancel();
    }

    /// Accept connections on both transports until shutdown.
    pub async fn run(self) -> SalesResult<()> {
        let Self {
            framed_listener,
            rpc_listener,
            connection_manager,
            rpc_sessions,
            shutdown_token,
        } = self;

        let framed = accept_connections(
            framed_listener,
            "framed",
            shutdown_token.clone(),
            move |socket, token| {
                let manager = Arc::clone(&connection_manager);
                async move { manager.handle_connection(socket, token).await }
            },
        );
        let rpc = accept_connections(
            rpc_listener,
            "json-rpc",
            shutdown_token.clone(),
            move |socket, token| {
                let sessions = Arc::clone(&rpc_sessions);
                async move { sessions.handle_connection(socket, token).await }
            },
        );

        tokio::join!(framed, rpc);
        Ok(())
    }
}

async fn accept_connections<F, Fut>(
    listener: TcpListener,
    transport: &'static str,
    shutdown_token: CancellationToken,
    handle: F,
) where
    F: Fn(TcpStream, CancellationToken) -> Fut,
    Fut: Future<Output = SalesResult<()>> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Listening for {} connections on {}", transport, addr);
    }

    loop {
        tokio::select! {
            // Handle new connections
            result = listener.accept() => {
                match result {
                    Ok((socket, addr)) => {
                        tracing::debug!("New {} connection from: {}", transport, addr);
                        let session = handle(socket, shutdown_token.child_token());
                        tokio::spawn(async move {
                            if let Err(e) = session.await {
                                tracing::warn!(
                                    "Error handling {} connection from {}: {}",
                                    transport,
                                    addr,
                                    e
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!("Failed to accept {} connection: {}", transport, e);
                    }
                }
            }
            // Handle shutdown signal
            _ = shutdown_token.cancelled() => {
                tracing::info!("Stopped accepting {} connections", transport);
                break;
            }
        }
    }
}
