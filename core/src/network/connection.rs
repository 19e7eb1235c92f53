//! Length-prefixed framing over a TCP stream
//!
//! Every frame is a 4-byte big-endian length followed by that many bytes of
//! JSON. The same type serves both ends: servers read [`ClientMessage`]s and
//! send [`ServerMessage`]s, clients do the opposite.

use crate::network::protocol::{ClientMessage, MAX_MESSAGE_SIZE, ServerMessage};
use crate::{SalesError, SalesResult};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Represents a network connection
pub struct NetworkConnection {
    stream: TcpStream,
    read_buffer: Vec<u8>,
    write_buffer: Vec<u8>,
    read_timeout: Duration,
}

impl NetworkConnection {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            read_buffer: vec![0; 8192],
            write_buffer: Vec::with_capacity(8192),
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// How long to wait for the next frame before giving up with
    /// [`SalesError::Timeout`].
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Read a message from the connection. `None` means the peer closed it.
    pub async fn read_message(&mut self) -> SalesResult<Option<ClientMessage>> {
        let Some(len) = self.read_frame().await? else {
            return Ok(None);
        };

        ClientMessage::from_bytes(&self.read_buffer[..len])
            .map(Some)
            .map_err(SalesError::Protocol)
    }

    /// Send a response through the connection. Oversized responses go out
    /// as an error frame instead.
    pub async fn send_response(&mut self, response: &ServerMessage) -> SalesResult<()> {
        let bytes = response.to_frame_bytes().map_err(SalesError::Protocol)?;
        self.write_frame(&bytes).await
    }

    /// Send a message through the connection (for client use)
    pub async fn send_message(&mut self, message: &ClientMessage) -> SalesResult<()> {
        let bytes = message.to_bytes().map_err(SalesError::Protocol)?;
        self.write_frame(&bytes).await
    }

    /// Read a response from the connection (for client use)
    pub async fn read_response(&mut self) -> SalesResult<Option<ServerMessage>> {
        let Some(len) = self.read_frame().await? else {
            return Ok(None);
        };

        ServerMessage::from_bytes(&self.read_buffer[..len])
            .map(Some)
            .map_err(SalesError::Protocol)
    }

    /// Fill the read buffer with the next frame and return its length.
    async fn read_frame(&mut self) -> SalesResult<Option<usize>> {
        let mut len_bytes = [0u8; 4];
        match tokio::time::timeout(self.read_timeout, self.stream.read_exact(&mut len_bytes))
            .await
        {
            Ok(Ok(_)) => {}
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None); // Connection closed
            }
            Ok(Err(e)) => return Err(SalesError::Io(e)),
            Err(_) => return Err(SalesError::Timeout),
        }

        let frame_len = u32::from_be_bytes(len_bytes) as usize;
        if frame_len > MAX_MESSAGE_SIZE {
            return Err(SalesError::Protocol(format!(
                "Message too large: {} bytes",
                frame_len
            )));
        }

        if self.read_buffer.len() < frame_len {
            self.read_buffer.resize(frame_len, 0);
        }

        self.stream
            .read_exact(&mut self.read_buffer[..frame_len])
            .await?;

        Ok(Some(frame_len))
    }

    async fn write_frame(&mut self, payload: &[u8]) -> SalesResult<()> {
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(SalesError::Protocol(format!(
                "Message too large: {} bytes",
                payload.len()
            )));
        }

        self.write_buffer.clear();
        self.write_buffer.reserve(4 + payload.len());
        self.write_buffer
            .extend_from_slice(&(payload.len() as u32).to_be_bytes());
        self.write_buffer.extend_from_slice(payload);

        self.stream.write_all(&self.write_buffer).await?;
        self.stream.flush().await?;

        Ok(())
    }

    /// Close the connection gracefully
    pub async fn close(&mut self) -> SalesResult<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
