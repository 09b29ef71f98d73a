//! Frame channel: one message in, one message out
//!
//! A [`FrameChannel`] couples a [`Transport`] with a [`MessageCodec`] and
//! exposes the strict request/response exchange the session layer relies on.
//! The [`Channel`] trait is the seam tests and alternative wire layers plug
//! into.

use crate::connection::{TlsConfig, Transport};
use crate::protocol::constants::CAP_TLS;
use crate::protocol::{ClientMessage, MessageCodec, ServerMessage};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::BytesMut;
use serde_json::Value;
use std::sync::Arc;

/// A bidirectional stream of protocol messages.
///
/// A channel never has more than one request in flight: callers must `send`
/// and then `recv` the full response before sending again.
#[async_trait]
pub trait Channel: Send {
    /// Send one client message
    async fn send(&mut self, msg: &ClientMessage) -> Result<()>;

    /// Receive one server message
    async fn recv(&mut self) -> Result<ServerMessage>;

    /// Shut the underlying byte stream down
    async fn shutdown(&mut self) -> Result<()>;

    /// Whether the channel is confidential (TLS or local socket)
    fn is_secure(&self) -> bool;
}

/// Channel over a real transport, framing via a [`MessageCodec`]
pub struct FrameChannel {
    transport: Option<Transport>,
    codec: Arc<dyn MessageCodec>,
    read_buf: BytesMut,
}

impl FrameChannel {
    /// Create a channel from an open transport
    pub fn new(transport: Transport, codec: Arc<dyn MessageCodec>) -> Self {
        Self {
            transport: Some(transport),
            codec,
            read_buf: BytesMut::with_capacity(8192),
        }
    }

    fn transport_mut(&mut self) -> Result<&mut Transport> {
        self.transport.as_mut().ok_or(Error::ConnectionClosed)
    }

    /// Negotiate a TLS upgrade with the server.
    ///
    /// Requests the `tls` capability and, once the server acknowledges it,
    /// upgrades the transport in place with a rustls handshake.
    pub async fn negotiate_tls(&mut self, tls_config: &TlsConfig, hostname: &str) -> Result<()> {
        let request = ClientMessage::CapabilitiesSet {
            capabilities: vec![(CAP_TLS.to_string(), Value::Bool(true))],
        };
        self.send(&request).await?;

        match self.recv().await? {
            ServerMessage::Ok => {}
            ServerMessage::Error(err) => {
                return Err(Error::Config(format!(
                    "server rejected TLS upgrade: {}",
                    err
                )));
            }
            other => {
                return Err(Error::Protocol(format!(
                    "unexpected response to TLS capability request: {:?}",
                    other
                )));
            }
        }

        tracing::debug!("server accepted TLS, upgrading connection");
        let transport = self.transport.take().ok_or(Error::ConnectionClosed)?;
        self.transport = Some(transport.upgrade_to_tls(tls_config, hostname).await?);
        tracing::info!("TLS connection established");
        Ok(())
    }
}

#[async_trait]
impl Channel for FrameChannel {
    async fn send(&mut self, msg: &ClientMessage) -> Result<()> {
        let mut buf = BytesMut::new();
        self.codec.encode(msg, &mut buf)?;
        let transport = self.transport_mut()?;
        transport.write_all(&buf).await?;
        transport.flush().await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<ServerMessage> {
        loop {
            if let Some(msg) = self.codec.decode(&mut self.read_buf)? {
                return Ok(msg);
            }

            // Need more data
            let read_buf = &mut self.read_buf;
            let transport = self.transport.as_mut().ok_or(Error::ConnectionClosed)?;
            let n = transport.read_buf(read_buf).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
    }

    async fn shutdown(&mut self) -> Result<()> {
        if let Some(transport) = self.transport.as_mut() {
            transport.shutdown().await?;
        }
        self.transport = None;
        Ok(())
    }

    fn is_secure(&self) -> bool {
        self.transport.as_ref().is_some_and(Transport::is_secure)
    }
}
