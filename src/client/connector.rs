//! Production connector: endpoints → transport → TLS → handshake → session

use crate::auth::{CredentialResponder, Negotiator, ScrambleResponder};
use crate::client::SessionConfig;
use crate::connection::{FrameChannel, SslMode, TlsConfig};
use crate::endpoint::{EndpointSet, Establisher};
use crate::pool::Connector;
use crate::protocol::MessageCodec;
use crate::session::Session;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Builds sessions by walking the endpoint trial sequence, upgrading to TLS
/// when configured, and negotiating authentication.
pub(crate) struct EndpointConnector {
    config: SessionConfig,
    /// Shared across attempts so endpoint availability state accumulates
    endpoints: Mutex<EndpointSet>,
    establisher: Establisher,
    tls: Option<TlsConfig>,
    codec: Arc<dyn MessageCodec>,
    responder: Arc<dyn CredentialResponder>,
}

impl EndpointConnector {
    pub(crate) fn new(config: SessionConfig, codec: Arc<dyn MessageCodec>) -> Result<Self> {
        config.validate()?;

        let endpoints = EndpointSet::new(config.endpoints.clone(), config.recheck_interval)?;
        let establisher = Establisher::new(config.connect_timeout);

        let tls = match config.ssl_mode {
            SslMode::Disabled => None,
            _ => Some(match &config.tls {
                Some(tls) => tls.clone(),
                None => TlsConfig::builder().build()?,
            }),
        };

        Ok(Self {
            config,
            endpoints: Mutex::new(endpoints),
            establisher,
            tls,
            codec,
            responder: Arc::new(ScrambleResponder),
        })
    }
}

#[async_trait]
impl Connector for EndpointConnector {
    async fn connect(&self) -> Result<Session> {
        let (transport, endpoint) = {
            let mut endpoints = self.endpoints.lock().await;
            self.establisher.connect(&mut endpoints).await?
        };

        let mut channel = FrameChannel::new(transport, self.codec.clone());

        // Local sockets are confidential channels already; TLS applies to
        // TCP endpoints only.
        if let (Some(tls), Some(host)) = (&self.tls, endpoint.address.host()) {
            channel.negotiate_tls(tls, host).await?;
        }

        let credentials = self.config.credentials();
        let outcome = Negotiator::new(self.responder.as_ref())
            .authenticate(&mut channel, &credentials, self.config.auth)
            .await?;

        Ok(Session::new(Box::new(channel), outcome.mechanism))
    }
}
