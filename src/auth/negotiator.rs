//! Handshake negotiation over an established channel

use crate::auth::{AuthMechanism, CredentialResponder, Credentials};
use crate::connection::Channel;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::{Error, Result};
use std::time::Instant;
use tracing::Instrument;

/// Outcome of a successful handshake
#[derive(Debug, Clone, Copy)]
pub struct AuthOutcome {
    /// The mechanism that authenticated the session
    pub mechanism: AuthMechanism,
}

/// Runs the authentication handshake.
///
/// Handshake failures are terminal for the endpoint: the server was
/// reachable, so retrying another endpoint with the same credentials would
/// only repeat the failure.
pub struct Negotiator<'a> {
    responder: &'a dyn CredentialResponder,
}

impl<'a> Negotiator<'a> {
    /// Create a negotiator backed by the given responder
    pub fn new(responder: &'a dyn CredentialResponder) -> Self {
        Self { responder }
    }

    /// Negotiate a mechanism and run the challenge/response exchange.
    ///
    /// An explicitly requested mechanism overrides inference. Requesting
    /// `PLAIN` over a non-confidential channel is rejected before any bytes
    /// are sent.
    pub async fn authenticate(
        &self,
        channel: &mut dyn Channel,
        credentials: &Credentials,
        explicit: Option<AuthMechanism>,
    ) -> Result<AuthOutcome> {
        let confidential = channel.is_secure();
        let mechanism = match explicit {
            Some(mechanism) => {
                if mechanism == AuthMechanism::Plain && !confidential {
                    return Err(Error::PlainOverInsecureChannel);
                }
                mechanism
            }
            None => AuthMechanism::infer(confidential),
        };

        async {
            let label = mechanism.metric_label();
            let started = Instant::now();
            crate::metrics::counters::auth_attempted(label);

            // PLAIN carries the whole identity up front; the challenge/response
            // mechanisms start empty and answer the server nonce.
            let initial = match mechanism {
                AuthMechanism::Plain => self.responder.respond(mechanism, b"", credentials)?,
                _ => Vec::new(),
            };

            channel
                .send(&ClientMessage::AuthenticateStart {
                    mechanism: mechanism.as_str().to_string(),
                    auth_data: initial,
                })
                .await?;

            loop {
                match channel.recv().await? {
                    ServerMessage::AuthenticateContinue { auth_data } => {
                        let response =
                            self.responder.respond(mechanism, &auth_data, credentials)?;
                        channel
                            .send(&ClientMessage::AuthenticateContinue {
                                auth_data: response,
                            })
                            .await?;
                    }
                    ServerMessage::AuthenticateOk { .. } => {
                        crate::metrics::counters::auth_successful(label);
                        crate::metrics::histograms::auth_duration(
                            label,
                            started.elapsed().as_millis() as u64,
                        );
                        tracing::debug!("authentication successful");
                        return Ok(AuthOutcome { mechanism });
                    }
                    ServerMessage::Notice(_) => {}
                    ServerMessage::Error(err) => {
                        crate::metrics::counters::auth_failed(label, "server_error");
                        tracing::warn!(error = %err, "authentication rejected by server");
                        return Err(err.into());
                    }
                    other => {
                        crate::metrics::counters::auth_failed(label, "protocol_error");
                        return Err(Error::Protocol(format!(
                            "unexpected message during authentication: {:?}",
                            other
                        )));
                    }
                }
            }
        }
        .instrument(tracing::info_span!(
            "authenticate",
            mechanism = %mechanism,
            user = %credentials.user
        ))
        .await
    }
}
