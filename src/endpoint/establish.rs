//! Connection establishment over a trial sequence

use crate::connection::Transport;
use crate::endpoint::{Endpoint, EndpointSet};
use crate::{Error, Result};
use std::time::{Duration, Instant};

/// Tries candidate endpoints in trial-sequence order.
///
/// The connect timeout is re-armed for every endpoint, so the worst-case
/// wait scales with the number of candidates.
#[derive(Debug, Clone)]
pub struct Establisher {
    connect_timeout: Duration,
}

impl Establisher {
    /// Create an establisher with the given per-endpoint connect timeout
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    /// The per-endpoint connect timeout
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Open a transport to the first reachable endpoint of a fresh trial
    /// sequence.
    ///
    /// Failed endpoints are marked unavailable on the set so later attempts
    /// deprioritize them. On exhaustion, a single-endpoint set surfaces the
    /// recorded failure directly; a multi-endpoint set fails with an
    /// aggregate error naming the timeout and the endpoint count.
    pub async fn connect(&self, endpoints: &mut EndpointSet) -> Result<(Transport, Endpoint)> {
        let sequence = endpoints.trial_sequence();
        let timeout_ms = self.connect_timeout.as_millis() as u64;
        let mut last_failure = None;

        for endpoint in &sequence {
            let started = Instant::now();
            tracing::debug!(endpoint = %endpoint.address, "trying endpoint");

            match tokio::time::timeout(self.connect_timeout, Transport::open(&endpoint.address))
                .await
            {
                Ok(Ok(transport)) => {
                    endpoints.mark_available(&endpoint.address);
                    crate::metrics::histograms::connect_duration(
                        started.elapsed().as_millis() as u64
                    );
                    tracing::info!(endpoint = %endpoint.address, "connected");
                    return Ok((transport, endpoint.clone()));
                }
                Ok(Err(e)) => {
                    tracing::warn!(endpoint = %endpoint.address, error = %e, "endpoint unreachable");
                    crate::metrics::counters::endpoint_failure("refused");
                    endpoints.mark_unavailable(&endpoint.address);
                    last_failure = Some(e);
                }
                Err(_) => {
                    tracing::warn!(
                        endpoint = %endpoint.address,
                        timeout_ms,
                        "connect attempt timed out"
                    );
                    crate::metrics::counters::endpoint_failure("timeout");
                    endpoints.mark_unavailable(&endpoint.address);
                    last_failure = Some(Error::ConnectTimeout { timeout_ms });
                }
            }
        }

        match sequence.len() {
            0 => Err(Error::Config("no endpoints to try".into())),
            1 => Err(last_failure.unwrap_or(Error::ConnectTimeout { timeout_ms })),
            n => Err(Error::AllEndpointsExhausted {
                endpoints: n,
                timeout_ms,
            }),
        }
    }
}
