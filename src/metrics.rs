//! Metrics instrumentation
//!
//! Thin wrappers around the `metrics` facade so call sites stay one-liners.
//! All metric names are prefixed with `xsession_`.

/// Label values shared across metrics
pub mod labels {
    /// PLAIN authentication mechanism
    pub const MECHANISM_PLAIN: &str = "plain";
    /// MYSQL41 authentication mechanism
    pub const MECHANISM_MYSQL41: &str = "mysql41";
    /// SHA256_MEMORY authentication mechanism
    pub const MECHANISM_SHA256_MEMORY: &str = "sha256_memory";
}

/// Counter metrics
pub mod counters {
    /// Authentication handshake started
    pub fn auth_attempted(mechanism: &str) {
        metrics::counter!("xsession_auth_attempts_total", "mechanism" => mechanism.to_string())
            .increment(1);
    }

    /// Authentication handshake completed successfully
    pub fn auth_successful(mechanism: &str) {
        metrics::counter!("xsession_auth_success_total", "mechanism" => mechanism.to_string())
            .increment(1);
    }

    /// Authentication handshake failed
    pub fn auth_failed(mechanism: &str, reason: &'static str) {
        metrics::counter!(
            "xsession_auth_failures_total",
            "mechanism" => mechanism.to_string(),
            "reason" => reason
        )
        .increment(1);
    }

    /// Connect attempt to one endpoint failed
    pub fn endpoint_failure(reason: &'static str) {
        metrics::counter!("xsession_endpoint_failures_total", "reason" => reason).increment(1);
    }

    /// Session leased from the pool (outcome: "reused", "created", "rebuilt")
    pub fn pool_lease(outcome: &'static str) {
        metrics::counter!("xsession_pool_leases_total", "outcome" => outcome).increment(1);
    }

    /// Idle session discarded after exceeding the idle timeout
    pub fn pool_idle_evicted() {
        metrics::counter!("xsession_pool_idle_evictions_total").increment(1);
    }

    /// Caller timed out waiting for a pooled session
    pub fn pool_wait_timeout() {
        metrics::counter!("xsession_pool_wait_timeouts_total").increment(1);
    }

    /// Statement prepared on the server
    pub fn stmt_prepared() {
        metrics::counter!("xsession_stmt_prepared_total").increment(1);
    }

    /// Execution served by an existing prepared statement
    pub fn stmt_cache_hit() {
        metrics::counter!("xsession_stmt_cache_hits_total").increment(1);
    }

    /// Prepare rejected for a resource reason; session fell back to ad hoc
    pub fn stmt_degraded() {
        metrics::counter!("xsession_stmt_degraded_total").increment(1);
    }
}

/// Histogram metrics
pub mod histograms {
    /// Authentication handshake duration in milliseconds
    pub fn auth_duration(mechanism: &str, millis: u64) {
        metrics::histogram!(
            "xsession_auth_duration_ms",
            "mechanism" => mechanism.to_string()
        )
        .record(millis as f64);
    }

    /// Transport establishment duration in milliseconds
    pub fn connect_duration(millis: u64) {
        metrics::histogram!("xsession_connect_duration_ms").record(millis as f64);
    }

    /// Time a caller spent waiting in the pool queue, in milliseconds
    pub fn pool_wait_duration(millis: u64) {
        metrics::histogram!("xsession_pool_wait_duration_ms").record(millis as f64);
    }
}
