//! Error types for the session layer
//!
//! Every variant carries a stable machine-readable code (see [`Error::code`])
//! next to its human-readable message. Server-reported errors are passed
//! through unmodified with their original numeric code and SQLSTATE.

use thiserror::Error;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Session layer errors
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration value or combination (raised before any I/O)
    #[error("configuration error: {0}")]
    Config(String),

    /// Some endpoints carry a priority and some do not
    #[error("you must either assign no priority to any of the endpoints or give a priority for every endpoint")]
    MixedEndpointPriority,

    /// Endpoint priority outside the 0-100 range
    #[error("endpoint priority must be between 0 and 100, got {0}")]
    BadEndpointPriority(i64),

    /// A local socket endpoint was given a failover priority
    #[error("a priority cannot be assigned to a local socket endpoint")]
    LocalSocketWithPriority,

    /// DNS SRV lookup combined with an explicit port
    #[error("specifying a port number with DNS SRV lookup is not allowed")]
    SrvLookupWithPort,

    /// DNS SRV lookup combined with a local socket path
    #[error("using Unix domain sockets with DNS SRV lookup is not allowed")]
    SrvLookupWithSocket,

    /// DNS SRV lookup combined with multiple explicit endpoints
    #[error("specifying multiple hostnames with DNS SRV lookup is not allowed")]
    SrvLookupWithMultipleHosts,

    /// Clear-text authentication requested over a channel that is not confidential
    #[error("PLAIN authentication is not allowed over an unencrypted channel")]
    PlainOverInsecureChannel,

    /// Failure to reach a single endpoint (refusal, reset, unreachable)
    #[error("connection error: {0}")]
    Connection(String),

    /// Single-endpoint connect attempt timed out
    #[error("Connection attempt to the server was aborted. Timeout of {timeout_ms} ms was exceeded.")]
    ConnectTimeout {
        /// Configured connect timeout in milliseconds
        timeout_ms: u64,
    },

    /// Every candidate endpoint failed or timed out
    #[error("All server connection attempts were aborted. Timeout of {timeout_ms} ms was exceeded for each of the {endpoints} selected servers.")]
    AllEndpointsExhausted {
        /// Number of endpoints tried
        endpoints: usize,
        /// Per-endpoint connect timeout in milliseconds
        timeout_ms: u64,
    },

    /// Handshake failure (wrong credentials, unsupported mechanism, missing cached proof)
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Server rejected the credentials for the given principal
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Pool saturated and the caller's queue timeout elapsed
    #[error("Could not retrieve a connection from the pool. Timeout of {timeout_ms} ms was exceeded.")]
    PoolTimeout {
        /// Configured queue timeout in milliseconds
        timeout_ms: u64,
    },

    /// Pool has been closed; no further sessions can be leased
    #[error("the connection pool has been closed")]
    PoolClosed,

    /// Invalid session state transition
    #[error("invalid state transition: expected {expected}, got {actual}")]
    InvalidState {
        /// Description of the expected state
        expected: String,
        /// The actual state encountered
        actual: String,
    },

    /// Session already has a request in flight
    #[error("session is busy: {0}")]
    SessionBusy(String),

    /// Connection closed unexpectedly
    #[error("connection closed unexpectedly")]
    ConnectionClosed,

    /// Protocol violation (unexpected or malformed frame)
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Error reported by the server, passed through unmodified
    #[error("server error {code} ({sql_state}): {message}")]
    Server {
        /// MySQL error code
        code: u16,
        /// SQLSTATE string
        sql_state: String,
        /// Server-provided message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "ER_DEVAPI_BAD_CONNECTION_OPTION",
            Error::MixedEndpointPriority => "ER_DEVAPI_MIXED_CONNECTION_ENDPOINT_PRIORITY",
            Error::BadEndpointPriority(_) => "ER_DEVAPI_BAD_CONNECTION_ENDPOINT_PRIORITY_RANGE",
            Error::LocalSocketWithPriority => "ER_DEVAPI_LOCAL_SOCKET_WITH_PRIORITY",
            Error::SrvLookupWithPort => "ER_DEVAPI_SRV_LOOKUP_NO_PORT",
            Error::SrvLookupWithSocket => "ER_DEVAPI_SRV_LOOKUP_NO_UNIX_SOCKET",
            Error::SrvLookupWithMultipleHosts => "ER_DEVAPI_SRV_LOOKUP_NO_MULTIPLE_HOSTS",
            Error::PlainOverInsecureChannel => "ER_DEVAPI_PLAIN_AUTH_UNSECURE_CHANNEL",
            Error::Connection(_) => "ER_DEVAPI_CONNECTION_ERROR",
            Error::ConnectTimeout { .. } => "ER_DEVAPI_CONNECTION_TIMEOUT",
            Error::AllEndpointsExhausted { .. } => "ER_DEVAPI_MULTI_HOST_CONNECTION_TIMEOUT",
            Error::Authentication(_) => "ER_DEVAPI_AUTH_ERROR",
            Error::AccessDenied(_) => "ER_ACCESS_DENIED_ERROR",
            Error::PoolTimeout { .. } => "ER_DEVAPI_POOL_QUEUE_TIMEOUT",
            Error::PoolClosed => "ER_DEVAPI_POOL_CLOSED",
            Error::InvalidState { .. } => "ER_DEVAPI_INVALID_SESSION_STATE",
            Error::SessionBusy(_) => "ER_DEVAPI_SESSION_BUSY",
            Error::ConnectionClosed => "ER_DEVAPI_CONNECTION_CLOSED",
            Error::Protocol(_) => "ER_X_BAD_MESSAGE",
            Error::Server { .. } => "ER_SERVER_ERROR",
            Error::Io(_) => "ER_IO_ERROR",
        }
    }

    /// Whether this error indicates the transport is no longer usable
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConnectionClosed | Error::Io(_) | Error::Connection(_)
        )
    }
}
