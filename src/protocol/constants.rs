//! Protocol constants

/// Default X Protocol port
pub const DEFAULT_PORT: u16 = 33060;

/// Server error code: access denied for the given principal
pub const ER_ACCESS_DENIED_ERROR: u16 = 1045;

/// Server error code: no more prepared statements can be allocated
pub const ER_MAX_PREPARED_STMT_COUNT_REACHED: u16 = 1461;

/// Capability name used to request a TLS upgrade
pub const CAP_TLS: &str = "tls";

/// Capability name listing the server's authentication mechanisms
pub const CAP_AUTH_MECHANISMS: &str = "authentication.mechanisms";
