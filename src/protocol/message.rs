//! Protocol message types

use crate::protocol::constants::ER_ACCESS_DENIED_ERROR;
use crate::stmt::StatementBody;
use bytes::Bytes;
use serde_json::Value;

/// Client message (client → server)
#[derive(Debug, Clone)]
pub enum ClientMessage {
    /// Request the server's capability set
    CapabilitiesGet,

    /// Set capabilities (e.g. request a TLS upgrade)
    CapabilitiesSet {
        /// Capability name/value pairs
        capabilities: Vec<(String, Value)>,
    },

    /// Start the authentication handshake
    AuthenticateStart {
        /// Mechanism name (e.g. "MYSQL41")
        mechanism: String,
        /// Initial response data (mechanism-dependent, may be empty)
        auth_data: Vec<u8>,
    },

    /// Continue the authentication handshake with a challenge response
    AuthenticateContinue {
        /// Response to the server challenge
        auth_data: Vec<u8>,
    },

    /// Execute a statement ad hoc (full shape and bound values)
    StmtExecute {
        /// Statement body
        stmt: StatementBody,
    },

    /// Prepare a statement shape under a client-assigned id
    PreparePrepare {
        /// Client-local statement id
        stmt_id: u32,
        /// Statement shape (bound values omitted)
        stmt: StatementBody,
    },

    /// Execute a previously prepared statement with fresh bound values
    PrepareExecute {
        /// Client-local statement id
        stmt_id: u32,
        /// Bound argument values
        args: Vec<Value>,
    },

    /// Deallocate a prepared statement
    PrepareDeallocate {
        /// Client-local statement id
        stmt_id: u32,
    },

    /// Reset server-side session state
    SessionReset {
        /// Keep the underlying connection usable for a new session
        keep_open: bool,
    },

    /// Close the logical session
    SessionClose,

    /// Close the connection
    ConnectionClose,
}

/// Server message (server → client)
#[derive(Debug, Clone)]
pub enum ServerMessage {
    /// Capability set response
    Capabilities {
        /// Capability name/value pairs
        capabilities: Vec<(String, Value)>,
    },

    /// Authentication challenge
    AuthenticateContinue {
        /// Server challenge data
        auth_data: Vec<u8>,
    },

    /// Authentication finished successfully
    AuthenticateOk {
        /// Final mechanism data (may be empty)
        auth_data: Vec<u8>,
    },

    /// Generic acknowledgement
    Ok,

    /// Statement execution finished
    StmtExecuteOk,

    /// Column metadata (opaque to the session layer)
    Column(Bytes),

    /// Result row (opaque to the session layer)
    Row(Bytes),

    /// All rows of the current result set delivered
    FetchDone,

    /// Out-of-band notice (opaque to the session layer)
    Notice(Bytes),

    /// Server-reported error
    Error(ServerError),
}

/// Error severity as reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Recoverable error; the session stays usable
    Error,
    /// Fatal error; the server will close the connection
    Fatal,
}

/// Server-reported error frame
#[derive(Debug, Clone)]
pub struct ServerError {
    /// Severity
    pub severity: Severity,
    /// MySQL error code
    pub code: u16,
    /// SQLSTATE string
    pub sql_state: String,
    /// Human-readable message
    pub message: String,
}

impl ServerError {
    /// Whether the server will tear down the connection after this error
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl From<ServerError> for crate::Error {
    fn from(err: ServerError) -> Self {
        if err.code == ER_ACCESS_DENIED_ERROR {
            crate::Error::AccessDenied(err.message)
        } else {
            crate::Error::Server {
                code: err.code,
                sql_state: err.sql_state,
                message: err.message,
            }
        }
    }
}
