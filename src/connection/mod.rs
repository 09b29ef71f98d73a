//! Connection management
//!
//! This module handles:
//! * Transport abstraction (TCP with optional TLS vs Unix socket)
//! * TLS configuration and the in-band capability-based TLS upgrade
//! * Session state machine enforcement
//! * The frame channel a session exchanges messages over

mod channel;
mod state;
mod tls;
mod transport;

pub use channel::{Channel, FrameChannel};
pub use state::SessionState;
pub use tls::{parse_server_name, SslMode, TlsConfig, TlsConfigBuilder, TlsVersion};
pub use transport::Transport;
