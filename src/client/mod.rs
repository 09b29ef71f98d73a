//! Top-level client surface
//!
//! A [`Client`] validates its configuration up front and hands out sessions,
//! pooled or standalone depending on [`PoolingConfig::enabled`].

mod config;
mod connection_string;
mod connector;
mod xclient;

pub use crate::pool::PoolingConfig;
pub use config::{SessionConfig, SessionConfigBuilder};
pub use xclient::{get_session, Client, PooledSession};

pub(crate) use connector::EndpointConnector;
