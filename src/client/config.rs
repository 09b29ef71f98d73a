//! Session configuration

use crate::auth::{AuthMechanism, Credentials};
use crate::connection::{SslMode, TlsConfig};
use crate::endpoint::{Endpoint, EndpointSet};
use crate::pool::PoolingConfig;
use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_RECHECK_INTERVAL: Duration = Duration::from_secs(20);

/// Session configuration
///
/// Built via [`SessionConfig::builder`] or parsed from a connection string
/// with [`SessionConfig::parse`]. Construction validates the endpoint list
/// (priority rules, DNS SRV restrictions) before any I/O happens.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Candidate endpoints in configuration order
    pub endpoints: Vec<Endpoint>,
    /// Username
    pub user: String,
    /// Password
    pub password: String,
    /// Default schema
    pub schema: Option<String>,
    /// Per-endpoint connect timeout (default: 10 seconds)
    pub connect_timeout: Duration,
    /// Explicit authentication mechanism; `None` = infer from the channel
    pub auth: Option<AuthMechanism>,
    /// TLS mode (default: `REQUIRED`)
    pub ssl_mode: SslMode,
    /// TLS configuration; built with defaults on demand when `None`
    pub tls: Option<TlsConfig>,
    /// Whether the single host is a DNS SRV service name
    pub dns_srv: bool,
    /// How long a failed endpoint stays deprioritized (default: 20 seconds)
    pub recheck_interval: Duration,
    /// Pooling behavior
    pub pooling: PoolingConfig,
}

impl SessionConfig {
    /// Create a configuration builder
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Parse a `mysqlx://` connection string
    ///
    /// See [`crate::client::SessionConfig::builder`] for the programmatic
    /// equivalent. Supported forms include single hosts, bracketed
    /// multi-endpoint lists with optional priorities, percent-encoded local
    /// socket paths, and `mysqlx+srv://` service names.
    pub fn parse(uri: &str) -> Result<Self> {
        super::connection_string::parse(uri)
    }

    /// Validate endpoint and SRV rules without touching the network
    pub fn validate(&self) -> Result<()> {
        if self.dns_srv {
            if self.endpoints.len() > 1 {
                return Err(Error::SrvLookupWithMultipleHosts);
            }
            for endpoint in &self.endpoints {
                if endpoint.address.is_socket() {
                    return Err(Error::SrvLookupWithSocket);
                }
                if endpoint.address.has_explicit_port() {
                    return Err(Error::SrvLookupWithPort);
                }
            }
        }

        // Priority and tier rules
        EndpointSet::new(self.endpoints.clone(), self.recheck_interval)?;
        Ok(())
    }

    pub(crate) fn credentials(&self) -> Credentials {
        let mut credentials = Credentials::new(self.user.clone(), self.password.clone());
        if let Some(schema) = &self.schema {
            credentials = credentials.with_schema(schema.clone());
        }
        credentials
    }
}

/// Builder for [`SessionConfig`]
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    endpoints: Vec<Endpoint>,
    user: Option<String>,
    password: Option<String>,
    schema: Option<String>,
    connect_timeout: Option<Duration>,
    auth: Option<AuthMechanism>,
    ssl_mode: Option<SslMode>,
    tls: Option<TlsConfig>,
    dns_srv: bool,
    recheck_interval: Option<Duration>,
    pooling: Option<PoolingConfig>,
}

impl SessionConfigBuilder {
    /// Add a TCP endpoint on the default port
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.endpoints.push(Endpoint::tcp(host));
        self
    }

    /// Add a TCP endpoint with an explicit port
    pub fn host_with_port(mut self, host: impl Into<String>, port: u16) -> Self {
        self.endpoints.push(Endpoint::tcp_with_port(host, port));
        self
    }

    /// Add a local socket endpoint
    pub fn socket(mut self, path: impl Into<PathBuf>) -> Self {
        self.endpoints.push(Endpoint::socket(path));
        self
    }

    /// Add a pre-built endpoint (e.g. with a priority)
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    /// Set the username (default: the current OS user)
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the default schema
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Set the per-endpoint connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Request an explicit authentication mechanism
    pub fn auth(mut self, mechanism: AuthMechanism) -> Self {
        self.auth = Some(mechanism);
        self
    }

    /// Set the TLS mode
    pub fn ssl_mode(mut self, mode: SslMode) -> Self {
        self.ssl_mode = Some(mode);
        self
    }

    /// Provide a TLS configuration (CA, CRL, versions)
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Treat the configured host as a DNS SRV service name
    pub fn dns_srv(mut self, enabled: bool) -> Self {
        self.dns_srv = enabled;
        self
    }

    /// Set how long a failed endpoint stays deprioritized
    pub fn recheck_interval(mut self, interval: Duration) -> Self {
        self.recheck_interval = Some(interval);
        self
    }

    /// Set the pooling configuration
    pub fn pooling(mut self, pooling: PoolingConfig) -> Self {
        self.pooling = Some(pooling);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<SessionConfig> {
        let endpoints = if self.endpoints.is_empty() {
            vec![Endpoint::tcp("localhost")]
        } else {
            self.endpoints
        };

        let config = SessionConfig {
            endpoints,
            user: self.user.unwrap_or_else(whoami::username),
            password: self.password.unwrap_or_default(),
            schema: self.schema,
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            auth: self.auth,
            ssl_mode: self.ssl_mode.unwrap_or_default(),
            tls: self.tls,
            dns_srv: self.dns_srv,
            recheck_interval: self.recheck_interval.unwrap_or(DEFAULT_RECHECK_INTERVAL),
            pooling: self.pooling.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::builder().build().unwrap();
        assert_eq!(config.endpoints.len(), 1);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.ssl_mode, SslMode::Required);
        assert!(config.auth.is_none());
        assert!(config.pooling.enabled);
        assert!(config.pooling.retain_prepared_statements);
    }

    #[test]
    fn test_mixed_priorities_rejected_at_build() {
        let result = SessionConfig::builder()
            .endpoint(Endpoint::tcp("a").with_priority(50))
            .host("b")
            .build();
        assert!(matches!(result, Err(Error::MixedEndpointPriority)));
    }

    #[test]
    fn test_srv_with_explicit_port_rejected() {
        let result = SessionConfig::builder()
            .host_with_port("db.example.com", 33060)
            .dns_srv(true)
            .build();
        assert!(matches!(result, Err(Error::SrvLookupWithPort)));
    }

    #[test]
    fn test_srv_with_socket_rejected() {
        let result = SessionConfig::builder()
            .socket("/tmp/mysqlx.sock")
            .dns_srv(true)
            .build();
        assert!(matches!(result, Err(Error::SrvLookupWithSocket)));
    }

    #[test]
    fn test_srv_with_multiple_hosts_rejected() {
        let result = SessionConfig::builder()
            .host("a")
            .host("b")
            .dns_srv(true)
            .build();
        assert!(matches!(result, Err(Error::SrvLookupWithMultipleHosts)));
    }

    #[test]
    fn test_srv_with_single_plain_host_accepted() {
        let config = SessionConfig::builder()
            .host("db.example.com")
            .dns_srv(true)
            .build()
            .unwrap();
        assert!(config.dns_srv);
    }

    #[test]
    fn test_credentials_carry_schema() {
        let config = SessionConfig::builder()
            .user("app")
            .password("secret")
            .schema("mydb")
            .build()
            .unwrap();
        let credentials = config.credentials();
        assert_eq!(credentials.user, "app");
        assert_eq!(credentials.schema.as_deref(), Some("mydb"));
    }
}
