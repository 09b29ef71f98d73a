//! TLS configuration and support for secure connections.
//!
//! TLS is negotiated in-band: the client requests the `tls` capability and
//! then performs the rustls handshake over the same TCP stream. This module
//! only builds the rustls client configuration; the upgrade itself lives on
//! [`crate::connection::Transport`].

use crate::{Error, Result};
use rustls::ClientConfig;
use rustls::RootCertStore;
use rustls_pemfile::Item;
use std::fs;
use std::sync::Arc;

/// TLS connection mode matching the `ssl-mode` connection option.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SslMode {
    /// No TLS (plaintext connection)
    Disabled,
    /// TLS required, but server certificate is not verified
    #[default]
    Required,
    /// TLS required, server certificate must be signed by a trusted CA
    VerifyCa,
    /// TLS required, certificate must be trusted and hostname must match
    VerifyIdentity,
}

impl SslMode {
    /// Whether this mode requires certificate verification (CA or identity)
    pub fn requires_verification(&self) -> bool {
        matches!(self, Self::VerifyCa | Self::VerifyIdentity)
    }
}

impl std::fmt::Display for SslMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "DISABLED"),
            Self::Required => write!(f, "REQUIRED"),
            Self::VerifyCa => write!(f, "VERIFY_CA"),
            Self::VerifyIdentity => write!(f, "VERIFY_IDENTITY"),
        }
    }
}

impl std::str::FromStr for SslMode {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DISABLED" => Ok(Self::Disabled),
            "REQUIRED" => Ok(Self::Required),
            "VERIFY_CA" => Ok(Self::VerifyCa),
            "VERIFY_IDENTITY" => Ok(Self::VerifyIdentity),
            _ => Err(Error::Config(format!(
                "invalid ssl-mode '{}': expected DISABLED, REQUIRED, VERIFY_CA, or VERIFY_IDENTITY",
                s
            ))),
        }
    }
}

/// TLS protocol version restriction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsVersion {
    /// TLS 1.2
    Tls12,
    /// TLS 1.3
    Tls13,
}

impl TlsVersion {
    fn supported(&self) -> &'static rustls::SupportedProtocolVersion {
        match self {
            Self::Tls12 => &rustls::version::TLS12,
            Self::Tls13 => &rustls::version::TLS13,
        }
    }
}

impl std::fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tls12 => write!(f, "TLSv1.2"),
            Self::Tls13 => write!(f, "TLSv1.3"),
        }
    }
}

impl std::str::FromStr for TlsVersion {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "TLSv1.2" => Ok(Self::Tls12),
            "TLSv1.3" => Ok(Self::Tls13),
            _ => Err(Error::Config(format!(
                "invalid TLS version '{}': expected TLSv1.2 or TLSv1.3",
                s
            ))),
        }
    }
}

/// TLS configuration for secure connections.
///
/// By default, server certificates are validated against system root
/// certificates (falling back to the bundled webpki roots when none can be
/// loaded).
///
/// # Examples
///
/// ```ignore
/// use xsession::connection::TlsConfig;
///
/// // With system root certificates (production)
/// let tls = TlsConfig::builder()
///     .verify_hostname(true)
///     .build()?;
///
/// // With custom CA certificate and revocation list
/// let tls = TlsConfig::builder()
///     .ca_cert_path("/path/to/ca.pem")
///     .ca_crl_path("/path/to/crl.pem")
///     .build()?;
/// ```
#[derive(Clone)]
pub struct TlsConfig {
    /// Path to CA certificate file (None = use system roots)
    ca_cert_path: Option<String>,
    /// Path to a certificate revocation list file
    ca_crl_path: Option<String>,
    /// Allowed TLS protocol versions (empty = all supported)
    tls_versions: Vec<TlsVersion>,
    /// Whether to verify hostname matches certificate
    verify_hostname: bool,
    /// Whether to accept invalid certificates (development only)
    danger_accept_invalid_certs: bool,
    /// Compiled rustls ClientConfig
    client_config: Arc<ClientConfig>,
}

impl TlsConfig {
    /// Create a new TLS configuration builder
    pub fn builder() -> TlsConfigBuilder {
        TlsConfigBuilder::default()
    }

    /// Get the rustls ClientConfig for this TLS configuration
    pub fn client_config(&self) -> Arc<ClientConfig> {
        self.client_config.clone()
    }

    /// Check if hostname verification is enabled
    pub fn verify_hostname(&self) -> bool {
        self.verify_hostname
    }

    /// Allowed TLS protocol versions (empty = all supported)
    pub fn tls_versions(&self) -> &[TlsVersion] {
        &self.tls_versions
    }

    /// Check if invalid certificates are accepted (development only)
    pub fn danger_accept_invalid_certs(&self) -> bool {
        self.danger_accept_invalid_certs
    }
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("ca_cert_path", &self.ca_cert_path)
            .field("ca_crl_path", &self.ca_crl_path)
            .field("tls_versions", &self.tls_versions)
            .field("verify_hostname", &self.verify_hostname)
            .field(
                "danger_accept_invalid_certs",
                &self.danger_accept_invalid_certs,
            )
            .field("client_config", &"<ClientConfig>")
            .finish()
    }
}

/// Builder for TLS configuration.
pub struct TlsConfigBuilder {
    ca_cert_path: Option<String>,
    ca_crl_path: Option<String>,
    tls_versions: Vec<TlsVersion>,
    verify_hostname: bool,
    danger_accept_invalid_certs: bool,
}

impl Default for TlsConfigBuilder {
    fn default() -> Self {
        Self {
            ca_cert_path: None,
            ca_crl_path: None,
            tls_versions: Vec::new(),
            verify_hostname: true,
            danger_accept_invalid_certs: false,
        }
    }
}

impl TlsConfigBuilder {
    /// Set the path to a custom CA certificate file (PEM format).
    ///
    /// If not set, system root certificates will be used.
    pub fn ca_cert_path(mut self, path: impl Into<String>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    /// Set the path to a certificate revocation list file (PEM format).
    pub fn ca_crl_path(mut self, path: impl Into<String>) -> Self {
        self.ca_crl_path = Some(path.into());
        self
    }

    /// Restrict the TLS protocol versions offered during the handshake.
    ///
    /// Default: all versions supported by rustls.
    pub fn tls_versions(mut self, versions: impl IntoIterator<Item = TlsVersion>) -> Self {
        self.tls_versions = versions.into_iter().collect();
        self
    }

    /// Enable or disable hostname verification (default: enabled).
    pub fn verify_hostname(mut self, verify: bool) -> Self {
        self.verify_hostname = verify;
        self
    }

    /// ⚠️ **DANGER**: Accept invalid certificates (development only).
    ///
    /// **NEVER use in production.** This disables certificate validation
    /// entirely, making the connection vulnerable to man-in-the-middle
    /// attacks. Only use for testing with self-signed certificates.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.danger_accept_invalid_certs = accept;
        self
    }

    /// Build the TLS configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the CA certificate or CRL file cannot be read or
    /// parsed, or if no root certificates can be loaded at all.
    pub fn build(self) -> Result<TlsConfig> {
        // Load root certificates
        let root_store = if let Some(ca_path) = &self.ca_cert_path {
            self.load_custom_ca(ca_path)?
        } else {
            // System root certificates, with the bundled webpki roots as a
            // fallback when the platform store is empty
            let result = rustls_native_certs::load_native_certs();

            let mut store = RootCertStore::empty();
            for cert in result.certs {
                let _ = store.add_parsable_certificates(std::iter::once(cert));
            }

            if store.is_empty() {
                store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            }

            if store.is_empty() {
                return Err(Error::Config(
                    "Failed to load any root certificates".to_string(),
                ));
            }

            store
        };

        let crls = match &self.ca_crl_path {
            Some(path) => Self::load_crls(path)?,
            None => Vec::new(),
        };

        let versions: Vec<&'static rustls::SupportedProtocolVersion> =
            if self.tls_versions.is_empty() {
                rustls::ALL_VERSIONS.to_vec()
            } else {
                self.tls_versions.iter().map(|v| v.supported()).collect()
            };

        let builder = ClientConfig::builder_with_protocol_versions(&versions);

        let client_config = if crls.is_empty() {
            builder
                .with_root_certificates(root_store)
                .with_no_client_auth()
        } else {
            let verifier = rustls::client::WebPkiServerVerifier::builder(Arc::new(root_store))
                .with_crls(crls)
                .build()
                .map_err(|e| {
                    Error::Config(format!("Failed to build certificate verifier: {}", e))
                })?;
            builder
                .dangerous()
                .with_custom_certificate_verifier(verifier)
                .with_no_client_auth()
        };

        Ok(TlsConfig {
            ca_cert_path: self.ca_cert_path,
            ca_crl_path: self.ca_crl_path,
            tls_versions: self.tls_versions,
            verify_hostname: self.verify_hostname,
            danger_accept_invalid_certs: self.danger_accept_invalid_certs,
            client_config: Arc::new(client_config),
        })
    }

    /// Load a custom CA certificate from a PEM file.
    fn load_custom_ca(&self, ca_path: &str) -> Result<RootCertStore> {
        let ca_cert_data = fs::read(ca_path).map_err(|e| {
            Error::Config(format!(
                "Failed to read CA certificate file '{}': {}",
                ca_path, e
            ))
        })?;

        let mut reader = std::io::Cursor::new(&ca_cert_data);
        let mut root_store = RootCertStore::empty();
        let mut found_certs = 0;

        loop {
            match rustls_pemfile::read_one(&mut reader) {
                Ok(Some(Item::X509Certificate(cert))) => {
                    let _ = root_store.add_parsable_certificates(std::iter::once(cert));
                    found_certs += 1;
                }
                Ok(Some(_)) => {
                    // Skip non-certificate items (private keys, etc.)
                }
                Ok(None) => {
                    break;
                }
                Err(_) => {
                    return Err(Error::Config(format!(
                        "Failed to parse CA certificate from '{}'",
                        ca_path
                    )));
                }
            }
        }

        if found_certs == 0 {
            return Err(Error::Config(format!(
                "No valid certificates found in '{}'",
                ca_path
            )));
        }

        Ok(root_store)
    }

    /// Load certificate revocation lists from a PEM file.
    fn load_crls(
        path: &str,
    ) -> Result<Vec<rustls_pki_types::CertificateRevocationListDer<'static>>> {
        let data = fs::read(path)
            .map_err(|e| Error::Config(format!("Failed to read CRL file '{}': {}", path, e)))?;

        let mut reader = std::io::Cursor::new(&data);
        let crls: Vec<_> = rustls_pemfile::crls(&mut reader)
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| Error::Config(format!("Failed to parse CRL from '{}'", path)))?;

        if crls.is_empty() {
            return Err(Error::Config(format!(
                "No revocation lists found in '{}'",
                path
            )));
        }

        Ok(crls)
    }
}

/// Parse server name from hostname for TLS SNI (Server Name Indication).
///
/// # Errors
///
/// Returns an error if the hostname is invalid.
pub fn parse_server_name(hostname: &str) -> Result<String> {
    // Remove trailing dot if present
    let hostname = hostname.trim_end_matches('.');

    if hostname.is_empty() || hostname.len() > 253 {
        return Err(Error::Config(format!(
            "Invalid hostname for TLS: '{}'",
            hostname
        )));
    }

    if !hostname
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '.')
    {
        return Err(Error::Config(format!(
            "Invalid hostname for TLS: '{}'",
            hostname
        )));
    }

    Ok(hostname.to_string())
}
