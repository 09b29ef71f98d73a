//! Credential responders: turning a server challenge into response bytes

use crate::auth::AuthMechanism;
use crate::{Error, Result};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use std::fmt::Write as _;

/// Principal credentials for the handshake
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Username
    pub user: String,
    /// Password (may be empty)
    pub password: String,
    /// Default schema, included in the authentication response
    pub schema: Option<String>,
}

impl Credentials {
    /// Create credentials without a default schema
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            schema: None,
        }
    }

    /// Set the default schema
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    fn schema_str(&self) -> &str {
        self.schema.as_deref().unwrap_or("")
    }
}

/// Computes the response bytes for a server challenge.
///
/// The default implementation is [`ScrambleResponder`]; embedders with
/// external credential stores (vaults, agents) can substitute their own.
pub trait CredentialResponder: Send + Sync {
    /// Compute the bytes to send for `mechanism` given `challenge`.
    ///
    /// For `PLAIN` the challenge is empty and the full identity is returned
    /// up front; the other mechanisms respond to a 20-byte server nonce.
    fn respond(
        &self,
        mechanism: AuthMechanism,
        challenge: &[u8],
        credentials: &Credentials,
    ) -> Result<Vec<u8>>;
}

/// Default responder implementing the standard scrambles
#[derive(Debug, Default, Clone, Copy)]
pub struct ScrambleResponder;

impl CredentialResponder for ScrambleResponder {
    fn respond(
        &self,
        mechanism: AuthMechanism,
        challenge: &[u8],
        credentials: &Credentials,
    ) -> Result<Vec<u8>> {
        match mechanism {
            AuthMechanism::Plain => Ok(plain_response(credentials)),
            AuthMechanism::Mysql41 => mysql41_response(challenge, credentials),
            AuthMechanism::Sha256Memory => sha256_memory_response(challenge, credentials),
        }
    }
}

/// `schema\0user\0password`
fn plain_response(credentials: &Credentials) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(credentials.schema_str().as_bytes());
    out.push(0);
    out.extend_from_slice(credentials.user.as_bytes());
    out.push(0);
    out.extend_from_slice(credentials.password.as_bytes());
    out
}

/// `schema\0user\0*hex(SHA1(pass) ⊕ SHA1(nonce ∥ SHA1(SHA1(pass))))`
fn mysql41_response(challenge: &[u8], credentials: &Credentials) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.extend_from_slice(credentials.schema_str().as_bytes());
    out.push(0);
    out.extend_from_slice(credentials.user.as_bytes());
    out.push(0);

    if !credentials.password.is_empty() {
        if challenge.len() < 20 {
            return Err(Error::Authentication(format!(
                "MYSQL41 challenge too short: {} bytes",
                challenge.len()
            )));
        }

        let pass_hash = Sha1::digest(credentials.password.as_bytes());
        let pass_hash_hash = Sha1::digest(pass_hash);

        let mut salted = Sha1::new();
        salted.update(challenge);
        salted.update(pass_hash_hash);
        let salted = salted.finalize();

        let token: Vec<u8> = pass_hash
            .iter()
            .zip(salted.iter())
            .map(|(a, b)| a ^ b)
            .collect();

        out.push(b'*');
        out.extend_from_slice(to_hex(&token).as_bytes());
    }

    Ok(out)
}

/// `schema\0user\0hex(SHA256(pass) ⊕ SHA256(SHA256(SHA256(pass)) ∥ nonce))`
fn sha256_memory_response(challenge: &[u8], credentials: &Credentials) -> Result<Vec<u8>> {
    if challenge.len() < 20 {
        return Err(Error::Authentication(format!(
            "SHA256_MEMORY challenge too short: {} bytes",
            challenge.len()
        )));
    }

    let pass_hash = Sha256::digest(credentials.password.as_bytes());
    let pass_hash_hash = Sha256::digest(pass_hash);

    let mut salted = Sha256::new();
    salted.update(pass_hash_hash);
    salted.update(challenge);
    let salted = salted.finalize();

    let token: Vec<u8> = pass_hash
        .iter()
        .zip(salted.iter())
        .map(|(a, b)| a ^ b)
        .collect();

    let mut out = Vec::new();
    out.extend_from_slice(credentials.schema_str().as_bytes());
    out.push(0);
    out.extend_from_slice(credentials.user.as_bytes());
    out.push(0);
    out.extend_from_slice(to_hex(&token).as_bytes());
    Ok(out)
}

fn to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}
