//! Authentication mechanism selection and handshake negotiation
//!
//! Mechanisms are a closed set: `PLAIN` sends credentials in the clear and
//! is only allowed over confidential channels; `MYSQL41` proves the password
//! with a salted SHA-1 scramble; `SHA256_MEMORY` proves it against a
//! server-side cached entry populated out-of-band. The scramble math lives
//! behind the [`CredentialResponder`] seam.

mod mechanism;
mod negotiator;
mod responder;

pub use mechanism::AuthMechanism;
pub use negotiator::{AuthOutcome, Negotiator};
pub use responder::{Credentials, CredentialResponder, ScrambleResponder};
