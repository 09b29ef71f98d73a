//! Protocol frame vocabulary and the codec seam
//!
//! The session layer names the frames it exchanges (capabilities,
//! authentication steps, statement preparation and execution, session
//! reset/close) but never touches their byte layout: serialization is
//! delegated to a [`MessageCodec`] implementation supplied by the embedding
//! driver. Result payloads (columns, rows, notices) stay opaque byte blobs.

pub mod constants;

mod codec;
mod message;

pub use codec::MessageCodec;
pub use message::{ClientMessage, Severity, ServerError, ServerMessage};
