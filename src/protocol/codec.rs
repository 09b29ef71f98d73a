//! Frame codec seam
//!
//! The binary layout of X Protocol frames belongs to the wire layer of the
//! embedding driver, not to session management. The session layer only needs
//! to turn [`ClientMessage`] values into bytes and bytes back into
//! [`ServerMessage`] values, which is exactly this trait.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::Result;
use bytes::BytesMut;

/// Serializes and deserializes protocol frames.
///
/// Implementations must be stateless with respect to individual frames:
/// `decode` is called repeatedly on a growing read buffer and must return
/// `Ok(None)` until a complete frame is available, consuming the frame's
/// bytes from `src` only once it returns `Ok(Some(..))`.
pub trait MessageCodec: Send + Sync {
    /// Append the encoded form of `msg` to `dst`
    fn encode(&self, msg: &ClientMessage, dst: &mut BytesMut) -> Result<()>;

    /// Try to decode one frame from the front of `src`
    ///
    /// Returns `Ok(None)` if `src` does not yet hold a complete frame.
    fn decode(&self, src: &mut BytesMut) -> Result<Option<ServerMessage>>;
}
