//! Candidate endpoints and connection establishment
//!
//! A configured list of endpoints is normalized into descending-priority
//! tiers; each connection attempt draws a fresh trial sequence (shuffled
//! within tiers) and tries candidates in order with a per-endpoint connect
//! timeout.

mod establish;
mod set;

pub use establish::Establisher;
pub use set::{Address, Endpoint, EndpointSet};
