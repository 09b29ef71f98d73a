//! Endpoint normalization and trial-sequence generation

use crate::protocol::constants::DEFAULT_PORT;
use crate::{Error, Result};
use rand::seq::SliceRandom;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// One candidate server address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// TCP host and optional explicit port
    Tcp {
        /// Hostname or IP address
        host: String,
        /// Explicit port; `None` means the protocol default
        port: Option<u16>,
    },
    /// Local Unix socket
    Socket {
        /// Socket path
        path: PathBuf,
    },
}

impl Address {
    /// TCP address
    pub fn tcp(host: impl Into<String>, port: Option<u16>) -> Self {
        Address::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Local socket address
    pub fn socket(path: impl Into<PathBuf>) -> Self {
        Address::Socket { path: path.into() }
    }

    /// The TCP port, with the protocol default applied
    pub fn port_or_default(&self) -> u16 {
        match self {
            Address::Tcp { port, .. } => port.unwrap_or(DEFAULT_PORT),
            Address::Socket { .. } => DEFAULT_PORT,
        }
    }

    /// Whether this is a local socket address
    pub fn is_socket(&self) -> bool {
        matches!(self, Address::Socket { .. })
    }

    /// Whether a port was given explicitly (always false for sockets)
    pub fn has_explicit_port(&self) -> bool {
        matches!(self, Address::Tcp { port: Some(_), .. })
    }

    /// The TCP hostname, if any
    pub fn host(&self) -> Option<&str> {
        match self {
            Address::Tcp { host, .. } => Some(host),
            Address::Socket { .. } => None,
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Address::Tcp { host, .. } => write!(f, "{}:{}", host, self.port_or_default()),
            Address::Socket { path } => write!(f, "{}", path.display()),
        }
    }
}

/// One candidate endpoint with an optional failover priority
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Server address
    pub address: Address,
    /// Failover priority in `[0, 100]`; higher is preferred
    pub priority: Option<u8>,
}

impl Endpoint {
    /// TCP endpoint on the default port
    pub fn tcp(host: impl Into<String>) -> Self {
        Self {
            address: Address::tcp(host, None),
            priority: None,
        }
    }

    /// TCP endpoint with an explicit port
    pub fn tcp_with_port(host: impl Into<String>, port: u16) -> Self {
        Self {
            address: Address::tcp(host, Some(port)),
            priority: None,
        }
    }

    /// Local socket endpoint
    pub fn socket(path: impl Into<PathBuf>) -> Self {
        Self {
            address: Address::socket(path),
            priority: None,
        }
    }

    /// Assign a failover priority (validated by [`EndpointSet::new`])
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// Normalized set of candidate endpoints, grouped into priority tiers.
///
/// Endpoints that failed recently are remembered and deprioritized within
/// their tier until `recheck_interval` has elapsed, so a flapping server does
/// not delay every connection attempt.
#[derive(Debug)]
pub struct EndpointSet {
    /// Tiers in descending priority order
    tiers: Vec<(u8, Vec<Endpoint>)>,
    /// Endpoints that failed recently, with the failure timestamp
    unavailable: HashMap<Address, Instant>,
    recheck_interval: Duration,
}

impl EndpointSet {
    /// Validate and normalize a list of endpoints.
    ///
    /// # Errors
    ///
    /// * [`Error::MixedEndpointPriority`] if some endpoints carry a priority
    ///   and some do not
    /// * [`Error::BadEndpointPriority`] if a priority is above 100
    /// * [`Error::LocalSocketWithPriority`] if a socket endpoint carries a
    ///   priority
    pub fn new(endpoints: Vec<Endpoint>, recheck_interval: Duration) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(Error::Config("at least one endpoint is required".into()));
        }

        let with_priority = endpoints.iter().filter(|e| e.priority.is_some()).count();
        if with_priority != 0 && with_priority != endpoints.len() {
            return Err(Error::MixedEndpointPriority);
        }

        let mut grouped: BTreeMap<u8, Vec<Endpoint>> = BTreeMap::new();
        for endpoint in endpoints {
            if let Some(priority) = endpoint.priority {
                if priority > 100 {
                    return Err(Error::BadEndpointPriority(i64::from(priority)));
                }
                if endpoint.address.is_socket() {
                    return Err(Error::LocalSocketWithPriority);
                }
            }
            grouped
                .entry(endpoint.priority.unwrap_or(0))
                .or_default()
                .push(endpoint);
        }

        // Descending priority order
        let tiers = grouped.into_iter().rev().collect();

        Ok(Self {
            tiers,
            unavailable: HashMap::new(),
            recheck_interval,
        })
    }

    /// Number of endpoints in the set
    pub fn len(&self) -> usize {
        self.tiers.iter().map(|(_, t)| t.len()).sum()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Produce a fresh ordered trial sequence.
    ///
    /// Tiers are emitted in descending priority order; within a tier the
    /// order is randomized, with recently failed endpoints moved behind
    /// their available peers.
    pub fn trial_sequence(&self) -> Vec<Endpoint> {
        let mut rng = rand::thread_rng();
        let now = Instant::now();
        let mut sequence = Vec::with_capacity(self.len());

        for (_, tier) in &self.tiers {
            let mut tier = tier.clone();
            tier.shuffle(&mut rng);

            let (available, penalized): (Vec<_>, Vec<_>) = tier
                .into_iter()
                .partition(|endpoint| self.is_available(&endpoint.address, now));
            sequence.extend(available);
            sequence.extend(penalized);
        }

        sequence
    }

    fn is_available(&self, address: &Address, now: Instant) -> bool {
        match self.unavailable.get(address) {
            None => true,
            Some(failed_at) => now.duration_since(*failed_at) >= self.recheck_interval,
        }
    }

    /// Record a failed connection attempt against an endpoint
    pub fn mark_unavailable(&mut self, address: &Address) {
        self.unavailable.insert(address.clone(), Instant::now());
    }

    /// Clear the failure record for an endpoint
    pub fn mark_available(&mut self, address: &Address) {
        self.unavailable.remove(address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(endpoints: Vec<Endpoint>) -> Result<EndpointSet> {
        EndpointSet::new(endpoints, Duration::from_secs(20))
    }

    #[test]
    fn test_mixed_priority_rejected() {
        let result = set(vec![
            Endpoint::tcp("a").with_priority(50),
            Endpoint::tcp("b"),
        ]);
        assert!(matches!(result, Err(Error::MixedEndpointPriority)));
    }

    #[test]
    fn test_priority_out_of_range_rejected() {
        let result = set(vec![
            Endpoint::tcp("a").with_priority(101),
            Endpoint::tcp("b").with_priority(50),
        ]);
        assert!(matches!(result, Err(Error::BadEndpointPriority(101))));
    }

    #[test]
    fn test_socket_with_priority_rejected() {
        let result = set(vec![
            Endpoint::socket("/tmp/mysqlx.sock").with_priority(50),
            Endpoint::tcp("a").with_priority(40),
        ]);
        assert!(matches!(result, Err(Error::LocalSocketWithPriority)));
    }

    #[test]
    fn test_empty_set_rejected() {
        assert!(set(vec![]).is_err());
    }

    #[test]
    fn test_higher_priority_tier_always_first() {
        let endpoints = set(vec![
            Endpoint::tcp("low-a").with_priority(10),
            Endpoint::tcp("high").with_priority(90),
            Endpoint::tcp("low-b").with_priority(10),
        ])
        .unwrap();

        for _ in 0..20 {
            let sequence = endpoints.trial_sequence();
            assert_eq!(sequence.len(), 3);
            assert_eq!(sequence[0].address.host(), Some("high"));
        }
    }

    #[test]
    fn test_trial_sequence_covers_all_endpoints() {
        let endpoints = set(vec![
            Endpoint::tcp("a"),
            Endpoint::tcp("b"),
            Endpoint::tcp("c"),
        ])
        .unwrap();

        let sequence = endpoints.trial_sequence();
        let mut hosts: Vec<_> = sequence
            .iter()
            .filter_map(|e| e.address.host())
            .collect();
        hosts.sort_unstable();
        assert_eq!(hosts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_shuffle_varies_within_tier() {
        let endpoints = set(vec![
            Endpoint::tcp("a"),
            Endpoint::tcp("b"),
            Endpoint::tcp("c"),
            Endpoint::tcp("d"),
        ])
        .unwrap();

        // With 4! = 24 orderings, 50 draws virtually always produce at least
        // two distinct ones.
        let first: Vec<_> = endpoints
            .trial_sequence()
            .iter()
            .map(|e| e.address.clone())
            .collect();
        let varied = (0..50).any(|_| {
            let next: Vec<_> = endpoints
                .trial_sequence()
                .iter()
                .map(|e| e.address.clone())
                .collect();
            next != first
        });
        assert!(varied);
    }

    #[test]
    fn test_unavailable_endpoint_moves_behind_peers() {
        let mut endpoints = set(vec![Endpoint::tcp("a"), Endpoint::tcp("b")]).unwrap();
        let failed = Address::tcp("a", None);
        endpoints.mark_unavailable(&failed);

        for _ in 0..20 {
            let sequence = endpoints.trial_sequence();
            assert_eq!(sequence[0].address.host(), Some("b"));
            assert_eq!(sequence[1].address.host(), Some("a"));
        }
    }

    #[test]
    fn test_unavailable_endpoint_recovers_after_recheck_interval() {
        let mut endpoints =
            EndpointSet::new(vec![Endpoint::tcp("a"), Endpoint::tcp("b")], Duration::ZERO)
                .unwrap();
        let failed = Address::tcp("a", None);
        endpoints.mark_unavailable(&failed);

        // Zero recheck interval: the endpoint is immediately eligible again,
        // so it must show up first at least occasionally.
        let recovered = (0..50).any(|_| {
            endpoints.trial_sequence()[0].address.host() == Some("a")
        });
        assert!(recovered);
    }

    #[test]
    fn test_mark_available_clears_penalty() {
        let mut endpoints = set(vec![Endpoint::tcp("a"), Endpoint::tcp("b")]).unwrap();
        let address = Address::tcp("a", None);
        endpoints.mark_unavailable(&address);
        endpoints.mark_available(&address);

        let recovered = (0..50).any(|_| {
            endpoints.trial_sequence()[0].address.host() == Some("a")
        });
        assert!(recovered);
    }

    #[test]
    fn test_address_display() {
        assert_eq!(Address::tcp("db", Some(33061)).to_string(), "db:33061");
        assert_eq!(Address::tcp("db", None).to_string(), "db:33060");
        assert_eq!(
            Address::socket("/tmp/mysqlx.sock").to_string(),
            "/tmp/mysqlx.sock"
        );
    }
}
