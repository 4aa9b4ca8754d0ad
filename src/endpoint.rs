//! Concrete endpoints and the set that tracks their scan status.
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use crate::address::Address;

/// A single address and port to scan.
///
/// Equality, hashing and ordering agree with the `address:port` text form,
/// so two endpoints are the same exactly when they render the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Endpoint {
    pub address: Address,
    pub port: u16,
}

impl Endpoint {
    pub const fn new(address: Address, port: u16) -> Self {
        Self { address, port }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::from(self.address), self.port))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Scan outcome for one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EndpointStatus {
    /// Not attempted yet.
    #[default]
    Unknown,
    /// A TCP connection was established.
    Reachable,
    /// The connect attempt failed; holds the reason reported by the OS or
    /// the timeout.
    Unreachable(String),
}

impl EndpointStatus {
    pub const fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable)
    }

    /// Whether a connect attempt has settled this status.
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Every endpoint produced from a target file, in sorted order.
///
/// Entries are only ever added or updated, never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointSet {
    entries: BTreeMap<Endpoint, EndpointStatus>,
}

impl EndpointSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `endpoint` as [`EndpointStatus::Unknown`].
    ///
    /// Returns `false` and leaves the existing status alone if the endpoint
    /// was already present.
    pub fn insert(&mut self, endpoint: Endpoint) -> bool {
        match self.entries.entry(endpoint) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(EndpointStatus::Unknown);
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Records a connect outcome. Endpoints not in the set are ignored.
    pub(crate) fn settle(&mut self, endpoint: Endpoint, status: EndpointStatus) {
        if let Some(slot) = self.entries.get_mut(&endpoint) {
            *slot = status;
        }
    }

    pub fn status(&self, endpoint: &Endpoint) -> Option<&EndpointStatus> {
        self.entries.get(endpoint)
    }

    pub fn contains(&self, endpoint: &Endpoint) -> bool {
        self.entries.contains_key(endpoint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn endpoints(&self) -> impl Iterator<Item = Endpoint> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Endpoint, &EndpointStatus)> {
        self.entries.iter()
    }

    /// Endpoints that a scan has not settled yet.
    pub fn pending(&self) -> usize {
        self.entries.values().filter(|s| !s.is_terminal()).count()
    }

    pub fn reachable(&self) -> impl Iterator<Item = Endpoint> + '_ {
        self.entries
            .iter()
            .filter(|(_, status)| status.is_reachable())
            .map(|(endpoint, _)| *endpoint)
    }

    /// Collapses the set to `address:port -> reachable`.
    pub fn to_liveness_map(&self) -> BTreeMap<String, bool> {
        self.entries
            .iter()
            .map(|(endpoint, status)| (endpoint.to_string(), status.is_reachable()))
            .collect()
    }
}

impl<'a> IntoIterator for &'a EndpointSet {
    type Item = (&'a Endpoint, &'a EndpointStatus);
    type IntoIter = btree_map::Iter<'a, Endpoint, EndpointStatus>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
