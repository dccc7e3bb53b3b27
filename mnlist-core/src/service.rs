//! Network service addresses announced by providers.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use serde::{Deserialize, Serialize};

/// A provider's announced service endpoint.
///
/// The default value `[::]:0` is the null address, meaning "not announced
/// yet". A provider registered with a null address is waiting for an
/// update-service transaction.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceAddr(SocketAddr);

impl Default for ServiceAddr {
    fn default() -> Self {
        Self(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0))
    }
}

impl ServiceAddr {
    /// Wrap a socket address.
    pub fn new(addr: SocketAddr) -> Self {
        Self(addr)
    }

    /// The underlying socket address.
    pub fn socket_addr(&self) -> SocketAddr {
        self.0
    }

    /// Check for the null address.
    pub fn is_null(&self) -> bool {
        *self == Self::default()
    }

    /// Syntactic validity: a concrete IP and a non-zero port.
    pub fn is_valid(&self) -> bool {
        !self.0.ip().is_unspecified() && self.0.port() != 0
    }

    /// Check that the address is reachable from the public internet.
    pub fn is_routable(&self) -> bool {
        if !self.is_valid() {
            return false;
        }
        match self.0.ip() {
            IpAddr::V4(ip) => is_routable_v4(ip),
            IpAddr::V6(ip) => match ip.to_ipv4_mapped() {
                Some(v4) => is_routable_v4(v4),
                None => is_routable_v6(ip),
            },
        }
    }
}

fn is_routable_v4(ip: Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();
    // RFC 6598 shared address space
    let shared = a == 100 && (64..128).contains(&b);
    // RFC 2544 benchmarking
    let benchmark = a == 198 && (b == 18 || b == 19);
    !(ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_documentation()
        || ip.is_multicast()
        || ip.is_broadcast()
        || ip.is_unspecified()
        || shared
        || benchmark
        || a == 0)
}

fn is_routable_v6(ip: Ipv6Addr) -> bool {
    let seg = ip.segments();
    let documentation = seg[0] == 0x2001 && seg[1] == 0x0db8;
    !(ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        || ip.is_unique_local()
        || ip.is_unicast_link_local()
        || documentation)
}

impl From<SocketAddr> for ServiceAddr {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl fmt::Debug for ServiceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceAddr({})", self.0)
    }
}

impl fmt::Display for ServiceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
