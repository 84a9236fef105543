//! Self-address discovery.
//!
//! Strategies are tried in order and the first address found wins:
//! a configured override, then the first non-loopback IPv4 address bound to
//! a local interface, then the source address the kernel picks for a UDP
//! socket connected to a public resolver.

use crate::error::IdentityError;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

/// Well-known external address used only for route selection; nothing is sent.
pub const ROUTE_LOOKUP_TARGET: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(8, 8, 8, 8), 53);

/// One way of finding this node's address.
pub trait AddressDiscovery {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means this strategy found nothing usable.
    fn discover(&self) -> io::Result<Option<Ipv4Addr>>;
}

/// Address supplied by configuration
pub struct Configured(pub Ipv4Addr);

impl AddressDiscovery for Configured {
    fn name(&self) -> &'static str {
        "configured"
    }

    fn discover(&self) -> io::Result<Option<Ipv4Addr>> {
        Ok(Some(self.0))
    }
}

/// First non-loopback IPv4 address from getifaddrs(3)
pub struct BoundInterfaces;

impl AddressDiscovery for BoundInterfaces {
    fn name(&self) -> &'static str {
        "bound-interfaces"
    }

    fn discover(&self) -> io::Result<Option<Ipv4Addr>> {
        Ok(local_ipv4_addresses()?.into_iter().find(|ip| is_usable(*ip)))
    }
}

/// Local source address of a UDP socket connected to `target`
pub struct UdpRouteLookup {
    pub target: SocketAddrV4,
}

impl Default for UdpRouteLookup {
    fn default() -> Self {
        Self {
            target: ROUTE_LOOKUP_TARGET,
        }
    }
}

impl AddressDiscovery for UdpRouteLookup {
    fn name(&self) -> &'static str {
        "udp-route"
    }

    fn discover(&self) -> io::Result<Option<Ipv4Addr>> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect(self.target)?;

        match socket.local_addr()? {
            SocketAddr::V4(addr) if is_usable(*addr.ip()) => Ok(Some(*addr.ip())),
            _ => Ok(None),
        }
    }
}

fn is_usable(ip: Ipv4Addr) -> bool {
    !ip.is_loopback() && !ip.is_unspecified()
}

/// Strategies in fallback order, led by the override when one is set.
pub fn default_strategies(configured: Option<Ipv4Addr>) -> Vec<Box<dyn AddressDiscovery>> {
    let mut strategies: Vec<Box<dyn AddressDiscovery>> = Vec::new();
    if let Some(ip) = configured {
        strategies.push(Box::new(Configured(ip)));
    }
    strategies.push(Box::new(BoundInterfaces));
    strategies.push(Box::new(UdpRouteLookup::default()));
    strategies
}

/// Runs the strategies in order, returning the first address found.
pub fn resolve_node_ip(
    strategies: &[Box<dyn AddressDiscovery>],
) -> Result<Ipv4Addr, IdentityError> {
    let mut attempted = Vec::with_capacity(strategies.len());

    for strategy in strategies {
        attempted.push(strategy.name());
        match strategy.discover() {
            Ok(Some(ip)) => {
                tracing::info!(strategy = strategy.name(), %ip, "resolved node address");
                return Ok(ip);
            }
            Ok(None) => tracing::debug!(strategy = strategy.name(), "no address"),
            Err(e) => tracing::warn!(strategy = strategy.name(), error = %e, "discovery failed"),
        }
    }

    Err(IdentityError::Unresolved { attempted })
}

/// The address as the 32-bit integer whose big-endian bytes are its octets.
pub fn ip_to_wire(ip: Ipv4Addr) -> u32 {
    u32::from(ip)
}

#[cfg(target_os = "linux")]
fn local_ipv4_addresses() -> io::Result<Vec<Ipv4Addr>> {
    let mut ifap: *mut libc::ifaddrs = std::ptr::null_mut();
    if unsafe { libc::getifaddrs(&mut ifap) } != 0 {
        return Err(io::Error::last_os_error());
    }

    let mut addresses = Vec::new();
    let mut cursor = ifap;
    while !cursor.is_null() {
        let entry = unsafe { &*cursor };
        if !entry.ifa_addr.is_null()
            && i32::from(unsafe { (*entry.ifa_addr).sa_family }) == libc::AF_INET
        {
            let sin = unsafe { &*(entry.ifa_addr as *const libc::sockaddr_in) };
            addresses.push(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr)));
        }
        cursor = entry.ifa_next;
    }

    unsafe { libc::freeifaddrs(ifap) };
    Ok(addresses)
}

#[cfg(not(target_os = "linux"))]
fn local_ipv4_addresses() -> io::Result<Vec<Ipv4Addr>> {
    Ok(Vec::new())
}
