//! Address-family helpers for exporter and flow addresses.
//!
//! Addresses are plain [`IpAddr`] values everywhere in this crate. The
//! derived ordering on `IpAddr` is exactly the one the flow log and the peer
//! registry rely on: family first (IPv4 sorts before IPv6), then the address
//! bytes lexicographically.

use serde::Serialize;
use std::net::IpAddr;

/// Address family tag, matching the two shapes an [`IpAddr`] can take.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Serialize)]
pub enum AddrFamily {
    Inet,
    Inet6,
}

impl AddrFamily {
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddrFamily::Inet,
            IpAddr::V6(_) => AddrFamily::Inet6,
        }
    }
}

/// True when both addresses belong to the same family.
pub fn same_family(a: &IpAddr, b: &IpAddr) -> bool {
    AddrFamily::of(a) == AddrFamily::of(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_of() {
        let v4: IpAddr = "192.0.2.1".parse().unwrap();
        let v6: IpAddr = "2001:db8::1".parse().unwrap();
        assert_eq!(AddrFamily::of(&v4), AddrFamily::Inet);
        assert_eq!(AddrFamily::of(&v6), AddrFamily::Inet6);
        assert!(same_family(&v4, &v4));
        assert!(!same_family(&v4, &v6));
    }

    #[test]
    fn order_is_family_then_bytes() {
        let low4: IpAddr = "10.0.0.1".parse().unwrap();
        let high4: IpAddr = "10.0.1.0".parse().unwrap();
        let any6: IpAddr = "::".parse().unwrap();
        let some6: IpAddr = "2001:db8::1".parse().unwrap();

        // bytes compare lexicographically within a family
        assert!(low4 < high4);
        assert!(any6 < some6);
        // any IPv4 address sorts before any IPv6 address
        assert!(high4 < any6);
    }

    #[test]
    fn equality_needs_family_and_bytes() {
        let v4: IpAddr = "1.2.3.4".parse().unwrap();
        let mapped: IpAddr = "::ffff:1.2.3.4".parse().unwrap();
        assert_ne!(v4, mapped);
    }
}
