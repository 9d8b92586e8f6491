//! `SockAddr` compound value: a parsed host/port/netmask triple, the
//! result type for `parse_inet_address`/`parse_subnet` (spec.md §6).
//!
//! Grounded on `original_source/src/pw_netutils.c`'s `_PwSockAddrData`
//! (`sockaddr_storage` + `netmask` bit count): this crate has no raw
//! socket layer, so the address itself is stored as plain bytes (4 for
//! IPv4, 16 for IPv6) rather than a `sockaddr_storage` union — the
//! observable contract (family, address, port, CIDR bits) is identical.

use std::net::IpAddr;
use std::sync::OnceLock;

use crate::compound::{Compound, CompoundPayload};
use crate::registry::{self, TypeId};
use crate::value::Value;

pub fn sockaddr_type() -> TypeId {
    static TYPE: OnceLock<TypeId> = OnceLock::new();
    *TYPE.get_or_init(|| registry::add_type("SockAddr", Vec::new()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Inet,
    Inet6,
}

struct SockAddrData {
    family: AddressFamily,
    addr: IpAddr,
    port: u16,
    /// CIDR prefix length, when this value came from `parse_subnet`.
    netmask: Option<u8>,
}

impl CompoundPayload for SockAddrData {
    fn clear_children(&mut self) {}
}

/// A handle to a shared `SockAddr` value. `SockAddr`s never hold other
/// `Value`s, so they can never participate in a reference cycle — sharing
/// is purely for cheap `Clone`.
#[derive(Clone)]
pub struct SockAddr(Compound);

impl SockAddr {
    fn new(family: AddressFamily, addr: IpAddr, port: u16, netmask: Option<u8>) -> Self {
        let data = SockAddrData {
            family,
            addr,
            port,
            netmask,
        };
        SockAddr(Compound::new(sockaddr_type(), Box::new(data)))
    }

    pub fn from_compound(c: Compound) -> Option<Self> {
        if c.type_id() == sockaddr_type() {
            Some(SockAddr(c))
        } else {
            None
        }
    }

    pub fn as_value(&self) -> Value {
        Value::Compound(self.0.clone())
    }

    fn data(&self) -> &SockAddrData {
        let payload = self.0 .0.payload.borrow();
        let ptr: *const dyn CompoundPayload = &**payload;
        unsafe { &*(ptr as *const SockAddrData) }
    }

    pub fn family(&self) -> AddressFamily {
        self.data().family
    }

    pub fn addr(&self) -> IpAddr {
        self.data().addr
    }

    pub fn port(&self) -> u16 {
        self.data().port
    }

    pub fn netmask(&self) -> Option<u8> {
        self.data().netmask
    }
}

impl std::fmt::Debug for SockAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let d = self.data();
        write!(f, "SockAddr({}:{}", d.addr, d.port)?;
        if let Some(n) = d.netmask {
            write!(f, "/{n}")?;
        }
        write!(f, ")")
    }
}

pub(crate) fn make(family: AddressFamily, addr: IpAddr, port: u16, netmask: Option<u8>) -> SockAddr {
    SockAddr::new(family, addr, port, netmask)
}

/// Maximum CIDR prefix length for an address family.
pub fn max_bits(family: AddressFamily) -> u8 {
    match family {
        AddressFamily::Inet => 32,
        AddressFamily::Inet6 => 128,
    }
}

/// Convert a dotted-quad (or IPv6) netmask address into a CIDR bit count:
/// the count of leading one-bits, which must be contiguous.
pub fn netmask_to_bits(addr: IpAddr) -> Option<u8> {
    match addr {
        IpAddr::V4(v4) => {
            let bits = u32::from(v4);
            leading_ones_contiguous(bits.to_be_bytes().as_slice(), 32)
        }
        IpAddr::V6(v6) => leading_ones_contiguous(&v6.octets(), 128),
    }
}

fn leading_ones_contiguous(bytes: &[u8], total_bits: u32) -> Option<u8> {
    let mut ones = 0u32;
    let mut seen_zero = false;
    for byte in bytes {
        for i in (0..8).rev() {
            let bit = (byte >> i) & 1;
            if bit == 1 {
                if seen_zero {
                    return None; // non-contiguous mask
                }
                ones += 1;
            } else {
                seen_zero = true;
            }
        }
    }
    debug_assert!(ones <= total_bits);
    Some(ones as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sockaddr_round_trips_fields() {
        let sa = make(AddressFamily::Inet, "192.168.0.1".parse().unwrap(), 8080, Some(24));
        assert_eq!(sa.family(), AddressFamily::Inet);
        assert_eq!(sa.port(), 8080);
        assert_eq!(sa.netmask(), Some(24));
    }

    #[test]
    fn netmask_to_bits_counts_leading_ones() {
        let mask: IpAddr = "255.255.255.0".parse().unwrap();
        assert_eq!(netmask_to_bits(mask), Some(24));
        let mask: IpAddr = "255.255.255.128".parse().unwrap();
        assert_eq!(netmask_to_bits(mask), Some(25));
    }

    #[test]
    fn netmask_to_bits_rejects_noncontiguous() {
        let mask: IpAddr = "255.0.255.0".parse().unwrap();
        assert_eq!(netmask_to_bits(mask), None);
    }
}
