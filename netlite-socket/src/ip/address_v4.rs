//! IPv4 address value type.

use crate::error::AddrParseError;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// An IPv4 address stored as a 32-bit integer in host byte order.
///
/// Ordering follows the numeric value, so `10.0.0.1 < 10.0.0.2 < 192.168.0.1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AddressV4(u32);

impl AddressV4 {
    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        AddressV4(u32::from_be_bytes([a, b, c, d]))
    }

    /// Builds an address from an integer in host byte order.
    pub const fn from_u32(addr: u32) -> Self {
        AddressV4(addr)
    }

    /// Builds an address from its bytes in network order.
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        AddressV4(u32::from_be_bytes(bytes))
    }

    /// `0.0.0.0`
    pub const fn any() -> Self {
        AddressV4(0)
    }

    /// `127.0.0.1`
    pub const fn loopback() -> Self {
        AddressV4(0x7F00_0001)
    }

    /// `255.255.255.255`
    pub const fn broadcast() -> Self {
        AddressV4(0xFFFF_FFFF)
    }

    /// The broadcast address of the network `addr` belongs to under `mask`.
    pub const fn broadcast_for(addr: AddressV4, mask: AddressV4) -> Self {
        AddressV4(addr.0 | !mask.0)
    }

    /// The classful netmask of `addr`.
    pub fn netmask(addr: AddressV4) -> Self {
        if addr.is_class_a() {
            AddressV4(0xFF00_0000)
        } else if addr.is_class_b() {
            AddressV4(0xFFFF_0000)
        } else if addr.is_class_c() {
            AddressV4(0xFFFF_FF00)
        } else {
            AddressV4(0xFFFF_FFFF)
        }
    }

    /// The address bytes in network order.
    pub const fn to_bytes(&self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// The address as an integer in host byte order.
    pub const fn to_u32(&self) -> u32 {
        self.0
    }

    pub const fn is_unspecified(&self) -> bool {
        self.0 == 0
    }

    /// `127.0.0.0/8`
    pub const fn is_loopback(&self) -> bool {
        (self.0 & 0xFF00_0000) == 0x7F00_0000
    }

    /// `224.0.0.0/4`
    pub const fn is_multicast(&self) -> bool {
        (self.0 & 0xF000_0000) == 0xE000_0000
    }

    pub const fn is_class_a(&self) -> bool {
        (self.0 & 0x8000_0000) == 0
    }

    pub const fn is_class_b(&self) -> bool {
        (self.0 & 0xC000_0000) == 0x8000_0000
    }

    pub const fn is_class_c(&self) -> bool {
        (self.0 & 0xE000_0000) == 0xC000_0000
    }
}

impl FromStr for AddressV4 {
    type Err = AddrParseError;

    /// Parses dotted-decimal text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ipv4Addr::from_str(s)
            .map(AddressV4::from)
            .map_err(|_| AddrParseError(s.to_owned()))
    }
}

impl fmt::Display for AddressV4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Ipv4Addr::from(*self), f)
    }
}

impl From<Ipv4Addr> for AddressV4 {
    fn from(addr: Ipv4Addr) -> Self {
        AddressV4(u32::from(addr))
    }
}

impl From<AddressV4> for Ipv4Addr {
    fn from(addr: AddressV4) -> Self {
        Ipv4Addr::from(addr.0)
    }
}

impl From<u32> for AddressV4 {
    fn from(addr: u32) -> Self {
        AddressV4(addr)
    }
}

impl From<[u8; 4]> for AddressV4 {
    fn from(bytes: [u8; 4]) -> Self {
        AddressV4::from_bytes(bytes)
    }
}
