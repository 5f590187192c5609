//! Version-independent IP address.

use crate::error::{AddrParseError, BadAddressCast};
use crate::ip::{AddressV4, AddressV6};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// An IPv4 or IPv6 address.
///
/// Ordering compares the family first (every IPv4 address sorts before every IPv6
/// address), then the active representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Address {
    V4(AddressV4),
    V6(AddressV6),
}

/// Mutually exclusive classification of an address within its family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressClass {
    Unspecified,
    Loopback,
    Multicast,
    Other,
}

impl Default for Address {
    fn default() -> Self {
        Address::V4(AddressV4::any())
    }
}

impl Address {
    pub fn is_v4(&self) -> bool {
        matches!(self, Address::V4(_))
    }

    pub fn is_v6(&self) -> bool {
        matches!(self, Address::V6(_))
    }

    pub fn to_v4(&self) -> Result<AddressV4, BadAddressCast> {
        match self {
            Address::V4(addr) => Ok(*addr),
            Address::V6(_) => Err(BadAddressCast),
        }
    }

    pub fn to_v6(&self) -> Result<AddressV6, BadAddressCast> {
        match self {
            Address::V6(addr) => Ok(*addr),
            Address::V4(_) => Err(BadAddressCast),
        }
    }

    pub fn is_unspecified(&self) -> bool {
        match self {
            Address::V4(addr) => addr.is_unspecified(),
            Address::V6(addr) => addr.is_unspecified(),
        }
    }

    pub fn is_loopback(&self) -> bool {
        match self {
            Address::V4(addr) => addr.is_loopback(),
            Address::V6(addr) => addr.is_loopback(),
        }
    }

    pub fn is_multicast(&self) -> bool {
        match self {
            Address::V4(addr) => addr.is_multicast(),
            Address::V6(addr) => addr.is_multicast(),
        }
    }

    pub fn classify(&self) -> AddressClass {
        if self.is_unspecified() {
            AddressClass::Unspecified
        } else if self.is_loopback() {
            AddressClass::Loopback
        } else if self.is_multicast() {
            AddressClass::Multicast
        } else {
            AddressClass::Other
        }
    }
}

impl FromStr for Address {
    type Err = AddrParseError;

    /// Tries IPv6 syntax first, then IPv4 dotted decimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(v6) = AddressV6::from_str(s) {
            return Ok(Address::V6(v6));
        }
        AddressV4::from_str(s)
            .map(Address::V4)
            .map_err(|_| AddrParseError(s.to_owned()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::V4(addr) => fmt::Display::fmt(addr, f),
            Address::V6(addr) => fmt::Display::fmt(addr, f),
        }
    }
}

impl From<AddressV4> for Address {
    fn from(addr: AddressV4) -> Self {
        Address::V4(addr)
    }
}

impl From<AddressV6> for Address {
    fn from(addr: AddressV6) -> Self {
        Address::V6(addr)
    }
}

impl From<IpAddr> for Address {
    fn from(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(v4) => Address::V4(v4.into()),
            IpAddr::V6(v6) => Address::V6(v6.into()),
        }
    }
}

impl From<Address> for IpAddr {
    fn from(addr: Address) -> Self {
        match addr {
            Address::V4(v4) => IpAddr::V4(v4.into()),
            Address::V6(v6) => IpAddr::V6(v6.into()),
        }
    }
}
