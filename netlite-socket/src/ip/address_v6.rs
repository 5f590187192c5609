//! IPv6 address value type with scope identifier.

use crate::error::{AddrParseError, BadAddressCast};
use crate::ip::AddressV4;
use crate::sys;
use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

/// An IPv6 address: 16 raw bytes in network order plus a scope identifier.
///
/// Ordering compares the bytes first and the scope id second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AddressV6 {
    bytes: [u8; 16],
    scope_id: u32,
}

impl AddressV6 {
    pub const fn new(bytes: [u8; 16], scope_id: u32) -> Self {
        AddressV6 { bytes, scope_id }
    }

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        AddressV6 { bytes, scope_id: 0 }
    }

    /// `::`
    pub const fn any() -> Self {
        AddressV6::from_bytes([0; 16])
    }

    /// `::1`
    pub const fn loopback() -> Self {
        let mut bytes = [0; 16];
        bytes[15] = 1;
        AddressV6::from_bytes(bytes)
    }

    /// `::ffff:a.b.c.d` for the given IPv4 address.
    pub const fn v4_mapped(addr: AddressV4) -> Self {
        let v4 = addr.to_bytes();
        AddressV6::from_bytes([
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xFF, 0xFF, v4[0], v4[1], v4[2], v4[3],
        ])
    }

    pub const fn to_bytes(&self) -> [u8; 16] {
        self.bytes
    }

    pub const fn scope_id(&self) -> u32 {
        self.scope_id
    }

    pub fn set_scope_id(&mut self, scope_id: u32) {
        self.scope_id = scope_id;
    }

    /// The embedded IPv4 address of a v4-mapped address.
    pub fn to_v4(&self) -> Result<AddressV4, BadAddressCast> {
        if !self.is_v4_mapped() && !self.is_v4_compatible() {
            return Err(BadAddressCast);
        }
        let b = &self.bytes;
        Ok(AddressV4::from_bytes([b[12], b[13], b[14], b[15]]))
    }

    pub fn is_unspecified(&self) -> bool {
        self.bytes == [0; 16]
    }

    pub fn is_loopback(&self) -> bool {
        self.bytes == AddressV6::loopback().bytes
    }

    /// `fe80::/10`
    pub fn is_link_local(&self) -> bool {
        self.bytes[0] == 0xFE && (self.bytes[1] & 0xC0) == 0x80
    }

    /// `fec0::/10`
    pub fn is_site_local(&self) -> bool {
        self.bytes[0] == 0xFE && (self.bytes[1] & 0xC0) == 0xC0
    }

    /// `::ffff:0:0/96`
    pub fn is_v4_mapped(&self) -> bool {
        self.bytes[..10] == [0; 10] && self.bytes[10] == 0xFF && self.bytes[11] == 0xFF
    }

    /// `::a.b.c.d`, excluding `::` and `::1`.
    pub fn is_v4_compatible(&self) -> bool {
        self.bytes[..12] == [0; 12]
            && !(self.bytes[12] == 0
                && self.bytes[13] == 0
                && self.bytes[14] == 0
                && (self.bytes[15] == 0 || self.bytes[15] == 1))
    }

    /// `ff00::/8`
    pub fn is_multicast(&self) -> bool {
        self.bytes[0] == 0xFF
    }

    pub fn is_multicast_global(&self) -> bool {
        self.is_multicast() && (self.bytes[1] & 0x0F) == 0x0E
    }

    pub fn is_multicast_link_local(&self) -> bool {
        self.is_multicast() && (self.bytes[1] & 0x0F) == 0x02
    }

    pub fn is_multicast_node_local(&self) -> bool {
        self.is_multicast() && (self.bytes[1] & 0x0F) == 0x01
    }

    pub fn is_multicast_org_local(&self) -> bool {
        self.is_multicast() && (self.bytes[1] & 0x0F) == 0x08
    }

    pub fn is_multicast_site_local(&self) -> bool {
        self.is_multicast() && (self.bytes[1] & 0x0F) == 0x05
    }

    /// Link-local unicast or link-local multicast; the only addresses whose text
    /// form carries a `%scope` suffix.
    fn is_link_local_class(&self) -> bool {
        self.is_link_local() || self.is_multicast_link_local()
    }
}

impl FromStr for AddressV6 {
    type Err = AddrParseError;

    /// Parses RFC 4291 text with an optional `%scope` suffix.
    ///
    /// For link-local-class addresses the scope may name an interface; any other
    /// suffix is read as a number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || AddrParseError(s.to_owned());
        let (text, scope) = match s.split_once('%') {
            Some((text, scope)) => (text, Some(scope)),
            None => (s, None),
        };
        let mut addr = Ipv6Addr::from_str(text).map(AddressV6::from).map_err(|_| err())?;
        if let Some(scope) = scope {
            if scope.is_empty() {
                return Err(err());
            }
            let mut scope_id = 0;
            if addr.is_link_local_class() {
                scope_id = sys::if_nametoindex(scope);
            }
            if scope_id == 0 {
                scope_id = scope.parse().map_err(|_| err())?;
            }
            addr.scope_id = scope_id;
        }
        Ok(addr)
    }
}

impl fmt::Display for AddressV6 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut text = Ipv6Addr::from(self.bytes).to_string();
        if self.scope_id != 0 && self.is_link_local_class() {
            match sys::if_indextoname(self.scope_id) {
                Some(name) => text = format!("{text}%{name}"),
                None => text = format!("{text}%{}", self.scope_id),
            }
        }
        f.pad(&text)
    }
}

impl From<Ipv6Addr> for AddressV6 {
    fn from(addr: Ipv6Addr) -> Self {
        AddressV6::from_bytes(addr.octets())
    }
}

impl From<AddressV6> for Ipv6Addr {
    fn from(addr: AddressV6) -> Self {
        Ipv6Addr::from(addr.bytes)
    }
}

impl From<[u8; 16]> for AddressV6 {
    fn from(bytes: [u8; 16]) -> Self {
        AddressV6::from_bytes(bytes)
    }
}
