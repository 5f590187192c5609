//! # IP Endpoint
//!
//! ## Purpose
//!
//! An [`Endpoint`] is an address and a port kept directly in the native socket
//! address layout, so that it can be handed to `bind`, `connect`, `sendto` and
//! friends without any conversion, and filled in place by `accept`, `recvfrom`,
//! `getsockname` and `getpeername`.
//!
//! ## How it works
//!
//! The record is a union of `sockaddr`, `sockaddr_in` and `sockaddr_in6`; its
//! capacity is therefore the larger of the two IP layouts. The active layout is
//! selected by the family field, and `size()` always reports the length of that
//! layout. Port accessors convert between host and network byte order.
//!
//! ## Main components
//!
//! - `Endpoint`: the wire-format record with address and port accessors.

use crate::error::ErrorCode;
use crate::ip::{Address, AddressV4, AddressV6, Family};
use static_assertions::const_assert;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem::size_of;
use std::net::{IpAddr, SocketAddr};

#[repr(C)]
#[derive(Clone, Copy)]
union SockAddr {
    base: libc::sockaddr,
    v4: libc::sockaddr_in,
    v6: libc::sockaddr_in6,
}

const_assert!(size_of::<SockAddr>() >= size_of::<libc::sockaddr_in>());
const_assert!(size_of::<SockAddr>() >= size_of::<libc::sockaddr_in6>());
const_assert!(size_of::<SockAddr>() <= size_of::<libc::sockaddr_storage>());

/// An IP address and port in the native socket address layout.
#[derive(Clone, Copy)]
pub struct Endpoint {
    data: SockAddr,
}

impl Endpoint {
    /// Builds an endpoint, selecting the layout from the address family.
    pub fn new(addr: impl Into<Address>, port: u16) -> Self {
        let mut ep = Endpoint::zeroed();
        ep.set_address(addr.into());
        ep.set_port(port);
        ep
    }

    /// The unspecified address of `family` with the given port.
    pub fn from_family(family: Family, port: u16) -> Self {
        match family {
            Family::V4 => Endpoint::new(AddressV4::any(), port),
            Family::V6 => Endpoint::new(AddressV6::any(), port),
        }
    }

    fn zeroed() -> Self {
        Endpoint {
            data: unsafe { std::mem::zeroed() },
        }
    }

    pub fn is_v4(&self) -> bool {
        self.raw_family() == libc::AF_INET
    }

    pub fn family(&self) -> Family {
        if self.is_v4() { Family::V4 } else { Family::V6 }
    }

    fn raw_family(&self) -> libc::c_int {
        unsafe { self.data.base.sa_family as libc::c_int }
    }

    /// Pointer to the native record, for syscalls that read it.
    pub fn data(&self) -> *const libc::sockaddr {
        unsafe { &self.data.base as *const libc::sockaddr }
    }

    /// Pointer to the native record, for syscalls that fill it.
    pub fn data_mut(&mut self) -> *mut libc::sockaddr {
        unsafe { &mut self.data.base as *mut libc::sockaddr }
    }

    /// Length of the layout of the currently stored family.
    pub fn size(&self) -> usize {
        if self.is_v4() {
            size_of::<libc::sockaddr_in>()
        } else {
            size_of::<libc::sockaddr_in6>()
        }
    }

    /// Accepts a length reported by the kernel after filling the record.
    pub fn resize(&mut self, new_size: usize) -> Result<(), ErrorCode> {
        if new_size > self.capacity() {
            return Err(ErrorCode::InvalidArgument);
        }
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        size_of::<SockAddr>()
    }

    pub fn port(&self) -> u16 {
        let port = unsafe {
            if self.is_v4() {
                self.data.v4.sin_port
            } else {
                self.data.v6.sin6_port
            }
        };
        u16::from_be(port)
    }

    pub fn set_port(&mut self, port: u16) {
        if self.is_v4() {
            self.data.v4.sin_port = port.to_be();
        } else {
            self.data.v6.sin6_port = port.to_be();
        }
    }

    pub fn address(&self) -> Address {
        unsafe {
            if self.is_v4() {
                Address::V4(AddressV4::from_u32(u32::from_be(
                    self.data.v4.sin_addr.s_addr,
                )))
            } else {
                Address::V6(AddressV6::new(
                    self.data.v6.sin6_addr.s6_addr,
                    self.data.v6.sin6_scope_id,
                ))
            }
        }
    }

    /// Replaces the address, switching the layout when the family changes.
    pub fn set_address(&mut self, addr: Address) {
        let port = self.port();
        let mut data: SockAddr = unsafe { std::mem::zeroed() };
        match addr {
            Address::V4(v4) => {
                data.v4 = libc::sockaddr_in {
                    sin_family: libc::AF_INET as libc::sa_family_t,
                    sin_port: port.to_be(),
                    sin_addr: libc::in_addr {
                        s_addr: v4.to_u32().to_be(),
                    },
                    ..unsafe { std::mem::zeroed() }
                };
            }
            Address::V6(v6) => {
                data.v6 = libc::sockaddr_in6 {
                    sin6_family: libc::AF_INET6 as libc::sa_family_t,
                    sin6_port: port.to_be(),
                    sin6_addr: libc::in6_addr {
                        s6_addr: v6.to_bytes(),
                    },
                    sin6_scope_id: v6.scope_id(),
                    ..unsafe { std::mem::zeroed() }
                };
            }
        }
        self.data = data;
        self.set_len();
    }

    #[cfg(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly"
    ))]
    fn set_len(&mut self) {
        let len = self.size() as u8;
        self.data.base.sa_len = len;
    }

    #[cfg(not(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly"
    )))]
    fn set_len(&mut self) {}
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::new(AddressV4::any(), 0)
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address() && self.port() == other.port()
    }
}

impl Eq for Endpoint {}

impl PartialOrd for Endpoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Endpoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.address()
            .cmp(&other.address())
            .then_with(|| self.port().cmp(&other.port()))
    }
}

impl Hash for Endpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
        self.port().hash(state);
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.address() {
            Address::V4(addr) => write!(f, "{}:{}", addr, self.port()),
            Address::V6(addr) => write!(f, "[{}]:{}", addr, self.port()),
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Endpoint({self})")
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        let mut ep = Endpoint::new(Address::from(addr.ip()), addr.port());
        if let (SocketAddr::V6(v6), Address::V6(mut a)) = (addr, ep.address()) {
            a.set_scope_id(v6.scope_id());
            ep.set_address(Address::V6(a));
        }
        ep
    }
}

impl From<Endpoint> for SocketAddr {
    fn from(ep: Endpoint) -> Self {
        match ep.address() {
            Address::V4(addr) => SocketAddr::new(IpAddr::V4(addr.into()), ep.port()),
            Address::V6(addr) => SocketAddr::V6(std::net::SocketAddrV6::new(
                addr.into(),
                ep.port(),
                0,
                addr.scope_id(),
            )),
        }
    }
}
