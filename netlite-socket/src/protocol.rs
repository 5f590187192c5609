//! Transport protocol descriptors.
//!
//! A protocol value tells `socket_ops::socket` which family, type and protocol
//! number to open with. `Socket<P>` is generic over it, so the choice is made at
//! compile time.

use crate::ip::{Endpoint, Family};
use crate::sys;

/// Socket orientation: a connected byte stream or discrete messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketType {
    Stream,
    Datagram,
}

impl SocketType {
    pub fn as_raw(&self) -> libc::c_int {
        match self {
            SocketType::Stream => sys::SOCK_STREAM,
            SocketType::Datagram => sys::SOCK_DGRAM,
        }
    }
}

/// Capability implemented by each concrete transport protocol.
pub trait Protocol: Copy + Send + Sync + 'static {
    fn family(&self) -> Family;

    fn sock_type(&self) -> SocketType;

    /// Protocol number passed as the third argument of `socket(2)`.
    fn protocol(&self) -> libc::c_int;

    /// The protocol of the same kind whose family matches `ep`.
    fn for_endpoint(ep: &Endpoint) -> Self;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tcp {
    family: Family,
}

impl Tcp {
    pub const fn v4() -> Self {
        Tcp { family: Family::V4 }
    }

    pub const fn v6() -> Self {
        Tcp { family: Family::V6 }
    }
}

impl Protocol for Tcp {
    fn family(&self) -> Family {
        self.family
    }

    fn sock_type(&self) -> SocketType {
        SocketType::Stream
    }

    fn protocol(&self) -> libc::c_int {
        sys::IPPROTO_TCP
    }

    fn for_endpoint(ep: &Endpoint) -> Self {
        Tcp { family: ep.family() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Udp {
    family: Family,
}

impl Udp {
    pub const fn v4() -> Self {
        Udp { family: Family::V4 }
    }

    pub const fn v6() -> Self {
        Udp { family: Family::V6 }
    }
}

impl Protocol for Udp {
    fn family(&self) -> Family {
        self.family
    }

    fn sock_type(&self) -> SocketType {
        SocketType::Datagram
    }

    fn protocol(&self) -> libc::c_int {
        sys::IPPROTO_UDP
    }

    fn for_endpoint(ep: &Endpoint) -> Self {
        Udp { family: ep.family() }
    }
}
