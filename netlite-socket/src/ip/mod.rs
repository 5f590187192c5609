//! # IP Address Model
//!
//! ## Purpose
//!
//! Value types for IPv4 and IPv6 addresses and the wire-format endpoint that
//! pairs an address with a port. None of these types touch a socket; they are
//! plain copyable values with parsing, formatting, classification and ordering.
//!
//! ## Main components
//!
//! - `AddressV4`, `AddressV6`: per-family addresses.
//! - `Address`: either family, ordered family first.
//! - `Endpoint`: address and port in the native `sockaddr` layout.
//! - `Family`: the address family selector used by protocols.

mod address;
mod address_v4;
mod address_v6;
mod endpoint;

pub use address::{Address, AddressClass};
pub use address_v4::AddressV4;
pub use address_v6::AddressV6;
pub use endpoint::Endpoint;

use crate::sys;

/// Internet address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    V4,
    V6,
}

impl Family {
    pub fn as_raw(&self) -> libc::c_int {
        match self {
            Family::V4 => sys::AF_INET,
            Family::V6 => sys::AF_INET6,
        }
    }
}
