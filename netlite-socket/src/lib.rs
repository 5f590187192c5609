//! # netlite-socket
//!
//! Portable socket handles over the native socket API.
//!
//! - [`ip`]: address and endpoint value types.
//! - [`socket_ops`]: thin primitives over the native calls plus the blocking
//!   (`sync_*`) and readiness-driven (`non_blocking_*`) variants.
//! - [`Socket`]: the protocol-typed handle with shared ownership.
//! - `reactor`: a completion-port reactor for asynchronous operations (Linux).
//!
//! Every native error is translated into [`ErrorCode`] before it leaves the
//! crate, so callers never branch on raw platform codes.

// Public modules and re-exports
pub mod error;
pub mod ip;
pub mod option;
pub mod protocol;
pub mod resolver;
pub mod socket_ops;
pub mod sys;

#[cfg(target_os = "linux")]
pub mod reactor;

mod retry;
mod socket;

#[cfg(test)]
mod tests;

pub use error::{AddrParseError, BadAddressCast, Error, ErrorClass, ErrorCode, Result};
pub use ip::{Address, AddressClass, AddressV4, AddressV6, Endpoint, Family};
pub use protocol::{Protocol, SocketType, Tcp, Udp};
pub use socket::{Socket, TcpSocket, UdpSocket};
pub use socket_ops::{MessageFlags, ShutdownType, StateFlags, WaitType};

#[cfg(target_os = "linux")]
pub use reactor::{Completion, HandleKey, Interest, Reactor, ReactorConfig, ReactorOp};
