//! # Platform Abstraction
//!
//! All platform divergence of the crate lives behind this module: native handle
//! types, protocol constants, interface-name lookups and the completion-port backend.
//! The rest of the crate names `sys::...` and never a platform crate directly for
//! these concerns.
//!
//! Only the Unix backend is provided. The completion port is Linux specific
//! (`epoll` + `eventfd`).

#[cfg(not(unix))]
compile_error!("netlite-socket currently supports Unix platforms only");

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::*;

#[cfg(target_os = "linux")]
pub(crate) mod epoll;
