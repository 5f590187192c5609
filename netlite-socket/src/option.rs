//! # Socket Options
//!
//! ## Purpose
//!
//! `Socket::set_option` and `Socket::get_option` are generic over the two
//! capability traits defined here and know nothing about the meaning of any
//! particular option. An option only has to say where it lives (`level`,
//! `name`) and where its value bytes are (`data`, `size`, and `resize` for the
//! length the kernel reports back).
//!
//! ## Main components
//!
//! - `SettableSocketOption`, `GettableSocketOption`: the capability traits.
//! - `Boolean`, `Integer`: `int`-valued options keyed by const level and name.
//! - `Linger`: the `SO_LINGER` record.
//! - `EnableConnectionAborted`: a crate-level pseudo option that controls
//!   whether `accept` surfaces `ConnectionAborted` instead of retrying.

use crate::error::ErrorCode;
use crate::protocol::Protocol;
use crate::sys;
use std::mem::size_of;

/// Level reserved for options that are handled inside the crate and never reach
/// `setsockopt(2)`.
pub const CUSTOM_OPTION_LEVEL: libc::c_int = 0xA510_0000_u32 as libc::c_int;

/// Name of the connection-aborted pseudo option at [`CUSTOM_OPTION_LEVEL`].
pub const ENABLE_CONNECTION_ABORTED_OPTION: libc::c_int = 1;

/// # Safety
///
/// `data` must point to at least `size` readable bytes that stay valid for as
/// long as `self` is borrowed.
pub unsafe trait SettableSocketOption<P: Protocol> {
    fn level(&self, protocol: &P) -> libc::c_int;
    fn name(&self, protocol: &P) -> libc::c_int;
    fn data(&self, protocol: &P) -> *const libc::c_void;
    fn size(&self, protocol: &P) -> usize;
}

/// # Safety
///
/// `data_mut` must point to at least `size` writable bytes that stay valid for
/// as long as `self` is mutably borrowed.
pub unsafe trait GettableSocketOption<P: Protocol> {
    fn level(&self, protocol: &P) -> libc::c_int;
    fn name(&self, protocol: &P) -> libc::c_int;
    fn data_mut(&mut self, protocol: &P) -> *mut libc::c_void;
    fn size(&self, protocol: &P) -> usize;

    /// Accepts the length written back by `getsockopt(2)`.
    fn resize(&mut self, protocol: &P, size: usize) -> Result<(), ErrorCode>;
}

/// An on/off option stored as a C `int`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Boolean<const LEVEL: libc::c_int, const NAME: libc::c_int> {
    value: libc::c_int,
}

impl<const LEVEL: libc::c_int, const NAME: libc::c_int> Boolean<LEVEL, NAME> {
    pub fn new(value: bool) -> Self {
        Boolean {
            value: value as libc::c_int,
        }
    }

    pub fn value(&self) -> bool {
        self.value != 0
    }
}

unsafe impl<P: Protocol, const LEVEL: libc::c_int, const NAME: libc::c_int> SettableSocketOption<P>
    for Boolean<LEVEL, NAME>
{
    fn level(&self, _: &P) -> libc::c_int {
        LEVEL
    }

    fn name(&self, _: &P) -> libc::c_int {
        NAME
    }

    fn data(&self, _: &P) -> *const libc::c_void {
        &self.value as *const libc::c_int as *const libc::c_void
    }

    fn size(&self, _: &P) -> usize {
        size_of::<libc::c_int>()
    }
}

unsafe impl<P: Protocol, const LEVEL: libc::c_int, const NAME: libc::c_int> GettableSocketOption<P>
    for Boolean<LEVEL, NAME>
{
    fn level(&self, _: &P) -> libc::c_int {
        LEVEL
    }

    fn name(&self, _: &P) -> libc::c_int {
        NAME
    }

    fn data_mut(&mut self, _: &P) -> *mut libc::c_void {
        &mut self.value as *mut libc::c_int as *mut libc::c_void
    }

    fn size(&self, _: &P) -> usize {
        size_of::<libc::c_int>()
    }

    fn resize(&mut self, _: &P, size: usize) -> Result<(), ErrorCode> {
        // Some stacks report a single byte for boolean options.
        if size == size_of::<libc::c_char>() {
            self.value = (self.value.to_ne_bytes()[0] != 0) as libc::c_int;
            return Ok(());
        }
        if size != size_of::<libc::c_int>() {
            return Err(ErrorCode::InvalidArgument);
        }
        Ok(())
    }
}

/// An integer option stored as a C `int`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Integer<const LEVEL: libc::c_int, const NAME: libc::c_int> {
    value: libc::c_int,
}

impl<const LEVEL: libc::c_int, const NAME: libc::c_int> Integer<LEVEL, NAME> {
    pub fn new(value: i32) -> Self {
        Integer { value }
    }

    pub fn value(&self) -> i32 {
        self.value
    }
}

unsafe impl<P: Protocol, const LEVEL: libc::c_int, const NAME: libc::c_int> SettableSocketOption<P>
    for Integer<LEVEL, NAME>
{
    fn level(&self, _: &P) -> libc::c_int {
        LEVEL
    }

    fn name(&self, _: &P) -> libc::c_int {
        NAME
    }

    fn data(&self, _: &P) -> *const libc::c_void {
        &self.value as *const libc::c_int as *const libc::c_void
    }

    fn size(&self, _: &P) -> usize {
        size_of::<libc::c_int>()
    }
}

unsafe impl<P: Protocol, const LEVEL: libc::c_int, const NAME: libc::c_int> GettableSocketOption<P>
    for Integer<LEVEL, NAME>
{
    fn level(&self, _: &P) -> libc::c_int {
        LEVEL
    }

    fn name(&self, _: &P) -> libc::c_int {
        NAME
    }

    fn data_mut(&mut self, _: &P) -> *mut libc::c_void {
        &mut self.value as *mut libc::c_int as *mut libc::c_void
    }

    fn size(&self, _: &P) -> usize {
        size_of::<libc::c_int>()
    }

    fn resize(&mut self, _: &P, size: usize) -> Result<(), ErrorCode> {
        if size != size_of::<libc::c_int>() {
            return Err(ErrorCode::InvalidArgument);
        }
        Ok(())
    }
}

/// `SO_LINGER`: whether `close` waits for unsent data, and for how long.
#[derive(Clone, Copy)]
pub struct Linger {
    value: libc::linger,
}

impl Linger {
    pub fn new(enabled: bool, timeout_secs: i32) -> Self {
        Linger {
            value: libc::linger {
                l_onoff: enabled as libc::c_int,
                l_linger: timeout_secs,
            },
        }
    }

    pub fn enabled(&self) -> bool {
        self.value.l_onoff != 0
    }

    pub fn timeout(&self) -> i32 {
        self.value.l_linger
    }
}

impl Default for Linger {
    fn default() -> Self {
        Linger::new(false, 0)
    }
}

impl std::fmt::Debug for Linger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Linger")
            .field("enabled", &self.enabled())
            .field("timeout", &self.timeout())
            .finish()
    }
}

unsafe impl<P: Protocol> SettableSocketOption<P> for Linger {
    fn level(&self, _: &P) -> libc::c_int {
        sys::SOL_SOCKET
    }

    fn name(&self, _: &P) -> libc::c_int {
        sys::SO_LINGER
    }

    fn data(&self, _: &P) -> *const libc::c_void {
        &self.value as *const libc::linger as *const libc::c_void
    }

    fn size(&self, _: &P) -> usize {
        size_of::<libc::linger>()
    }
}

unsafe impl<P: Protocol> GettableSocketOption<P> for Linger {
    fn level(&self, _: &P) -> libc::c_int {
        sys::SOL_SOCKET
    }

    fn name(&self, _: &P) -> libc::c_int {
        sys::SO_LINGER
    }

    fn data_mut(&mut self, _: &P) -> *mut libc::c_void {
        &mut self.value as *mut libc::linger as *mut libc::c_void
    }

    fn size(&self, _: &P) -> usize {
        size_of::<libc::linger>()
    }

    fn resize(&mut self, _: &P, size: usize) -> Result<(), ErrorCode> {
        if size != size_of::<libc::linger>() {
            return Err(ErrorCode::InvalidArgument);
        }
        Ok(())
    }
}

pub type Broadcast = Boolean<{ libc::SOL_SOCKET }, { libc::SO_BROADCAST }>;
pub type DoNotRoute = Boolean<{ libc::SOL_SOCKET }, { libc::SO_DONTROUTE }>;
pub type KeepAlive = Boolean<{ libc::SOL_SOCKET }, { libc::SO_KEEPALIVE }>;
pub type ReuseAddress = Boolean<{ libc::SOL_SOCKET }, { libc::SO_REUSEADDR }>;
pub type NoDelay = Boolean<{ libc::IPPROTO_TCP }, { libc::TCP_NODELAY }>;
pub type V6Only = Boolean<{ libc::IPPROTO_IPV6 }, { libc::IPV6_V6ONLY }>;
pub type SendBufferSize = Integer<{ libc::SOL_SOCKET }, { libc::SO_SNDBUF }>;
pub type ReceiveBufferSize = Integer<{ libc::SOL_SOCKET }, { libc::SO_RCVBUF }>;
pub type SendLowWatermark = Integer<{ libc::SOL_SOCKET }, { libc::SO_SNDLOWAT }>;
pub type ReceiveLowWatermark = Integer<{ libc::SOL_SOCKET }, { libc::SO_RCVLOWAT }>;

/// When enabled, `accept` reports `ConnectionAborted` instead of retrying.
pub type EnableConnectionAborted =
    Boolean<CUSTOM_OPTION_LEVEL, ENABLE_CONNECTION_ABORTED_OPTION>;
