//! # Socket Operation Primitives
//!
//! ## Purpose
//!
//! Free functions wrapping each native socket call. Every function takes a raw
//! descriptor, returns `Result<_, ErrorCode>` and never panics; the socket handle
//! and the reactor are built on top of these.
//!
//! ## How it works
//!
//! Three families live here:
//!
//! - Plain wrappers (`socket`, `bind`, `recv`, `setsockopt`, ...) issue one
//!   syscall and map `errno` through [`ErrorCode::from_raw_os_error`].
//! - `non_blocking_*` helpers are used by the reactor once a descriptor reported
//!   readiness. They return `None` when the call would block and the operation
//!   has to wait for the next readiness event, and retry `EINTR` silently.
//! - `sync_*` helpers give blocking semantics on top of a descriptor that may be
//!   in non-blocking mode: try the call, and on would-block either report it (if
//!   the user asked for non-blocking mode) or wait for readiness and try again.
//!
//! Buffers are passed as `IoSlice`/`IoSliceMut` arrays, which share the layout of
//! `struct iovec`, so scatter/gather goes straight to `sendmsg`/`recvmsg`.
//!
//! ## Main components
//!
//! - `StateFlags`: per-socket state word consulted by the helpers.
//! - `MessageFlags`: the portable subset of `MSG_*` flags.
//! - `ShutdownType`, `WaitType`: selectors for `shutdown` and readiness waits.

use crate::error::ErrorCode;
use crate::ip::Endpoint;
use crate::option::{CUSTOM_OPTION_LEVEL, ENABLE_CONNECTION_ABORTED_OPTION};
use crate::retry::retry_blocking;
use crate::sys::{self, RawSocket, cvt};
use bitflags::bitflags;
use std::io::{IoSlice, IoSliceMut};
use std::mem::{size_of, zeroed};

bitflags! {
    /// State of a socket as seen by the primitives.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StateFlags: u8 {
        /// The user put the socket in non-blocking mode.
        const USER_SET_NON_BLOCKING = 1;
        /// The crate put the socket in non-blocking mode for reactor use.
        const INTERNAL_NON_BLOCKING = 2;
        const NON_BLOCKING = Self::USER_SET_NON_BLOCKING.bits() | Self::INTERNAL_NON_BLOCKING.bits();
        /// `accept` surfaces `ConnectionAborted` instead of retrying.
        const ENABLE_CONNECTION_ABORTED = 4;
        /// `SO_LINGER` was set through `setsockopt`.
        const USER_SET_LINGER = 8;
        const STREAM_ORIENTED = 16;
        const DATAGRAM_ORIENTED = 32;
        /// The descriptor came from `assign` and may be shared with other owners.
        const POSSIBLE_DUP = 64;
    }
}

bitflags! {
    /// Flags accepted by the send and receive operations.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MessageFlags: libc::c_int {
        /// `MSG_PEEK`: leave the data in the receive queue.
        const PEEK = sys::MSG_PEEK;
        /// `MSG_OOB`: out-of-band data.
        const OUT_OF_BAND = sys::MSG_OOB;
        /// `MSG_DONTROUTE`: bypass routing.
        const DO_NOT_ROUTE = sys::MSG_DONTROUTE;
        /// `MSG_EOR`: end of record.
        const END_OF_RECORD = sys::MSG_EOR;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownType {
    Receive,
    Send,
    Both,
}

impl ShutdownType {
    fn as_raw(&self) -> libc::c_int {
        match self {
            ShutdownType::Receive => sys::SHUT_RD,
            ShutdownType::Send => sys::SHUT_WR,
            ShutdownType::Both => sys::SHUT_RDWR,
        }
    }
}

/// Readiness condition to wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitType {
    Read,
    Write,
    Error,
}

fn check(fd: RawSocket) -> Result<(), ErrorCode> {
    if fd == sys::INVALID_SOCKET {
        return Err(ErrorCode::BadDescriptor);
    }
    Ok(())
}

fn is_stream(state: StateFlags) -> bool {
    state.contains(StateFlags::STREAM_ORIENTED)
}

/// Opens a new descriptor, close-on-exec where the platform allows it.
pub fn socket(
    family: libc::c_int,
    ty: libc::c_int,
    protocol: libc::c_int,
) -> Result<RawSocket, ErrorCode> {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    let ty = ty | libc::SOCK_CLOEXEC;
    let fd = cvt(unsafe { libc::socket(family, ty, protocol) })?;
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        let on: libc::c_int = 1;
        let ret = cvt(unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_NOSIGPIPE,
                &on as *const libc::c_int as *const libc::c_void,
                size_of::<libc::c_int>() as libc::socklen_t,
            )
        });
        if let Err(err) = ret {
            unsafe { libc::close(fd) };
            return Err(err);
        }
    }
    Ok(fd)
}

/// A pair of connected descriptors.
pub fn socketpair(
    family: libc::c_int,
    ty: libc::c_int,
    protocol: libc::c_int,
) -> Result<(RawSocket, RawSocket), ErrorCode> {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    let ty = ty | libc::SOCK_CLOEXEC;
    let mut fds = [sys::INVALID_SOCKET; 2];
    cvt(unsafe { libc::socketpair(family, ty, protocol, fds.as_mut_ptr()) })?;
    Ok((fds[0], fds[1]))
}

pub fn bind(fd: RawSocket, ep: &Endpoint) -> Result<(), ErrorCode> {
    check(fd)?;
    cvt(unsafe { libc::bind(fd, ep.data(), ep.size() as libc::socklen_t) })?;
    Ok(())
}

pub fn listen(fd: RawSocket, backlog: i32) -> Result<(), ErrorCode> {
    check(fd)?;
    cvt(unsafe { libc::listen(fd, backlog) })?;
    Ok(())
}

/// Accepts one pending connection, storing the peer address in `peer` if given.
pub fn accept(fd: RawSocket, peer: Option<&mut Endpoint>) -> Result<RawSocket, ErrorCode> {
    check(fd)?;
    let mut ep = Endpoint::default();
    let mut len = ep.capacity() as libc::socklen_t;
    #[cfg(any(target_os = "linux", target_os = "android"))]
    let new_fd = cvt(unsafe { libc::accept4(fd, ep.data_mut(), &mut len, libc::SOCK_CLOEXEC) })?;
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    let new_fd = cvt(unsafe { libc::accept(fd, ep.data_mut(), &mut len) })?;
    if let Some(peer) = peer {
        if let Err(err) = ep.resize(len as usize) {
            unsafe { libc::close(new_fd) };
            return Err(err);
        }
        *peer = ep;
    }
    Ok(new_fd)
}

pub fn connect(fd: RawSocket, ep: &Endpoint) -> Result<(), ErrorCode> {
    check(fd)?;
    cvt(unsafe { libc::connect(fd, ep.data(), ep.size() as libc::socklen_t) })?;
    Ok(())
}

pub fn shutdown(fd: RawSocket, how: ShutdownType) -> Result<(), ErrorCode> {
    check(fd)?;
    cvt(unsafe { libc::shutdown(fd, how.as_raw()) })?;
    Ok(())
}

/// Closes `fd`.
///
/// With `destruction` set, a linger the user configured is switched off first so
/// that closing never blocks. A close that reports would-block is retried after
/// putting the descriptor back into blocking mode.
pub fn close(fd: RawSocket, state: &mut StateFlags, destruction: bool) -> Result<(), ErrorCode> {
    check(fd)?;
    if destruction && state.contains(StateFlags::USER_SET_LINGER) {
        let opt = libc::linger {
            l_onoff: 0,
            l_linger: 0,
        };
        // Best effort; the close below reports the error that matters.
        let _ = cvt(unsafe {
            libc::setsockopt(
                fd,
                sys::SOL_SOCKET,
                sys::SO_LINGER,
                &opt as *const libc::linger as *const libc::c_void,
                size_of::<libc::linger>() as libc::socklen_t,
            )
        });
    }
    match cvt(unsafe { libc::close(fd) }) {
        Ok(_) => Ok(()),
        Err(err) if err.is_would_block() => {
            let mut arg: libc::c_int = 0;
            let _ = cvt(unsafe { libc::ioctl(fd, libc::FIONBIO, &mut arg) });
            state.remove(StateFlags::NON_BLOCKING);
            cvt(unsafe { libc::close(fd) })?;
            Ok(())
        }
        Err(err) => Err(err),
    }
}

fn set_fionbio(fd: RawSocket, value: bool) -> Result<(), ErrorCode> {
    let mut arg: libc::c_int = value as libc::c_int;
    cvt(unsafe { libc::ioctl(fd, libc::FIONBIO, &mut arg) })?;
    Ok(())
}

/// Switches non-blocking mode on behalf of the user.
///
/// Turning it off also drops the mode the crate may have applied internally.
pub fn set_user_non_blocking(
    fd: RawSocket,
    state: &mut StateFlags,
    value: bool,
) -> Result<(), ErrorCode> {
    check(fd)?;
    set_fionbio(fd, value)?;
    if value {
        state.insert(StateFlags::USER_SET_NON_BLOCKING);
    } else {
        state.remove(StateFlags::NON_BLOCKING);
    }
    Ok(())
}

/// Switches non-blocking mode for internal use.
///
/// Clearing it is refused while the user still wants non-blocking mode.
pub fn set_internal_non_blocking(
    fd: RawSocket,
    state: &mut StateFlags,
    value: bool,
) -> Result<(), ErrorCode> {
    check(fd)?;
    if !value && state.contains(StateFlags::USER_SET_NON_BLOCKING) {
        return Err(ErrorCode::InvalidArgument);
    }
    set_fionbio(fd, value)?;
    if value {
        state.insert(StateFlags::INTERNAL_NON_BLOCKING);
    } else {
        state.remove(StateFlags::INTERNAL_NON_BLOCKING);
    }
    Ok(())
}

fn msghdr_for(bufs_ptr: *mut libc::iovec, bufs_len: usize) -> libc::msghdr {
    let mut msg: libc::msghdr = unsafe { zeroed() };
    msg.msg_iov = bufs_ptr;
    msg.msg_iovlen = bufs_len as _;
    msg
}

pub fn recv(
    fd: RawSocket,
    bufs: &mut [IoSliceMut<'_>],
    flags: MessageFlags,
) -> Result<usize, ErrorCode> {
    check(fd)?;
    let mut msg = msghdr_for(bufs.as_mut_ptr() as *mut libc::iovec, bufs.len());
    let n = cvt(unsafe { libc::recvmsg(fd, &mut msg, flags.bits()) })?;
    Ok(n as usize)
}

pub fn recvfrom(
    fd: RawSocket,
    bufs: &mut [IoSliceMut<'_>],
    flags: MessageFlags,
    sender: &mut Endpoint,
) -> Result<usize, ErrorCode> {
    check(fd)?;
    let mut msg = msghdr_for(bufs.as_mut_ptr() as *mut libc::iovec, bufs.len());
    msg.msg_name = sender.data_mut() as *mut libc::c_void;
    msg.msg_namelen = sender.capacity() as libc::socklen_t;
    let n = cvt(unsafe { libc::recvmsg(fd, &mut msg, flags.bits()) })?;
    sender.resize(msg.msg_namelen as usize)?;
    Ok(n as usize)
}

pub fn send(fd: RawSocket, bufs: &[IoSlice<'_>], flags: MessageFlags) -> Result<usize, ErrorCode> {
    check(fd)?;
    let msg = msghdr_for(bufs.as_ptr() as *mut libc::iovec, bufs.len());
    let n = cvt(unsafe { libc::sendmsg(fd, &msg, flags.bits() | sys::MSG_SEND_DEFAULT) })?;
    Ok(n as usize)
}

pub fn sendto(
    fd: RawSocket,
    bufs: &[IoSlice<'_>],
    flags: MessageFlags,
    dest: &Endpoint,
) -> Result<usize, ErrorCode> {
    check(fd)?;
    let mut msg = msghdr_for(bufs.as_ptr() as *mut libc::iovec, bufs.len());
    msg.msg_name = dest.data() as *mut libc::c_void;
    msg.msg_namelen = dest.size() as libc::socklen_t;
    let n = cvt(unsafe { libc::sendmsg(fd, &msg, flags.bits() | sys::MSG_SEND_DEFAULT) })?;
    Ok(n as usize)
}

/// Applies an option. The crate-level pseudo options only update `state`.
///
/// # Safety
///
/// `data` must be null or point to `size` readable bytes.
pub unsafe fn setsockopt(
    fd: RawSocket,
    state: &mut StateFlags,
    level: libc::c_int,
    name: libc::c_int,
    data: *const libc::c_void,
    size: usize,
) -> Result<(), ErrorCode> {
    if level == CUSTOM_OPTION_LEVEL && name == ENABLE_CONNECTION_ABORTED_OPTION {
        if size != size_of::<libc::c_int>() || data.is_null() {
            return Err(ErrorCode::InvalidArgument);
        }
        let value = unsafe { *(data as *const libc::c_int) };
        state.set(StateFlags::ENABLE_CONNECTION_ABORTED, value != 0);
        return Ok(());
    }
    if level == CUSTOM_OPTION_LEVEL {
        return Err(ErrorCode::InvalidArgument);
    }
    check(fd)?;
    cvt(unsafe { libc::setsockopt(fd, level, name, data, size as libc::socklen_t) })?;
    if level == sys::SOL_SOCKET && name == sys::SO_LINGER {
        state.insert(StateFlags::USER_SET_LINGER);
    }
    Ok(())
}

/// Reads an option into `data`, updating `size` to the length written.
///
/// # Safety
///
/// `data` must be null or point to `*size` writable bytes.
pub unsafe fn getsockopt(
    fd: RawSocket,
    state: StateFlags,
    level: libc::c_int,
    name: libc::c_int,
    data: *mut libc::c_void,
    size: &mut usize,
) -> Result<(), ErrorCode> {
    if level == CUSTOM_OPTION_LEVEL && name == ENABLE_CONNECTION_ABORTED_OPTION {
        if *size != size_of::<libc::c_int>() || data.is_null() {
            return Err(ErrorCode::InvalidArgument);
        }
        let value = state.contains(StateFlags::ENABLE_CONNECTION_ABORTED) as libc::c_int;
        unsafe { *(data as *mut libc::c_int) = value };
        return Ok(());
    }
    if level == CUSTOM_OPTION_LEVEL {
        return Err(ErrorCode::InvalidArgument);
    }
    check(fd)?;
    let mut len = *size as libc::socklen_t;
    cvt(unsafe { libc::getsockopt(fd, level, name, data, &mut len) })?;
    *size = len as usize;
    // Linux doubles the buffer sizes it is given and reports the doubled value.
    #[cfg(target_os = "linux")]
    if level == sys::SOL_SOCKET
        && (name == libc::SO_SNDBUF || name == libc::SO_RCVBUF)
        && *size == size_of::<libc::c_int>()
    {
        unsafe { *(data as *mut libc::c_int) /= 2 };
    }
    Ok(())
}

pub fn getsockname(fd: RawSocket, ep: &mut Endpoint) -> Result<(), ErrorCode> {
    check(fd)?;
    let mut len = ep.capacity() as libc::socklen_t;
    cvt(unsafe { libc::getsockname(fd, ep.data_mut(), &mut len) })?;
    ep.resize(len as usize)
}

pub fn getpeername(fd: RawSocket, ep: &mut Endpoint) -> Result<(), ErrorCode> {
    check(fd)?;
    let mut len = ep.capacity() as libc::socklen_t;
    cvt(unsafe { libc::getpeername(fd, ep.data_mut(), &mut len) })?;
    ep.resize(len as usize)
}

/// Bytes that can be read without blocking.
pub fn available(fd: RawSocket) -> Result<usize, ErrorCode> {
    check(fd)?;
    let mut value: libc::c_int = 0;
    cvt(unsafe { libc::ioctl(fd, libc::FIONREAD, &mut value) })?;
    Ok(value.max(0) as usize)
}

fn poll_one(fd: RawSocket, events: libc::c_short, msec: i32) -> Result<bool, ErrorCode> {
    let mut pfd = libc::pollfd {
        fd,
        events,
        revents: 0,
    };
    loop {
        match cvt(unsafe { libc::poll(&mut pfd, 1, msec) }) {
            Ok(n) => return Ok(n > 0),
            Err(ErrorCode::Interrupted) => continue,
            Err(err) => return Err(err),
        }
    }
}

fn poll_with_state(
    fd: RawSocket,
    state: StateFlags,
    events: libc::c_short,
    msec: i32,
) -> Result<bool, ErrorCode> {
    check(fd)?;
    let user_nb = state.contains(StateFlags::USER_SET_NON_BLOCKING);
    let ready = poll_one(fd, events, if user_nb { 0 } else { msec })?;
    if !ready && user_nb {
        return Err(ErrorCode::WouldBlock);
    }
    Ok(ready)
}

/// Waits up to `msec` (negative: forever) for `fd` to become readable.
///
/// In user non-blocking mode the wait does not block and reports `WouldBlock`
/// when the descriptor is not ready.
pub fn poll_read(fd: RawSocket, state: StateFlags, msec: i32) -> Result<bool, ErrorCode> {
    poll_with_state(fd, state, libc::POLLIN, msec)
}

pub fn poll_write(fd: RawSocket, state: StateFlags, msec: i32) -> Result<bool, ErrorCode> {
    poll_with_state(fd, state, libc::POLLOUT, msec)
}

pub fn poll_error(fd: RawSocket, state: StateFlags, msec: i32) -> Result<bool, ErrorCode> {
    poll_with_state(fd, state, libc::POLLPRI | libc::POLLERR | libc::POLLHUP, msec)
}

/// Waits for an in-progress connect to finish, successfully or not.
pub fn poll_connect(fd: RawSocket, msec: i32) -> Result<bool, ErrorCode> {
    check(fd)?;
    poll_one(fd, libc::POLLOUT, msec)
}

pub fn poll_wait(
    fd: RawSocket,
    state: StateFlags,
    wait: WaitType,
    msec: i32,
) -> Result<bool, ErrorCode> {
    match wait {
        WaitType::Read => poll_read(fd, state, msec),
        WaitType::Write => poll_write(fd, state, msec),
        WaitType::Error => poll_error(fd, state, msec),
    }
}

/// The result of a finished connect, read from `SO_ERROR`.
pub fn connect_error(fd: RawSocket) -> Result<(), ErrorCode> {
    check(fd)?;
    let mut err: libc::c_int = 0;
    let mut len = size_of::<libc::c_int>() as libc::socklen_t;
    cvt(unsafe {
        libc::getsockopt(
            fd,
            sys::SOL_SOCKET,
            sys::SO_ERROR,
            &mut err as *mut libc::c_int as *mut libc::c_void,
            &mut len,
        )
    })?;
    if err != 0 {
        return Err(ErrorCode::from_raw_os_error(err));
    }
    Ok(())
}

pub fn host_name() -> Result<String, ErrorCode> {
    sys::host_name()
}

pub fn host_to_network_short(value: u16) -> u16 {
    value.to_be()
}

pub fn network_to_host_short(value: u16) -> u16 {
    u16::from_be(value)
}

pub fn host_to_network_long(value: u32) -> u32 {
    value.to_be()
}

pub fn network_to_host_long(value: u32) -> u32 {
    u32::from_be(value)
}

// --- non-blocking helpers used by the reactor ---

fn non_blocking<T>(mut attempt: impl FnMut() -> Result<T, ErrorCode>) -> Option<Result<T, ErrorCode>> {
    loop {
        match attempt() {
            Err(ErrorCode::Interrupted) => continue,
            Err(err) if err.is_would_block() => return None,
            other => return Some(other),
        }
    }
}

pub fn non_blocking_recv(
    fd: RawSocket,
    bufs: &mut [IoSliceMut<'_>],
    flags: MessageFlags,
    is_stream: bool,
) -> Option<Result<usize, ErrorCode>> {
    non_blocking(|| match recv(fd, &mut *bufs, flags) {
        Ok(0) if is_stream => Err(ErrorCode::Eof),
        other => other,
    })
}

pub fn non_blocking_recvfrom(
    fd: RawSocket,
    bufs: &mut [IoSliceMut<'_>],
    flags: MessageFlags,
    sender: &mut Endpoint,
) -> Option<Result<usize, ErrorCode>> {
    non_blocking(|| recvfrom(fd, &mut *bufs, flags, &mut *sender))
}

pub fn non_blocking_send(
    fd: RawSocket,
    bufs: &[IoSlice<'_>],
    flags: MessageFlags,
) -> Option<Result<usize, ErrorCode>> {
    non_blocking(|| send(fd, bufs, flags))
}

pub fn non_blocking_sendto(
    fd: RawSocket,
    bufs: &[IoSlice<'_>],
    flags: MessageFlags,
    dest: &Endpoint,
) -> Option<Result<usize, ErrorCode>> {
    non_blocking(|| sendto(fd, bufs, flags, dest))
}

/// Accepts on a ready listener.
///
/// A connection aborted before it could be accepted counts as not ready unless
/// `ENABLE_CONNECTION_ABORTED` is set.
pub fn non_blocking_accept(
    fd: RawSocket,
    state: StateFlags,
    peer: &mut Endpoint,
) -> Option<Result<RawSocket, ErrorCode>> {
    non_blocking(|| accept_filtered(fd, state, Some(&mut *peer)))
}

/// Completes a connect started on a non-blocking descriptor.
pub fn non_blocking_connect(fd: RawSocket) -> Option<Result<(), ErrorCode>> {
    match poll_connect(fd, 0) {
        Ok(false) => None,
        Ok(true) => Some(connect_error(fd)),
        Err(err) => Some(Err(err)),
    }
}

fn accept_filtered(
    fd: RawSocket,
    state: StateFlags,
    peer: Option<&mut Endpoint>,
) -> Result<RawSocket, ErrorCode> {
    filter_aborted_accept(state, accept(fd, peer))
}

/// Turns an aborted pending connection into `WouldBlock` so the caller waits for
/// the next one, unless `ENABLE_CONNECTION_ABORTED` is set.
pub(crate) fn filter_aborted_accept(
    state: StateFlags,
    result: Result<RawSocket, ErrorCode>,
) -> Result<RawSocket, ErrorCode> {
    match result {
        Err(ErrorCode::ConnectionAborted | ErrorCode::ProtocolError)
            if !state.contains(StateFlags::ENABLE_CONNECTION_ABORTED) =>
        {
            Err(ErrorCode::WouldBlock)
        }
        other => other,
    }
}

// --- synchronous helpers ---

pub fn sync_recv(
    fd: RawSocket,
    state: StateFlags,
    bufs: &mut [IoSliceMut<'_>],
    flags: MessageFlags,
) -> Result<usize, ErrorCode> {
    check(fd)?;
    let stream = is_stream(state);
    if stream && bufs.iter().all(|b| b.is_empty()) {
        return Ok(0);
    }
    retry_blocking(
        "recv",
        state,
        || match recv(fd, &mut *bufs, flags) {
            Ok(0) if stream => Err(ErrorCode::Eof),
            other => other,
        },
        || poll_read(fd, state, -1).map(|_| ()),
    )
}

pub fn sync_recvfrom(
    fd: RawSocket,
    state: StateFlags,
    bufs: &mut [IoSliceMut<'_>],
    flags: MessageFlags,
    sender: &mut Endpoint,
) -> Result<usize, ErrorCode> {
    check(fd)?;
    retry_blocking(
        "recvfrom",
        state,
        || recvfrom(fd, &mut *bufs, flags, &mut *sender),
        || poll_read(fd, state, -1).map(|_| ()),
    )
}

pub fn sync_send(
    fd: RawSocket,
    state: StateFlags,
    bufs: &[IoSlice<'_>],
    flags: MessageFlags,
) -> Result<usize, ErrorCode> {
    check(fd)?;
    if is_stream(state) && bufs.iter().all(|b| b.is_empty()) {
        return Ok(0);
    }
    retry_blocking(
        "send",
        state,
        || send(fd, bufs, flags),
        || poll_write(fd, state, -1).map(|_| ()),
    )
}

pub fn sync_sendto(
    fd: RawSocket,
    state: StateFlags,
    bufs: &[IoSlice<'_>],
    flags: MessageFlags,
    dest: &Endpoint,
) -> Result<usize, ErrorCode> {
    check(fd)?;
    retry_blocking(
        "sendto",
        state,
        || sendto(fd, bufs, flags, dest),
        || poll_write(fd, state, -1).map(|_| ()),
    )
}

/// Accepts a connection, blocking unless the user asked for non-blocking mode.
pub fn sync_accept(
    fd: RawSocket,
    state: StateFlags,
    mut peer: Option<&mut Endpoint>,
) -> Result<RawSocket, ErrorCode> {
    check(fd)?;
    retry_blocking(
        "accept",
        state,
        || accept_filtered(fd, state, peer.as_deref_mut()),
        || poll_read(fd, state, -1).map(|_| ()),
    )
}

/// Connects and waits for the handshake to finish.
///
/// In user non-blocking mode a connect that has not finished immediately
/// reports `InProgress`.
pub fn sync_connect(fd: RawSocket, state: StateFlags, ep: &Endpoint) -> Result<(), ErrorCode> {
    match connect(fd, ep) {
        Ok(()) => return Ok(()),
        Err(ErrorCode::InProgress | ErrorCode::Interrupted)
            if !state.contains(StateFlags::USER_SET_NON_BLOCKING) => {}
        Err(err) if err.is_would_block() && !state.contains(StateFlags::USER_SET_NON_BLOCKING) => {}
        Err(err) => return Err(err),
    }
    log::trace!("connect: waiting for fd {fd} to become writable");
    while !poll_connect(fd, -1)? {}
    connect_error(fd)
}
