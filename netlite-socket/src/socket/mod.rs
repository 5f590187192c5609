//! # Socket Handle
//!
//! ## Purpose
//!
//! `Socket<P>` is the public operation surface: open, bind, connect, listen,
//! accept, send and receive, options, shutdown and close, for a protocol `P`
//! chosen at compile time.
//!
//! ## How it works
//!
//! The native descriptor lives in an [`OwnedSocket`] shared through an `Arc`.
//! Cloning a `Socket` shares the descriptor; the clone that turns out to be the
//! last owner when it is dropped shuts the descriptor down in both directions and
//! closes it. `close()` closes the descriptor for every clone at once: the slot is
//! swapped to an invalid value, so the descriptor is closed exactly once and later
//! calls through other clones fail with `BadDescriptor` instead of touching a
//! reused descriptor number.
//!
//! Each clone carries its own [`StateFlags`] word, copied at clone time, which the
//! blocking operations consult to decide whether to wait for readiness.
//!
//! Blocking calls go through the `sync_*` primitives and return the tagged
//! [`Error`](crate::error::Error), naming the operation that failed.
//!
//! ## Main components
//!
//! - `Socket<P>`: the handle, with `TcpSocket` and `UdpSocket` aliases.
//! - `OwnedSocket`: the shared descriptor slot.

#[cfg(target_os = "linux")]
mod async_ops;

use crate::error::{Error, ErrorCode, Result, Tag as _};
use crate::ip::Endpoint;
use crate::option::{GettableSocketOption, SettableSocketOption};
use crate::protocol::{Protocol, SocketType, Tcp, Udp};
use crate::socket_ops::{self, MessageFlags, ShutdownType, StateFlags, WaitType};
use crate::sys::{self, RawSocket};
use std::io::{IoSlice, IoSliceMut};
use std::os::fd::{BorrowedFd, IntoRawFd as _, OwnedFd};
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

#[cfg(target_os = "linux")]
use crate::reactor::{HandleKey, WeakReactor};
#[cfg(target_os = "linux")]
use std::sync::{Mutex, PoisonError};

pub type TcpSocket = Socket<Tcp>;
pub type UdpSocket = Socket<Udp>;

#[cfg(target_os = "linux")]
struct Registration {
    reactor: WeakReactor,
    key: HandleKey,
}

/// The shared descriptor slot behind every clone of a [`Socket`].
pub(crate) struct OwnedSocket {
    fd: AtomicI32,
    #[cfg(target_os = "linux")]
    registration: Mutex<Option<Registration>>,
}

impl OwnedSocket {
    fn new(fd: RawSocket) -> Self {
        OwnedSocket {
            fd: AtomicI32::new(fd),
            #[cfg(target_os = "linux")]
            registration: Mutex::new(None),
        }
    }

    fn fd(&self) -> RawSocket {
        self.fd.load(Ordering::Acquire)
    }

    /// Completes pending reactor operations with `OperationAborted` and stops
    /// watching the descriptor.
    #[cfg(target_os = "linux")]
    fn deregister(&self) {
        let registration = self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(registration) = registration else {
            return;
        };
        if let Some(reactor) = registration.reactor.upgrade() {
            if let Err(err) = reactor.deregister_handle(registration.key) {
                log::warn!("socket: deregistering from reactor failed: {err}");
            }
        }
    }

    #[cfg(target_os = "linux")]
    fn cancel(&self) {
        let registration = self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(registration) = registration.as_ref() {
            if let Some(reactor) = registration.reactor.upgrade() {
                reactor.cancel(registration.key);
            }
        }
    }

    /// Closes the descriptor unless another clone already did.
    fn close(&self, state: &mut StateFlags, destruction: bool) -> std::result::Result<(), ErrorCode> {
        #[cfg(target_os = "linux")]
        self.deregister();
        let fd = self.fd.swap(sys::INVALID_SOCKET, Ordering::AcqRel);
        if fd == sys::INVALID_SOCKET {
            return Ok(());
        }
        log::debug!("socket: closing fd {fd}");
        socket_ops::close(fd, state, destruction)
    }

    /// Last-owner teardown: shut down both directions, then close.
    ///
    /// # Panics
    ///
    /// Panics if the shutdown fails with anything but `NotConnected`. The
    /// descriptor is closed first. While already unwinding the failure is only
    /// logged.
    fn release(self, state: &mut StateFlags) {
        let fd = self.fd();
        if fd == sys::INVALID_SOCKET {
            return;
        }
        let shutdown = match socket_ops::shutdown(fd, ShutdownType::Both) {
            Ok(()) | Err(ErrorCode::NotConnected) => Ok(()),
            Err(err) => Err(err),
        };
        if let Err(err) = self.close(state, true) {
            log::error!("socket: close of fd {fd} failed on drop: {err}");
        }
        if let Err(err) = shutdown {
            if std::thread::panicking() {
                log::error!("socket: shutdown of fd {fd} failed on drop: {err}");
            } else {
                panic!("socket: shutdown of fd {fd} failed on drop: {err}");
            }
        }
    }
}

fn orientation(ty: SocketType) -> StateFlags {
    match ty {
        SocketType::Stream => StateFlags::STREAM_ORIENTED,
        SocketType::Datagram => StateFlags::DATAGRAM_ORIENTED,
    }
}

/// A socket handle for protocol `P`.
///
/// # Example
///
/// ```rust,no_run
/// use netlite_socket::{Address, Endpoint, TcpSocket, Tcp};
///
/// let mut socket = TcpSocket::new(Tcp::v4());
/// socket.connect(&Endpoint::new("127.0.0.1".parse::<Address>()?, 8080))?;
/// socket.send(b"ping")?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Socket<P: Protocol> {
    handle: Option<Arc<OwnedSocket>>,
    state: StateFlags,
    protocol: P,
}

impl<P: Protocol> Socket<P> {
    /// A closed socket that will open with `protocol`.
    pub fn new(protocol: P) -> Self {
        Socket {
            handle: None,
            state: StateFlags::empty(),
            protocol,
        }
    }

    /// Opens a new socket for `protocol`.
    pub fn open_with(protocol: P) -> Result<Self> {
        let mut socket = Socket::new(protocol);
        socket.open(protocol)?;
        Ok(socket)
    }

    /// Binds a new socket to `ep`, with the protocol family taken from `ep`.
    pub fn bound(ep: &Endpoint) -> Result<Self> {
        let socket = Socket::open_with(P::for_endpoint(ep))?;
        socket.bind(ep)?;
        Ok(socket)
    }

    fn from_raw(protocol: P, fd: RawSocket, state: StateFlags) -> Self {
        Socket {
            handle: Some(Arc::new(OwnedSocket::new(fd))),
            state,
            protocol,
        }
    }

    pub fn open(&mut self, protocol: P) -> Result<()> {
        if self.is_open() {
            return Err(Error::new("open", ErrorCode::AlreadyOpen));
        }
        let fd = socket_ops::socket(
            protocol.family().as_raw(),
            protocol.sock_type().as_raw(),
            protocol.protocol(),
        )
        .tag("open")?;
        log::debug!("socket: opened fd {fd}");
        *self = Socket::from_raw(protocol, fd, orientation(protocol.sock_type()));
        Ok(())
    }

    /// Takes ownership of an existing descriptor.
    pub fn assign(&mut self, protocol: P, fd: OwnedFd) -> Result<()> {
        if self.is_open() {
            return Err(Error::new("assign", ErrorCode::AlreadyOpen));
        }
        let fd = fd.into_raw_fd();
        log::debug!("socket: assigned fd {fd}");
        *self = Socket::from_raw(
            protocol,
            fd,
            orientation(protocol.sock_type()) | StateFlags::POSSIBLE_DUP,
        );
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.native_handle() != sys::INVALID_SOCKET
    }

    pub fn protocol(&self) -> P {
        self.protocol
    }

    pub fn state(&self) -> StateFlags {
        self.state
    }

    /// The native descriptor, or `INVALID_SOCKET` when closed.
    pub fn native_handle(&self) -> RawSocket {
        self.handle
            .as_ref()
            .map_or(sys::INVALID_SOCKET, |owned| owned.fd())
    }

    /// A non-owning view of the descriptor.
    pub fn as_fd(&self) -> Option<BorrowedFd<'_>> {
        let fd = self.native_handle();
        if fd == sys::INVALID_SOCKET {
            return None;
        }
        Some(unsafe { BorrowedFd::borrow_raw(fd) })
    }

    /// Moves the descriptor out, leaving this socket closed.
    pub fn take(&mut self) -> Self {
        std::mem::replace(self, Socket::new(self.protocol))
    }

    fn require(&self, flag: StateFlags, context: &'static str) -> Result<()> {
        if !self.state.contains(flag) {
            return Err(Error::new(context, ErrorCode::WrongOrientation));
        }
        Ok(())
    }

    /// Connects to `peer`, opening the socket first if needed.
    ///
    /// A socket opened here stays open if the connect fails.
    pub fn connect(&mut self, peer: &Endpoint) -> Result<()> {
        if !self.is_open() {
            self.open(P::for_endpoint(peer))
                .map_err(|err| Error::new("connect", err.code()))?;
        }
        socket_ops::sync_connect(self.native_handle(), self.state, peer).tag("connect")
    }

    pub fn bind(&self, ep: &Endpoint) -> Result<()> {
        socket_ops::bind(self.native_handle(), ep).tag("bind")
    }

    pub fn listen(&self, backlog: i32) -> Result<()> {
        self.require(StateFlags::STREAM_ORIENTED, "listen")?;
        socket_ops::listen(self.native_handle(), backlog).tag("listen")
    }

    /// Waits for a connection and returns it with the peer address.
    pub fn accept(&self) -> Result<(Socket<P>, Endpoint)> {
        self.require(StateFlags::STREAM_ORIENTED, "accept")?;
        let mut peer = Endpoint::default();
        let fd = socket_ops::sync_accept(self.native_handle(), self.state, Some(&mut peer))
            .tag("accept")?;
        log::debug!("socket: accepted fd {fd} from {peer}");
        let socket = Socket::from_raw(self.protocol, fd, orientation(self.protocol.sock_type()));
        Ok((socket, peer))
    }

    pub fn send(&self, data: &[u8]) -> Result<usize> {
        self.send_with_flags(data, MessageFlags::empty())
    }

    pub fn send_with_flags(&self, data: &[u8], flags: MessageFlags) -> Result<usize> {
        self.send_vectored(&[IoSlice::new(data)], flags)
    }

    pub fn send_vectored(&self, bufs: &[IoSlice<'_>], flags: MessageFlags) -> Result<usize> {
        socket_ops::sync_send(self.native_handle(), self.state, bufs, flags).tag("send")
    }

    /// Receives into `buf`. On a stream socket an orderly close by the peer is
    /// reported as `ErrorCode::Eof`.
    pub fn receive(&self, buf: &mut [u8]) -> Result<usize> {
        self.receive_with_flags(buf, MessageFlags::empty())
    }

    pub fn receive_with_flags(&self, buf: &mut [u8], flags: MessageFlags) -> Result<usize> {
        self.receive_vectored(&mut [IoSliceMut::new(buf)], flags)
    }

    pub fn receive_vectored(
        &self,
        bufs: &mut [IoSliceMut<'_>],
        flags: MessageFlags,
    ) -> Result<usize> {
        socket_ops::sync_recv(self.native_handle(), self.state, bufs, flags).tag("receive")
    }

    pub fn send_to(&self, data: &[u8], dest: &Endpoint) -> Result<usize> {
        self.send_to_with_flags(data, dest, MessageFlags::empty())
    }

    pub fn send_to_with_flags(
        &self,
        data: &[u8],
        dest: &Endpoint,
        flags: MessageFlags,
    ) -> Result<usize> {
        self.require(StateFlags::DATAGRAM_ORIENTED, "send_to")?;
        socket_ops::sync_sendto(
            self.native_handle(),
            self.state,
            &[IoSlice::new(data)],
            flags,
            dest,
        )
        .tag("send_to")
    }

    pub fn receive_from(&self, buf: &mut [u8]) -> Result<(usize, Endpoint)> {
        self.receive_from_with_flags(buf, MessageFlags::empty())
    }

    pub fn receive_from_with_flags(
        &self,
        buf: &mut [u8],
        flags: MessageFlags,
    ) -> Result<(usize, Endpoint)> {
        self.require(StateFlags::DATAGRAM_ORIENTED, "receive_from")?;
        let mut sender = Endpoint::default();
        let n = socket_ops::sync_recvfrom(
            self.native_handle(),
            self.state,
            &mut [IoSliceMut::new(buf)],
            flags,
            &mut sender,
        )
        .tag("receive_from")?;
        Ok((n, sender))
    }

    pub fn shutdown(&self, what: ShutdownType) -> Result<()> {
        socket_ops::shutdown(self.native_handle(), what).tag("shutdown")
    }

    /// Closes the descriptor for this socket and every clone of it.
    ///
    /// Pending reactor operations complete with `OperationAborted`.
    pub fn close(&mut self) -> Result<()> {
        let Some(owned) = self.handle.take() else {
            return Ok(());
        };
        owned.close(&mut self.state, false).tag("close")
    }

    /// Completes every pending reactor operation with `OperationAborted`.
    #[cfg(target_os = "linux")]
    pub fn cancel(&self) -> Result<()> {
        let owned = self
            .handle
            .as_ref()
            .ok_or(Error::new("cancel", ErrorCode::BadDescriptor))?;
        owned.cancel();
        Ok(())
    }

    pub fn non_blocking(&mut self, mode: bool) -> Result<()> {
        socket_ops::set_user_non_blocking(self.native_handle(), &mut self.state, mode)
            .tag("non_blocking")
    }

    pub fn is_non_blocking(&self) -> bool {
        self.state.contains(StateFlags::USER_SET_NON_BLOCKING)
    }

    pub fn local_endpoint(&self) -> Result<Endpoint> {
        let mut ep = Endpoint::default();
        socket_ops::getsockname(self.native_handle(), &mut ep).tag("local_endpoint")?;
        Ok(ep)
    }

    pub fn remote_endpoint(&self) -> Result<Endpoint> {
        let mut ep = Endpoint::default();
        socket_ops::getpeername(self.native_handle(), &mut ep).tag("remote_endpoint")?;
        Ok(ep)
    }

    pub fn set_option<O: SettableSocketOption<P>>(&mut self, option: &O) -> Result<()> {
        let p = self.protocol;
        let fd = self.native_handle();
        // SAFETY: `SettableSocketOption` guarantees `data` covers `size` bytes.
        unsafe {
            socket_ops::setsockopt(
                fd,
                &mut self.state,
                option.level(&p),
                option.name(&p),
                option.data(&p),
                option.size(&p),
            )
        }
        .tag("set_option")
    }

    pub fn get_option<O: GettableSocketOption<P>>(&self, option: &mut O) -> Result<()> {
        let p = self.protocol;
        let mut size = option.size(&p);
        // SAFETY: `GettableSocketOption` guarantees `data_mut` covers `size` bytes.
        unsafe {
            socket_ops::getsockopt(
                self.native_handle(),
                self.state,
                option.level(&p),
                option.name(&p),
                option.data_mut(&p),
                &mut size,
            )
        }
        .tag("get_option")?;
        option.resize(&p, size).tag("get_option")
    }

    /// Bytes that can be read without blocking.
    pub fn available(&self) -> Result<usize> {
        socket_ops::available(self.native_handle()).tag("available")
    }

    /// Blocks until the socket is readable, writable or in error.
    ///
    /// In non-blocking mode reports `WouldBlock` if the condition does not hold yet.
    pub fn wait(&self, what: WaitType) -> Result<()> {
        while !socket_ops::poll_wait(self.native_handle(), self.state, what, -1).tag("wait")? {}
        Ok(())
    }

    /// True when a listening socket has a connection ready to accept.
    pub fn has_pending_accept(&self) -> Result<bool> {
        let fd = self.native_handle();
        let state = self.state - StateFlags::USER_SET_NON_BLOCKING;
        if socket_ops::poll_error(fd, state, 0).tag("has_pending_accept")? {
            return Ok(false);
        }
        socket_ops::poll_read(fd, state, 0).tag("has_pending_accept")
    }
}

impl<P: Protocol> Clone for Socket<P> {
    fn clone(&self) -> Self {
        Socket {
            handle: self.handle.clone(),
            state: self.state,
            protocol: self.protocol,
        }
    }
}

impl<P: Protocol> Drop for Socket<P> {
    fn drop(&mut self) {
        let Some(owned) = self.handle.take() else {
            return;
        };
        if let Some(owned) = Arc::into_inner(owned) {
            owned.release(&mut self.state);
        }
    }
}

impl<P: Protocol + std::fmt::Debug> std::fmt::Debug for Socket<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket")
            .field("fd", &self.native_handle())
            .field("state", &self.state)
            .field("protocol", &self.protocol)
            .finish()
    }
}
