//! Asynchronous socket operations driven by a [`Reactor`].
//!
//! A socket is registered with a reactor the first time it starts an
//! asynchronous operation, and is switched to internal non-blocking mode at that
//! point. Buffers are owned `Vec<u8>`s that travel with the operation and are
//! handed back to the completion handler. Handlers run on a thread driving the
//! reactor, never inline in the call that starts the operation. If the reactor is
//! shut down first, handlers are dropped without running.

use super::{Registration, Socket, orientation};
use crate::error::{Error, ErrorCode, Result};
use crate::ip::Endpoint;
use crate::protocol::Protocol;
use crate::reactor::{Completion, HandleKey, Interest, Reactor, ReactorOp};
use crate::socket_ops::{self, MessageFlags, StateFlags, WaitType};
use crate::sys::RawSocket;
use std::io::{IoSlice, IoSliceMut};
use std::os::fd::BorrowedFd;
use std::sync::PoisonError;

fn into_result(context: &'static str, completion: Completion) -> Result<usize> {
    match completion.error {
        None => Ok(completion.bytes_transferred),
        Some(code) => Err(Error::new(context, code)),
    }
}

impl<P: Protocol> Socket<P> {
    /// Registers with `reactor` on first use and returns the handle key.
    fn ensure_registered(&mut self, reactor: &Reactor) -> std::result::Result<HandleKey, ErrorCode> {
        let owned = self.handle.as_ref().ok_or(ErrorCode::BadDescriptor)?;
        let fd = owned.fd();
        if fd == crate::sys::INVALID_SOCKET {
            return Err(ErrorCode::BadDescriptor);
        }
        if !self.state.contains(StateFlags::INTERNAL_NON_BLOCKING) {
            socket_ops::set_internal_non_blocking(fd, &mut self.state, true)?;
        }
        let mut registration = owned
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = registration.as_ref() {
            if current.reactor.is(reactor) {
                return Ok(current.key);
            }
            if current.reactor.upgrade().is_some() {
                // Already driven by another live reactor.
                return Err(ErrorCode::InvalidArgument);
            }
        }
        let key = reactor.register_handle(unsafe { BorrowedFd::borrow_raw(fd) })?;
        *registration = Some(Registration {
            reactor: reactor.downgrade(),
            key,
        });
        Ok(key)
    }

    /// Registers and starts `op`, or completes it at once with the registration error.
    fn start(&mut self, reactor: &Reactor, interest: Interest, op: Box<dyn ReactorOp>) {
        match self.ensure_registered(reactor) {
            Ok(key) => reactor.start_op(key, interest, op),
            Err(err) => reactor.post_completion(op, Completion::failure(err)),
        }
    }

    /// Connects to `peer`, opening the socket first if needed.
    pub fn async_connect<F>(&mut self, reactor: &Reactor, peer: &Endpoint, handler: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let op = Box::new(ConnectOp { handler });
        if !self.is_open() {
            if let Err(err) = self.open(P::for_endpoint(peer)) {
                reactor.post_completion(op, Completion::failure(err.code()));
                return;
            }
        }
        let key = match self.ensure_registered(reactor) {
            Ok(key) => key,
            Err(err) => {
                reactor.post_completion(op, Completion::failure(err));
                return;
            }
        };
        match socket_ops::connect(self.native_handle(), peer) {
            Ok(()) => reactor.post_completion(op, Completion::success(0)),
            Err(ErrorCode::InProgress) => reactor.start_op(key, Interest::Write, op),
            Err(err) if err.is_would_block() => reactor.start_op(key, Interest::Write, op),
            Err(err) => reactor.post_completion(op, Completion::failure(err)),
        }
    }

    /// Sends `buf`; the handler gets the byte count and the buffer back.
    pub fn async_send<F>(&mut self, reactor: &Reactor, buf: Vec<u8>, flags: MessageFlags, handler: F)
    where
        F: FnOnce(Result<usize>, Vec<u8>) + Send + 'static,
    {
        let empty_stream = buf.is_empty() && self.state.contains(StateFlags::STREAM_ORIENTED);
        let op = Box::new(SendOp {
            buf,
            flags,
            dest: None,
            handler,
        });
        if empty_stream {
            reactor.post_completion(op, Completion::success(0));
            return;
        }
        self.start(reactor, Interest::Write, op);
    }

    /// Receives into `buf`; the handler gets the byte count and the buffer back.
    ///
    /// On a stream socket an orderly close by the peer completes with `Eof`.
    pub fn async_receive<F>(
        &mut self,
        reactor: &Reactor,
        buf: Vec<u8>,
        flags: MessageFlags,
        handler: F,
    ) where
        F: FnOnce(Result<usize>, Vec<u8>) + Send + 'static,
    {
        let is_stream = self.state.contains(StateFlags::STREAM_ORIENTED);
        let empty_stream = buf.is_empty() && is_stream;
        let op = Box::new(ReceiveOp {
            buf,
            flags,
            is_stream,
            handler,
        });
        if empty_stream {
            reactor.post_completion(op, Completion::success(0));
            return;
        }
        self.start(reactor, Interest::Read, op);
    }

    pub fn async_send_to<F>(
        &mut self,
        reactor: &Reactor,
        buf: Vec<u8>,
        dest: &Endpoint,
        flags: MessageFlags,
        handler: F,
    ) where
        F: FnOnce(Result<usize>, Vec<u8>) + Send + 'static,
    {
        let op = Box::new(SendOp {
            buf,
            flags,
            dest: Some(*dest),
            handler,
        });
        if !self.state.contains(StateFlags::DATAGRAM_ORIENTED) {
            reactor.post_completion(op, Completion::failure(ErrorCode::WrongOrientation));
            return;
        }
        self.start(reactor, Interest::Write, op);
    }

    /// Receives one datagram; the handler gets the byte count, the sender and the
    /// buffer back.
    pub fn async_receive_from<F>(
        &mut self,
        reactor: &Reactor,
        buf: Vec<u8>,
        flags: MessageFlags,
        handler: F,
    ) where
        F: FnOnce(Result<(usize, Endpoint)>, Vec<u8>) + Send + 'static,
    {
        let op = Box::new(ReceiveFromOp {
            buf,
            flags,
            sender: Endpoint::default(),
            handler,
        });
        if !self.state.contains(StateFlags::DATAGRAM_ORIENTED) {
            reactor.post_completion(op, Completion::failure(ErrorCode::WrongOrientation));
            return;
        }
        self.start(reactor, Interest::Read, op);
    }

    /// Accepts one connection; the handler gets the new socket and the peer address.
    pub fn async_accept<F>(&mut self, reactor: &Reactor, handler: F)
    where
        F: FnOnce(Result<(Socket<P>, Endpoint)>) + Send + 'static,
    {
        let op = Box::new(AcceptOp {
            protocol: self.protocol,
            state: self.state,
            peer: Endpoint::default(),
            accepted: None,
            handler,
        });
        if !self.state.contains(StateFlags::STREAM_ORIENTED) {
            reactor.post_completion(op, Completion::failure(ErrorCode::WrongOrientation));
            return;
        }
        self.start(reactor, Interest::Read, op);
    }

    /// Completes once the socket is readable, writable or in error.
    pub fn async_wait<F>(&mut self, reactor: &Reactor, what: WaitType, handler: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let interest = match what {
            WaitType::Write => Interest::Write,
            WaitType::Read | WaitType::Error => Interest::Read,
        };
        let op = Box::new(WaitOp { what, handler });
        self.start(reactor, interest, op);
    }
}

struct ConnectOp<F> {
    handler: F,
}

impl<F> ReactorOp for ConnectOp<F>
where
    F: FnOnce(Result<()>) + Send + 'static,
{
    fn perform(&mut self, fd: RawSocket) -> Option<Completion> {
        socket_ops::non_blocking_connect(fd).map(|r| Completion::from_result(r.map(|()| 0)))
    }

    fn complete(self: Box<Self>, reactor: Option<&Reactor>, completion: Completion) {
        if reactor.is_some() {
            (self.handler)(into_result("async_connect", completion).map(|_| ()));
        }
    }
}

struct SendOp<F> {
    buf: Vec<u8>,
    flags: MessageFlags,
    dest: Option<Endpoint>,
    handler: F,
}

impl<F> ReactorOp for SendOp<F>
where
    F: FnOnce(Result<usize>, Vec<u8>) + Send + 'static,
{
    fn perform(&mut self, fd: RawSocket) -> Option<Completion> {
        let bufs = [IoSlice::new(&self.buf)];
        let result = match &self.dest {
            None => socket_ops::non_blocking_send(fd, &bufs, self.flags),
            Some(dest) => socket_ops::non_blocking_sendto(fd, &bufs, self.flags, dest),
        };
        result.map(Completion::from_result)
    }

    fn complete(self: Box<Self>, reactor: Option<&Reactor>, completion: Completion) {
        if reactor.is_some() {
            let context = if self.dest.is_some() {
                "async_send_to"
            } else {
                "async_send"
            };
            (self.handler)(into_result(context, completion), self.buf);
        }
    }
}

struct ReceiveOp<F> {
    buf: Vec<u8>,
    flags: MessageFlags,
    is_stream: bool,
    handler: F,
}

impl<F> ReactorOp for ReceiveOp<F>
where
    F: FnOnce(Result<usize>, Vec<u8>) + Send + 'static,
{
    fn perform(&mut self, fd: RawSocket) -> Option<Completion> {
        let mut bufs = [IoSliceMut::new(&mut self.buf)];
        socket_ops::non_blocking_recv(fd, &mut bufs, self.flags, self.is_stream)
            .map(Completion::from_result)
    }

    fn complete(self: Box<Self>, reactor: Option<&Reactor>, completion: Completion) {
        if reactor.is_some() {
            (self.handler)(into_result("async_receive", completion), self.buf);
        }
    }
}

struct ReceiveFromOp<F> {
    buf: Vec<u8>,
    flags: MessageFlags,
    sender: Endpoint,
    handler: F,
}

impl<F> ReactorOp for ReceiveFromOp<F>
where
    F: FnOnce(Result<(usize, Endpoint)>, Vec<u8>) + Send + 'static,
{
    fn perform(&mut self, fd: RawSocket) -> Option<Completion> {
        let mut bufs = [IoSliceMut::new(&mut self.buf)];
        socket_ops::non_blocking_recvfrom(fd, &mut bufs, self.flags, &mut self.sender)
            .map(Completion::from_result)
    }

    fn complete(self: Box<Self>, reactor: Option<&Reactor>, completion: Completion) {
        if reactor.is_some() {
            let sender = self.sender;
            let result = into_result("async_receive_from", completion).map(|n| (n, sender));
            (self.handler)(result, self.buf);
        }
    }
}

struct AcceptOp<P, F> {
    protocol: P,
    state: StateFlags,
    peer: Endpoint,
    accepted: Option<RawSocket>,
    handler: F,
}

impl<P, F> ReactorOp for AcceptOp<P, F>
where
    P: Protocol,
    F: FnOnce(Result<(Socket<P>, Endpoint)>) + Send + 'static,
{
    fn perform(&mut self, fd: RawSocket) -> Option<Completion> {
        match socket_ops::non_blocking_accept(fd, self.state, &mut self.peer)? {
            Ok(new_fd) => {
                self.accepted = Some(new_fd);
                Some(Completion::success(0))
            }
            Err(err) => Some(Completion::failure(err)),
        }
    }

    fn complete(self: Box<Self>, reactor: Option<&Reactor>, completion: Completion) {
        let this = *self;
        // Owning the descriptor first means it is closed if the handler never runs.
        let accepted = this.accepted.map(|fd| {
            Socket::from_raw(this.protocol, fd, orientation(this.protocol.sock_type()))
        });
        if reactor.is_none() {
            return;
        }
        let result = match (into_result("async_accept", completion), accepted) {
            (Ok(_), Some(socket)) => {
                log::debug!("socket: accepted fd {} from {}", socket.native_handle(), this.peer);
                Ok((socket, this.peer))
            }
            (Ok(_), None) => Err(Error::new("async_accept", ErrorCode::BadDescriptor)),
            (Err(err), _) => Err(err),
        };
        (this.handler)(result);
    }
}

struct WaitOp<F> {
    what: WaitType,
    handler: F,
}

impl<F> ReactorOp for WaitOp<F>
where
    F: FnOnce(Result<()>) + Send + 'static,
{
    fn perform(&mut self, fd: RawSocket) -> Option<Completion> {
        match socket_ops::poll_wait(fd, StateFlags::empty(), self.what, 0) {
            Ok(true) => Some(Completion::success(0)),
            Ok(false) => None,
            Err(err) => Some(Completion::failure(err)),
        }
    }

    fn complete(self: Box<Self>, reactor: Option<&Reactor>, completion: Completion) {
        if reactor.is_some() {
            (self.handler)(into_result("async_wait", completion).map(|_| ()));
        }
    }
}
