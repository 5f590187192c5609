//! # Completion Reactor
//!
//! ## Purpose
//!
//! The reactor delivers the results of asynchronous socket operations to
//! whichever threads call its `run` family. Any number of threads may drive the
//! same reactor; each dequeues and executes completions on its own, and callback
//! execution is not serialized.
//!
//! ## How it works
//!
//! The reactor owns a [`CompletionPort`] and an outstanding-work counter. Every
//! operation handed to it (a posted handler or a socket operation waiting for
//! readiness) counts as one unit of work until its completion callback has run or
//! it has been destroyed. When the counter drops to zero the reactor stops itself,
//! which makes `run` return.
//!
//! Sockets are registered once and get a [`HandleKey`]. Each registered handle
//! keeps one FIFO queue of waiting operations per direction. A new operation is
//! attempted right away when its queue is empty; if it would block it is queued.
//! When the port reports readiness for a handle, the queued operations of the
//! ready direction are attempted in order until one would block. Finished
//! operations are moved to a local completed queue, and one dispatch packet per
//! operation is posted so that a waiting thread picks each of them up.
//!
//! `stop()` marks the reactor stopped and posts a single stop packet. The thread
//! that receives it re-posts it while the reactor is still stopped, so every
//! waiting thread wakes up in turn.
//!
//! `shutdown()` destroys every operation the reactor still holds: first the ones
//! waiting on handles, then the completed queue, and then whatever arrives on the
//! port, until the outstanding-work counter is zero. Destroying an operation
//! invokes its callback without a reactor and with `OperationAborted`.
//!
//! ## Main components
//!
//! - `Reactor`: cheaply clonable handle shared by all driving threads.
//! - `ReactorOp`: the operation capability (`perform` on readiness, `complete` once).
//! - `Completion`: error and byte count handed to `complete`.
//! - `ReactorConfig`: construction options.

use crate::error::ErrorCode;
use crate::sys::RawSocket;
use crate::sys::epoll::{CompletionPort, PortEvent, READ_EVENTS, WRITE_EVENTS};
use std::collections::{HashMap, VecDeque};
use std::os::fd::{AsRawFd as _, BorrowedFd};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

const DEFAULT_SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Construction options of a [`Reactor`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReactorConfig {
    /// Expected number of threads driving the reactor. Informational for the
    /// epoll backend.
    pub concurrency_hint: Option<usize>,
    /// How long each wait lasts while `shutdown()` drains the port. Default 500 ms.
    pub shutdown_poll_interval: Option<Duration>,
}

/// Result handed to an operation's completion callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub error: Option<ErrorCode>,
    pub bytes_transferred: usize,
}

impl Completion {
    pub fn success(bytes_transferred: usize) -> Self {
        Completion {
            error: None,
            bytes_transferred,
        }
    }

    pub fn failure(error: ErrorCode) -> Self {
        Completion {
            error: Some(error),
            bytes_transferred: 0,
        }
    }

    pub fn from_result(result: Result<usize, ErrorCode>) -> Self {
        match result {
            Ok(n) => Completion::success(n),
            Err(err) => Completion::failure(err),
        }
    }
}

/// An asynchronous operation driven by the reactor.
pub trait ReactorOp: Send + 'static {
    /// Attempts the operation on a descriptor that may be ready.
    ///
    /// Returns `None` when the operation has to wait for the next readiness event.
    fn perform(&mut self, fd: RawSocket) -> Option<Completion>;

    /// Delivers the result. Called exactly once.
    ///
    /// `reactor` is `None` when the operation is destroyed during shutdown.
    fn complete(self: Box<Self>, reactor: Option<&Reactor>, completion: Completion);
}

/// Which readiness direction an operation waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Read,
    Write,
}

/// Identifies a handle registered with a reactor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleKey(u64);

/// An operation together with the result it will be completed with.
pub(crate) struct Operation {
    token: u64,
    completion: Completion,
    op: Box<dyn ReactorOp>,
}

impl Operation {
    fn execute(self, reactor: &Reactor) {
        log::trace!("reactor: executing operation #{}", self.token);
        self.op.complete(Some(reactor), self.completion);
    }

    fn destroy(self) {
        log::trace!("reactor: destroying operation #{}", self.token);
        self.op
            .complete(None, Completion::failure(ErrorCode::OperationAborted));
    }
}

enum Packet {
    Op(Operation),
    Dispatch,
    Stop,
}

struct Pending {
    token: u64,
    op: Box<dyn ReactorOp>,
}

struct HandleOps {
    fd: RawSocket,
    read: VecDeque<Pending>,
    write: VecDeque<Pending>,
}

impl HandleOps {
    fn take_all(&mut self) -> Vec<Pending> {
        self.read.drain(..).chain(self.write.drain(..)).collect()
    }
}

struct Inner {
    port: CompletionPort<Packet>,
    config: ReactorConfig,
    outstanding: AtomicUsize,
    stopped: AtomicBool,
    stop_event_posted: AtomicBool,
    shutdown: AtomicBool,
    completed: Mutex<VecDeque<Operation>>,
    handles: Mutex<HashMap<u64, Arc<Mutex<HandleOps>>>>,
    next_key: AtomicU64,
    next_token: AtomicU64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A multi-threaded completion reactor.
///
/// Clones share the same reactor. Dropping the last clone shuts it down.
#[derive(Clone)]
pub struct Reactor {
    inner: Arc<Inner>,
}

impl Reactor {
    pub fn new() -> Result<Self, ErrorCode> {
        Reactor::with_config(ReactorConfig::default())
    }

    pub fn with_config(config: ReactorConfig) -> Result<Self, ErrorCode> {
        let port = CompletionPort::new()?;
        log::debug!(
            "reactor: created, concurrency hint {:?}",
            config.concurrency_hint
        );
        Ok(Reactor {
            inner: Arc::new(Inner {
                port,
                config,
                outstanding: AtomicUsize::new(0),
                stopped: AtomicBool::new(false),
                stop_event_posted: AtomicBool::new(false),
                shutdown: AtomicBool::new(false),
                completed: Mutex::new(VecDeque::new()),
                handles: Mutex::new(HashMap::new()),
                next_key: AtomicU64::new(1),
                next_token: AtomicU64::new(1),
            }),
        })
    }

    pub fn config(&self) -> ReactorConfig {
        self.inner.config
    }

    pub(crate) fn downgrade(&self) -> WeakReactor {
        WeakReactor(Arc::downgrade(&self.inner))
    }

    /// Number of operations not yet completed or destroyed.
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    pub fn stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Stops the reactor; idempotent. Every thread blocked in the `run` family
    /// returns as soon as it wakes.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Clears the stopped flag so that the `run` family can be used again.
    pub fn restart(&self) {
        self.inner.stopped.store(false, Ordering::Release);
    }

    /// Runs `handler` on one of the threads driving the reactor.
    ///
    /// The handler is dropped without running if the reactor shuts down first.
    pub fn post<F>(&self, handler: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.post_completion(Box::new(PostedHandler(handler)), Completion::success(0));
    }

    /// Queues `op` for completion with `completion` without waiting for readiness.
    pub fn post_completion(&self, op: Box<dyn ReactorOp>, completion: Completion) {
        self.inner.work_started();
        let op = Operation {
            token: self.inner.next_token(),
            completion,
            op,
        };
        self.inner.post_operation(op);
    }

    /// Associates a descriptor with the reactor. The caller keeps ownership and must
    /// deregister it before closing it.
    pub fn register_handle(&self, fd: BorrowedFd<'_>) -> Result<HandleKey, ErrorCode> {
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(ErrorCode::OperationAborted);
        }
        let key = self.inner.next_key.fetch_add(1, Ordering::Relaxed);
        let raw = fd.as_raw_fd();
        self.inner.port.associate(raw, key)?;
        lock(&self.inner.handles).insert(
            key,
            Arc::new(Mutex::new(HandleOps {
                fd: raw,
                read: VecDeque::new(),
                write: VecDeque::new(),
            })),
        );
        log::debug!("reactor: registered fd {raw} as key {key}");
        Ok(HandleKey(key))
    }

    /// Completes every operation waiting on `key` with `OperationAborted`.
    pub fn cancel(&self, key: HandleKey) {
        self.inner.cancel(key);
    }

    /// Cancels pending operations on `key` and stops watching its descriptor.
    pub fn deregister_handle(&self, key: HandleKey) -> Result<(), ErrorCode> {
        self.inner.deregister(key)
    }

    /// Starts `op` on the handle registered as `key`.
    ///
    /// The operation is attempted immediately when nothing else waits in the same
    /// direction; otherwise, or if it would block, it waits for readiness. Its
    /// completion is always delivered through the `run` family, never inline.
    pub fn start_op(&self, key: HandleKey, interest: Interest, mut op: Box<dyn ReactorOp>) {
        let inner = &self.inner;
        inner.work_started();
        let token = inner.next_token();
        let handle = lock(&inner.handles).get(&key.0).cloned();
        let Some(handle) = handle else {
            inner.post_operation(Operation {
                token,
                completion: Completion::failure(ErrorCode::BadDescriptor),
                op,
            });
            return;
        };
        let mut ops = lock(&handle);
        if inner.shutdown.load(Ordering::Acquire) {
            drop(ops);
            inner.destroy(Operation {
                token,
                completion: Completion::failure(ErrorCode::OperationAborted),
                op,
            });
            return;
        }
        let fd = ops.fd;
        let queue = match interest {
            Interest::Read => &mut ops.read,
            Interest::Write => &mut ops.write,
        };
        if queue.is_empty() {
            if let Some(completion) = op.perform(fd) {
                drop(ops);
                inner.post_operation(Operation {
                    token,
                    completion,
                    op,
                });
                return;
            }
        }
        queue.push_back(Pending { token, op });
    }

    /// Runs until stopped or out of work. Returns the number of handlers executed.
    pub fn run(&self) -> Result<usize, ErrorCode> {
        if self.outstanding() == 0 {
            self.stop();
            return Ok(0);
        }
        let mut n = 0usize;
        while self.do_one(None)? == 1 {
            n = n.saturating_add(1);
        }
        Ok(n)
    }

    /// Executes at most one handler, blocking until one is available.
    pub fn run_one(&self) -> Result<usize, ErrorCode> {
        if self.outstanding() == 0 {
            self.stop();
            return Ok(0);
        }
        self.do_one(None)
    }

    /// Executes at most one handler, waiting no longer than `timeout`.
    pub fn wait_one(&self, timeout: Duration) -> Result<usize, ErrorCode> {
        if self.outstanding() == 0 {
            self.stop();
            return Ok(0);
        }
        self.do_one(Some(timeout))
    }

    /// Executes every handler that is ready without blocking.
    pub fn poll(&self) -> Result<usize, ErrorCode> {
        if self.outstanding() == 0 {
            self.stop();
            return Ok(0);
        }
        let mut n = 0usize;
        while self.do_one(Some(Duration::ZERO))? == 1 {
            n = n.saturating_add(1);
        }
        Ok(n)
    }

    /// Executes at most one ready handler without blocking.
    pub fn poll_one(&self) -> Result<usize, ErrorCode> {
        if self.outstanding() == 0 {
            self.stop();
            return Ok(0);
        }
        self.do_one(Some(Duration::ZERO))
    }

    /// Destroys every operation the reactor holds and waits until none is outstanding.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    fn do_one(&self, timeout: Option<Duration>) -> Result<usize, ErrorCode> {
        let inner = &self.inner;
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        loop {
            if self.stopped() {
                return Ok(0);
            }
            let op = lock(&inner.completed).pop_front();
            if let Some(op) = op {
                self.execute(op);
                return Ok(1);
            }
            let remaining = match (timeout, deadline) {
                (None, _) | (Some(_), None) => None,
                (Some(_), Some(deadline)) => {
                    Some(deadline.saturating_duration_since(Instant::now()))
                }
            };
            match inner.port.get(remaining)? {
                PortEvent::Timeout => return Ok(0),
                PortEvent::Posted(Packet::Op(op)) => {
                    self.execute(op);
                    return Ok(1);
                }
                PortEvent::Posted(Packet::Dispatch) => continue,
                PortEvent::Posted(Packet::Stop) => {
                    inner.stop_event_posted.store(false, Ordering::Release);
                    if self.stopped() {
                        // Pass the wake-up on to the next waiting thread.
                        inner.post_stop();
                        return Ok(0);
                    }
                }
                PortEvent::Ready { key, events } => inner.on_ready(key, events),
            }
        }
    }

    fn execute(&self, op: Operation) {
        op.execute(self);
        self.inner.work_finished();
    }
}

impl Inner {
    fn next_token(&self) -> u64 {
        self.next_token.fetch_add(1, Ordering::Relaxed)
    }

    fn work_started(&self) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
    }

    fn work_finished(&self) {
        if self.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.stop();
        }
    }

    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            log::debug!("reactor: stop requested");
            self.post_stop();
        }
    }

    fn post_stop(&self) {
        if !self.stop_event_posted.swap(true, Ordering::AcqRel) {
            if let Err((_, err)) = self.port.post(Packet::Stop) {
                self.stop_event_posted.store(false, Ordering::Release);
                log::error!("reactor: failed to post stop event: {err}");
            }
        }
    }

    fn destroy(&self, op: Operation) {
        op.destroy();
        self.work_finished();
    }

    fn post_operation(&self, op: Operation) {
        if self.shutdown.load(Ordering::Acquire) {
            self.destroy(op);
            return;
        }
        if let Err((Packet::Op(op), err)) = self.port.post(Packet::Op(op)) {
            log::error!("reactor: failed to post operation: {err}");
            self.destroy(op);
        }
    }

    fn push_completed(&self, ops: Vec<Operation>) {
        if ops.is_empty() {
            return;
        }
        if self.shutdown.load(Ordering::Acquire) {
            for op in ops {
                self.destroy(op);
            }
            return;
        }
        let count = ops.len();
        lock(&self.completed).extend(ops);
        for _ in 0..count {
            if let Err((_, err)) = self.port.post(Packet::Dispatch) {
                log::warn!("reactor: failed to post dispatch packet: {err}");
            }
        }
    }

    fn on_ready(&self, key: u64, events: u32) {
        let handle = lock(&self.handles).get(&key).cloned();
        let Some(handle) = handle else {
            log::trace!("reactor: readiness for unknown key {key}");
            return;
        };
        let mut done = Vec::new();
        {
            let mut ops = lock(&handle);
            let fd = ops.fd;
            if events & READ_EVENTS != 0 {
                perform_queued(&mut ops.read, fd, &mut done);
            }
            if events & WRITE_EVENTS != 0 {
                perform_queued(&mut ops.write, fd, &mut done);
            }
        }
        self.push_completed(done);
    }

    fn take_pending(&self, key: HandleKey, remove: bool) -> Option<(RawSocket, Vec<Pending>)> {
        let handle = {
            let mut handles = lock(&self.handles);
            if remove {
                handles.remove(&key.0)
            } else {
                handles.get(&key.0).cloned()
            }
        }?;
        let mut ops = lock(&handle);
        Some((ops.fd, ops.take_all()))
    }

    fn abort_pending(&self, pending: Vec<Pending>) {
        let aborted = pending
            .into_iter()
            .map(|p| Operation {
                token: p.token,
                completion: Completion::failure(ErrorCode::OperationAborted),
                op: p.op,
            })
            .collect();
        self.push_completed(aborted);
    }

    fn cancel(&self, key: HandleKey) {
        if let Some((_, pending)) = self.take_pending(key, false) {
            self.abort_pending(pending);
        }
    }

    fn deregister(&self, key: HandleKey) -> Result<(), ErrorCode> {
        let Some((fd, pending)) = self.take_pending(key, true) else {
            return Err(ErrorCode::BadDescriptor);
        };
        self.abort_pending(pending);
        log::debug!("reactor: deregistered fd {fd} (key {})", key.0);
        self.port.disassociate(fd)
    }

    fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        log::debug!(
            "reactor: shutting down with {} outstanding operations",
            self.outstanding.load(Ordering::Acquire)
        );
        let interval = self
            .config
            .shutdown_poll_interval
            .unwrap_or(DEFAULT_SHUTDOWN_POLL_INTERVAL);
        loop {
            self.destroy_held();
            if self.outstanding.load(Ordering::Acquire) == 0 {
                break;
            }
            match self.port.get(Some(interval)) {
                Ok(PortEvent::Posted(Packet::Op(op))) => self.destroy(op),
                Ok(PortEvent::Posted(Packet::Stop)) => {
                    self.stop_event_posted.store(false, Ordering::Release);
                }
                Ok(_) => {}
                Err(err) => {
                    log::error!("reactor: failed to drain the completion port: {err}");
                    break;
                }
            }
        }
        // Threads still inside the run family must wake up and leave.
        self.stopped.store(true, Ordering::Release);
        self.post_stop();
        log::debug!("reactor: shut down");
    }

    /// Destroys operations waiting on handles and in the completed queue.
    fn destroy_held(&self) {
        let handles: Vec<_> = lock(&self.handles).values().cloned().collect();
        for handle in handles {
            let pending = lock(&handle).take_all();
            for p in pending {
                self.destroy(Operation {
                    token: p.token,
                    completion: Completion::failure(ErrorCode::OperationAborted),
                    op: p.op,
                });
            }
        }
        loop {
            let op = lock(&self.completed).pop_front();
            match op {
                Some(op) => self.destroy(op),
                None => break,
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn perform_queued(queue: &mut VecDeque<Pending>, fd: RawSocket, done: &mut Vec<Operation>) {
    while let Some(front) = queue.front_mut() {
        let Some(completion) = front.op.perform(fd) else {
            break;
        };
        if let Some(p) = queue.pop_front() {
            done.push(Operation {
                token: p.token,
                completion,
                op: p.op,
            });
        }
    }
}

/// Non-owning reference held by sockets registered with a reactor.
#[derive(Clone)]
pub(crate) struct WeakReactor(std::sync::Weak<Inner>);

impl WeakReactor {
    pub fn upgrade(&self) -> Option<Reactor> {
        self.0.upgrade().map(|inner| Reactor { inner })
    }

    pub fn is(&self, reactor: &Reactor) -> bool {
        std::ptr::eq(self.0.as_ptr(), Arc::as_ptr(&reactor.inner))
    }
}

struct PostedHandler<F>(F);

impl<F> ReactorOp for PostedHandler<F>
where
    F: FnOnce() + Send + 'static,
{
    fn perform(&mut self, _: RawSocket) -> Option<Completion> {
        Some(Completion::success(0))
    }

    fn complete(self: Box<Self>, reactor: Option<&Reactor>, _: Completion) {
        if reactor.is_some() {
            (self.0)();
        }
    }
}
