#![cfg(test)]

use crate::error::ErrorCode;
use crate::protocol::Tcp;
use crate::reactor::{Completion, Interest, Reactor, ReactorConfig, ReactorOp};
use crate::socket::TcpSocket;
use crate::socket_ops::{self, MessageFlags};
use crate::sys::{self, RawSocket};
use std::os::fd::{AsFd as _, FromRawFd as _, OwnedFd};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Counters {
    performed: AtomicUsize,
    completed: AtomicUsize,
    destroyed: AtomicUsize,
    results: Mutex<Vec<Completion>>,
}

/// Completes immediately when `ready` is set, otherwise waits forever.
struct CountingOp {
    ready: bool,
    counters: Arc<Counters>,
}

impl ReactorOp for CountingOp {
    fn perform(&mut self, _: RawSocket) -> Option<Completion> {
        self.counters.performed.fetch_add(1, Ordering::SeqCst);
        self.ready.then(|| Completion::success(1))
    }

    fn complete(self: Box<Self>, reactor: Option<&Reactor>, completion: Completion) {
        let counter = match reactor {
            Some(_) => &self.counters.completed,
            None => &self.counters.destroyed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        self.counters.results.lock().unwrap().push(completion);
    }
}

fn op(ready: bool, counters: &Arc<Counters>) -> Box<dyn ReactorOp> {
    Box::new(CountingOp {
        ready,
        counters: counters.clone(),
    })
}

fn fd_pair() -> (OwnedFd, OwnedFd) {
    let (a, b) = socket_ops::socketpair(libc::AF_UNIX, sys::SOCK_STREAM, 0).unwrap();
    unsafe { (OwnedFd::from_raw_fd(a), OwnedFd::from_raw_fd(b)) }
}

fn stream_pair() -> (TcpSocket, TcpSocket) {
    let (a, b) = fd_pair();
    let mut left = TcpSocket::new(Tcp::v4());
    let mut right = TcpSocket::new(Tcp::v4());
    left.assign(Tcp::v4(), a).unwrap();
    right.assign(Tcp::v4(), b).unwrap();
    (left, right)
}

#[test]
fn test_run_without_work_returns_zero_and_stops() {
    let reactor = Reactor::new().unwrap();
    assert_eq!(reactor.run().unwrap(), 0);
    assert!(reactor.stopped());
    assert_eq!(reactor.poll().unwrap(), 0);
}

#[test]
fn test_run_executes_every_posted_handler() {
    let reactor = Reactor::new().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    for _ in 0..10 {
        let hits = hits.clone();
        reactor.post(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        });
    }
    assert_eq!(reactor.outstanding(), 10);
    assert_eq!(reactor.run().unwrap(), 10);
    assert_eq!(hits.load(Ordering::SeqCst), 10);
    assert_eq!(reactor.outstanding(), 0);
    assert!(reactor.stopped());
}

#[test]
fn test_stop_is_idempotent_and_restart_resumes() {
    let reactor = Reactor::new().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    {
        let hits = hits.clone();
        reactor.post(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        });
    }
    reactor.stop();
    reactor.stop();
    assert_eq!(reactor.run().unwrap(), 0);
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    reactor.restart();
    assert!(!reactor.stopped());
    assert_eq!(reactor.run().unwrap(), 1);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_stop_wakes_every_blocked_thread() {
    let reactor = Reactor::new().unwrap();
    let (a, _b) = fd_pair();
    let key = reactor.register_handle(a.as_fd()).unwrap();
    let counters = Arc::new(Counters::default());
    reactor.start_op(key, Interest::Read, op(false, &counters));

    let threads: Vec<_> = (0..4)
        .map(|_| {
            let reactor = reactor.clone();
            std::thread::spawn(move || reactor.run())
        })
        .collect();
    std::thread::sleep(Duration::from_millis(50));
    reactor.stop();
    for t in threads {
        assert_eq!(t.join().unwrap().unwrap(), 0);
    }
    assert_eq!(reactor.outstanding(), 1);
    reactor.deregister_handle(key).unwrap();
}

#[test]
fn test_shutdown_destroys_every_held_operation() {
    let reactor = Reactor::with_config(ReactorConfig {
        shutdown_poll_interval: Some(Duration::from_millis(10)),
        ..ReactorConfig::default()
    })
    .unwrap();
    let counters = Arc::new(Counters::default());
    for _ in 0..5 {
        reactor.post_completion(op(true, &counters), Completion::success(0));
    }
    let (a, _b) = fd_pair();
    let key = reactor.register_handle(a.as_fd()).unwrap();
    for _ in 0..3 {
        reactor.start_op(key, Interest::Read, op(false, &counters));
    }
    assert_eq!(reactor.outstanding(), 8);

    reactor.shutdown();
    assert_eq!(counters.destroyed.load(Ordering::SeqCst), 8);
    assert_eq!(counters.completed.load(Ordering::SeqCst), 0);
    assert_eq!(reactor.outstanding(), 0);
    assert!(
        counters
            .results
            .lock()
            .unwrap()
            .iter()
            .all(|c| c.error == Some(ErrorCode::OperationAborted))
    );

    // Work handed over after shutdown is destroyed right away.
    reactor.post_completion(op(true, &counters), Completion::success(0));
    assert_eq!(counters.destroyed.load(Ordering::SeqCst), 9);
    assert_eq!(reactor.outstanding(), 0);
}

#[test]
fn test_posted_handlers_are_dropped_on_shutdown() {
    let reactor = Reactor::new().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    {
        let hits = hits.clone();
        reactor.post(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        });
    }
    drop(reactor);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn test_completion_is_never_delivered_inline() {
    let reactor = Reactor::new().unwrap();
    let (a, _b) = fd_pair();
    let key = reactor.register_handle(a.as_fd()).unwrap();
    let counters = Arc::new(Counters::default());
    reactor.start_op(key, Interest::Write, op(true, &counters));
    assert_eq!(counters.performed.load(Ordering::SeqCst), 1);
    assert_eq!(counters.completed.load(Ordering::SeqCst), 0);
    assert_eq!(reactor.poll_one().unwrap(), 1);
    assert_eq!(counters.completed.load(Ordering::SeqCst), 1);
    reactor.deregister_handle(key).unwrap();
}

#[test]
fn test_queued_operation_waits_behind_the_first() {
    let reactor = Reactor::new().unwrap();
    let (a, _b) = fd_pair();
    let key = reactor.register_handle(a.as_fd()).unwrap();
    let counters = Arc::new(Counters::default());
    reactor.start_op(key, Interest::Read, op(false, &counters));
    // Not attempted: another read is already waiting.
    reactor.start_op(key, Interest::Read, op(true, &counters));
    assert_eq!(counters.performed.load(Ordering::SeqCst), 1);
    assert_eq!(reactor.outstanding(), 2);

    reactor.cancel(key);
    assert_eq!(reactor.run().unwrap(), 2);
    let results = counters.results.lock().unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|c| c.error == Some(ErrorCode::OperationAborted)));
    drop(results);
    reactor.deregister_handle(key).unwrap();
}

#[test]
fn test_unknown_key_fails_with_bad_descriptor() {
    let reactor = Reactor::new().unwrap();
    let (a, _b) = fd_pair();
    let key = reactor.register_handle(a.as_fd()).unwrap();
    reactor.deregister_handle(key).unwrap();
    assert_eq!(reactor.deregister_handle(key), Err(ErrorCode::BadDescriptor));

    let counters = Arc::new(Counters::default());
    reactor.start_op(key, Interest::Read, op(true, &counters));
    assert_eq!(reactor.run().unwrap(), 1);
    assert_eq!(
        counters.results.lock().unwrap()[0].error,
        Some(ErrorCode::BadDescriptor)
    );
}

#[test]
fn test_wait_one_times_out() {
    let reactor = Reactor::new().unwrap();
    let (a, _b) = fd_pair();
    let key = reactor.register_handle(a.as_fd()).unwrap();
    let counters = Arc::new(Counters::default());
    reactor.start_op(key, Interest::Read, op(false, &counters));
    assert_eq!(reactor.wait_one(Duration::from_millis(10)).unwrap(), 0);
    assert!(!reactor.stopped());
    reactor.deregister_handle(key).unwrap();
    assert_eq!(reactor.run().unwrap(), 1);
}

#[test]
fn test_async_receive_completes_when_data_arrives() {
    let reactor = Reactor::new().unwrap();
    let (mut left, right) = stream_pair();
    let received = Arc::new(Mutex::new(None));
    {
        let received = received.clone();
        left.async_receive(&reactor, vec![0u8; 16], MessageFlags::empty(), move |r, buf| {
            let n = r.unwrap();
            *received.lock().unwrap() = Some(buf[..n].to_vec());
        });
    }
    right.send(b"pong").unwrap();
    assert_eq!(reactor.run().unwrap(), 1);
    assert_eq!(received.lock().unwrap().as_deref(), Some(&b"pong"[..]));
}

#[test]
fn test_async_receive_reports_eof() {
    let reactor = Reactor::new().unwrap();
    let (mut left, right) = stream_pair();
    let result = Arc::new(Mutex::new(None));
    {
        let result = result.clone();
        left.async_receive(&reactor, vec![0u8; 16], MessageFlags::empty(), move |r, _| {
            *result.lock().unwrap() = Some(r.map_err(|e| e.code()));
        });
    }
    drop(right);
    assert_eq!(reactor.run().unwrap(), 1);
    assert_eq!(*result.lock().unwrap(), Some(Err(ErrorCode::Eof)));
}

#[test]
fn test_close_aborts_pending_operations() {
    let reactor = Reactor::new().unwrap();
    let (mut left, _right) = stream_pair();
    let result = Arc::new(Mutex::new(None));
    {
        let result = result.clone();
        left.async_receive(&reactor, vec![0u8; 16], MessageFlags::empty(), move |r, _| {
            *result.lock().unwrap() = Some(r.map_err(|e| e.code()));
        });
    }
    left.close().unwrap();
    assert_eq!(reactor.run().unwrap(), 1);
    assert_eq!(*result.lock().unwrap(), Some(Err(ErrorCode::OperationAborted)));
}

#[test]
fn test_zero_length_async_receive_completes_at_once() {
    let reactor = Reactor::new().unwrap();
    let (mut left, _right) = stream_pair();
    let result = Arc::new(Mutex::new(None));
    {
        let result = result.clone();
        left.async_receive(&reactor, Vec::new(), MessageFlags::empty(), move |r, _| {
            *result.lock().unwrap() = Some(r.map_err(|e| e.code()));
        });
    }
    assert_eq!(reactor.run().unwrap(), 1);
    assert_eq!(*result.lock().unwrap(), Some(Ok(0)));
}

#[test]
fn test_socket_cannot_switch_reactors() {
    let first = Reactor::new().unwrap();
    let second = Reactor::new().unwrap();
    let (mut left, _right) = stream_pair();
    left.async_wait(&first, crate::socket_ops::WaitType::Write, |r| r.unwrap());
    let result = Arc::new(Mutex::new(None));
    {
        let result = result.clone();
        left.async_wait(&second, crate::socket_ops::WaitType::Write, move |r| {
            *result.lock().unwrap() = Some(r.map_err(|e| e.code()));
        });
    }
    assert_eq!(first.run().unwrap(), 1);
    assert_eq!(second.run().unwrap(), 1);
    assert_eq!(*result.lock().unwrap(), Some(Err(ErrorCode::InvalidArgument)));
}
