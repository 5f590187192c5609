//! # Linux Completion Port
//!
//! ## Purpose
//!
//! A small completion-port object on top of `epoll`: threads block in [`get`]
//! and receive either an item posted by another thread or a readiness event for
//! a descriptor associated with the port.
//!
//! ## How it works
//!
//! Posted items go into a mutex-protected queue, and every post adds one to an
//! `eventfd` counter in semaphore mode. The eventfd is registered level-triggered
//! under a reserved key, so as long as posts are pending some waiter wakes up,
//! takes one unit from the counter, and pops one item. A waiter that loses the
//! race for the counter (`EAGAIN`) goes back to waiting.
//!
//! Socket descriptors are registered edge-triggered for every event, keyed by a
//! caller-chosen `u64`.
//!
//! [`get`]: CompletionPort::get

use crate::error::ErrorCode;
use crate::sys::{RawSocket, cvt};
use std::collections::VecDeque;
use std::mem::size_of;
use std::os::fd::{AsRawFd as _, FromRawFd as _, OwnedFd};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

const WAKE_KEY: u64 = u64::MAX;

pub(crate) const SOCKET_EVENTS: u32 = (libc::EPOLLIN
    | libc::EPOLLOUT
    | libc::EPOLLPRI
    | libc::EPOLLERR
    | libc::EPOLLHUP
    | libc::EPOLLRDHUP
    | libc::EPOLLET) as u32;

pub(crate) const READ_EVENTS: u32 =
    (libc::EPOLLIN | libc::EPOLLPRI | libc::EPOLLERR | libc::EPOLLHUP | libc::EPOLLRDHUP) as u32;

pub(crate) const WRITE_EVENTS: u32 = (libc::EPOLLOUT | libc::EPOLLERR | libc::EPOLLHUP) as u32;

/// What a waiter received.
pub(crate) enum PortEvent<T> {
    Posted(T),
    Ready { key: u64, events: u32 },
    Timeout,
}

pub(crate) struct CompletionPort<T> {
    epoll: OwnedFd,
    wake: OwnedFd,
    posted: Mutex<VecDeque<T>>,
}

impl<T> CompletionPort<T> {
    pub fn new() -> Result<Self, ErrorCode> {
        let epoll = cvt(unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) })?;
        let epoll = unsafe { OwnedFd::from_raw_fd(epoll) };
        let wake = cvt(unsafe {
            libc::eventfd(0, libc::EFD_CLOEXEC | libc::EFD_NONBLOCK | libc::EFD_SEMAPHORE)
        })?;
        let wake = unsafe { OwnedFd::from_raw_fd(wake) };
        let port = CompletionPort {
            epoll,
            wake,
            posted: Mutex::new(VecDeque::new()),
        };
        port.ctl(
            libc::EPOLL_CTL_ADD,
            port.wake.as_raw_fd(),
            libc::EPOLLIN as u32,
            WAKE_KEY,
        )?;
        Ok(port)
    }

    fn ctl(&self, op: libc::c_int, fd: RawSocket, events: u32, key: u64) -> Result<(), ErrorCode> {
        let mut ev = libc::epoll_event { events, u64: key };
        cvt(unsafe { libc::epoll_ctl(self.epoll.as_raw_fd(), op, fd, &mut ev) })?;
        Ok(())
    }

    /// Starts delivering readiness of `fd` under `key`.
    pub fn associate(&self, fd: RawSocket, key: u64) -> Result<(), ErrorCode> {
        if key == WAKE_KEY {
            return Err(ErrorCode::InvalidArgument);
        }
        self.ctl(libc::EPOLL_CTL_ADD, fd, SOCKET_EVENTS, key)
    }

    pub fn disassociate(&self, fd: RawSocket) -> Result<(), ErrorCode> {
        self.ctl(libc::EPOLL_CTL_DEL, fd, 0, 0)
    }

    /// Queues `item` and wakes one waiter. The item is handed back on failure.
    pub fn post(&self, item: T) -> Result<(), (T, ErrorCode)> {
        self.posted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(item);
        let one: u64 = 1;
        let ret = cvt(unsafe {
            libc::write(
                self.wake.as_raw_fd(),
                &one as *const u64 as *const libc::c_void,
                size_of::<u64>(),
            )
        });
        match ret {
            Ok(_) => Ok(()),
            Err(err) => {
                let mut posted = self.posted.lock().unwrap_or_else(PoisonError::into_inner);
                match posted.pop_back() {
                    Some(item) => Err((item, err)),
                    // Already taken by a waiter that found a unit from an earlier post.
                    None => Ok(()),
                }
            }
        }
    }

    /// Waits up to `timeout` (`None`: forever) for one posted item or readiness event.
    pub fn get(&self, timeout: Option<Duration>) -> Result<PortEvent<T>, ErrorCode> {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        loop {
            let msec = match deadline {
                None => -1,
                Some(deadline) => to_msec(deadline.saturating_duration_since(Instant::now())),
            };
            let mut ev = libc::epoll_event { events: 0, u64: 0 };
            let n = match cvt(unsafe { libc::epoll_wait(self.epoll.as_raw_fd(), &mut ev, 1, msec) }) {
                Ok(n) => n,
                Err(ErrorCode::Interrupted) => continue,
                Err(err) => return Err(err),
            };
            if n == 0 {
                return Ok(PortEvent::Timeout);
            }
            let key = ev.u64;
            let events = ev.events;
            if key != WAKE_KEY {
                return Ok(PortEvent::Ready { key, events });
            }
            let mut unit: u64 = 0;
            let ret = cvt(unsafe {
                libc::read(
                    self.wake.as_raw_fd(),
                    &mut unit as *mut u64 as *mut libc::c_void,
                    size_of::<u64>(),
                )
            });
            match ret {
                Ok(_) => {}
                Err(err) if err.is_would_block() => continue,
                Err(err) => return Err(err),
            }
            let item = self
                .posted
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            if let Some(item) = item {
                return Ok(PortEvent::Posted(item));
            }
        }
    }
}

/// Rounds up to whole milliseconds so a short non-zero timeout never becomes a poll.
pub(crate) fn to_msec(d: Duration) -> libc::c_int {
    let msec = d.as_nanos().div_ceil(1_000_000);
    msec.min(libc::c_int::MAX as u128) as libc::c_int
}
