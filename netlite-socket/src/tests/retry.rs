#![cfg(test)]

use crate::error::ErrorCode;
use crate::retry::retry_blocking;
use crate::socket_ops::{StateFlags, filter_aborted_accept};
use std::cell::Cell;

#[test]
fn test_waits_once_per_would_block() {
    let attempts = Cell::new(0);
    let waits = Cell::new(0);
    let n = retry_blocking(
        "recv",
        StateFlags::STREAM_ORIENTED,
        || {
            attempts.set(attempts.get() + 1);
            if attempts.get() <= 3 {
                Err(ErrorCode::WouldBlock)
            } else {
                Ok(42usize)
            }
        },
        || {
            waits.set(waits.get() + 1);
            Ok(())
        },
    );
    assert_eq!(n, Ok(42));
    assert_eq!(attempts.get(), 4);
    assert_eq!(waits.get(), 3);
}

#[test]
fn test_user_non_blocking_reports_would_block() {
    let waits = Cell::new(0);
    let r: Result<usize, _> = retry_blocking(
        "recv",
        StateFlags::USER_SET_NON_BLOCKING,
        || Err(ErrorCode::TryAgain),
        || {
            waits.set(waits.get() + 1);
            Ok(())
        },
    );
    assert_eq!(r, Err(ErrorCode::TryAgain));
    assert_eq!(waits.get(), 0);
}

#[test]
fn test_internal_non_blocking_still_blocks() {
    let attempts = Cell::new(0);
    let r = retry_blocking(
        "send",
        StateFlags::INTERNAL_NON_BLOCKING,
        || {
            attempts.set(attempts.get() + 1);
            if attempts.get() == 1 { Err(ErrorCode::WouldBlock) } else { Ok(()) }
        },
        || Ok(()),
    );
    assert_eq!(r, Ok(()));
    assert_eq!(attempts.get(), 2);
}

#[test]
fn test_interrupted_is_retried_without_waiting() {
    let attempts = Cell::new(0);
    let waits = Cell::new(0);
    let r = retry_blocking(
        "accept",
        StateFlags::empty(),
        || {
            attempts.set(attempts.get() + 1);
            match attempts.get() {
                1 | 2 => Err(ErrorCode::Interrupted),
                _ => Ok(7),
            }
        },
        || {
            waits.set(waits.get() + 1);
            Ok(())
        },
    );
    assert_eq!(r, Ok(7));
    assert_eq!(waits.get(), 0);
}

#[test]
fn test_other_errors_surface() {
    let waits = Cell::new(0);
    let r: Result<(), _> = retry_blocking(
        "send",
        StateFlags::empty(),
        || Err(ErrorCode::ConnectionReset),
        || {
            waits.set(waits.get() + 1);
            Ok(())
        },
    );
    assert_eq!(r, Err(ErrorCode::ConnectionReset));
    assert_eq!(waits.get(), 0);

    // A failing wait ends the loop with the wait's error.
    let r: Result<(), _> = retry_blocking(
        "recv",
        StateFlags::empty(),
        || Err(ErrorCode::WouldBlock),
        || Err(ErrorCode::BadDescriptor),
    );
    assert_eq!(r, Err(ErrorCode::BadDescriptor));
}

#[test]
fn test_aborted_accept_is_retried_by_default() {
    let attempts = Cell::new(0);
    let waits = Cell::new(0);
    let fd = retry_blocking(
        "accept",
        StateFlags::STREAM_ORIENTED,
        || {
            attempts.set(attempts.get() + 1);
            let raw = if attempts.get() == 1 {
                Err(ErrorCode::ConnectionAborted)
            } else {
                Ok(7)
            };
            filter_aborted_accept(StateFlags::STREAM_ORIENTED, raw)
        },
        || {
            waits.set(waits.get() + 1);
            Ok(())
        },
    );
    assert_eq!(fd, Ok(7));
    assert_eq!(attempts.get(), 2);
    assert_eq!(waits.get(), 1);
}

#[test]
fn test_aborted_accept_surfaces_when_enabled() {
    let state = StateFlags::STREAM_ORIENTED | StateFlags::ENABLE_CONNECTION_ABORTED;
    let waits = Cell::new(0);
    let fd = retry_blocking(
        "accept",
        state,
        || filter_aborted_accept(state, Err(ErrorCode::ConnectionAborted)),
        || {
            waits.set(waits.get() + 1);
            Ok(())
        },
    );
    assert_eq!(fd, Err(ErrorCode::ConnectionAborted));
    assert_eq!(waits.get(), 0);

    assert_eq!(
        filter_aborted_accept(StateFlags::STREAM_ORIENTED, Err(ErrorCode::ProtocolError)),
        Err(ErrorCode::WouldBlock)
    );
    assert_eq!(
        filter_aborted_accept(StateFlags::STREAM_ORIENTED, Err(ErrorCode::ConnectionReset)),
        Err(ErrorCode::ConnectionReset)
    );
}
