//! Blocking semantics on top of non-blocking attempts.
//!
//! Every `sync_*` primitive runs the same loop: attempt the call, return on
//! success or on a non-transient error, and on would-block either hand the error
//! back (user non-blocking mode) or wait for readiness and attempt again. The
//! attempt and the wait are closures so the loop can be driven without a real
//! descriptor.

use crate::error::ErrorCode;
use crate::socket_ops::StateFlags;

pub(crate) fn retry_blocking<T>(
    op: &'static str,
    state: StateFlags,
    mut attempt: impl FnMut() -> Result<T, ErrorCode>,
    mut wait: impl FnMut() -> Result<(), ErrorCode>,
) -> Result<T, ErrorCode> {
    loop {
        match attempt() {
            Err(ErrorCode::Interrupted) => continue,
            Err(err) if err.is_would_block() => {
                if state.contains(StateFlags::USER_SET_NON_BLOCKING) {
                    return Err(err);
                }
                log::trace!("{op}: would block, waiting for readiness");
                wait()?;
            }
            other => return other,
        }
    }
}
