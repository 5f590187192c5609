//! Unix flavour of the platform constants and helpers.

use crate::error::ErrorCode;
use std::ffi::{CStr, CString};
use std::os::fd::RawFd;

/// Native socket descriptor.
pub type RawSocket = RawFd;

/// Value of a descriptor slot that holds no socket.
pub const INVALID_SOCKET: RawSocket = -1;

pub const AF_UNSPEC: libc::c_int = libc::AF_UNSPEC;
pub const AF_INET: libc::c_int = libc::AF_INET;
pub const AF_INET6: libc::c_int = libc::AF_INET6;

pub const SOCK_STREAM: libc::c_int = libc::SOCK_STREAM;
pub const SOCK_DGRAM: libc::c_int = libc::SOCK_DGRAM;

pub const IPPROTO_TCP: libc::c_int = libc::IPPROTO_TCP;
pub const IPPROTO_UDP: libc::c_int = libc::IPPROTO_UDP;
pub const IPPROTO_IPV6: libc::c_int = libc::IPPROTO_IPV6;

pub const SOL_SOCKET: libc::c_int = libc::SOL_SOCKET;
pub const SO_LINGER: libc::c_int = libc::SO_LINGER;
pub const SO_ERROR: libc::c_int = libc::SO_ERROR;

pub const SHUT_RD: libc::c_int = libc::SHUT_RD;
pub const SHUT_WR: libc::c_int = libc::SHUT_WR;
pub const SHUT_RDWR: libc::c_int = libc::SHUT_RDWR;

pub const SOMAXCONN: libc::c_int = libc::SOMAXCONN;

pub const MSG_PEEK: libc::c_int = libc::MSG_PEEK;
pub const MSG_OOB: libc::c_int = libc::MSG_OOB;
pub const MSG_DONTROUTE: libc::c_int = libc::MSG_DONTROUTE;
pub const MSG_EOR: libc::c_int = libc::MSG_EOR;

/// Extra flags every send carries so a reset peer yields `EPIPE` instead of `SIGPIPE`.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub const MSG_SEND_DEFAULT: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub const MSG_SEND_DEFAULT: libc::c_int = 0;

/// Turns a `-1` syscall return into the calling thread's mapped error.
pub(crate) fn cvt<T: IsMinusOne>(ret: T) -> Result<T, ErrorCode> {
    if ret.is_minus_one() {
        Err(ErrorCode::last_os_error())
    } else {
        Ok(ret)
    }
}

pub(crate) trait IsMinusOne {
    fn is_minus_one(&self) -> bool;
}

macro_rules! impl_is_minus_one {
    ($($t:ident)*) => ($(impl IsMinusOne for $t {
        fn is_minus_one(&self) -> bool {
            *self == -1
        }
    })*)
}

impl_is_minus_one! { i32 isize }

/// Resolves an interface name to its index, `0` when no such interface exists.
pub fn if_nametoindex(name: &str) -> u32 {
    match CString::new(name) {
        Ok(cname) => unsafe { libc::if_nametoindex(cname.as_ptr()) },
        Err(_) => 0,
    }
}

/// Resolves an interface index to its name.
pub fn if_indextoname(index: u32) -> Option<String> {
    let mut buf = [0 as libc::c_char; libc::IF_NAMESIZE + 1];
    let ret = unsafe { libc::if_indextoname(index, buf.as_mut_ptr()) };
    if ret.is_null() {
        return None;
    }
    let name = unsafe { CStr::from_ptr(buf.as_ptr()) };
    Some(name.to_string_lossy().into_owned())
}

/// Host name of the local machine.
pub fn host_name() -> Result<String, ErrorCode> {
    let mut buf = [0 as libc::c_char; 256];
    cvt(unsafe { libc::gethostname(buf.as_mut_ptr(), buf.len() - 1) })?;
    let name = unsafe { CStr::from_ptr(buf.as_ptr()) };
    Ok(name.to_string_lossy().into_owned())
}
