#![cfg(test)]

use crate::error::{Error, ErrorClass, ErrorCode};
use std::io;

#[test]
fn test_errno_mapping() {
    assert_eq!(ErrorCode::from_raw_os_error(libc::EAGAIN), ErrorCode::WouldBlock);
    assert_eq!(ErrorCode::from_raw_os_error(libc::EWOULDBLOCK), ErrorCode::WouldBlock);
    assert_eq!(ErrorCode::from_raw_os_error(libc::EINTR), ErrorCode::Interrupted);
    assert_eq!(ErrorCode::from_raw_os_error(libc::ECONNREFUSED), ErrorCode::ConnectionRefused);
    assert_eq!(ErrorCode::from_raw_os_error(libc::EAFNOSUPPORT), ErrorCode::AddressFamilyNotSupported);
    assert_eq!(ErrorCode::from_raw_os_error(libc::EMFILE), ErrorCode::TooManyOpenFiles);
    assert_eq!(ErrorCode::from_raw_os_error(libc::ENOEXEC), ErrorCode::Os(libc::ENOEXEC));
}

#[test]
fn test_winsock_mapping() {
    assert_eq!(ErrorCode::from_winsock(10035), ErrorCode::WouldBlock);
    assert_eq!(ErrorCode::from_winsock(10054), ErrorCode::ConnectionReset);
    assert_eq!(ErrorCode::from_winsock(995), ErrorCode::OperationAborted);
    assert_eq!(ErrorCode::from_winsock(38), ErrorCode::Eof);
    assert_eq!(ErrorCode::from_winsock(11001), ErrorCode::HostNotFound);
    assert_eq!(ErrorCode::from_winsock(12345), ErrorCode::Os(12345));
}

#[test]
fn test_classes() {
    assert_eq!(ErrorCode::WouldBlock.class(), ErrorClass::Transient);
    assert_eq!(ErrorCode::Interrupted.class(), ErrorClass::Transient);
    assert_eq!(ErrorCode::WrongOrientation.class(), ErrorClass::ProtocolArgument);
    assert_eq!(ErrorCode::ConnectionReset.class(), ErrorClass::Connection);
    assert_eq!(ErrorCode::Eof.class(), ErrorClass::EndOfStream);
    assert_eq!(ErrorCode::OutOfMemory.class(), ErrorClass::Fatal);
    assert_eq!(ErrorCode::OperationAborted.class(), ErrorClass::Other);
    assert!(ErrorCode::TryAgain.is_would_block());
    assert!(!ErrorCode::Interrupted.is_would_block());
}

#[test]
fn test_io_conversion() {
    let err: io::Error = ErrorCode::Os(libc::ENOEXEC).into();
    assert_eq!(err.raw_os_error(), Some(libc::ENOEXEC));
    let err: io::Error = ErrorCode::WouldBlock.into();
    assert_eq!(err.kind(), io::ErrorKind::WouldBlock);

    let tagged = Error::new("connect", ErrorCode::ConnectionRefused);
    assert_eq!(tagged.to_string(), "connect: connection refused");
    assert_eq!(tagged.code(), ErrorCode::ConnectionRefused);
    let err: io::Error = tagged.into();
    assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
}
