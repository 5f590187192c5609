//! # Error Translation Layer
//!
//! ## Purpose
//!
//! Every failure that leaves this crate is expressed in one portable taxonomy,
//! [`ErrorCode`], so that the retry engine, the socket handle and the reactor never
//! branch on a raw platform code.
//!
//! ## How it works
//!
//! Native error signals (`errno` on Unix, `WSAGetLastError`/`GetLastError` values on
//! Windows) are mapped once, at the primitive layer, through
//! [`ErrorCode::from_raw_os_error`] or [`ErrorCode::from_winsock`]. Codes without a
//! portable counterpart are carried verbatim in [`ErrorCode::Os`].
//!
//! Operations come in two forms. The primitive layer (`socket_ops`) returns the bare
//! [`ErrorCode`] as an error value. The socket handle returns [`Error`], which carries
//! the same code plus the call-site tag of the operation that failed, and is meant to
//! be propagated with `?`.
//!
//! ## Main components
//!
//! - `ErrorCode`: the portable error taxonomy.
//! - `ErrorClass`: the coarse classification used by the retry engine.
//! - `Error`: a tagged error raised by the socket handle.
//! - `AddrParseError`, `BadAddressCast`: address model failures.

use std::io;

/// Portable error taxonomy shared by every layer of the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorCode {
    #[error("operation would block")]
    WouldBlock,
    #[error("resource temporarily unavailable")]
    TryAgain,
    #[error("interrupted system call")]
    Interrupted,
    #[error("operation now in progress")]
    InProgress,
    #[error("operation already in progress")]
    AlreadyInProgress,

    #[error("invalid argument")]
    InvalidArgument,
    #[error("address family not supported by protocol")]
    AddressFamilyNotSupported,
    #[error("protocol wrong type for socket")]
    WrongProtocolType,
    #[error("operation not supported for this socket orientation")]
    WrongOrientation,
    #[error("operation not supported")]
    OperationNotSupported,
    #[error("protocol not available")]
    NoProtocolOption,
    #[error("bad file descriptor")]
    BadDescriptor,
    #[error("socket operation on non-socket")]
    NotASocket,
    #[error("bad address")]
    BadAddress,
    #[error("destination address required")]
    DestinationAddressRequired,
    #[error("message too long")]
    MessageSize,
    #[error("permission denied")]
    PermissionDenied,
    #[error("address already in use")]
    AddressInUse,
    #[error("cannot assign requested address")]
    AddressNotAvailable,
    #[error("name too long")]
    NameTooLong,
    #[error("already open")]
    AlreadyOpen,

    #[error("connection refused")]
    ConnectionRefused,
    #[error("connection reset by peer")]
    ConnectionReset,
    #[error("software caused connection abort")]
    ConnectionAborted,
    #[error("protocol error")]
    ProtocolError,
    #[error("connection timed out")]
    TimedOut,
    #[error("transport endpoint is not connected")]
    NotConnected,
    #[error("transport endpoint is already connected")]
    AlreadyConnected,
    #[error("cannot send after transport endpoint shutdown")]
    ShutDown,
    #[error("broken pipe")]
    BrokenPipe,
    #[error("network is down")]
    NetworkDown,
    #[error("network is unreachable")]
    NetworkUnreachable,
    #[error("network dropped connection on reset")]
    NetworkReset,
    #[error("no route to host")]
    HostUnreachable,

    #[error("end of file")]
    Eof,
    #[error("operation aborted")]
    OperationAborted,
    #[error("host not found")]
    HostNotFound,

    #[error("cannot allocate memory")]
    OutOfMemory,
    #[error("no buffer space available")]
    NoBufferSpace,
    #[error("too many open files")]
    TooManyOpenFiles,

    #[error("os error {0}")]
    Os(i32),
}

/// Coarse classification of an [`ErrorCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Retried internally by the synchronous engine, never surfaced by blocking calls.
    Transient,
    /// Unsupported family, invalid argument, wrong orientation and friends.
    ProtocolArgument,
    /// Refused, reset, aborted, timed out.
    Connection,
    /// Orderly end of a byte stream.
    EndOfStream,
    /// Resource exhaustion; surfaced and never retried.
    Fatal,
    /// Everything else, including unmapped native codes and cancellation.
    Other,
}

impl ErrorCode {
    /// Maps a native error number of the current platform into the taxonomy.
    #[cfg(unix)]
    pub fn from_raw_os_error(code: i32) -> Self {
        // EAGAIN and EWOULDBLOCK share a value on most targets, so they can not
        // both appear as match patterns.
        if code == libc::EWOULDBLOCK || code == libc::EAGAIN {
            return ErrorCode::WouldBlock;
        }
        match code {
            libc::EINTR => ErrorCode::Interrupted,
            libc::EINPROGRESS => ErrorCode::InProgress,
            libc::EALREADY => ErrorCode::AlreadyInProgress,
            libc::EINVAL => ErrorCode::InvalidArgument,
            libc::EAFNOSUPPORT | libc::EPFNOSUPPORT => ErrorCode::AddressFamilyNotSupported,
            libc::EPROTOTYPE => ErrorCode::WrongProtocolType,
            libc::EOPNOTSUPP | libc::EPROTONOSUPPORT | libc::ESOCKTNOSUPPORT => {
                ErrorCode::OperationNotSupported
            }
            libc::ENOPROTOOPT => ErrorCode::NoProtocolOption,
            libc::EBADF => ErrorCode::BadDescriptor,
            libc::ENOTSOCK => ErrorCode::NotASocket,
            libc::EFAULT => ErrorCode::BadAddress,
            libc::EDESTADDRREQ => ErrorCode::DestinationAddressRequired,
            libc::EMSGSIZE => ErrorCode::MessageSize,
            libc::EACCES | libc::EPERM => ErrorCode::PermissionDenied,
            libc::EADDRINUSE => ErrorCode::AddressInUse,
            libc::EADDRNOTAVAIL => ErrorCode::AddressNotAvailable,
            libc::ENAMETOOLONG => ErrorCode::NameTooLong,
            libc::ECONNREFUSED => ErrorCode::ConnectionRefused,
            libc::ECONNRESET => ErrorCode::ConnectionReset,
            libc::ECONNABORTED => ErrorCode::ConnectionAborted,
            libc::EPROTO => ErrorCode::ProtocolError,
            libc::ETIMEDOUT => ErrorCode::TimedOut,
            libc::ENOTCONN => ErrorCode::NotConnected,
            libc::EISCONN => ErrorCode::AlreadyConnected,
            libc::ESHUTDOWN => ErrorCode::ShutDown,
            libc::EPIPE => ErrorCode::BrokenPipe,
            libc::ENETDOWN => ErrorCode::NetworkDown,
            libc::ENETUNREACH => ErrorCode::NetworkUnreachable,
            libc::ENETRESET => ErrorCode::NetworkReset,
            libc::EHOSTUNREACH => ErrorCode::HostUnreachable,
            libc::ECANCELED => ErrorCode::OperationAborted,
            libc::ENOMEM => ErrorCode::OutOfMemory,
            libc::ENOBUFS => ErrorCode::NoBufferSpace,
            libc::EMFILE | libc::ENFILE => ErrorCode::TooManyOpenFiles,
            other => ErrorCode::Os(other),
        }
    }

    /// Maps a Winsock (`WSAE*`) or Win32 (`ERROR_*`) code into the taxonomy.
    ///
    /// This table is pure data and available on every platform.
    pub fn from_winsock(code: i32) -> Self {
        match code {
            // Win32 codes that surface through socket calls and overlapped I/O.
            4 => ErrorCode::TooManyOpenFiles,     // ERROR_TOO_MANY_OPEN_FILES
            5 => ErrorCode::PermissionDenied,     // ERROR_ACCESS_DENIED
            6 => ErrorCode::BadDescriptor,        // ERROR_INVALID_HANDLE
            8 | 14 => ErrorCode::OutOfMemory,     // ERROR_NOT_ENOUGH_MEMORY, ERROR_OUTOFMEMORY
            21 | 1237 => ErrorCode::TryAgain,     // ERROR_NOT_READY, ERROR_RETRY
            38 | 109 => ErrorCode::Eof,           // ERROR_HANDLE_EOF, ERROR_BROKEN_PIPE
            64 => ErrorCode::ConnectionReset,     // ERROR_NETNAME_DELETED
            995 => ErrorCode::OperationAborted,   // ERROR_OPERATION_ABORTED
            1225 | 1234 => ErrorCode::ConnectionRefused, // ERROR_CONNECTION_REFUSED, ERROR_PORT_UNREACHABLE
            1236 => ErrorCode::ConnectionAborted, // ERROR_CONNECTION_ABORTED

            10004 => ErrorCode::Interrupted,
            10009 => ErrorCode::BadDescriptor,
            10013 => ErrorCode::PermissionDenied,
            10014 => ErrorCode::BadAddress,
            10022 => ErrorCode::InvalidArgument,
            10024 => ErrorCode::TooManyOpenFiles,
            10035 => ErrorCode::WouldBlock,
            10036 => ErrorCode::InProgress,
            10037 => ErrorCode::AlreadyInProgress,
            10038 => ErrorCode::NotASocket,
            10039 => ErrorCode::DestinationAddressRequired,
            10040 => ErrorCode::MessageSize,
            10041 => ErrorCode::WrongProtocolType,
            10042 => ErrorCode::NoProtocolOption,
            10043..=10045 => ErrorCode::OperationNotSupported,
            10046 | 10047 => ErrorCode::AddressFamilyNotSupported,
            10048 => ErrorCode::AddressInUse,
            10049 => ErrorCode::AddressNotAvailable,
            10050 => ErrorCode::NetworkDown,
            10051 => ErrorCode::NetworkUnreachable,
            10052 => ErrorCode::NetworkReset,
            10053 => ErrorCode::ConnectionAborted,
            10054 => ErrorCode::ConnectionReset,
            10055 => ErrorCode::NoBufferSpace,
            10056 => ErrorCode::AlreadyConnected,
            10057 => ErrorCode::NotConnected,
            10058 => ErrorCode::ShutDown,
            10060 => ErrorCode::TimedOut,
            10061 => ErrorCode::ConnectionRefused,
            10063 => ErrorCode::NameTooLong,
            10065 => ErrorCode::HostUnreachable,
            11001 => ErrorCode::HostNotFound,
            other => ErrorCode::Os(other),
        }
    }

    /// Captures and maps the calling thread's last native error.
    pub fn last_os_error() -> Self {
        match io::Error::last_os_error().raw_os_error() {
            #[cfg(unix)]
            Some(code) => ErrorCode::from_raw_os_error(code),
            #[cfg(not(unix))]
            Some(code) => ErrorCode::from_winsock(code),
            None => ErrorCode::Os(0),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ErrorCode::WouldBlock
            | ErrorCode::TryAgain
            | ErrorCode::Interrupted
            | ErrorCode::InProgress
            | ErrorCode::AlreadyInProgress => ErrorClass::Transient,

            ErrorCode::InvalidArgument
            | ErrorCode::AddressFamilyNotSupported
            | ErrorCode::WrongProtocolType
            | ErrorCode::WrongOrientation
            | ErrorCode::OperationNotSupported
            | ErrorCode::NoProtocolOption
            | ErrorCode::BadDescriptor
            | ErrorCode::NotASocket
            | ErrorCode::BadAddress
            | ErrorCode::DestinationAddressRequired
            | ErrorCode::MessageSize
            | ErrorCode::PermissionDenied
            | ErrorCode::AddressInUse
            | ErrorCode::AddressNotAvailable
            | ErrorCode::NameTooLong
            | ErrorCode::AlreadyOpen => ErrorClass::ProtocolArgument,

            ErrorCode::ConnectionRefused
            | ErrorCode::ConnectionReset
            | ErrorCode::ConnectionAborted
            | ErrorCode::ProtocolError
            | ErrorCode::TimedOut
            | ErrorCode::NotConnected
            | ErrorCode::AlreadyConnected
            | ErrorCode::ShutDown
            | ErrorCode::BrokenPipe
            | ErrorCode::NetworkDown
            | ErrorCode::NetworkUnreachable
            | ErrorCode::NetworkReset
            | ErrorCode::HostUnreachable => ErrorClass::Connection,

            ErrorCode::Eof => ErrorClass::EndOfStream,

            ErrorCode::OutOfMemory | ErrorCode::NoBufferSpace | ErrorCode::TooManyOpenFiles => {
                ErrorClass::Fatal
            }

            ErrorCode::OperationAborted | ErrorCode::HostNotFound | ErrorCode::Os(_) => {
                ErrorClass::Other
            }
        }
    }

    /// True for the two spellings of "cannot complete without waiting".
    pub fn is_would_block(&self) -> bool {
        matches!(self, ErrorCode::WouldBlock | ErrorCode::TryAgain)
    }

    pub fn kind(&self) -> io::ErrorKind {
        match self {
            ErrorCode::WouldBlock | ErrorCode::TryAgain => io::ErrorKind::WouldBlock,
            ErrorCode::Interrupted => io::ErrorKind::Interrupted,
            ErrorCode::InvalidArgument | ErrorCode::BadDescriptor => io::ErrorKind::InvalidInput,
            ErrorCode::AddressFamilyNotSupported
            | ErrorCode::WrongOrientation
            | ErrorCode::OperationNotSupported => io::ErrorKind::Unsupported,
            ErrorCode::PermissionDenied => io::ErrorKind::PermissionDenied,
            ErrorCode::AddressInUse => io::ErrorKind::AddrInUse,
            ErrorCode::AddressNotAvailable => io::ErrorKind::AddrNotAvailable,
            ErrorCode::ConnectionRefused => io::ErrorKind::ConnectionRefused,
            ErrorCode::ConnectionReset | ErrorCode::NetworkReset => {
                io::ErrorKind::ConnectionReset
            }
            ErrorCode::ConnectionAborted => io::ErrorKind::ConnectionAborted,
            ErrorCode::TimedOut => io::ErrorKind::TimedOut,
            ErrorCode::NotConnected => io::ErrorKind::NotConnected,
            ErrorCode::BrokenPipe | ErrorCode::ShutDown => io::ErrorKind::BrokenPipe,
            ErrorCode::Eof => io::ErrorKind::UnexpectedEof,
            ErrorCode::OutOfMemory => io::ErrorKind::OutOfMemory,
            _ => io::ErrorKind::Other,
        }
    }
}

impl From<ErrorCode> for io::Error {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::Os(raw) => io::Error::from_raw_os_error(raw),
            _ => io::Error::new(code.kind(), code),
        }
    }
}

/// A failed socket-handle operation: the portable code plus the call-site tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{context}: {code}")]
pub struct Error {
    context: &'static str,
    code: ErrorCode,
}

impl Error {
    pub fn new(context: &'static str, code: ErrorCode) -> Self {
        Error { context, code }
    }

    /// The operation that failed, e.g. `"connect"`.
    pub fn context(&self) -> &'static str {
        self.context
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        io::Error::new(err.code.kind(), err)
    }
}

/// Attaches a call-site tag to an error value.
pub(crate) trait Tag<T> {
    fn tag(self, context: &'static str) -> Result<T>;
}

impl<T> Tag<T> for std::result::Result<T, ErrorCode> {
    fn tag(self, context: &'static str) -> Result<T> {
        self.map_err(|code| Error::new(context, code))
    }
}

/// Result of a socket-handle operation.
pub type Result<T> = std::result::Result<T, Error>;

/// The text is neither an IPv6 nor an IPv4 address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not an address: {0:?}")]
pub struct AddrParseError(pub(crate) String);

/// Conversion between address families that do not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("bad address cast")]
pub struct BadAddressCast;
