use std::ffi::CStr;

/// Socket syscall errors.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("cannot create the socket: {}", errno_to_str(*.errno))]
    Create { errno: i32 },

    #[error("bind({addr}) failed: {}", errno_to_str(*.errno))]
    Bind { errno: i32, addr: String },

    #[error("cannot listen on {addr}: {}", errno_to_str(*.errno))]
    Listen { errno: i32, addr: String },

    #[error("connect({addr}) failed: {}", errno_to_str(*.errno))]
    Connect { errno: i32, addr: String },

    #[error("cannot accept connection: {}", errno_to_str(*.errno))]
    Accept { errno: i32 },

    #[error("cannot recv from socket: {}", errno_to_str(*.errno))]
    Recv { errno: i32 },

    #[error("cannot duplicate file descriptor {fd}: {}", errno_to_str(*.errno))]
    Duplicate { errno: i32, fd: i32 },

    #[error("readiness wait failed: {}", errno_to_str(*.errno))]
    Wait { errno: i32 },

    #[error("setsockopt({option}) failed: {}", errno_to_str(*.errno))]
    SetOption { errno: i32, option: &'static str },

    #[error("getsockopt({option}) failed: {}", errno_to_str(*.errno))]
    GetOption { errno: i32, option: &'static str },

    #[error("invalid address: {reason}")]
    InvalidAddress { reason: &'static str },
}

impl SocketError {
    /// Returns the errno carried by this error, if any.
    pub fn errno(&self) -> Option<i32> {
        match self {
            SocketError::Create { errno }
            | SocketError::Bind { errno, .. }
            | SocketError::Listen { errno, .. }
            | SocketError::Connect { errno, .. }
            | SocketError::Accept { errno }
            | SocketError::Recv { errno }
            | SocketError::Duplicate { errno, .. }
            | SocketError::Wait { errno }
            | SocketError::SetOption { errno, .. }
            | SocketError::GetOption { errno, .. } => Some(*errno),
            SocketError::InvalidAddress { .. } => None,
        }
    }
}

/// Name service errors (`getaddrinfo` / `getnameinfo`).
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("forward host lookup failed for {host} ({service}): {message}")]
    Lookup {
        code: i32,
        message: String,
        host: String,
        service: String,
    },

    #[error("forward host lookup for {host} ({service}) returned no addresses")]
    Empty { host: String, service: String },

    #[error("getnameinfo failed: {message}")]
    NameInfo { code: i32, message: String },

    #[error("endpoint string contains a NUL byte")]
    Nul,
}

impl ResolveError {
    pub(crate) fn lookup(code: i32, host: Option<&str>, service: Option<&str>) -> Self {
        ResolveError::Lookup {
            code,
            message: gai_to_str(code),
            host: host.unwrap_or("[unspecified]").to_owned(),
            service: service.unwrap_or("[unspecified]").to_owned(),
        }
    }

    pub(crate) fn name_info(code: i32) -> Self {
        ResolveError::NameInfo { code, message: gai_to_str(code) }
    }
}

/// Unrecoverable engine failures.
///
/// Every value of this type is fatal: the candidate-level failures that the
/// engine can recover from never leave the connect and bind loops.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Socket(#[from] SocketError),

    #[error("forward lookup returned no usable socket types")]
    NoUsableSocketTypes,

    #[error("unable to connect to address {host}, service {service}")]
    Unreachable { host: String, service: String },

    #[error("failed to bind to any local addr/port")]
    NothingBound,

    #[error("connection timed out")]
    TimedOut,

    #[error("listener stopped without delivering a peer")]
    NoPeer,

    #[error("invalid connection attributes: {0}")]
    InvalidAttributes(&'static str),
}

/// Reports `err` and terminates the process with status 1.
pub fn fatal(err: &EngineError) -> ! {
    tracing::error!("{}", err);
    std::process::exit(1)
}

/// Returns current errno value.
#[inline]
pub fn errno() -> i32 {
    unsafe { *libc::__errno_location() }
}

/// Converts errno to human-readable string.
pub(crate) fn errno_to_str(errno: i32) -> String {
    match errno {
        libc::EACCES => "permission denied".into(),
        libc::EADDRINUSE => "address already in use".into(),
        libc::EADDRNOTAVAIL => "address not available".into(),
        libc::EAFNOSUPPORT => "address family not supported".into(),
        libc::EAGAIN => "resource temporarily unavailable".into(),
        libc::EBADF => "bad file descriptor".into(),
        libc::ECONNREFUSED => "connection refused".into(),
        libc::ECONNRESET => "connection reset by peer".into(),
        libc::EHOSTUNREACH => "no route to host".into(),
        libc::EINPROGRESS => "operation in progress".into(),
        libc::EINTR => "interrupted by signal".into(),
        libc::EINVAL => "invalid argument".into(),
        libc::EMFILE => "too many open files".into(),
        libc::ENETUNREACH => "network unreachable".into(),
        libc::ENOBUFS => "no buffer space available".into(),
        libc::ENOTCONN => "not connected".into(),
        libc::EPIPE => "broken pipe".into(),
        libc::EPROTONOSUPPORT => "protocol not supported".into(),
        libc::ETIMEDOUT => "connection timed out".into(),
        _ => format!("errno {}", errno),
    }
}

/// Converts a `getaddrinfo`/`getnameinfo` status to its message.
fn gai_to_str(code: i32) -> String {
    let msg = unsafe { libc::gai_strerror(code) };
    if msg.is_null() {
        return format!("resolver error {}", code);
    }
    unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
}

/// Maps errno to std::io::ErrorKind.
fn errno_to_kind(errno: i32) -> std::io::ErrorKind {
    match errno {
        libc::EACCES | libc::EPERM => std::io::ErrorKind::PermissionDenied,
        libc::EADDRINUSE => std::io::ErrorKind::AddrInUse,
        libc::EADDRNOTAVAIL => std::io::ErrorKind::AddrNotAvailable,
        libc::EAGAIN => std::io::ErrorKind::WouldBlock,
        libc::ECONNREFUSED => std::io::ErrorKind::ConnectionRefused,
        libc::ECONNRESET => std::io::ErrorKind::ConnectionReset,
        libc::EINTR => std::io::ErrorKind::Interrupted,
        libc::EINVAL => std::io::ErrorKind::InvalidInput,
        libc::ENOTCONN => std::io::ErrorKind::NotConnected,
        libc::EPIPE => std::io::ErrorKind::BrokenPipe,
        libc::ETIMEDOUT => std::io::ErrorKind::TimedOut,
        _ => std::io::ErrorKind::Other,
    }
}

impl From<SocketError> for std::io::Error {
    fn from(err: SocketError) -> Self {
        let kind = err.errno().map_or(std::io::ErrorKind::InvalidInput, errno_to_kind);
        std::io::Error::new(kind, err)
    }
}
