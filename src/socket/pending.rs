use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::time::Duration;

use crate::addr::ToSockAddr;
use crate::error::SocketError;
use super::options::take_error;
use super::poll::wait_writable;
use super::raw::RawSocket;

/// Outcome of one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected,
    /// No answer before the timeout.
    TimedOut,
    /// The kernel rejected the attempt; carries the errno.
    Aborted(i32),
}

/// A connect() that returned `EINPROGRESS`.
///
/// Borrows the socket: on a timeout or abort the caller still owns the fd
/// and decides whether to close it.
pub struct PendingConnect<'a> {
    fd: BorrowedFd<'a>,
}

impl<'a> PendingConnect<'a> {
    pub fn new(fd: BorrowedFd<'a>) -> Self {
        Self { fd }
    }

    /// Waits for writability, then classifies the result from SO_ERROR.
    ///
    /// Only a failed wait or a failed getsockopt is an error; both mean
    /// the socket layer itself is broken.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<ConnectOutcome, SocketError> {
        if !wait_writable(self.fd.as_raw_fd(), timeout)? {
            return Ok(ConnectOutcome::TimedOut);
        }

        match take_error(&self.fd)? {
            0 => Ok(ConnectOutcome::Connected),
            err => Ok(ConnectOutcome::Aborted(err)),
        }
    }
}

/// Non-blocking connect bounded by `timeout` (`None` waits for the kernel's
/// own connect timeout).
///
/// The socket is left in non-blocking mode.
pub fn connect_with_timeout<A: ToSockAddr>(
    socket: &RawSocket,
    addr: &A,
    timeout: Option<Duration>,
) -> Result<ConnectOutcome, SocketError> {
    socket.set_nonblocking(true)?;

    match socket.start_connect(addr) {
        Ok(true) => Ok(ConnectOutcome::Connected),
        Ok(false) => PendingConnect::new(socket.as_fd()).wait(timeout),
        Err(errno) => Ok(ConnectOutcome::Aborted(errno)),
    }
}

/*
  connect() result      → outcome
  ─────────────────────────────────────────────
  0                     → Connected
  -1 / EINPROGRESS      → wait for POLLOUT:
                            nothing ready  → TimedOut
                            SO_ERROR == 0  → Connected
                            SO_ERROR != 0  → Aborted(SO_ERROR)
  -1 / anything else    → Aborted(errno)
*/

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::SockAddr;
    use crate::socket::SocketKind;
    use std::net::TcpListener;

    fn tcp4() -> RawSocket {
        RawSocket::open(libc::AF_INET, SocketKind::Stream, libc::IPPROTO_TCP).unwrap()
    }

    #[test]
    fn connects_to_live_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = SockAddr::from(listener.local_addr().unwrap());
        let outcome = connect_with_timeout(&tcp4(), &addr, Some(Duration::from_secs(2))).unwrap();
        assert_eq!(outcome, ConnectOutcome::Connected);
    }

    #[test]
    fn closed_port_is_never_success() {
        // grab a free port, then release it so nothing listens there
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let addr = SockAddr::from(std::net::SocketAddr::from(([127, 0, 0, 1], port)));

        for _ in 0..3 {
            let outcome = connect_with_timeout(&tcp4(), &addr, Some(Duration::from_millis(500))).unwrap();
            assert!(matches!(outcome, ConnectOutcome::Aborted(_) | ConnectOutcome::TimedOut));
        }
    }

    #[test]
    fn unroutable_target_times_out_or_aborts() {
        // TEST-NET-1, reserved for documentation
        let addr = SockAddr::from(std::net::SocketAddr::from(([192, 0, 2, 1], 9)));
        for _ in 0..2 {
            let outcome = connect_with_timeout(&tcp4(), &addr, Some(Duration::from_millis(100))).unwrap();
            assert_ne!(outcome, ConnectOutcome::Connected);
        }
    }
}
