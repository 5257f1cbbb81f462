use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};

use crate::addr::SockAddr;
use crate::error::{SocketError, errno};
use super::raw::RawSocket;

/// A listening stream socket.
pub struct Listener {
    fd: OwnedFd,
}

impl Listener {
    /// Moves a bound stream socket into the listening state.
    ///
    /// `label` only feeds the error message.
    pub fn listen(socket: RawSocket, backlog: i32, label: &str) -> Result<Self, SocketError> {
        let result = unsafe { libc::listen(socket.as_raw_fd(), backlog) };

        if result == -1 {
            return Err(SocketError::Listen { errno: errno(), addr: label.to_owned() });
        }

        Ok(Self { fd: socket.into_fd() })
    }

    #[inline]
    pub fn as_raw_fd(&self) -> libc::c_int {
        self.fd.as_raw_fd()
    }

    /// Accepts a connection, returning it with the client's address.
    pub fn accept_with_addr(&self) -> Result<(OwnedFd, SockAddr), SocketError> {
        let mut peer = SockAddr::empty();

        let fd = unsafe {
            libc::accept4(self.as_raw_fd(), peer.as_mut_ptr(), peer.len_mut(), libc::SOCK_CLOEXEC)
        };

        if fd == -1 {
            return Err(SocketError::Accept { errno: errno() });
        }

        let fd = unsafe { OwnedFd::from_raw_fd(fd) };
        Ok((fd, peer))
    }
}

impl AsRawFd for Listener {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl AsFd for Listener {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}
