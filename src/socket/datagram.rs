use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};

use crate::addr::{SockAddr, ToSockAddr};
use crate::error::{SocketError, errno};
use super::raw::RawSocket;

/// A bound datagram socket shared by every peer that writes to it.
pub struct BoundDatagram {
	fd: OwnedFd,
}

impl BoundDatagram {
	pub fn from_socket(socket: RawSocket) -> Self {
		Self { fd: socket.into_fd() }
	}

	#[inline]
	pub fn as_raw_fd(&self) -> libc::c_int {
		self.fd.as_raw_fd()
	}

	/// Learns the source of the next queued datagram without consuming it.
	pub fn peek_sender(&self) -> Result<SockAddr, SocketError> {
		let mut from = SockAddr::empty();

		let n = unsafe {
			libc::recvfrom(
				self.as_raw_fd(),
				std::ptr::null_mut(),
				0,
				libc::MSG_PEEK,
				from.as_mut_ptr(),
				from.len_mut(),
			)
		};

		if n == -1 {
			return Err(SocketError::Recv { errno: errno() });
		}
		Ok(from)
	}

	/// Duplicates the descriptor so one peer can get its own handle.
	///
	/// Both handles refer to the same kernel socket.
	pub fn duplicate(&self) -> Result<PeerDatagram, SocketError> {
		let fd = unsafe { libc::fcntl(self.as_raw_fd(), libc::F_DUPFD_CLOEXEC, 0) };

		if fd == -1 {
			return Err(SocketError::Duplicate { errno: errno(), fd: self.as_raw_fd() });
		}
		Ok(PeerDatagram { fd: unsafe { OwnedFd::from_raw_fd(fd) } })
	}
}

impl AsRawFd for BoundDatagram {
	fn as_raw_fd(&self) -> RawFd {
		self.fd.as_raw_fd()
	}
}

impl AsFd for BoundDatagram {
	fn as_fd(&self) -> BorrowedFd<'_> {
		self.fd.as_fd()
	}
}

/// A duplicated datagram handle for a single peer.
pub struct PeerDatagram {
	fd: OwnedFd,
}

impl PeerDatagram {
	/// Restricts the socket to exchanging datagrams with `addr` only.
	pub fn connect(&self, addr: &SockAddr) -> Result<(), SocketError> {
		let result = addr.with_raw(|ptr, len| unsafe { libc::connect(self.fd.as_raw_fd(), ptr, len) });

		match result {
			Some(0) => Ok(()),
			Some(_) => Err(SocketError::Connect { errno: errno(), addr: format!("{:?}", addr) }),
			None => Err(SocketError::InvalidAddress { reason: "empty address" }),
		}
	}

	/// Consumes the queued datagram so the next readiness wait does not
	/// report it again. Errors are ignored: the datagram is unwanted anyway.
	pub fn discard_pending(&self) {
		let _ = unsafe {
			libc::recvfrom(
				self.fd.as_raw_fd(),
				std::ptr::null_mut(),
				0,
				libc::MSG_DONTWAIT,
				std::ptr::null_mut(),
				std::ptr::null_mut(),
			)
		};
	}

	pub fn into_fd(self) -> OwnedFd {
		self.fd
	}
}

impl AsRawFd for PeerDatagram {
	fn as_raw_fd(&self) -> RawFd {
		self.fd.as_raw_fd()
	}
}
