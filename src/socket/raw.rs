use std::fmt::Debug;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};

use crate::addr::ToSockAddr;
use crate::error::{SocketError, errno};
use super::SocketKind;

/// A socket that has been created but not yet connected or listening.
///
/// Family and kind are runtime values: they come from whichever resolver
/// candidate is being tried.
pub struct RawSocket {
	fd: OwnedFd,
	family: libc::c_int,
	kind: SocketKind,
	protocol: libc::c_int,
}

impl RawSocket {
	/// Creates a new socket with `SOCK_CLOEXEC`.
	pub fn open(family: libc::c_int, kind: SocketKind, protocol: libc::c_int) -> Result<Self, SocketError> {
		let fd = unsafe { libc::socket(family, kind.raw() | libc::SOCK_CLOEXEC, protocol) };
		if fd == -1 {
			return Err(SocketError::Create { errno: errno() });
		}
		let fd = unsafe { OwnedFd::from_raw_fd(fd) };

		Ok(Self { fd, family, kind, protocol })
	}

	#[inline]
	pub fn as_raw_fd(&self) -> libc::c_int {
		self.fd.as_raw_fd()
	}

	pub fn family(&self) -> libc::c_int {
		self.family
	}

	pub fn kind(&self) -> SocketKind {
		self.kind
	}

	pub fn is_tcp(&self) -> bool {
		self.protocol == libc::IPPROTO_TCP
			|| (self.protocol == 0 && self.kind == SocketKind::Stream)
	}

	pub fn set_nonblocking(&self, nonblocking: bool) -> Result<(), SocketError> {
		let flags = unsafe { libc::fcntl(self.as_raw_fd(), libc::F_GETFL) };

		if flags == -1 {
			return Err(SocketError::GetOption { errno: errno(), option: "F_GETFL" });
		}

		let new_flags = if nonblocking {
			flags | libc::O_NONBLOCK
		} else {
			flags & !libc::O_NONBLOCK
		};

		let result = unsafe { libc::fcntl(self.as_raw_fd(), libc::F_SETFL, new_flags) };

		if result == -1 {
			return Err(SocketError::SetOption { errno: errno(), option: "O_NONBLOCK" });
		}

		Ok(())
	}

	/// Binds the socket to a local address.
	///
	/// Does not consume self: the connector tries several local candidates
	/// on the same socket.
	pub fn bind<A>(&self, addr: &A) -> Result<(), SocketError>
	where
		A: ToSockAddr + Debug,
	{
		let result = addr.with_raw(|ptr, len| unsafe { libc::bind(self.as_raw_fd(), ptr, len) });

		match result {
			Some(-1) => Err(SocketError::Bind {
				errno: errno(),
				addr: format!("{:?}", addr),
			}),
			Some(_) => Ok(()),
			None => Err(SocketError::InvalidAddress { reason: "empty address" }),
		}
	}

	/// Issues `connect()` and reports the raw outcome.
	///
	/// - `Ok(true)`: connected immediately
	/// - `Ok(false)`: in progress
	/// - `Err(errno)`: failed at once
	pub(crate) fn start_connect<A: ToSockAddr>(&self, addr: &A) -> Result<bool, i32> {
		let result = addr.with_raw(|ptr, len| unsafe { libc::connect(self.as_raw_fd(), ptr, len) });

		match result {
			Some(0) => Ok(true),
			Some(_) => {
				let e = errno();
				if e == libc::EINPROGRESS { Ok(false) } else { Err(e) }
			}
			None => Err(libc::EINVAL),
		}
	}

	pub(crate) fn into_fd(self) -> OwnedFd {
		self.fd
	}
}

/// True when `socket()` failed only because this family/type/protocol
/// combination is not available here.
pub fn unsupported_sock_error(errno: i32) -> bool {
	matches!(
		errno,
		libc::EPROTONOSUPPORT | libc::EAFNOSUPPORT | libc::EPFNOSUPPORT | libc::ESOCKTNOSUPPORT
	)
}

impl AsRawFd for RawSocket {
	fn as_raw_fd(&self) -> RawFd {
		self.fd.as_raw_fd()
	}
}

impl AsFd for RawSocket {
	fn as_fd(&self) -> BorrowedFd<'_> {
		self.fd.as_fd()
	}
}

impl Debug for RawSocket {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RawSocket")
			.field("fd", &self.as_raw_fd())
			.field("family", &self.family)
			.field("kind", &self.kind)
			.finish()
	}
}
