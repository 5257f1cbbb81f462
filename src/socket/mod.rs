mod datagram;
mod listener;
mod options;
mod pending;
mod poll;
mod raw;

use std::os::fd::{AsRawFd, OwnedFd, RawFd};

pub use self::datagram::{BoundDatagram, PeerDatagram};
pub use self::listener::Listener;
pub use self::options::{local_addr, set_ipv6_only, set_reuse_addr, set_tcp_nodelay, take_error};
pub use self::pending::{ConnectOutcome, PendingConnect, connect_with_timeout};
pub use self::poll::{wait_readable, wait_writable};
pub use self::raw::{RawSocket, unsupported_sock_error};

/// Socket type of a candidate or a bound descriptor.
///
/// - `Stream` — reliable, ordered byte stream (TCP)
/// - `Datagram` — unreliable, bounded packets (UDP)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketKind {
	Stream,
	Datagram,
}

impl SocketKind {
	/// Returns the `SOCK_*` constant for this socket type.
	#[inline]
	pub fn raw(self) -> libc::c_int {
		match self {
			SocketKind::Stream => libc::SOCK_STREAM,
			SocketKind::Datagram => libc::SOCK_DGRAM,
		}
	}

	/// Returns the transport protocol the engine pairs with this type.
	#[inline]
	pub fn protocol(self) -> libc::c_int {
		match self {
			SocketKind::Stream => libc::IPPROTO_TCP,
			SocketKind::Datagram => libc::IPPROTO_UDP,
		}
	}

	/// Anything other than stream or datagram is not handled by the engine.
	pub fn from_raw(raw: libc::c_int) -> Option<Self> {
		match raw {
			libc::SOCK_STREAM => Some(SocketKind::Stream),
			libc::SOCK_DGRAM => Some(SocketKind::Datagram),
			_ => None,
		}
	}
}

/// A connected socket handed to the caller, who owns it from here on.
#[derive(Debug)]
pub struct Established {
	pub fd: OwnedFd,
	pub kind: SocketKind,
}

impl Established {
	pub fn new(fd: OwnedFd, kind: SocketKind) -> Self {
		Self { fd, kind }
	}

	pub fn into_parts(self) -> (OwnedFd, SocketKind) {
		(self.fd, self.kind)
	}
}

impl AsRawFd for Established {
	fn as_raw_fd(&self) -> RawFd {
		self.fd.as_raw_fd()
	}
}

/*
  ┌──────────┬─────────────┬─────────────┐
  │   Kind   │  Constant   │  Protocol   │
  ├──────────┼─────────────┼─────────────┤
  │ Stream   │ SOCK_STREAM │ IPPROTO_TCP │
  ├──────────┼─────────────┼─────────────┤
  │ Datagram │ SOCK_DGRAM  │ IPPROTO_UDP │
  └──────────┴─────────────┴─────────────┘
*/

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn kind_round_trips_raw_constant() {
		for kind in [SocketKind::Stream, SocketKind::Datagram] {
			assert_eq!(SocketKind::from_raw(kind.raw()), Some(kind));
		}
		assert_eq!(SocketKind::from_raw(libc::SOCK_RAW), None);
		assert_eq!(SocketKind::from_raw(libc::SOCK_SEQPACKET), None);
	}
}
