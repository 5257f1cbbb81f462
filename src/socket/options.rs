use std::os::fd::AsRawFd;

use crate::addr::SockAddr;
use crate::error::{SocketError, errno};

fn set_int_option<S: AsRawFd>(
	socket: &S,
	level: libc::c_int,
	name: libc::c_int,
	value: libc::c_int,
	option: &'static str,
) -> Result<(), SocketError> {
	let result = unsafe {
		libc::setsockopt(
			socket.as_raw_fd(),
			level,
			name,
			&value as *const _ as *const libc::c_void,
			std::mem::size_of::<libc::c_int>() as libc::socklen_t,
		)
	};
	if result == -1 {
		Err(SocketError::SetOption { errno: errno(), option })
	} else {
		Ok(())
	}
}

/// Sets SO_REUSEADDR on a socket.
///
/// Lets a listener rebind a port still in TIME_WAIT.
pub fn set_reuse_addr<S: AsRawFd>(socket: &S, enable: bool) -> Result<(), SocketError> {
	set_int_option(socket, libc::SOL_SOCKET, libc::SO_REUSEADDR, enable as libc::c_int, "SO_REUSEADDR")
}

/// Sets TCP_NODELAY on a socket (disables Nagle's algorithm).
pub fn set_tcp_nodelay<S: AsRawFd>(socket: &S, enable: bool) -> Result<(), SocketError> {
	set_int_option(socket, libc::IPPROTO_TCP, libc::TCP_NODELAY, enable as libc::c_int, "TCP_NODELAY")
}

/// Sets IPV6_V6ONLY on an IPv6 socket.
///
/// With it set, binding `::` leaves `0.0.0.0` free for a separate IPv4 socket.
pub fn set_ipv6_only<S: AsRawFd>(socket: &S, enable: bool) -> Result<(), SocketError> {
	set_int_option(socket, libc::IPPROTO_IPV6, libc::IPV6_V6ONLY, enable as libc::c_int, "IPV6_V6ONLY")
}

/// Reads and clears the pending socket error (SO_ERROR).
///
/// Returns 0 when no error is pending.
pub fn take_error<S: AsRawFd>(socket: &S) -> Result<i32, SocketError> {
	let mut error: libc::c_int = 0;
	let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;

	let result = unsafe {
		libc::getsockopt(
			socket.as_raw_fd(),
			libc::SOL_SOCKET,
			libc::SO_ERROR,
			&mut error as *mut _ as *mut libc::c_void,
			&mut len,
		)
	};

	if result == -1 {
		return Err(SocketError::GetOption { errno: errno(), option: "SO_ERROR" });
	}
	Ok(error)
}

/// Returns the local address a socket is bound to.
pub fn local_addr<S: AsRawFd>(socket: &S) -> Result<SockAddr, SocketError> {
	let mut addr = SockAddr::empty();
	let result = unsafe { libc::getsockname(socket.as_raw_fd(), addr.as_mut_ptr(), addr.len_mut()) };

	if result == -1 {
		return Err(SocketError::GetOption { errno: errno(), option: "getsockname" });
	}
	Ok(addr)
}
