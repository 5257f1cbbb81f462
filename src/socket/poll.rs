//! Readiness waits over a set of descriptors.
//!
//! `EINTR` is retried with whatever remains of the requested timeout; every
//! other `poll()` failure is returned to the caller.

use std::os::fd::RawFd;
use std::time::{Duration, Instant};

use crate::error::{SocketError, errno};

fn poll_retrying(
	fds: &mut [libc::pollfd],
	timeout: Option<Duration>,
) -> Result<usize, SocketError> {
	// a deadline past what Instant can hold waits forever
	let deadline = timeout.and_then(|t| Instant::now().checked_add(t));

	loop {
		let timeout_ms = match deadline {
			None => -1,
			Some(deadline) => {
				let left = deadline.saturating_duration_since(Instant::now());
				// round up so a sub-millisecond remainder still waits
				let ms = left.as_micros().div_ceil(1000);
				ms.min(libc::c_int::MAX as u128) as libc::c_int
			}
		};

		let ret = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };

		if ret >= 0 {
			return Ok(ret as usize);
		}
		let e = errno();
		if e != libc::EINTR {
			return Err(SocketError::Wait { errno: e });
		}
	}
}

fn pollfd(fd: RawFd, events: libc::c_short) -> libc::pollfd {
	let mut pfd: libc::pollfd = unsafe { std::mem::zeroed() };
	pfd.fd = fd;
	pfd.events = events;
	pfd
}

/// Waits until `fd` is writable.
///
/// Returns `false` when the timeout expired first.
pub fn wait_writable(fd: RawFd, timeout: Option<Duration>) -> Result<bool, SocketError> {
	let mut fds = [pollfd(fd, libc::POLLOUT)];
	Ok(poll_retrying(&mut fds, timeout)? > 0)
}

/// Waits until any of `fds` is readable and returns the lowest-numbered
/// ready descriptor, or `None` when the timeout expired.
pub fn wait_readable(
	fds: &[RawFd],
	timeout: Option<Duration>,
) -> Result<Option<RawFd>, SocketError> {
	let mut pfds: Vec<libc::pollfd> = fds.iter().map(|&fd| pollfd(fd, libc::POLLIN)).collect();

	if poll_retrying(&mut pfds, timeout)? == 0 {
		return Ok(None);
	}

	Ok(pfds.iter().filter(|p| p.revents != 0).map(|p| p.fd).min())
}
