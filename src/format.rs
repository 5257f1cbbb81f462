//! Human-readable endpoint strings for diagnostics.
//!
//! Never used on the data path.

use std::ffi::CStr;

use crate::addr::SockAddr;
use crate::error::ResolveError;

const NI_MAXHOST: usize = 1025;
const NI_MAXSERV: usize = 32;

/// Runs `getnameinfo()` and returns `(host, service)`, or the `EAI_*` code.
fn name_info(addr: &SockAddr, flags: libc::c_int) -> Result<(String, String), i32> {
	let mut host = [0 as libc::c_char; NI_MAXHOST];
	let mut serv = [0 as libc::c_char; NI_MAXSERV];

	let err = unsafe {
		libc::getnameinfo(
			addr.as_ptr(),
			addr.len(),
			host.as_mut_ptr(),
			host.len() as _,
			serv.as_mut_ptr(),
			serv.len() as _,
			flags,
		)
	};
	if err != 0 {
		return Err(err);
	}

	let host = unsafe { CStr::from_ptr(host.as_ptr()) }.to_string_lossy().into_owned();
	let serv = unsafe { CStr::from_ptr(serv.as_ptr()) }.to_string_lossy().into_owned();
	Ok((host, serv))
}

/// Numeric host and service of `addr`.
///
/// Failure here means the local name-service stack is broken.
pub fn numeric_name(addr: &SockAddr) -> Result<(String, String), ResolveError> {
	name_info(addr, libc::NI_NUMERICHOST | libc::NI_NUMERICSERV).map_err(ResolveError::name_info)
}

/// Reverse-resolved host and service of `addr`.
pub fn reverse_name(addr: &SockAddr) -> Result<(String, String), ResolveError> {
	name_info(addr, 0).map_err(ResolveError::name_info)
}

/// Renders an address for log lines.
///
/// - numeric: `"<host> <service>"`
/// - symbolic: `"<rhost> (<host>) <service> [<rservice>]"`, falling back to
///   the numeric shape with a warning when the reverse lookup fails
pub fn format_endpoint(addr: &SockAddr, numeric: bool) -> Result<String, ResolveError> {
	let (host, serv) = numeric_name(addr)?;

	if numeric {
		return Ok(format!("{} {}", host, serv));
	}

	match reverse_name(addr) {
		Ok((rhost, rserv)) => Ok(format!("{} ({}) {} [{}]", rhost, host, serv, rserv)),
		Err(err) => {
			tracing::warn!("inverse lookup failed for {}: {}", host, err);
			Ok(format!("{} {}", host, serv))
		}
	}
}
