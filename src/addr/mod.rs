//! Socket address values.
//!
//! - `SocketAddrV4` / `SocketAddrV6` — typed views of a single family
//! - `SockAddr` — an owned `sockaddr_storage` as produced by the resolver,
//!   `accept()` or `recvfrom()`, whichever family it holds

mod ipv4;
mod ipv6;
pub use self::ipv4::SocketAddrV4;
pub use self::ipv6::SocketAddrV6;

use std::fmt;
use std::net::SocketAddr;

/// Trait for address types that can be converted to raw sockaddr for syscalls.
pub trait ToSockAddr {
	/// Calls the provided closure with a pointer to the raw sockaddr and its size.
	/// Returns None if the address cannot be expressed as a sockaddr.
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R;
}

/// Trait for address types that can be created from raw sockaddr.
pub trait FromSockAddr: Sized {
	/// Creates address from raw sockaddr storage.
	///
	/// # Safety
	/// `addr` must point to at least `len` readable bytes.
	unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self>;
}

impl FromSockAddr for SocketAddrV4 {
	unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self> {
		if len < std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t {
			return None;
		}
		let raw = unsafe { &*(addr as *const libc::sockaddr_in) };
		if raw.sin_family as libc::c_int != libc::AF_INET {
			return None;
		}
		Some(Self::from_raw(raw))
	}
}

impl FromSockAddr for SocketAddrV6 {
	unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self> {
		if len < std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t {
			return None;
		}
		let raw = unsafe { &*(addr as *const libc::sockaddr_in6) };
		if raw.sin6_family as libc::c_int != libc::AF_INET6 {
			return None;
		}
		Some(Self::from_raw(raw))
	}
}

/// An owned socket address of any supported family.
#[derive(Clone, Copy)]
pub struct SockAddr {
	storage: libc::sockaddr_storage,
	len: libc::socklen_t,
}

impl SockAddr {
	/// Returns an empty address sized for any family, ready to be filled
	/// by a syscall through `as_mut_ptr` / `len_mut`.
	pub(crate) fn empty() -> Self {
		Self {
			storage: unsafe { std::mem::zeroed() },
			len: std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t,
		}
	}

	pub(crate) fn as_mut_ptr(&mut self) -> *mut libc::sockaddr {
		&mut self.storage as *mut _ as *mut libc::sockaddr
	}

	pub(crate) fn len_mut(&mut self) -> &mut libc::socklen_t {
		&mut self.len
	}

	pub fn as_ptr(&self) -> *const libc::sockaddr {
		&self.storage as *const _ as *const libc::sockaddr
	}

	pub fn len(&self) -> libc::socklen_t {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// Returns the `AF_*` constant of the stored address.
	pub fn family(&self) -> libc::c_int {
		self.storage.ss_family as libc::c_int
	}

	pub fn is_ipv4(&self) -> bool {
		self.family() == libc::AF_INET
	}

	pub fn is_ipv6(&self) -> bool {
		self.family() == libc::AF_INET6
	}

	pub fn as_v4(&self) -> Option<SocketAddrV4> {
		unsafe { SocketAddrV4::from_sockaddr(self.as_ptr(), self.len) }
	}

	pub fn as_v6(&self) -> Option<SocketAddrV6> {
		unsafe { SocketAddrV6::from_sockaddr(self.as_ptr(), self.len) }
	}

	/// Port in host byte order, or 0 for an unknown family.
	pub fn port(&self) -> u16 {
		if let Some(v4) = self.as_v4() {
			v4.port()
		} else if let Some(v6) = self.as_v6() {
			v6.port()
		} else {
			0
		}
	}

	/// True for `::ffff:a.b.c.d` addresses.
	pub fn is_ipv4_mapped(&self) -> bool {
		self.as_v6().is_some_and(|v6| v6.is_ipv4_mapped())
	}

	/// Turns `::ffff:a.b.c.d` into the plain IPv4 address, port kept.
	/// Anything else is returned unchanged.
	pub fn unmapped(&self) -> SockAddr {
		match self.as_v6() {
			Some(v6) if v6.is_ipv4_mapped() => {
				let ip = v6.ip();
				SocketAddrV4::new([ip[12], ip[13], ip[14], ip[15]], v6.port()).into()
			}
			_ => *self,
		}
	}

	/// True for `0.0.0.0` and `::`.
	pub fn is_unspecified(&self) -> bool {
		if let Some(v4) = self.as_v4() {
			v4.ip() == [0; 4]
		} else if let Some(v6) = self.as_v6() {
			v6.ip() == [0; 16]
		} else {
			false
		}
	}

	/// Returns true when both addresses carry the same IP, ignoring port.
	pub fn same_ip(&self, other: &SockAddr) -> bool {
		match (self.as_v4(), other.as_v4(), self.as_v6(), other.as_v6()) {
			(Some(a), Some(b), _, _) => a.ip() == b.ip(),
			(_, _, Some(a), Some(b)) => a.ip() == b.ip(),
			_ => false,
		}
	}

	pub fn to_std(&self) -> Option<SocketAddr> {
		match (self.as_v4(), self.as_v6()) {
			(Some(v4), _) => Some(SocketAddr::V4(v4.into())),
			(None, Some(v6)) => Some(SocketAddr::V6(v6.into())),
			(None, None) => None,
		}
	}

	/// Copies `len` bytes of a raw sockaddr into owned storage.
	///
	/// # Safety
	/// `addr` must point to at least `len` readable bytes.
	pub(crate) unsafe fn from_raw_parts(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self> {
		if addr.is_null() || len as usize > std::mem::size_of::<libc::sockaddr_storage>() {
			return None;
		}
		let mut out = Self::empty();
		unsafe {
			std::ptr::copy_nonoverlapping(addr as *const u8, out.as_mut_ptr() as *mut u8, len as usize);
		}
		out.len = len;
		Some(out)
	}
}

impl FromSockAddr for SockAddr {
	unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self> {
		unsafe { Self::from_raw_parts(addr, len) }
	}
}

impl ToSockAddr for SockAddr {
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
	{
		if self.is_empty() {
			return None;
		}
		Some(f(self.as_ptr(), self.len))
	}
}

impl From<SocketAddrV4> for SockAddr {
	fn from(addr: SocketAddrV4) -> Self {
		let copied = addr.with_raw(|ptr, len| unsafe { Self::from_raw_parts(ptr, len) });
		copied.flatten().unwrap_or_else(Self::empty)
	}
}

impl From<SocketAddrV6> for SockAddr {
	fn from(addr: SocketAddrV6) -> Self {
		let copied = addr.with_raw(|ptr, len| unsafe { Self::from_raw_parts(ptr, len) });
		copied.flatten().unwrap_or_else(Self::empty)
	}
}

impl From<SocketAddr> for SockAddr {
	fn from(addr: SocketAddr) -> Self {
		match addr {
			SocketAddr::V4(v4) => SocketAddrV4::from(v4).into(),
			SocketAddr::V6(v6) => SocketAddrV6::from(v6).into(),
		}
	}
}

impl PartialEq for SockAddr {
	fn eq(&self, other: &Self) -> bool {
		match (self.as_v4(), other.as_v4(), self.as_v6(), other.as_v6()) {
			(Some(a), Some(b), _, _) => a == b,
			(_, _, Some(a), Some(b)) => a == b,
			_ => false,
		}
	}
}

impl fmt::Debug for SockAddr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.to_std() {
			Some(addr) => write!(f, "{}", addr),
			None => write!(f, "<family {} len {}>", self.family(), self.len),
		}
	}
}
