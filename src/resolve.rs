//! Name resolution into ordered candidate addresses.

use std::ffi::CString;

use crate::addr::SockAddr;
use crate::attrs::ConnectionAttributes;
use crate::error::ResolveError;
use crate::socket::SocketKind;

/// One concrete address the engine may try.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
	/// `AF_*` constant.
	pub family: libc::c_int,
	/// `SOCK_*` constant as reported by the resolver.
	pub socktype: libc::c_int,
	pub protocol: libc::c_int,
	pub addr: SockAddr,
}

impl Candidate {
	pub fn new(socktype: libc::c_int, protocol: libc::c_int, addr: SockAddr) -> Self {
		Self { family: addr.family(), socktype, protocol, addr }
	}

	/// `None` for socket types the engine does not handle.
	pub fn kind(&self) -> Option<SocketKind> {
		SocketKind::from_raw(self.socktype)
	}

	pub fn is_ipv6(&self) -> bool {
		self.family == libc::AF_INET6
	}
}

/// Lookup hints handed to `getaddrinfo()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveHints {
	pub family: libc::c_int,
	pub kind: Option<SocketKind>,
	pub protocol: libc::c_int,
	/// Wildcard address when no host is given.
	pub passive: bool,
	/// No DNS: hosts must be numeric.
	pub numeric: bool,
	/// Only families configured on some local interface.
	pub addrconfig: bool,
}

impl Default for ResolveHints {
	fn default() -> Self {
		Self {
			family: libc::AF_UNSPEC,
			kind: None,
			protocol: 0,
			passive: false,
			numeric: false,
			addrconfig: false,
		}
	}
}

impl ResolveHints {
	pub fn new() -> Self {
		Self::default()
	}

	/// Family and socket type as requested by the caller.
	pub fn from_attrs(attrs: &ConnectionAttributes) -> Self {
		Self::new().family(attrs.family.raw()).kind(attrs.kind)
	}

	pub fn family(mut self, family: libc::c_int) -> Self {
		self.family = family;
		self
	}

	/// Sets the socket type and the protocol the engine pairs with it.
	pub fn kind(mut self, kind: SocketKind) -> Self {
		self.kind = Some(kind);
		self.protocol = kind.protocol();
		self
	}

	pub fn protocol(mut self, protocol: libc::c_int) -> Self {
		self.protocol = protocol;
		self
	}

	pub fn passive(mut self, enable: bool) -> Self {
		self.passive = enable;
		self
	}

	pub fn numeric(mut self, enable: bool) -> Self {
		self.numeric = enable;
		self
	}

	pub fn addrconfig(mut self, enable: bool) -> Self {
		self.addrconfig = enable;
		self
	}

	fn flags(&self) -> libc::c_int {
		let mut flags = 0;
		if self.passive {
			flags |= libc::AI_PASSIVE;
		}
		if self.numeric {
			flags |= libc::AI_NUMERICHOST;
		}
		if self.addrconfig {
			flags |= libc::AI_ADDRCONFIG;
		}
		flags
	}

	fn to_raw(&self) -> libc::addrinfo {
		let mut hints: libc::addrinfo = unsafe { std::mem::zeroed() };
		hints.ai_family = self.family;
		hints.ai_socktype = self.kind.map_or(0, SocketKind::raw);
		hints.ai_protocol = self.protocol;
		hints.ai_flags = self.flags();
		hints
	}
}

fn to_cstring(s: Option<&str>) -> Result<Option<CString>, ResolveError> {
	s.map(|s| CString::new(s).map_err(|_| ResolveError::Nul)).transpose()
}

/// Resolves `host`/`service` into candidates, in resolver order.
///
/// `None` for the host means the wildcard address with passive hints and
/// loopback otherwise.
pub fn resolve(
	host: Option<&str>,
	service: Option<&str>,
	hints: &ResolveHints,
) -> Result<Vec<Candidate>, ResolveError> {
	let c_host = to_cstring(host)?;
	let c_service = to_cstring(service)?;
	let raw_hints = hints.to_raw();
	let mut res: *mut libc::addrinfo = std::ptr::null_mut();

	let err = unsafe {
		libc::getaddrinfo(
			c_host.as_ref().map_or(std::ptr::null(), |s| s.as_ptr()),
			c_service.as_ref().map_or(std::ptr::null(), |s| s.as_ptr()),
			&raw_hints,
			&mut res,
		)
	};
	if err != 0 {
		return Err(ResolveError::lookup(err, host, service));
	}

	let mut candidates = Vec::new();
	let mut cur = res;
	while !cur.is_null() {
		let ai = unsafe { &*cur };
		let addr = unsafe { SockAddr::from_raw_parts(ai.ai_addr, ai.ai_addrlen) };
		if let Some(addr) = addr {
			candidates.push(Candidate {
				family: ai.ai_family,
				socktype: ai.ai_socktype,
				protocol: ai.ai_protocol,
				addr,
			});
		}
		cur = ai.ai_next;
	}
	unsafe { libc::freeaddrinfo(res) };

	if candidates.is_empty() {
		return Err(ResolveError::Empty {
			host: host.unwrap_or("[unspecified]").to_owned(),
			service: service.unwrap_or("[unspecified]").to_owned(),
		});
	}
	Ok(candidates)
}

/// True when the engine must not try this candidate.
///
/// Mapped addresses would let an IPv4 peer through an IPv6-only
/// restriction (and the reverse), so they are dropped while dual-stack
/// support is on. Without it, IPv6 is dropped entirely.
pub fn skip_candidate(candidate: &Candidate, dual_stack: bool) -> bool {
	if candidate.kind().is_none() {
		return true;
	}

	if dual_stack {
		candidate.is_ipv6() && candidate.addr.is_ipv4_mapped()
	} else {
		candidate.is_ipv6()
	}
}

/// Moves IPv6 candidates ahead of IPv4 ones, keeping the order within
/// each family.
pub fn order_ipv6_first(candidates: Vec<Candidate>) -> Vec<Candidate> {
	let (mut v6, rest): (Vec<_>, Vec<_>) = candidates.into_iter().partition(Candidate::is_ipv6);
	v6.extend(rest);
	v6
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::addr::SocketAddrV4;
	use proptest::prelude::*;
	use std::net::SocketAddr;

	fn candidate(addr: &str, socktype: libc::c_int) -> Candidate {
		let addr: SockAddr = addr.parse::<SocketAddr>().unwrap().into();
		Candidate::new(socktype, 0, addr)
	}

	#[test]
	fn numeric_loopback_resolves() {
		let hints = ResolveHints::new().kind(SocketKind::Stream).numeric(true);
		let found = resolve(Some("127.0.0.1"), Some("8080"), &hints).unwrap();
		assert!(!found.is_empty());
		for c in &found {
			assert_eq!(c.family, libc::AF_INET);
			assert_eq!(c.kind(), Some(SocketKind::Stream));
			assert_eq!(c.addr, SockAddr::from(SocketAddrV4::new([127, 0, 0, 1], 8080)));
		}
	}

	#[test]
	fn passive_wildcard_without_host() {
		let hints = ResolveHints::new()
			.family(libc::AF_INET)
			.kind(SocketKind::Datagram)
			.passive(true)
			.numeric(true);
		let found = resolve(None, Some("0"), &hints).unwrap();
		assert!(found.iter().all(|c| c.addr.is_unspecified()));
		assert!(found.iter().all(|c| c.kind() == Some(SocketKind::Datagram)));
	}

	#[test]
	fn numeric_mode_rejects_names() {
		let hints = ResolveHints::new().numeric(true);
		let err = resolve(Some("not-an-address.invalid"), Some("80"), &hints).unwrap_err();
		assert!(matches!(err, ResolveError::Lookup { .. }));
		assert!(err.to_string().contains("not-an-address.invalid"));
	}

	#[test]
	fn nul_bytes_are_refused() {
		let err = resolve(Some("127.0.0.1\0"), None, &ResolveHints::new()).unwrap_err();
		assert!(matches!(err, ResolveError::Nul));
	}

	#[test]
	fn hints_follow_attributes() {
		use crate::attrs::AddressFamily;

		let attrs = ConnectionAttributes::new().family(AddressFamily::Ipv6).datagram();
		let hints = ResolveHints::from_attrs(&attrs);
		assert_eq!(hints.family, libc::AF_INET6);
		assert_eq!(hints.kind, Some(SocketKind::Datagram));
		assert_eq!(hints.protocol, libc::IPPROTO_UDP);
		assert!(!hints.passive);
	}

	#[test]
	fn skip_rules() {
		let raw = candidate("127.0.0.1:1", libc::SOCK_RAW);
		let v4 = candidate("127.0.0.1:1", libc::SOCK_STREAM);
		let v6 = candidate("[::1]:1", libc::SOCK_DGRAM);
		let mapped = candidate("[::ffff:127.0.0.1]:1", libc::SOCK_STREAM);

		assert!(skip_candidate(&raw, true));
		assert!(!skip_candidate(&v4, true));
		assert!(!skip_candidate(&v6, true));
		assert!(skip_candidate(&mapped, true));

		assert!(!skip_candidate(&v4, false));
		assert!(skip_candidate(&v6, false));
		assert!(skip_candidate(&mapped, false));
	}

	fn arb_candidate() -> impl Strategy<Value = Candidate> {
		let socktype = prop_oneof![
			Just(libc::SOCK_STREAM),
			Just(libc::SOCK_DGRAM),
			Just(libc::SOCK_RAW),
			Just(libc::SOCK_SEQPACKET),
		];
		(any::<bool>(), any::<bool>(), any::<[u8; 4]>(), any::<u16>(), socktype).prop_map(
			|(v6, mapped, ip, port, socktype)| {
				let addr: SocketAddr = match (v6, mapped) {
					(false, _) => SocketAddr::from((ip, port)),
					(true, true) => SocketAddr::from((std::net::Ipv4Addr::from(ip).to_ipv6_mapped(), port)),
					(true, false) => {
						let mut octets = [0u8; 16];
						octets[0] = 0x20;
						octets[1] = 0x01;
						octets[12..].copy_from_slice(&ip);
						SocketAddr::from((octets, port))
					}
				};
				Candidate::new(socktype, 0, addr.into())
			},
		)
	}

	proptest! {
		#[test]
		fn ipv6_always_precedes_ipv4(list in prop::collection::vec(arb_candidate(), 0..24)) {
			let ordered = order_ipv6_first(list.clone());
			prop_assert_eq!(ordered.len(), list.len());

			let first_v4 = ordered.iter().position(|c| !c.is_ipv6()).unwrap_or(ordered.len());
			prop_assert!(ordered[first_v4..].iter().all(|c| !c.is_ipv6()));

			let v6_in: Vec<_> = list.iter().filter(|c| c.is_ipv6()).collect();
			let v4_in: Vec<_> = list.iter().filter(|c| !c.is_ipv6()).collect();
			prop_assert_eq!(ordered[..first_v4].iter().collect::<Vec<_>>(), v6_in);
			prop_assert_eq!(ordered[first_v4..].iter().collect::<Vec<_>>(), v4_in);
		}

		#[test]
		fn filtering_keeps_only_usable_candidates(
			list in prop::collection::vec(arb_candidate(), 0..24),
			dual_stack in any::<bool>(),
		) {
			for c in list.iter().filter(|c| !skip_candidate(c, dual_stack)) {
				prop_assert!(c.kind().is_some());
				if dual_stack {
					prop_assert!(!c.addr.is_ipv4_mapped());
				} else {
					prop_assert!(!c.is_ipv6());
				}
			}
		}
	}
}
