use crate::addr::SockAddr;
use crate::attrs::Endpoint;
use crate::resolve::{ResolveHints, resolve};

/// Decides whether an accepted peer may be handed to the caller.
///
/// Only consulted when a remote restriction is configured. Anything but
/// `true` rejects the peer.
pub trait AccessFilter {
	fn is_allowed(&self, peer: &SockAddr, restriction: &Endpoint) -> bool;
}

impl<F> AccessFilter for F
where
	F: Fn(&SockAddr, &Endpoint) -> bool,
{
	fn is_allowed(&self, peer: &SockAddr, restriction: &Endpoint) -> bool {
		self(peer, restriction)
	}
}

/// Lets every peer through.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessFilter for AllowAll {
	fn is_allowed(&self, _peer: &SockAddr, _restriction: &Endpoint) -> bool {
		true
	}
}

/// Matches the peer against the resolved restriction.
///
/// The peer IP must be one of the host's addresses and its port must equal
/// the service's port; an absent half matches anything. IPv4-mapped peers
/// are compared as plain IPv4. A restriction that fails to resolve rejects.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolvedFilter {
	pub numeric: bool,
}

impl ResolvedFilter {
	pub fn new(numeric: bool) -> Self {
		Self { numeric }
	}

	fn port_matches(&self, peer: &SockAddr, service: &str) -> bool {
		let hints = ResolveHints::new().passive(true);
		match resolve(None, Some(service), &hints) {
			Ok(found) => found.iter().any(|c| c.addr.port() == peer.port()),
			Err(err) => {
				tracing::warn!("cannot resolve restricted service: {}", err);
				false
			}
		}
	}

	fn host_matches(&self, peer: &SockAddr, host: &str) -> bool {
		let hints = ResolveHints::new().numeric(self.numeric);
		match resolve(Some(host), None, &hints) {
			Ok(found) => found.iter().any(|c| c.addr.unmapped().same_ip(peer)),
			Err(err) => {
				tracing::warn!("cannot resolve restricted host: {}", err);
				false
			}
		}
	}
}

impl AccessFilter for ResolvedFilter {
	fn is_allowed(&self, peer: &SockAddr, restriction: &Endpoint) -> bool {
		let peer = peer.unmapped();

		if let Some(service) = restriction.service() {
			if !self.port_matches(&peer, service) {
				return false;
			}
		}
		if let Some(host) = restriction.host() {
			if !self.host_matches(&peer, host) {
				return false;
			}
		}
		true
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::net::SocketAddr;

	fn addr(s: &str) -> SockAddr {
		s.parse::<SocketAddr>().unwrap().into()
	}

	#[test]
	fn closures_are_filters() {
		let only_loopback = |peer: &SockAddr, _restriction: &Endpoint| {
			peer.as_v4().is_some_and(|v4| v4.ip()[0] == 127)
		};
		let restriction = Endpoint::new(Some("127.0.0.1"), None);
		assert!(only_loopback.is_allowed(&addr("127.0.0.9:1"), &restriction));
		assert!(!only_loopback.is_allowed(&addr("10.0.0.1:1"), &restriction));
		assert!(AllowAll.is_allowed(&addr("10.0.0.1:1"), &restriction));
	}

	#[test]
	fn host_restriction_compares_ip_only() {
		let filter = ResolvedFilter::new(true);
		let restriction = Endpoint::new(Some("127.0.0.1"), None);
		assert!(filter.is_allowed(&addr("127.0.0.1:4000"), &restriction));
		assert!(filter.is_allowed(&addr("[::ffff:127.0.0.1]:4000"), &restriction));
		assert!(!filter.is_allowed(&addr("127.0.0.2:4000"), &restriction));
	}

	#[test]
	fn service_restriction_compares_port() {
		let filter = ResolvedFilter::new(true);
		let restriction = Endpoint::new(Some("127.0.0.1"), Some("4000"));
		assert!(filter.is_allowed(&addr("127.0.0.1:4000"), &restriction));
		assert!(!filter.is_allowed(&addr("127.0.0.1:4001"), &restriction));
	}

	#[test]
	fn unresolvable_restriction_rejects() {
		let filter = ResolvedFilter::new(true);
		let restriction = Endpoint::new(Some("no-such-host.invalid"), None);
		assert!(!filter.is_allowed(&addr("127.0.0.1:1"), &restriction));
	}
}
