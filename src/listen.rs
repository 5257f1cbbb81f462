//! Inbound connections.
//!
//! The bind phase claims every local candidate it can (both families, one
//! socket kind), then the accept loop multiplexes readiness over all of
//! them. Datagram sockets have no accept: the sender of the next queued
//! datagram is peeked and the listening descriptor is duplicated to give
//! that peer its own handle.

use std::collections::BTreeMap;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use crate::addr::SockAddr;
use crate::attrs::{ConnectionAttributes, EngineConfig};
use crate::error::{EngineError, SocketError, fatal};
use crate::filter::AccessFilter;
use crate::format::{format_endpoint, numeric_name, reverse_name};
use crate::resolve::{Candidate, ResolveHints, order_ipv6_first, resolve, skip_candidate};
use crate::socket::{
	BoundDatagram, Established, Listener, PeerDatagram, RawSocket, SocketKind, local_addr,
	set_ipv6_only, set_reuse_addr, set_tcp_nodelay, unsupported_sock_error, wait_readable,
};

/// Fixed listen backlog. Historic BSD stacks cap it low.
const LISTEN_BACKLOG: i32 = 5;

/// State carried across the bind loop for the dual-stack workaround.
///
/// On stacks where `::` also claims `0.0.0.0`, the later IPv4 wildcard bind
/// fails with `EADDRINUSE` even though IPv4 traffic is already served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindSession {
	/// Some IPv6 socket in this session accepted `IPV6_V6ONLY`.
	pub ipv6_only_confirmed: bool,
	/// Some IPv6 socket in this session is bound to `::`.
	pub ipv6_wildcard_bound: bool,
}

/// How a failed bind is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindFailure {
	/// IPv4 traffic is already covered by a dual-stack IPv6 wildcard.
	CoveredByDualStack,
	/// Warn and move on to the next candidate.
	Skip,
}

impl BindSession {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn record_ipv6_only(&mut self) {
		self.ipv6_only_confirmed = true;
	}

	/// Notes a successful bind of `addr`.
	pub fn record_bound(&mut self, addr: &SockAddr) {
		if addr.is_ipv6() && addr.is_unspecified() {
			self.ipv6_wildcard_bound = true;
		}
	}

	/// The two flags need not come from the same socket.
	pub fn classify_bind_failure(&self, family: libc::c_int, errno: Option<i32>) -> BindFailure {
		if errno == Some(libc::EADDRINUSE)
			&& family == libc::AF_INET
			&& !self.ipv6_only_confirmed
			&& self.ipv6_wildcard_bound
		{
			BindFailure::CoveredByDualStack
		} else {
			BindFailure::Skip
		}
	}
}

/// Classifies a failed bind and emits its diagnostic.
pub fn report_bind_failure(
	session: &BindSession,
	family: libc::c_int,
	label: &str,
	err: &SocketError,
) -> BindFailure {
	let outcome = session.classify_bind_failure(family, err.errno());
	match outcome {
		BindFailure::CoveredByDualStack => tracing::info!("listening on {} ...", label),
		BindFailure::Skip => tracing::warn!("bind to source {} failed: {}", label, err),
	}
	outcome
}

/// A descriptor produced by the bind phase.
pub enum Bound {
	Stream(Listener),
	Datagram(BoundDatagram),
}

impl Bound {
	pub fn kind(&self) -> SocketKind {
		match self {
			Bound::Stream(_) => SocketKind::Stream,
			Bound::Datagram(_) => SocketKind::Datagram,
		}
	}
}

impl AsRawFd for Bound {
	fn as_raw_fd(&self) -> RawFd {
		match self {
			Bound::Stream(listener) => listener.as_raw_fd(),
			Bound::Datagram(datagram) => datagram.as_raw_fd(),
		}
	}
}

pub struct BoundSocket {
	pub socket: Bound,
	/// Numeric or symbolic form of the bound address, for diagnostics.
	pub label: String,
}

/// Every descriptor bound for one listen session, keyed by fd.
///
/// Filled during the bind phase only; dropping the set closes every
/// listening socket.
#[derive(Default)]
pub struct BoundSocketSet {
	sockets: BTreeMap<RawFd, BoundSocket>,
}

impl BoundSocketSet {
	pub fn new() -> Self {
		Self::default()
	}

	fn insert(&mut self, socket: Bound, label: String) {
		self.sockets.insert(socket.as_raw_fd(), BoundSocket { socket, label });
	}

	pub fn get(&self, fd: RawFd) -> Option<&BoundSocket> {
		self.sockets.get(&fd)
	}

	pub fn len(&self) -> usize {
		self.sockets.len()
	}

	pub fn is_empty(&self) -> bool {
		self.sockets.is_empty()
	}

	/// Descriptors in ascending order.
	pub fn fds(&self) -> Vec<RawFd> {
		self.sockets.keys().copied().collect()
	}

	pub fn iter(&self) -> impl Iterator<Item = &BoundSocket> {
		self.sockets.values()
	}
}

/// Resolves the local endpoint and binds every candidate that can be bound.
pub fn bind_all(
	attrs: &ConnectionAttributes,
	config: &EngineConfig,
) -> Result<BoundSocketSet, EngineError> {
	let local = &attrs.local;
	let hints = ResolveHints::from_attrs(attrs).passive(true).numeric(config.numeric);
	let mut candidates = resolve(local.host(), local.service(), &hints)?;
	if config.ipv6 {
		candidates = order_ipv6_first(candidates);
	}

	let mut session = BindSession::new();
	let mut bound = BoundSocketSet::new();

	for candidate in candidates.iter().filter(|c| !skip_candidate(c, config.ipv6)) {
		if let Some((socket, label)) = bind_candidate(candidate, config, &mut session)? {
			bound.insert(socket, label);
		}
	}

	if bound.is_empty() {
		return Err(EngineError::NothingBound);
	}
	Ok(bound)
}

fn bind_candidate(
	candidate: &Candidate,
	config: &EngineConfig,
	session: &mut BindSession,
) -> Result<Option<(Bound, String)>, EngineError> {
	let Some(kind) = candidate.kind() else {
		return Ok(None);
	};
	let label = format_endpoint(&candidate.addr, true)?;

	let socket = match RawSocket::open(candidate.family, kind, candidate.protocol) {
		Ok(socket) => socket,
		Err(err) if err.errno().is_some_and(unsupported_sock_error) => {
			tracing::debug!(family = candidate.family, "skipping {}: {}", label, err);
			return Ok(None);
		}
		Err(err) => return Err(err.into()),
	};

	if candidate.is_ipv6() && config.ipv6 {
		match set_ipv6_only(&socket, true) {
			Ok(()) => session.record_ipv6_only(),
			Err(err) => tracing::warn!("error with sockopt IPV6_V6ONLY: {}", err),
		}
	}

	if config.reuse_addr {
		if let Err(err) = set_reuse_addr(&socket, true) {
			tracing::warn!("error with sockopt SO_REUSEADDR: {}", err);
		}
	}

	if config.disable_nagle && socket.is_tcp() {
		if let Err(err) = set_tcp_nodelay(&socket, true) {
			tracing::warn!("error with sockopt TCP_NODELAY: {}", err);
		}
	}

	if let Err(err) = socket.bind(&candidate.addr) {
		report_bind_failure(session, candidate.family, &label, &err);
		return Ok(None);
	}

	let socket = match kind {
		SocketKind::Stream => Bound::Stream(Listener::listen(socket, LISTEN_BACKLOG, &label)?),
		SocketKind::Datagram => Bound::Datagram(BoundDatagram::from_socket(socket)),
	};

	if config.verbose {
		tracing::info!("listening on {} ...", label);
	}
	session.record_bound(&candidate.addr);

	Ok(Some((socket, label)))
}

/// A peer taken off a bound socket, before the access check.
enum Accepted {
	Stream(OwnedFd),
	Datagram(PeerDatagram),
}

impl AsRawFd for Accepted {
	fn as_raw_fd(&self) -> RawFd {
		match self {
			Accepted::Stream(fd) => fd.as_raw_fd(),
			Accepted::Datagram(peer) => peer.as_raw_fd(),
		}
	}
}

fn take_peer(bound: &Bound) -> Result<(Accepted, SockAddr), SocketError> {
	match bound {
		Bound::Stream(listener) => {
			let (fd, peer) = listener.accept_with_addr()?;
			Ok((Accepted::Stream(fd), peer))
		}
		Bound::Datagram(datagram) => {
			let peer = datagram.peek_sender()?;
			Ok((Accepted::Datagram(datagram.duplicate()?), peer))
		}
	}
}

/// Both ends of an accepted connection, for the verbose log line.
struct PeerNames {
	local_host: String,
	local_service: String,
	peer_rhost: String,
	peer_host: String,
	peer_service: String,
}

fn describe_peer(accepted: &Accepted, peer: &SockAddr, config: &EngineConfig) -> Result<PeerNames, EngineError> {
	let local = local_addr(accepted)?;
	let (local_host, local_service) = numeric_name(&local)?;
	let (peer_host, peer_service) = numeric_name(peer)?;

	let peer_rhost = if config.numeric {
		peer_host.clone()
	} else {
		match reverse_name(peer) {
			Ok((rhost, _)) => rhost,
			Err(err) => {
				tracing::warn!("inverse lookup failed for {}: {}", peer_host, err);
				peer_host.clone()
			}
		}
	};

	Ok(PeerNames { local_host, local_service, peer_rhost, peer_host, peer_service })
}

/// Accepts up to `max_accepts` peers (negative for no limit), handing each
/// to `callback`. Terminates the process on failure.
pub fn listen_continuous<A, F, C>(
	attrs: &ConnectionAttributes,
	config: &EngineConfig,
	filter: &A,
	callback: F,
	context: &mut C,
	max_accepts: i64,
) where
	A: AccessFilter + ?Sized,
	F: FnMut(Established, &mut C),
{
	if let Err(err) = try_listen_continuous(attrs, config, filter, callback, context, max_accepts) {
		fatal(&err);
	}
}

/// Accepts up to `max_accepts` peers (negative for no limit), handing each
/// to `callback` together with `context`.
///
/// Peers rejected by `filter` are dropped without counting. Waiting longer
/// than `attrs.connect_timeout` for the next peer is an error.
pub fn try_listen_continuous<A, F, C>(
	attrs: &ConnectionAttributes,
	config: &EngineConfig,
	filter: &A,
	mut callback: F,
	context: &mut C,
	max_accepts: i64,
) -> Result<(), EngineError>
where
	A: AccessFilter + ?Sized,
	F: FnMut(Established, &mut C),
{
	attrs.validate_for_listen()?;
	if max_accepts == 0 {
		return Ok(());
	}

	let bound = bind_all(attrs, config)?;
	let fds = bound.fds();
	let restricted = !attrs.remote.is_unspecified();
	let mut remaining = max_accepts;

	loop {
		let Some(fd) = wait_readable(&fds, attrs.connect_timeout)? else {
			return Err(EngineError::TimedOut);
		};
		let Some(entry) = bound.get(fd) else {
			continue;
		};

		let (accepted, peer) = take_peer(&entry.socket)?;
		let names = if config.verbose {
			Some(describe_peer(&accepted, &peer, config)?)
		} else {
			None
		};

		if restricted && !filter.is_allowed(&peer, &attrs.remote) {
			if let Accepted::Datagram(datagram) = &accepted {
				datagram.discard_pending();
			}
			drop(accepted);
			match &names {
				Some(n) => tracing::warn!(
					"refused connect to {} ({}) from {} [{}] {}",
					n.local_host, n.local_service, n.peer_rhost, n.peer_host, n.peer_service
				),
				None => tracing::warn!("refused connect from {:?} on {}", peer, entry.label),
			}
			continue;
		}

		let fd = match accepted {
			Accepted::Stream(fd) => fd,
			Accepted::Datagram(datagram) => {
				datagram.connect(&peer)?;
				datagram.into_fd()
			}
		};

		if let Some(n) = &names {
			tracing::info!(
				"connect to {} ({}) from {} [{}] {}",
				n.local_host, n.local_service, n.peer_rhost, n.peer_host, n.peer_service
			);
		}

		callback(Established::new(fd, entry.socket.kind()), context);

		if max_accepts > 0 {
			remaining -= 1;
			if remaining == 0 {
				break;
			}
		}
	}

	Ok(())
}

/// Accepts a single peer. Terminates the process on failure.
pub fn listen_once<A>(attrs: &ConnectionAttributes, config: &EngineConfig, filter: &A) -> Established
where
	A: AccessFilter + ?Sized,
{
	try_listen_once(attrs, config, filter).unwrap_or_else(|err| fatal(&err))
}

/// Accepts a single peer and returns it.
pub fn try_listen_once<A>(
	attrs: &ConnectionAttributes,
	config: &EngineConfig,
	filter: &A,
) -> Result<Established, EngineError>
where
	A: AccessFilter + ?Sized,
{
	let mut slot: Option<Established> = None;
	let keep = |conn, slot: &mut Option<Established>| *slot = Some(conn);
	try_listen_continuous(attrs, config, filter, keep, &mut slot, 1)?;
	slot.ok_or(EngineError::NoPeer)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::attrs::AddressFamily;
	use crate::filter::AllowAll;
	use std::net::SocketAddr;
	use tracing_test::traced_test;

	fn addr(s: &str) -> SockAddr {
		s.parse::<SocketAddr>().unwrap().into()
	}

	fn in_use() -> SocketError {
		SocketError::Bind { errno: libc::EADDRINUSE, addr: "0.0.0.0:7000".into() }
	}

	#[test]
	#[traced_test]
	fn ipv4_in_use_after_dual_stack_wildcard_is_covered() {
		let mut session = BindSession::new();
		session.record_bound(&addr("[::]:7000"));
		assert!(session.ipv6_wildcard_bound);
		assert!(!session.ipv6_only_confirmed);

		let outcome = report_bind_failure(&session, libc::AF_INET, "0.0.0.0 7000", &in_use());
		assert_eq!(outcome, BindFailure::CoveredByDualStack);
		assert!(logs_contain("listening on 0.0.0.0 7000 ..."));
		assert!(!logs_contain("bind to source"));
	}

	#[test]
	#[traced_test]
	fn other_bind_failures_are_skipped_with_warning() {
		let mut session = BindSession::new();
		session.record_bound(&addr("[::]:7000"));
		session.record_ipv6_only();

		let outcome = report_bind_failure(&session, libc::AF_INET, "0.0.0.0 7000", &in_use());
		assert_eq!(outcome, BindFailure::Skip);
		assert!(logs_contain("bind to source 0.0.0.0 7000 failed"));
	}

	#[test]
	fn workaround_needs_every_condition() {
		let covered = BindSession { ipv6_only_confirmed: false, ipv6_wildcard_bound: true };
		assert_eq!(covered.classify_bind_failure(libc::AF_INET, Some(libc::EADDRINUSE)), BindFailure::CoveredByDualStack);
		assert_eq!(covered.classify_bind_failure(libc::AF_INET6, Some(libc::EADDRINUSE)), BindFailure::Skip);
		assert_eq!(covered.classify_bind_failure(libc::AF_INET, Some(libc::EACCES)), BindFailure::Skip);
		assert_eq!(covered.classify_bind_failure(libc::AF_INET, None), BindFailure::Skip);

		let no_wildcard = BindSession::new();
		assert_eq!(no_wildcard.classify_bind_failure(libc::AF_INET, Some(libc::EADDRINUSE)), BindFailure::Skip);
	}

	#[test]
	fn only_ipv6_wildcard_marks_the_session() {
		let mut session = BindSession::new();
		session.record_bound(&addr("[::1]:7000"));
		session.record_bound(&addr("0.0.0.0:7000"));
		assert!(!session.ipv6_wildcard_bound);
		session.record_bound(&addr("[::]:7000"));
		assert!(session.ipv6_wildcard_bound);
	}

	#[test]
	fn zero_accepts_binds_nothing() {
		// port 1 would need privileges; a no-op never gets that far
		let attrs = ConnectionAttributes::new().local(Some("127.0.0.1"), Some("1"));
		let config = EngineConfig::new().numeric(true);
		let mut calls = 0;
		try_listen_continuous(&attrs, &config, &AllowAll, |_, calls: &mut i32| *calls += 1, &mut calls, 0).unwrap();
		assert_eq!(calls, 0);
	}

	#[test]
	fn listen_requires_a_service() {
		let attrs = ConnectionAttributes::new().local(Some("127.0.0.1"), None);
		let err = try_listen_once(&attrs, &EngineConfig::new(), &AllowAll).unwrap_err();
		assert!(matches!(err, EngineError::InvalidAttributes(_)));
	}

	#[test]
	fn wildcard_binds_every_family_it_can() {
		let attrs = ConnectionAttributes::new().local(None, Some("0"));
		let bound = bind_all(&attrs, &EngineConfig::new().numeric(true)).unwrap();
		assert!(!bound.is_empty());
		assert!(bound.iter().all(|b| b.socket.kind() == SocketKind::Stream));
		let fds = bound.fds();
		assert_eq!(fds.len(), bound.len());
		assert!(fds.windows(2).all(|w| w[0] < w[1]));
	}

	#[test]
	fn bound_labels_stay_numeric_without_numeric_mode() {
		let attrs = ConnectionAttributes::new()
			.family(AddressFamily::Ipv4)
			.local(Some("127.0.0.1"), Some("0"));
		let bound = bind_all(&attrs, &EngineConfig::new()).unwrap();
		assert_eq!(bound.len(), 1);
		for b in bound.iter() {
			assert_eq!(b.label, "127.0.0.1 0");
		}
	}

	#[test]
	fn idle_listener_times_out() {
		let attrs = ConnectionAttributes::new()
			.family(AddressFamily::Ipv4)
			.local(Some("127.0.0.1"), Some("0"))
			.connect_timeout(Some(std::time::Duration::from_millis(50)));
		let err = try_listen_once(&attrs, &EngineConfig::new().numeric(true), &AllowAll).unwrap_err();
		assert!(matches!(err, EngineError::TimedOut));
	}
}
