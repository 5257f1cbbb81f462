//! Outbound connections.
//!
//! Every remote candidate is tried in resolver order until one connects.
//! A candidate that cannot be used on this host, cannot bind the requested
//! source address, times out or is refused only moves the loop on to the
//! next one.

use crate::attrs::{ConnectionAttributes, EngineConfig};
use crate::error::{EngineError, errno_to_str, fatal};
use crate::format::format_endpoint;
use crate::resolve::{Candidate, ResolveHints, resolve, skip_candidate};
use crate::socket::{
	ConnectOutcome, Established, RawSocket, connect_with_timeout, set_ipv6_only, set_tcp_nodelay,
	unsupported_sock_error,
};

/// Connects to the remote endpoint of `attrs`, terminating the process on
/// failure.
pub fn connect(attrs: &ConnectionAttributes, config: &EngineConfig) -> Established {
	try_connect(attrs, config).unwrap_or_else(|err| fatal(&err))
}

/// Connects to the remote endpoint of `attrs`.
pub fn try_connect(
	attrs: &ConnectionAttributes,
	config: &EngineConfig,
) -> Result<Established, EngineError> {
	attrs.validate_for_connect()?;

	let remote = &attrs.remote;
	let hints = ResolveHints::from_attrs(attrs)
		.numeric(config.numeric)
		.addrconfig(!config.numeric);
	let candidates = resolve(remote.host(), remote.service(), &hints)?;

	let mut attempted = false;
	for candidate in candidates.iter().filter(|c| !skip_candidate(c, config.ipv6)) {
		attempted = true;
		if let Some(established) = attempt(candidate, attrs, config)? {
			return Ok(established);
		}
	}

	if !attempted {
		return Err(EngineError::NoUsableSocketTypes);
	}
	Err(EngineError::Unreachable {
		host: remote.host().unwrap_or_default().to_owned(),
		service: remote.service().unwrap_or_default().to_owned(),
	})
}

/// One pass over a single remote candidate. `Ok(None)` moves on to the next.
fn attempt(
	candidate: &Candidate,
	attrs: &ConnectionAttributes,
	config: &EngineConfig,
) -> Result<Option<Established>, EngineError> {
	let Some(kind) = candidate.kind() else {
		return Ok(None);
	};

	let socket = match RawSocket::open(candidate.family, kind, candidate.protocol) {
		Ok(socket) => socket,
		Err(err) if err.errno().is_some_and(unsupported_sock_error) => {
			tracing::debug!(family = candidate.family, "skipping candidate: {}", err);
			return Ok(None);
		}
		Err(err) => return Err(err.into()),
	};

	if candidate.is_ipv6() && config.ipv6 {
		if let Err(err) = set_ipv6_only(&socket, true) {
			tracing::warn!("error with sockopt IPV6_V6ONLY: {}", err);
		}
	}

	if config.disable_nagle && socket.is_tcp() {
		if let Err(err) = set_tcp_nodelay(&socket, true) {
			tracing::warn!("error with sockopt TCP_NODELAY: {}", err);
		}
	}

	let label = if config.verbose {
		format_endpoint(&candidate.addr, config.numeric)?
	} else {
		String::new()
	};

	if !attrs.local.is_unspecified() && !bind_source(&socket, candidate, attrs, config)? {
		if config.verbose {
			tracing::warn!("bind to source addr/port failed when connecting to {}", label);
		}
		return Ok(None);
	}

	match connect_with_timeout(&socket, &candidate.addr, attrs.connect_timeout)? {
		ConnectOutcome::Connected => {
			if config.verbose {
				tracing::info!("{} open", label);
			}
			Ok(Some(Established::new(socket.into_fd(), kind)))
		}
		ConnectOutcome::TimedOut => {
			if config.verbose {
				tracing::warn!("timeout while connecting to {}", label);
			}
			Ok(None)
		}
		ConnectOutcome::Aborted(errno) => {
			if config.verbose {
				tracing::warn!("cannot connect to {}: {}", label, errno_to_str(errno));
			}
			Ok(None)
		}
	}
}

/// Binds `socket` to the first usable local address for this candidate.
///
/// A failed lookup of the source endpoint is fatal; failed binds are not.
fn bind_source(
	socket: &RawSocket,
	candidate: &Candidate,
	attrs: &ConnectionAttributes,
	config: &EngineConfig,
) -> Result<bool, EngineError> {
	let mut hints = ResolveHints::new()
		.family(candidate.family)
		.passive(true)
		.numeric(config.numeric);
	if let Some(kind) = candidate.kind() {
		hints = hints.kind(kind);
	}
	let hints = hints.protocol(candidate.protocol);

	let local = &attrs.local;
	let sources = resolve(local.host(), local.service(), &hints)?;

	for source in &sources {
		match socket.bind(&source.addr) {
			Ok(()) => return Ok(true),
			Err(err) => tracing::debug!("source {:?} rejected: {}", source.addr, err),
		}
	}
	Ok(false)
}
