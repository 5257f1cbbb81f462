use std::time::Duration;

use crate::error::EngineError;
use crate::socket::SocketKind;

/// Default remote MTU for datagram sessions.
pub const DEFAULT_UDP_MTU: usize = 8192;
/// Default remote NRU for datagram sessions (largest UDP payload).
pub const DEFAULT_UDP_NRU: usize = 65536;
/// Default receive buffer for datagram sessions.
pub const DEFAULT_UDP_BUFFER_SIZE: usize = 65536;

/// Address family preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressFamily {
	#[default]
	Unspecified,
	Ipv4,
	Ipv6,
}

impl AddressFamily {
	/// Returns the `AF_*` hint passed to the resolver.
	#[inline]
	pub fn raw(self) -> libc::c_int {
		match self {
			AddressFamily::Unspecified => libc::AF_UNSPEC,
			AddressFamily::Ipv4 => libc::AF_INET,
			AddressFamily::Ipv6 => libc::AF_INET6,
		}
	}
}

/// One side of a connection as the user spelled it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoint {
	pub host: Option<String>,
	pub service: Option<String>,
}

impl Endpoint {
	/// Empty strings are treated as absent.
	pub fn new(host: Option<&str>, service: Option<&str>) -> Self {
		let keep = |s: Option<&str>| s.filter(|s| !s.is_empty()).map(str::to_owned);
		Self {
			host: keep(host),
			service: keep(service),
		}
	}

	pub fn host(&self) -> Option<&str> {
		self.host.as_deref()
	}

	pub fn service(&self) -> Option<&str> {
		self.service.as_deref()
	}

	pub fn is_unspecified(&self) -> bool {
		self.host.is_none() && self.service.is_none()
	}
}

/// Idle-close threshold handed to the copy loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HoldTimeout {
	#[default]
	Infinite,
	After(Duration),
}

impl HoldTimeout {
	/// Negative seconds mean infinite.
	pub fn from_secs(secs: i64) -> Self {
		if secs < 0 {
			HoldTimeout::Infinite
		} else {
			HoldTimeout::After(Duration::from_secs(secs as u64))
		}
	}
}

/// Per-direction stream settings, carried through to the copy loop untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamConfig {
	pub hold_timeout: HoldTimeout,
	/// Largest single write.
	pub mtu: Option<usize>,
	/// Largest single read.
	pub nru: Option<usize>,
	pub buffer_size: Option<usize>,
}

impl StreamConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn hold_timeout(mut self, timeout: HoldTimeout) -> Self {
		self.hold_timeout = timeout;
		self
	}

	pub fn mtu(mut self, mtu: usize) -> Self {
		self.mtu = Some(mtu);
		self
	}

	pub fn nru(mut self, nru: usize) -> Self {
		self.nru = Some(nru);
		self
	}

	pub fn buffer_size(mut self, size: usize) -> Self {
		self.buffer_size = Some(size);
		self
	}

	/// Reads larger than the buffer would never complete.
	pub fn clamp_nru(mut self) -> Self {
		if let (Some(nru), Some(buf)) = (self.nru, self.buffer_size) {
			if nru > buf {
				self.nru = Some(buf);
			}
		}
		self
	}
}

/// Description of the connection to make or accept.
///
/// # Example
/// ```ignore
/// use wireconn::{ConnectionAttributes, AddressFamily};
///
/// let attrs = ConnectionAttributes::new()
///     .family(AddressFamily::Ipv6)
///     .datagram()
///     .remote(Some("::1"), Some("5353"))
///     .connect_timeout_secs(5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionAttributes {
	pub family: AddressFamily,
	pub kind: SocketKind,
	pub remote: Endpoint,
	pub local: Endpoint,
	pub connect_timeout: Option<Duration>,
	pub remote_stream: StreamConfig,
	pub local_stream: StreamConfig,
}

impl Default for ConnectionAttributes {
	fn default() -> Self {
		Self {
			family: AddressFamily::Unspecified,
			kind: SocketKind::Stream,
			remote: Endpoint::default(),
			local: Endpoint::default(),
			connect_timeout: None,
			remote_stream: StreamConfig::default(),
			local_stream: StreamConfig::default().hold_timeout(HoldTimeout::Infinite),
		}
	}
}

impl ConnectionAttributes {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn family(mut self, family: AddressFamily) -> Self {
		self.family = family;
		self
	}

	pub fn kind(mut self, kind: SocketKind) -> Self {
		self.kind = kind;
		self
	}

	/// Switches to datagram sockets and fills in the remote stream's
	/// UDP defaults where the caller has not set them.
	pub fn datagram(mut self) -> Self {
		self.kind = SocketKind::Datagram;
		let stream = &mut self.remote_stream;
		stream.mtu.get_or_insert(DEFAULT_UDP_MTU);
		stream.nru.get_or_insert(DEFAULT_UDP_NRU);
		stream.buffer_size.get_or_insert(DEFAULT_UDP_BUFFER_SIZE);
		self.remote_stream = self.remote_stream.clamp_nru();
		self
	}

	pub fn remote(mut self, host: Option<&str>, service: Option<&str>) -> Self {
		self.remote = Endpoint::new(host, service);
		self
	}

	pub fn local(mut self, host: Option<&str>, service: Option<&str>) -> Self {
		self.local = Endpoint::new(host, service);
		self
	}

	pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.connect_timeout = timeout;
		self
	}

	/// Zero and negative values leave the timeout to the platform.
	pub fn connect_timeout_secs(mut self, secs: i64) -> Self {
		self.connect_timeout = if secs > 0 {
			Some(Duration::from_secs(secs as u64))
		} else {
			None
		};
		self
	}

	pub fn remote_stream(mut self, config: StreamConfig) -> Self {
		self.remote_stream = config;
		self
	}

	pub fn local_stream(mut self, config: StreamConfig) -> Self {
		self.local_stream = config;
		self
	}

	/// Connect mode needs both halves of the remote endpoint.
	pub fn validate_for_connect(&self) -> Result<(), EngineError> {
		if self.remote.host.is_none() || self.remote.service.is_none() {
			return Err(EngineError::InvalidAttributes(
				"the remote endpoint needs both an address and a service",
			));
		}
		Ok(())
	}

	/// Listen mode must bind a definite port.
	pub fn validate_for_listen(&self) -> Result<(), EngineError> {
		if self.local.service.is_none() {
			return Err(EngineError::InvalidAttributes(
				"in listen mode the local endpoint needs a service",
			));
		}
		Ok(())
	}
}

/// Engine-wide switches, threaded explicitly into every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
	/// Numeric hosts only, no DNS in either direction.
	pub numeric: bool,
	/// Emit per-candidate and per-peer diagnostics.
	pub verbose: bool,
	pub reuse_addr: bool,
	pub disable_nagle: bool,
	/// Dual-stack support. When off, IPv6 candidates are discarded.
	pub ipv6: bool,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			numeric: false,
			verbose: false,
			reuse_addr: true,
			disable_nagle: false,
			ipv6: true,
		}
	}
}

impl EngineConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn numeric(mut self, enable: bool) -> Self {
		self.numeric = enable;
		self
	}

	pub fn verbose(mut self, enable: bool) -> Self {
		self.verbose = enable;
		self
	}

	pub fn reuse_addr(mut self, enable: bool) -> Self {
		self.reuse_addr = enable;
		self
	}

	pub fn disable_nagle(mut self, enable: bool) -> Self {
		self.disable_nagle = enable;
		self
	}

	pub fn ipv6(mut self, enable: bool) -> Self {
		self.ipv6 = enable;
		self
	}
}
