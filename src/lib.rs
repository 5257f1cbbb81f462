pub mod socket;
mod addr;
mod attrs;
mod connect;
mod error;
mod filter;
mod format;
mod listen;
mod resolve;

pub use self::error::{EngineError, ResolveError, SocketError, errno, fatal};
pub use self::addr::{FromSockAddr, SockAddr, SocketAddrV4, SocketAddrV6, ToSockAddr};
pub use self::attrs::{AddressFamily, ConnectionAttributes, EngineConfig, Endpoint, HoldTimeout,
					  StreamConfig, DEFAULT_UDP_BUFFER_SIZE, DEFAULT_UDP_MTU, DEFAULT_UDP_NRU};
pub use self::socket::{Established, SocketKind, ConnectOutcome};
pub use self::resolve::{Candidate, ResolveHints, order_ipv6_first, resolve, skip_candidate};
pub use self::format::{format_endpoint, numeric_name, reverse_name};
pub use self::filter::{AccessFilter, AllowAll, ResolvedFilter};
pub use self::connect::{connect, try_connect};
pub use self::listen::{BindFailure, BindSession, Bound, BoundSocket, BoundSocketSet, bind_all,
					   listen_continuous, listen_once, report_bind_failure,
					   try_listen_continuous, try_listen_once};
