//! End-to-end runs of the connector and acceptor over loopback.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::thread;
use std::time::Duration;

use wireconn::{
	AddressFamily, AllowAll, ConnectionAttributes, EngineConfig, Endpoint, Established, SockAddr,
	SocketKind, format_endpoint, try_connect, try_listen_continuous, try_listen_once,
};

fn config() -> EngineConfig {
	EngineConfig::new().numeric(true)
}

fn free_tcp_port() -> u16 {
	TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

fn free_udp_port() -> u16 {
	UdpSocket::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

fn listen_attrs(port: u16) -> ConnectionAttributes {
	ConnectionAttributes::new()
		.family(AddressFamily::Ipv4)
		.local(Some("127.0.0.1"), Some(&port.to_string()))
		.connect_timeout_secs(5)
}

/// The listener runs on another thread; keep knocking until it is up.
fn connect_retrying(port: u16) -> TcpStream {
	for _ in 0..200 {
		if let Ok(stream) = TcpStream::connect(("127.0.0.1", port)) {
			return stream;
		}
		thread::sleep(Duration::from_millis(10));
	}
	panic!("listener on port {} never came up", port);
}

#[test]
fn connect_exchanges_bytes_with_listener() {
	let listener = TcpListener::bind("127.0.0.1:0").unwrap();
	let port = listener.local_addr().unwrap().port().to_string();

	let server = thread::spawn(move || {
		let (mut stream, _) = listener.accept().unwrap();
		let mut buf = [0u8; 5];
		stream.read_exact(&mut buf).unwrap();
		stream.write_all(b"world").unwrap();
		buf
	});

	let attrs = ConnectionAttributes::new()
		.remote(Some("127.0.0.1"), Some(&port))
		.connect_timeout_secs(5);
	let conn = try_connect(&attrs, &config()).unwrap();
	assert_eq!(conn.kind, SocketKind::Stream);

	let mut stream = TcpStream::from(conn.fd);
	stream.set_nonblocking(false).unwrap();
	stream.write_all(b"hello").unwrap();
	let mut reply = [0u8; 5];
	stream.read_exact(&mut reply).unwrap();

	assert_eq!(&server.join().unwrap(), b"hello");
	assert_eq!(&reply, b"world");
}

#[test]
fn accept_budget_stops_after_n_peers() {
	let port = free_tcp_port();
	let attrs = listen_attrs(port);

	let server = thread::spawn(move || {
		let mut accepted: Vec<Established> = Vec::new();
		let keep = |conn, accepted: &mut Vec<Established>| accepted.push(conn);
		try_listen_continuous(&attrs, &config(), &AllowAll, keep, &mut accepted, 2).unwrap();
		accepted
	});

	let first = connect_retrying(port);
	let second = TcpStream::connect(("127.0.0.1", port)).unwrap();
	let accepted = server.join().unwrap();

	// the listening socket is gone, so a third peer cannot get in
	assert!(TcpStream::connect(("127.0.0.1", port)).is_err());

	assert_eq!(accepted.len(), 2);
	let peers: Vec<SocketAddr> = accepted
		.into_iter()
		.map(|conn| TcpStream::from(conn.fd).peer_addr().unwrap())
		.collect();
	assert_eq!(peers, vec![first.local_addr().unwrap(), second.local_addr().unwrap()]);
}

#[test]
fn listen_once_returns_the_first_peer() {
	let port = free_tcp_port();
	let attrs = listen_attrs(port);
	let server = thread::spawn(move || try_listen_once(&attrs, &config(), &AllowAll).unwrap());

	let first = connect_retrying(port);
	// queued behind the first, never handed out
	let _second = TcpStream::connect(("127.0.0.1", port));
	let conn = server.join().unwrap();

	assert_eq!(conn.kind, SocketKind::Stream);
	let peer = TcpStream::from(conn.fd).peer_addr().unwrap();
	assert_eq!(peer, first.local_addr().unwrap());
}

#[test]
fn rejected_datagram_peer_is_drained() {
	let port = free_udp_port();
	let blocked = UdpSocket::bind("127.0.0.1:0").unwrap();
	let allowed = UdpSocket::bind("127.0.0.1:0").unwrap();
	let blocked_port = blocked.local_addr().unwrap().port();

	let attrs = listen_attrs(port).datagram().remote(Some("127.0.0.1"), None);
	let server = thread::spawn(move || {
		let filter = move |peer: &SockAddr, _restriction: &Endpoint| peer.port() != blocked_port;
		let mut accepted: Vec<Established> = Vec::new();
		let keep = |conn, accepted: &mut Vec<Established>| accepted.push(conn);
		try_listen_continuous(&attrs, &config(), &filter, keep, &mut accepted, 1).unwrap();
		accepted
	});

	let target = ("127.0.0.1", port);
	while !server.is_finished() {
		blocked.send_to(b"bad", target).unwrap();
		allowed.send_to(b"good", target).unwrap();
		thread::sleep(Duration::from_millis(50));
	}

	let mut accepted = server.join().unwrap();
	assert_eq!(accepted.len(), 1);
	let conn = accepted.remove(0);
	assert_eq!(conn.kind, SocketKind::Datagram);

	let socket = UdpSocket::from(conn.fd);
	socket.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
	assert_eq!(socket.peer_addr().unwrap(), allowed.local_addr().unwrap());

	let mut buf = [0u8; 16];
	let n = socket.recv(&mut buf).unwrap();
	assert_eq!(&buf[..n], b"good");
}

#[test]
fn zero_budget_returns_immediately() {
	let attrs = listen_attrs(free_tcp_port());
	let mut calls = 0usize;
	try_listen_continuous(&attrs, &config(), &AllowAll, |_, calls: &mut usize| *calls += 1, &mut calls, 0).unwrap();
	assert_eq!(calls, 0);
}

#[test]
fn loopback_formats_as_ip_and_port() {
	for (text, expected) in [("127.0.0.1:8080", "127.0.0.1 8080"), ("[::1]:443", "::1 443")] {
		let addr: SockAddr = text.parse::<SocketAddr>().unwrap().into();
		let formatted = format_endpoint(&addr, true).unwrap();
		assert_eq!(formatted, expected);
		assert!(!formatted.contains(['(', ')', '[', ']']));
	}
}
