//! Blocking TCP endpoint: connector, listener, or accepted connection.

use std::{
	net::{SocketAddr, SocketAddrV4, ToSocketAddrs},
	os::unix::io::RawFd,
	time::{Duration, SystemTime},
};

use nix::{
	errno::Errno,
	sys::socket::{
		accept, bind, connect, getsockname, listen, recv, send, setsockopt,
		shutdown, socket, sockopt, AddressFamily, MsgFlags, Shutdown,
		SockFlag, SockType, SockaddrIn,
	},
	unistd::close,
};
use tracing::{debug, trace};

use super::{retry_on_interrupt, IOError, IoBuf, RetryPolicy, MAX_CHUNK_SIZE};

/// Number of pending connections a listener queues before refusing new ones.
pub const BACKLOG: usize = 5;

// A peer that went away must surface as `EPIPE`, not kill the process.
#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: MsgFlags = MsgFlags::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: MsgFlags = MsgFlags::empty();

/// The part an [`Endpoint`] plays in a TCP conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
	/// Outbound connection created with [`Endpoint::connector`].
	Connector,
	/// Passive socket created with [`Endpoint::listener`].
	Listener,
	/// Inbound connection produced by [`Endpoint::accept`].
	Accepted,
}

/// Byte and time accounting for connectors and accepted connections.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionStats {
	/// Bytes actually handed to the kernel by `send`.
	pub bytes_sent: u64,
	/// Bytes returned by `recv`.
	pub bytes_received: u64,
	/// When the connection was established.
	pub start_time: Option<SystemTime>,
	/// When the connection was closed.
	pub end_time: Option<SystemTime>,
}

impl ConnectionStats {
	/// Lifetime of the connection, once it has been closed.
	#[must_use]
	pub fn duration(&self) -> Option<Duration> {
		let start = self.start_time?;
		let end = self.end_time?;
		Some(end.duration_since(start).unwrap_or_default())
	}
}

/// Accounting for listeners.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ListenerStats {
	/// Number of successful `accept` calls.
	pub accepted: u64,
}

/// Role dependent statistics of an [`Endpoint`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stats {
	/// Connector and accepted endpoints.
	Connection(ConnectionStats),
	/// Listener endpoints.
	Listener(ListenerStats),
}

/// A TCP/IPv4 stream socket with blocking transfer and statistics.
///
/// The endpoint owns its descriptor: it is released by [`Endpoint::close`] or
/// when the endpoint is dropped, whichever happens first.
#[derive(Debug)]
pub struct Endpoint {
	fd: RawFd,
	open: bool,
	role: Role,
	port: u16,
	retry: RetryPolicy,
	stats: Stats,
}

impl Endpoint {
	/// Resolve `host` to an IPv4 address and connect to it on `port`.
	pub fn connector(host: &str, port: u16) -> Result<Self, IOError> {
		Self::connector_with_policy(host, port, RetryPolicy::default())
	}

	/// Same as [`Self::connector`], retrying an interrupted `connect`
	/// according to `retry`.
	pub fn connector_with_policy(
		host: &str,
		port: u16,
		retry: RetryPolicy,
	) -> Result<Self, IOError> {
		let addr = SockaddrIn::from(resolve_ipv4(host, port)?);

		// From here on `endpoint` owns the descriptor, so any early return
		// closes it on drop.
		let mut endpoint =
			Self::new(socket_fd()?, Role::Connector, port, retry);

		let fd = endpoint.fd;
		match retry_on_interrupt(retry, || connect(fd, &addr)) {
			Ok(()) => {}
			// An interrupted connect keeps going in the background; by the
			// time it is reissued it may already be done.
			Err(Errno::EISCONN) => {}
			Err(e) => return Err(IOError::Connect(e)),
		}

		endpoint.stats = Stats::Connection(ConnectionStats {
			start_time: Some(SystemTime::now()),
			..ConnectionStats::default()
		});
		debug!(fd, host, port, "connected");

		Ok(endpoint)
	}

	/// Bind to `0.0.0.0:port` and start listening. Passing port `0` lets the
	/// kernel pick a free port, which is then reported by [`Self::port`].
	pub fn listener(port: u16) -> Result<Self, IOError> {
		Self::listener_with_policy(port, RetryPolicy::default())
	}

	/// Same as [`Self::listener`], retrying an interrupted `accept` according
	/// to `retry`. Accepted endpoints inherit the policy.
	pub fn listener_with_policy(
		port: u16,
		retry: RetryPolicy,
	) -> Result<Self, IOError> {
		let mut endpoint = Self::new(socket_fd()?, Role::Listener, port, retry);
		let fd = endpoint.fd;

		setsockopt(fd, sockopt::ReuseAddr, &true)
			.map_err(IOError::SocketOption)?;

		let addr = SockaddrIn::new(0, 0, 0, 0, port);
		bind(fd, &addr).map_err(IOError::Bind)?;
		listen(fd, BACKLOG).map_err(IOError::Listen)?;

		if port == 0 {
			let bound = getsockname::<SockaddrIn>(fd).map_err(IOError::Listen)?;
			endpoint.port = bound.port();
		}
		debug!(fd, port = endpoint.port, backlog = BACKLOG, "listening");

		Ok(endpoint)
	}

	fn new(fd: RawFd, role: Role, port: u16, retry: RetryPolicy) -> Self {
		let stats = match role {
			Role::Listener => Stats::Listener(ListenerStats::default()),
			Role::Connector | Role::Accepted => {
				Stats::Connection(ConnectionStats::default())
			}
		};

		Self { fd, open: true, role, port, retry, stats }
	}

	/// Block until a client connects and return the connection as a new,
	/// independently owned endpoint.
	pub fn accept(&mut self) -> Result<Endpoint, IOError> {
		if self.role != Role::Listener {
			return Err(IOError::NotListener);
		}
		let fd = self.open_fd()?;

		let conn_fd =
			retry_on_interrupt(self.retry, || accept(fd)).map_err(|e| {
				debug!(fd, error = %e, "accept failed");
				IOError::Accept(e)
			})?;

		if let Stats::Listener(stats) = &mut self.stats {
			stats.accepted += 1;
		}

		let mut conn =
			Self::new(conn_fd, Role::Accepted, self.port, self.retry);
		conn.stats = Stats::Connection(ConnectionStats {
			start_time: Some(SystemTime::now()),
			..ConnectionStats::default()
		});
		debug!(listener = fd, fd = conn_fd, "accepted connection");

		Ok(conn)
	}

	/// Iterate over incoming connections. Each call to `next` blocks in
	/// [`Self::accept`]; iteration ends once the listener is closed.
	pub fn incoming(&mut self) -> Incoming<'_> {
		Incoming { listener: self }
	}

	/// Send all of `buf`'s valid bytes.
	pub fn write(&mut self, buf: &IoBuf) -> Result<(), IOError> {
		self.write_all(buf.as_slice())
	}

	/// Send `text` without any terminator.
	pub fn write_str(&mut self, text: &str) -> Result<(), IOError> {
		self.write(&IoBuf::from(text))
	}

	/// Send every byte of `data`, never handing more than [`MAX_CHUNK_SIZE`]
	/// bytes to a single `send`.
	pub fn write_all(&mut self, data: &[u8]) -> Result<(), IOError> {
		let fd = self.open_fd()?;
		let retry = self.retry;

		let mut offset = 0;
		while offset < data.len() {
			let end = data.len().min(offset + MAX_CHUNK_SIZE);
			let chunk = &data[offset..end];

			let send_chunk = || send(fd, chunk, SEND_FLAGS);
			let written =
				retry_on_interrupt(retry, send_chunk).map_err(IOError::Write)?;
			if written == 0 {
				// No progress on a non empty chunk.
				return Err(IOError::Write(Errno::EPIPE));
			}

			offset += written;
			if let Stats::Connection(stats) = &mut self.stats {
				stats.bytes_sent += written as u64;
			}
			trace!(fd, written, offset, total = data.len(), "send");
		}

		Ok(())
	}

	/// Receive once into `buf`, replacing its contents. Returns the number of
	/// bytes received; `0` means the peer shut down its side gracefully.
	///
	/// `buf` must have room for at least one byte, otherwise `0` could not be
	/// told apart from a shutdown.
	pub fn read(&mut self, buf: &mut IoBuf) -> Result<usize, IOError> {
		let fd = self.open_fd()?;
		if buf.capacity() == 0 {
			return Err(IOError::EmptyBuffer);
		}

		let received = retry_on_interrupt(self.retry, || {
			recv(fd, buf.recv_window(), MsgFlags::empty())
		})
		.map_err(IOError::Read)?;

		buf.set_len(received);
		if let Stats::Connection(stats) = &mut self.stats {
			stats.bytes_received += received as u64;
		}
		trace!(fd, received, "recv");

		Ok(received)
	}

	/// Shut down both directions and release the descriptor. Only the first
	/// call has any effect.
	pub fn close(&mut self) {
		if !self.open {
			return;
		}

		// Its ok if either of these error - likely means the other end of the
		// connection has been shutdown, or this socket never connected
		if let Err(e) = shutdown(self.fd, Shutdown::Both) {
			trace!(fd = self.fd, error = %e, "shutdown");
		}
		if let Err(e) = close(self.fd) {
			debug!(fd = self.fd, error = %e, "close");
		}
		self.open = false;

		if let Stats::Connection(stats) = &mut self.stats {
			stats.end_time = Some(SystemTime::now());
		}
		debug!(fd = self.fd, role = ?self.role, "closed");
	}

	/// Raw descriptor, e.g. for setting socket options. Not valid once the
	/// endpoint is closed.
	#[must_use]
	pub fn fd(&self) -> RawFd {
		self.fd
	}

	/// Port this endpoint was configured with. Listeners bound to port `0`
	/// report the port picked by the kernel; accepted connections report the
	/// port of their listener.
	#[must_use]
	pub fn port(&self) -> u16 {
		self.port
	}

	/// The part this endpoint plays.
	#[must_use]
	pub fn role(&self) -> Role {
		self.role
	}

	/// True until [`Self::close`] runs.
	#[must_use]
	pub fn is_open(&self) -> bool {
		self.open
	}

	/// Statistics gathered so far.
	#[must_use]
	pub fn stats(&self) -> &Stats {
		&self.stats
	}

	/// Statistics of a connector or accepted endpoint.
	#[must_use]
	pub fn connection_stats(&self) -> Option<&ConnectionStats> {
		match &self.stats {
			Stats::Connection(stats) => Some(stats),
			Stats::Listener(_) => None,
		}
	}

	/// Statistics of a listener.
	#[must_use]
	pub fn listener_stats(&self) -> Option<&ListenerStats> {
		match &self.stats {
			Stats::Listener(stats) => Some(stats),
			Stats::Connection(_) => None,
		}
	}

	/// Current retry policy for interrupted system calls.
	#[must_use]
	pub fn retry_policy(&self) -> RetryPolicy {
		self.retry
	}

	/// Change how interrupted system calls are retried from now on.
	pub fn set_retry_policy(&mut self, retry: RetryPolicy) {
		self.retry = retry;
	}

	fn open_fd(&self) -> Result<RawFd, IOError> {
		if self.open {
			Ok(self.fd)
		} else {
			Err(IOError::Closed)
		}
	}
}

impl Drop for Endpoint {
	fn drop(&mut self) {
		self.close();
	}
}

/// Iterator over connections accepted by a listener. See
/// [`Endpoint::incoming`].
#[derive(Debug)]
pub struct Incoming<'a> {
	listener: &'a mut Endpoint,
}

impl Iterator for Incoming<'_> {
	type Item = Result<Endpoint, IOError>;

	fn next(&mut self) -> Option<Self::Item> {
		if !self.listener.is_open() {
			return None;
		}

		Some(self.listener.accept())
	}
}

fn resolve_ipv4(host: &str, port: u16) -> Result<SocketAddrV4, IOError> {
	let addrs = (host, port).to_socket_addrs().map_err(|e| {
		debug!(host, error = %e, "name resolution failed");
		IOError::Resolution(host.to_string())
	})?;

	addrs
		.filter_map(|addr| match addr {
			SocketAddr::V4(v4) => Some(v4),
			SocketAddr::V6(_) => None,
		})
		.next()
		.ok_or_else(|| IOError::Resolution(host.to_string()))
}

fn socket_fd() -> Result<RawFd, IOError> {
	socket(
		AddressFamily::Inet,
		// Type - sequenced, two way byte stream. (full duplexed).
		// Stream must be in a connected state before send/recieve.
		SockType::Stream,
		// Flags
		SockFlag::empty(),
		// Protocol - no protocol needs to be specified as SOCK_STREAM
		// is both a type and protocol.
		None,
	)
	.map_err(IOError::SocketCreation)
}
