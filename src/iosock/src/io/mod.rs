//! Abstractions for low level I/O.
//!
//! NOTE TO MAINTAINERS: Interaction with any sys calls should be contained
//! within this module.

mod buf;
mod endpoint;
mod retry;

use std::fmt;

pub use buf::{IoBuf, MAX_CHUNK_SIZE, NET_BUF_SIZE};
pub use endpoint::{
	ConnectionStats, Endpoint, Incoming, ListenerStats, Role, Stats, BACKLOG,
};
pub use retry::{retry_on_interrupt, RetryPolicy};

/// Endpoint I/O error. Every variant is fatal to the operation that produced
/// it; signal interruption is retried and only shows up here once a bounded
/// [`RetryPolicy`] runs out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IOError {
	/// The stream socket could not be allocated.
	SocketCreation(nix::Error),
	/// Binding the listener to the wildcard address failed.
	Bind(nix::Error),
	/// Enabling `SO_REUSEADDR` failed.
	SocketOption(nix::Error),
	/// Marking the socket as listening failed, or the port picked by the
	/// kernel for a port `0` listener could not be read back.
	Listen(nix::Error),
	/// The hostname did not resolve to an IPv4 address.
	Resolution(String),
	/// A non retryable `connect` failure.
	Connect(nix::Error),
	/// A non retryable `accept` failure.
	Accept(nix::Error),
	/// A non retryable `recv` failure.
	Read(nix::Error),
	/// A non retryable `send` failure.
	Write(nix::Error),
	/// Transfer was attempted on an endpoint that has been closed.
	Closed,
	/// `accept` was called on an endpoint that is not a listener.
	NotListener,
	/// `read` was given a buffer with no capacity.
	EmptyBuffer,
	/// Payload of the given size does not fit in the requested capacity.
	BufferOverflow {
		/// Size of the payload.
		len: usize,
		/// Capacity of the buffer.
		capacity: usize,
	},
}

impl fmt::Display for IOError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::SocketCreation(e) => write!(f, "socket creation error: {e}"),
			Self::Bind(e) => write!(f, "bind error: {e}"),
			Self::SocketOption(e) => write!(f, "setsockopt error: {e}"),
			Self::Listen(e) => write!(f, "listen error: {e}"),
			Self::Resolution(host) => {
				write!(f, "hostname resolution failed for {host}")
			}
			Self::Connect(e) => write!(f, "unable to connect to host: {e}"),
			Self::Accept(e) => write!(f, "accept error: {e}"),
			Self::Read(e) => write!(f, "read error: {e}"),
			Self::Write(e) => write!(f, "write error: {e}"),
			Self::Closed => write!(f, "endpoint is closed"),
			Self::NotListener => write!(f, "endpoint is not a listener"),
			Self::EmptyBuffer => write!(f, "cannot read into an empty buffer"),
			Self::BufferOverflow { len, capacity } => write!(
				f,
				"payload of {len} bytes exceeds buffer capacity of {capacity}"
			),
		}
	}
}

impl std::error::Error for IOError {}

impl From<IOError> for std::io::Error {
	fn from(value: IOError) -> Self {
		match value {
			IOError::Closed => std::io::Error::new(
				std::io::ErrorKind::NotConnected,
				"endpoint is closed",
			),
			IOError::EmptyBuffer => std::io::Error::new(
				std::io::ErrorKind::InvalidInput,
				"cannot read into an empty buffer",
			),
			IOError::Resolution(host) => std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("unable to resolve {host}"),
			),
			IOError::SocketCreation(e)
			| IOError::Bind(e)
			| IOError::SocketOption(e)
			| IOError::Listen(e)
			| IOError::Connect(e)
			| IOError::Accept(e)
			| IOError::Read(e)
			| IOError::Write(e) => std::io::Error::from(e),
			other => std::io::Error::other(other.to_string()),
		}
	}
}
