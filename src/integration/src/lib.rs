//! Integration tests.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(missing_docs)]

use std::thread::{self, JoinHandle};

use iosock::{cli::serve_echo, io::Endpoint};

/// Local host IP address.
pub const LOCAL_HOST: &str = "127.0.0.1";

/// Start an echo server on a free port in its own thread. The thread returns
/// the listener's accepted count once `max_connections` have been served.
///
/// # Panics
///
/// Panics if no listener can be created.
#[must_use]
pub fn spawn_echo_server(max_connections: u64) -> (u16, JoinHandle<u64>) {
	let mut listener = Endpoint::listener(0).expect("unable to listen");
	let port = listener.port();

	let handle = thread::spawn(move || {
		serve_echo(&mut listener, Some(max_connections))
			.expect("echo server failed");
		listener.listener_stats().map_or(0, |s| s.accepted)
	});

	(port, handle)
}
