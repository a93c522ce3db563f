//! Primitive types for test setup.

use std::{net::TcpListener, ops::Range, thread, time::Duration};

use rand::prelude::*;

const MAX_PORT_BIND_WAIT_TIME: Duration = Duration::from_secs(30);
const PORT_BIND_WAIT_TIME_INCREMENT: Duration = Duration::from_millis(100);
const SERVER_PORT_RANGE: Range<u16> = 10000..60000;
const MAX_PORT_SEARCH_ATTEMPTS: u16 = 50;

/// Get a bind-able TCP port on the local system.
#[must_use]
pub fn find_free_port() -> Option<u16> {
	let mut rng = rand::thread_rng();
	(0..MAX_PORT_SEARCH_ATTEMPTS)
		.map(|_| rng.gen_range(SERVER_PORT_RANGE))
		.find(|port| port_is_available(*port))
}

/// Wait until something is listening on `port`.
///
/// # Panics
///
/// Panics if the port is still free after `MAX_PORT_BIND_WAIT_TIME`.
pub fn wait_until_port_is_bound(port: u16) {
	let mut waited = Duration::ZERO;

	while port_is_available(port) {
		assert!(
			waited < MAX_PORT_BIND_WAIT_TIME,
			"Server has not come up: port {port} is still available after {}s",
			MAX_PORT_BIND_WAIT_TIME.as_secs()
		);
		thread::sleep(PORT_BIND_WAIT_TIME_INCREMENT);
		waited += PORT_BIND_WAIT_TIME_INCREMENT;
	}
}

/// Return whether or not the port can be bound to.
fn port_is_available(port: u16) -> bool {
	TcpListener::bind(("0.0.0.0", port)).is_ok()
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn free_port_is_in_range_and_bindable() {
		let port = find_free_port().unwrap();

		assert!(SERVER_PORT_RANGE.contains(&port));
		assert!(port_is_available(port));
	}

	#[test]
	fn bound_port_is_detected() {
		let listener = TcpListener::bind(("0.0.0.0", 0)).unwrap();
		let port = listener.local_addr().unwrap().port();

		wait_until_port_is_bound(port);
		assert!(!port_is_available(port));
	}
}
