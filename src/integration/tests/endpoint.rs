use std::thread;

use integration::{spawn_echo_server, LOCAL_HOST};
use iosock::io::{Endpoint, IOError, IoBuf, Role, MAX_CHUNK_SIZE};
use iosock_test_primitives::{find_free_port, wait_until_port_is_bound};

#[test]
fn ping_scenario_on_fixed_port() {
	let port = find_free_port().unwrap();
	let mut listener = Endpoint::listener(port).unwrap();
	wait_until_port_is_bound(port);
	assert_eq!(listener.port(), port);

	let mut connector = Endpoint::connector("localhost", port).unwrap();
	connector.write_str("ping").unwrap();

	let mut accepted = listener.accept().unwrap();
	let mut buf = IoBuf::new();
	accepted.read(&mut buf).unwrap();
	assert_eq!(buf.as_slice(), b"ping");
	assert_eq!(buf.len(), 4);

	connector.close();
	accepted.close();
	listener.close();

	for endpoint in [&connector, &accepted] {
		let stats = endpoint.connection_stats().unwrap();
		assert!(stats.end_time.unwrap() >= stats.start_time.unwrap());
	}
	assert_eq!(listener.listener_stats().unwrap().accepted, 1);
}

#[test]
fn echo_round_trip_keeps_byte_counts_in_step() {
	let (port, server) = spawn_echo_server(1);

	let mut client = Endpoint::connector(LOCAL_HOST, port).unwrap();
	let payload: Vec<u8> =
		(0..MAX_CHUNK_SIZE * 3).map(|i| (i % 7) as u8).collect();

	// One chunk in flight at a time.
	let mut echoed = Vec::new();
	let mut buf = IoBuf::new();
	for chunk in payload.chunks(MAX_CHUNK_SIZE) {
		client.write_all(chunk).unwrap();
		let mut got = 0;
		while got < chunk.len() {
			got += client.read(&mut buf).unwrap();
			echoed.extend_from_slice(buf.as_slice());
		}
	}
	client.close();

	assert_eq!(echoed, payload);
	let stats = client.connection_stats().unwrap();
	assert_eq!(stats.bytes_sent, payload.len() as u64);
	assert_eq!(stats.bytes_received, payload.len() as u64);
	assert_eq!(server.join().unwrap(), 1);
}

#[test]
fn accepted_endpoints_move_to_worker_threads() {
	let mut listener = Endpoint::listener(0).unwrap();
	let port = listener.port();

	let clients: Vec<_> = (0..4)
		.map(|i| {
			thread::spawn(move || {
				let mut client = Endpoint::connector(LOCAL_HOST, port).unwrap();
				client.write_str(&format!("client {i}")).unwrap();
				let mut buf = IoBuf::new();
				client.read(&mut buf).unwrap();
				String::from_utf8(buf.as_slice().to_vec()).unwrap()
			})
		})
		.collect();

	let workers: Vec<_> = listener
		.incoming()
		.take(4)
		.map(|conn| {
			let mut conn = conn.unwrap();
			assert_eq!(conn.role(), Role::Accepted);
			thread::spawn(move || {
				let mut buf = IoBuf::new();
				conn.read(&mut buf).unwrap();
				let text = String::from_utf8_lossy(buf.as_slice());
				conn.write_str(&format!("ack {text}")).unwrap();
			})
		})
		.collect();

	for worker in workers {
		worker.join().unwrap();
	}
	let mut replies: Vec<_> =
		clients.into_iter().map(|c| c.join().unwrap()).collect();
	replies.sort();

	assert_eq!(
		replies,
		vec!["ack client 0", "ack client 1", "ack client 2", "ack client 3"]
	);
	assert_eq!(listener.listener_stats().unwrap().accepted, 4);
}

#[test]
fn second_listener_on_same_port_fails_to_bind() {
	let listener = Endpoint::listener(0).unwrap();

	match Endpoint::listener(listener.port()).unwrap_err() {
		IOError::Bind(e) => assert_eq!(e, nix::errno::Errno::EADDRINUSE),
		other => panic!("unexpected error variant ({other:?})"),
	}
}
