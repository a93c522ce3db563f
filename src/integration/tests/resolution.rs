//! Kept in its own test binary so no other test opens descriptors while the
//! count is taken.

use iosock::io::{Endpoint, IOError};

const HOST: &str = "unresolvable.invalid";

#[test]
fn unresolvable_host_does_not_leak_descriptors() {
	// The resolver may keep a descriptor of its own around after first use.
	let _ = Endpoint::connector(HOST, 80);
	let before = open_descriptor_count();

	for _ in 0..16 {
		match Endpoint::connector(HOST, 80).unwrap_err() {
			IOError::Resolution(host) => assert_eq!(host, HOST),
			other => panic!("unexpected error variant ({other:?})"),
		}
	}

	assert!(open_descriptor_count() <= before + 2);
}

fn open_descriptor_count() -> usize {
	std::fs::read_dir("/proc/self/fd").map_or(0, Iterator::count)
}
