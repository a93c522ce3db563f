//! Retrying system calls that were interrupted by a signal.

use nix::errno::Errno;
use tracing::trace;

/// How many times an interrupted (`EINTR`) system call is reissued before the
/// interruption is surfaced to the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RetryPolicy {
	/// Reissue the call for as long as it keeps getting interrupted.
	#[default]
	Unbounded,
	/// Reissue the call at most this many times.
	Limited(u32),
}

impl RetryPolicy {
	fn allows(self, retries: u32) -> bool {
		match self {
			Self::Unbounded => true,
			Self::Limited(max) => retries < max,
		}
	}
}

/// Run `operation`, running it again whenever it fails with `EINTR` and the
/// `policy` still allows a retry. Any other error is returned immediately.
pub fn retry_on_interrupt<T, F>(
	policy: RetryPolicy,
	mut operation: F,
) -> Result<T, Errno>
where
	F: FnMut() -> Result<T, Errno>,
{
	let mut retries = 0;

	loop {
		match operation() {
			Err(Errno::EINTR) if policy.allows(retries) => {
				retries = retries.saturating_add(1);
				trace!(retries, "system call interrupted, retrying");
			}
			result => return result,
		}
	}
}

#[cfg(test)]
mod test {
	use std::cell::RefCell;

	use super::*;

	#[test]
	fn retries_until_the_call_is_not_interrupted() {
		let attempt_counter = RefCell::new(0);
		let operation = || {
			let mut attempts = attempt_counter.borrow_mut();
			*attempts += 1;
			if *attempts <= 5 {
				Err(Errno::EINTR)
			} else {
				Ok(*attempts)
			}
		};

		let result = retry_on_interrupt(RetryPolicy::Unbounded, operation);

		assert_eq!(result, Ok(6));
		assert_eq!(*attempt_counter.borrow(), 6);
	}

	#[test]
	fn other_errors_are_not_retried() {
		let attempt_counter = RefCell::new(0);
		let operation = || -> Result<(), Errno> {
			*attempt_counter.borrow_mut() += 1;
			Err(Errno::ECONNREFUSED)
		};

		let result = retry_on_interrupt(RetryPolicy::Unbounded, operation);

		assert_eq!(result, Err(Errno::ECONNREFUSED));
		assert_eq!(*attempt_counter.borrow(), 1);
	}

	#[test]
	fn limited_policy_surfaces_the_interruption() {
		let attempt_counter = RefCell::new(0);
		let operation = || -> Result<(), Errno> {
			*attempt_counter.borrow_mut() += 1;
			Err(Errno::EINTR)
		};

		let result = retry_on_interrupt(RetryPolicy::Limited(3), operation);

		assert_eq!(result, Err(Errno::EINTR));
		// 1 initial try + 3 retries
		assert_eq!(*attempt_counter.borrow(), 4);
	}

	#[test]
	fn limited_zero_never_retries() {
		let attempt_counter = RefCell::new(0);
		let operation = || -> Result<(), Errno> {
			*attempt_counter.borrow_mut() += 1;
			Err(Errno::EINTR)
		};

		let result = retry_on_interrupt(RetryPolicy::Limited(0), operation);

		assert_eq!(result, Err(Errno::EINTR));
		assert_eq!(*attempt_counter.borrow(), 1);
	}
}
