//! Fixed capacity transfer buffer.

use super::IOError;

/// Default capacity of an [`IoBuf`].
pub const NET_BUF_SIZE: usize = 4096;

/// Upper bound on the number of bytes handed to a single `send` or `recv`
/// call.
pub const MAX_CHUNK_SIZE: usize = NET_BUF_SIZE;

/// Byte buffer with a fixed capacity and a tracked length of valid bytes.
///
/// The length can never exceed the capacity: the only ways to grow it are
/// [`IoBuf::copy_from`], which sizes the buffer to fit, and
/// [`IoBuf::fill_from`], which rejects oversized payloads.
#[derive(Clone, PartialEq, Eq)]
pub struct IoBuf {
	content: Box<[u8]>,
	len: usize,
}

impl IoBuf {
	/// Create an empty buffer with a capacity of [`NET_BUF_SIZE`].
	#[must_use]
	pub fn new() -> Self {
		Self::with_capacity(NET_BUF_SIZE)
	}

	/// Create an empty buffer holding at most `capacity` bytes.
	#[must_use]
	pub fn with_capacity(capacity: usize) -> Self {
		Self { content: vec![0; capacity].into_boxed_slice(), len: 0 }
	}

	/// Create a buffer whose capacity is exactly `bytes.len()` and which
	/// holds a copy of `bytes`.
	#[must_use]
	pub fn copy_from(bytes: &[u8]) -> Self {
		Self { content: bytes.into(), len: bytes.len() }
	}

	/// Replace the contents of the buffer with `bytes`.
	pub fn fill_from(&mut self, bytes: &[u8]) -> Result<(), IOError> {
		if bytes.len() > self.capacity() {
			return Err(IOError::BufferOverflow {
				len: bytes.len(),
				capacity: self.capacity(),
			});
		}

		self.content[..bytes.len()].copy_from_slice(bytes);
		self.len = bytes.len();
		Ok(())
	}

	/// The valid bytes.
	#[must_use]
	pub fn as_slice(&self) -> &[u8] {
		&self.content[..self.len]
	}

	/// Number of valid bytes.
	#[must_use]
	pub fn len(&self) -> usize {
		self.len
	}

	/// True if there are no valid bytes.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// Maximum number of bytes this buffer can hold.
	#[must_use]
	pub fn capacity(&self) -> usize {
		self.content.len()
	}

	/// Mark the buffer as empty. Capacity is unchanged.
	pub fn clear(&mut self) {
		self.len = 0;
	}

	// Storage a single `recv` may fill.
	pub(super) fn recv_window(&mut self) -> &mut [u8] {
		let window = self.capacity().min(MAX_CHUNK_SIZE);
		&mut self.content[..window]
	}

	// `len` comes from `recv` into `recv_window`, so it is bounded by
	// the capacity.
	pub(super) fn set_len(&mut self, len: usize) {
		debug_assert!(len <= self.capacity());
		self.len = len.min(self.capacity());
	}
}

impl Default for IoBuf {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for IoBuf {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("IoBuf")
			.field("len", &self.len)
			.field("capacity", &self.capacity())
			.finish()
	}
}

impl From<&str> for IoBuf {
	fn from(text: &str) -> Self {
		Self::copy_from(text.as_bytes())
	}
}

impl AsRef<[u8]> for IoBuf {
	fn as_ref(&self) -> &[u8] {
		self.as_slice()
	}
}
