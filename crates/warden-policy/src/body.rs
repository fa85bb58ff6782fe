// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bounded, repeatable access to request bodies.
//!
//! Body constraints need the raw bytes, but the proxy still has to forward the
//! same body upstream. [`BodyReader`] is the seam between the two: it returns
//! the body as [`Bytes`] as often as asked, and refuses bodies over a limit
//! instead of buffering without bound.

use std::io::Read;
use std::sync::OnceLock;

use bytes::Bytes;
use parking_lot::Mutex;
use thiserror::Error;

/// Default body size limit (1 MiB).
///
/// `warden_server_config::DEFAULT_MAX_BODY_BYTES` must stay equal to this; the
/// `warden` binary tests that it does.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Errors returned when a request body cannot be made available.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BodyError {
	#[error("request body exceeds {limit} bytes")]
	TooLarge { limit: usize },

	#[error("failed to read request body: {0}")]
	Read(String),
}

/// Access to the raw bytes of a request body.
///
/// Implementations must return the same bytes on every call within one
/// request and must enforce a size limit.
pub trait BodyReader {
	fn read_body(&self) -> Result<Bytes, BodyError>;
}

impl<T: BodyReader + ?Sized> BodyReader for &T {
	fn read_body(&self) -> Result<Bytes, BodyError> {
		(**self).read_body()
	}
}

/// A body that has already been buffered in memory.
#[derive(Debug, Clone)]
pub struct BufferedBody {
	bytes: Bytes,
	limit: usize,
}

impl BufferedBody {
	pub fn new(bytes: impl Into<Bytes>, limit: usize) -> Self {
		Self {
			bytes: bytes.into(),
			limit,
		}
	}

	/// Creates a buffered body limited to [`DEFAULT_MAX_BODY_BYTES`].
	pub fn with_default_limit(bytes: impl Into<Bytes>) -> Self {
		Self::new(bytes, DEFAULT_MAX_BODY_BYTES)
	}

	pub fn empty() -> Self {
		Self::with_default_limit(Bytes::new())
	}

	/// Returns the buffered bytes for forwarding upstream.
	pub fn into_bytes(self) -> Bytes {
		self.bytes
	}
}

impl BodyReader for BufferedBody {
	fn read_body(&self) -> Result<Bytes, BodyError> {
		if self.bytes.len() > self.limit {
			return Err(BodyError::TooLarge { limit: self.limit });
		}
		Ok(self.bytes.clone())
	}
}

/// A body read from an underlying reader on first use.
///
/// The reader is consumed at most once; the outcome (bytes or error) is cached
/// for every later call and handed back by [`LazyBody::into_bytes`].
pub struct LazyBody<R> {
	reader: Mutex<Option<R>>,
	cached: OnceLock<Result<Bytes, BodyError>>,
	limit: usize,
}

impl<R: Read> LazyBody<R> {
	pub fn new(reader: R, limit: usize) -> Self {
		Self {
			reader: Mutex::new(Some(reader)),
			cached: OnceLock::new(),
			limit,
		}
	}

	/// Returns true once the underlying reader has been drained.
	pub fn is_buffered(&self) -> bool {
		self.cached.get().is_some()
	}

	/// Returns the full body, reading it now if nothing has yet.
	pub fn into_bytes(self) -> Result<Bytes, BodyError> {
		if let Some(cached) = self.cached.into_inner() {
			return cached;
		}
		match self.reader.into_inner() {
			Some(reader) => read_limited(reader, self.limit),
			None => Err(BodyError::Read("body reader already consumed".to_string())),
		}
	}
}

impl<R: Read> BodyReader for LazyBody<R> {
	fn read_body(&self) -> Result<Bytes, BodyError> {
		self.cached
			.get_or_init(|| match self.reader.lock().take() {
				Some(reader) => read_limited(reader, self.limit),
				None => Err(BodyError::Read("body reader already consumed".to_string())),
			})
			.clone()
	}
}

impl<R> std::fmt::Debug for LazyBody<R> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LazyBody")
			.field("limit", &self.limit)
			.field("buffered", &self.cached.get().is_some())
			.finish()
	}
}

fn read_limited<R: Read>(reader: R, limit: usize) -> Result<Bytes, BodyError> {
	let mut buf = Vec::new();
	reader
		.take((limit as u64).saturating_add(1))
		.read_to_end(&mut buf)
		.map_err(|e| BodyError::Read(e.to_string()))?;
	if buf.len() > limit {
		return Err(BodyError::TooLarge { limit });
	}
	Ok(Bytes::from(buf))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;

	struct FailingReader;

	impl Read for FailingReader {
		fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
			Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
		}
	}

	#[test]
	fn test_buffered_body_within_limit() {
		let body = BufferedBody::new("hello", 5);
		assert_eq!(body.read_body().unwrap(), Bytes::from_static(b"hello"));
		assert_eq!(body.read_body().unwrap(), Bytes::from_static(b"hello"));
		assert_eq!(body.into_bytes(), Bytes::from_static(b"hello"));
	}

	#[test]
	fn test_buffered_body_over_limit() {
		let body = BufferedBody::new("hello!", 5);
		assert_eq!(body.read_body(), Err(BodyError::TooLarge { limit: 5 }));
	}

	#[test]
	fn test_lazy_body_reads_once() {
		let body = LazyBody::new(Cursor::new(b"payload".to_vec()), 64);
		assert!(!body.is_buffered());
		assert_eq!(body.read_body().unwrap(), Bytes::from_static(b"payload"));
		assert!(body.is_buffered());
		assert_eq!(body.read_body().unwrap(), Bytes::from_static(b"payload"));
		assert_eq!(body.into_bytes().unwrap(), Bytes::from_static(b"payload"));
	}

	#[test]
	fn test_lazy_body_into_bytes_without_read() {
		let body = LazyBody::new(Cursor::new(b"payload".to_vec()), 64);
		assert_eq!(body.into_bytes().unwrap(), Bytes::from_static(b"payload"));
	}

	#[test]
	fn test_lazy_body_over_limit() {
		let body = LazyBody::new(Cursor::new(vec![b'x'; 65]), 64);
		assert_eq!(body.read_body(), Err(BodyError::TooLarge { limit: 64 }));
		assert_eq!(body.read_body(), Err(BodyError::TooLarge { limit: 64 }));
	}

	#[test]
	fn test_lazy_body_exactly_at_limit() {
		let body = LazyBody::new(Cursor::new(vec![b'x'; 64]), 64);
		assert_eq!(body.read_body().unwrap().len(), 64);
	}

	#[test]
	fn test_lazy_body_read_error_is_cached() {
		let body = LazyBody::new(FailingReader, 64);
		assert!(matches!(body.read_body(), Err(BodyError::Read(_))));
		assert!(matches!(body.read_body(), Err(BodyError::Read(_))));
	}
}
