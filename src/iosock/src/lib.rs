//! Blocking TCP/IPv4 endpoints with transfer statistics.
//!
//! A single [`io::Endpoint`] type covers the three roles a TCP socket plays:
//! outbound connector, listener, and accepted connection. Interrupted system
//! calls are retried, partial writes are accumulated, and bytes and
//! connection times are accounted for as a side effect.
//!
//! # Maintainers Notes
//!
//! This crate should have as minimal dependencies as possible. All socket
//! syscalls live in [`io`].

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

/// Command line interface for the echo binary
pub mod cli;
/// Basic IO capabilities
pub mod io;
/// Command line token parser
pub mod parser;
