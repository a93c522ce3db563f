//! CLI for the `iosock` echo server and client.

use std::{env, fmt, str::FromStr};

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
	io::{Endpoint, IOError, IoBuf},
	parser::{Parser, ParserError, Token},
};

/// "listen-port"
pub const LISTEN_PORT: &str = "listen-port";
/// "max-connections"
pub const MAX_CONNECTIONS: &str = "max-connections";
/// "host"
pub const HOST: &str = "host";
/// "port"
pub const PORT: &str = "port";
/// "message"
pub const MESSAGE: &str = "message";

const DEFAULT_MESSAGE: &str = "ping";
const DEFAULT_LOG_FILTER: &str = "info";

/// Errors from running the CLI.
#[derive(Debug)]
pub enum CliError {
	/// The arguments could not be parsed.
	Parser(ParserError),
	/// An option had a value of the wrong shape.
	InvalidValue {
		/// Option name.
		name: &'static str,
		/// Value given by the user.
		value: String,
	},
	/// Neither `--listen-port` nor `--host` was given.
	MissingMode,
	/// `io::IOError` wrapper.
	IOError(IOError),
}

impl fmt::Display for CliError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Parser(e) => write!(f, "{e}"),
			Self::InvalidValue { name, value } => {
				write!(f, "invalid value {value:?} for --{name}")
			}
			Self::MissingMode => {
				write!(f, "one of --{LISTEN_PORT} or --{HOST} is required")
			}
			Self::IOError(e) => write!(f, "{e}"),
		}
	}
}

impl std::error::Error for CliError {}

impl From<ParserError> for CliError {
	fn from(err: ParserError) -> Self {
		Self::Parser(err)
	}
}

impl From<IOError> for CliError {
	fn from(err: IOError) -> Self {
		Self::IOError(err)
	}
}

/// What the binary was asked to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mode {
	/// Echo back everything received on `port`.
	Serve {
		/// Port to listen on.
		port: u16,
		/// Stop after this many connections.
		max_connections: Option<u64>,
	},
	/// Send `message` to `host:port` and print the reply.
	Ping {
		/// Host to connect to.
		host: String,
		/// Port to connect to.
		port: u16,
		/// Text to send.
		message: String,
	},
}

/// CLI options for the echo binary.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct EchoOptions {
	parsed: Parser,
}

impl EchoOptions {
	/// Parse `args`, which must start with the binary name.
	pub fn new(args: &[String]) -> Result<Self, ParserError> {
		let mut parsed = parser();
		parsed.parse(args.get(1..).unwrap_or_default())?;

		Ok(Self { parsed })
	}

	/// Work out the [`Mode`] from the parsed options.
	pub fn mode(&self) -> Result<Mode, CliError> {
		if let Some(port) = self.parsed.single(LISTEN_PORT) {
			let max_connections = self
				.parsed
				.single(MAX_CONNECTIONS)
				.map(|m| parse_value(MAX_CONNECTIONS, &m))
				.transpose()?;

			return Ok(Mode::Serve {
				port: parse_value(LISTEN_PORT, &port)?,
				max_connections,
			});
		}

		match (self.parsed.single(HOST), self.parsed.single(PORT)) {
			(Some(host), Some(port)) => Ok(Mode::Ping {
				host,
				port: parse_value(PORT, &port)?,
				message: self
					.parsed
					.single(MESSAGE)
					.unwrap_or_else(|| DEFAULT_MESSAGE.to_string()),
			}),
			_ => Err(CliError::MissingMode),
		}
	}
}

fn parser() -> Parser {
	Parser::new()
		.token(
			Token::new(LISTEN_PORT, "port to listen on and echo back from")
				.takes_value(true)
				.forbids(&[HOST, PORT]),
		)
		.token(
			Token::new(MAX_CONNECTIONS, "stop after this many connections")
				.takes_value(true)
				.requires(&[LISTEN_PORT]),
		)
		.token(
			Token::new(HOST, "host to send a message to")
				.takes_value(true)
				.requires(&[PORT]),
		)
		.token(
			Token::new(PORT, "port on the host")
				.takes_value(true)
				.requires(&[HOST]),
		)
		.token(
			Token::new(MESSAGE, "text to send")
				.takes_value(true)
				.default_value(DEFAULT_MESSAGE),
		)
}

fn parse_value<T: FromStr>(
	name: &'static str,
	value: &str,
) -> Result<T, CliError> {
	value
		.parse()
		.map_err(|_| CliError::InvalidValue { name, value: value.to_string() })
}

/// Accept connections on `listener` one at a time and echo back every chunk
/// until the peer shuts down. Returns after `max_connections` connections, or
/// never if it is `None`. Returns the number of connections served.
///
/// A connection that fails mid echo is logged at `warn`, counted as served and
/// does not stop the loop. Only a failing `accept` is returned.
pub fn serve_echo(
	listener: &mut Endpoint,
	max_connections: Option<u64>,
) -> Result<u64, IOError> {
	let mut served = 0;
	if max_connections == Some(0) {
		return Ok(served);
	}

	for conn in listener.incoming() {
		let mut conn = conn?;

		if let Err(e) = echo(&mut conn) {
			warn!(fd = conn.fd(), error = %e, "echo connection failed");
		}
		conn.close();
		log_connection(&conn, "served");

		served += 1;
		if max_connections.is_some_and(|max| served >= max) {
			break;
		}
	}

	Ok(served)
}

fn echo(conn: &mut Endpoint) -> Result<(), IOError> {
	let mut buf = IoBuf::new();
	while conn.read(&mut buf)? > 0 {
		conn.write(&buf)?;
	}

	Ok(())
}

/// Send `message` to `host:port` and return the first chunk of the reply.
pub fn ping(host: &str, port: u16, message: &str) -> Result<Vec<u8>, IOError> {
	let mut conn = Endpoint::connector(host, port)?;
	conn.write_str(message)?;

	let mut buf = IoBuf::new();
	conn.read(&mut buf)?;
	conn.close();
	log_connection(&conn, "ping");

	Ok(buf.as_slice().to_vec())
}

fn log_connection(conn: &Endpoint, what: &str) {
	if let Some(stats) = conn.connection_stats() {
		let millis = stats.duration().unwrap_or_default().as_millis();
		let duration_ms = u64::try_from(millis).unwrap_or(u64::MAX);
		info!(
			bytes_sent = stats.bytes_sent,
			bytes_received = stats.bytes_received,
			duration_ms,
			"{what}"
		);
	}
}

/// Install a `fmt` subscriber filtered by `RUST_LOG`, defaulting to `info`.
pub fn init_logging() {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

	// Ignore the error if a subscriber is already installed, e.g. in tests
	let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Echo CLI.
pub struct CLI;

impl CLI {
	/// Execute the echo CLI with the environment args.
	pub fn execute() {
		let args: Vec<String> = env::args().collect();

		if let Err(e) = Self::run(&args) {
			eprintln!("iosock: {e}");
			std::process::exit(1);
		}
	}

	fn run(args: &[String]) -> Result<(), CliError> {
		let options = EchoOptions::new(args)?;

		if options.parsed.version() {
			println!("version: {}", env!("CARGO_PKG_VERSION"));
			return Ok(());
		}
		if options.parsed.help() {
			println!("{}", options.parsed.info());
			return Ok(());
		}

		init_logging();

		match options.mode()? {
			Mode::Serve { port, max_connections } => {
				let mut listener = Endpoint::listener(port)?;
				info!(port = listener.port(), "echo server listening");

				let served = serve_echo(&mut listener, max_connections)?;
				info!(served, "echo server done");
			}
			Mode::Ping { host, port, message } => {
				let reply = ping(&host, port, &message)?;
				println!("{}", String::from_utf8_lossy(&reply));
			}
		}

		Ok(())
	}
}
