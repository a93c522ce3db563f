//! Command line token parser.
use std::{collections::HashMap, fmt};

const HELP_INPUT: &str = "--help";
const VERSION_INPUT: &str = "--version";
const INPUT_PREFIX: &str = "--";

/// Token parsing error.
#[derive(Debug, PartialEq, Eq)]
pub enum ParserError {
	/// The input was not expected.
	UnexpectedInput(String),
	/// The input was provided more than once.
	DuplicateInput(String),
	/// Inputs are mutually exclusive.
	MutuallyExclusiveInput(String, String),
	/// A value is required for the given token.
	MissingValue(String),
	/// An expected input is missing.
	MissingInput(String),
}

impl fmt::Display for ParserError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::UnexpectedInput(i) => write!(f, "unexpected input {i}"),
			Self::DuplicateInput(i) => write!(f, "{i} given more than once"),
			Self::MutuallyExclusiveInput(a, b) => {
				write!(f, "--{a} and --{b} cannot be used together")
			}
			Self::MissingValue(i) => write!(f, "--{i} needs a value"),
			Self::MissingInput(i) => write!(f, "--{i} is required"),
		}
	}
}

impl std::error::Error for ParserError {}

/// Value of a parsed token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenValue {
	/// The token was present and takes no value.
	Flag,
	/// The token's value.
	Single(String),
}

impl fmt::Display for TokenValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Flag => write!(f, "true"),
			Self::Single(s) => write!(f, "{s}"),
		}
	}
}

/// Description of a `--name [value]` input.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct Token {
	name: String,
	help: String,
	required: bool,
	requires: Vec<String>,
	forbids: Vec<String>,
	takes_value: bool,
	default_value: Option<String>,
	user_value: Option<TokenValue>,
}

impl Token {
	/// Create `name` token with the given `help` message.
	#[must_use]
	pub fn new(name: &str, help: &str) -> Self {
		Self {
			name: name.to_string(),
			help: help.to_string(),
			..Default::default()
		}
	}

	/// Require that the user must provide this token.
	#[must_use]
	pub fn required(mut self, required: bool) -> Self {
		self.required = required;
		self
	}

	/// Other tokens that must be present when this one is.
	#[must_use]
	pub fn requires(mut self, others: &[&str]) -> Self {
		self.requires = others.iter().map(ToString::to_string).collect();
		self
	}

	/// Other tokens that cannot be present when this one is.
	#[must_use]
	pub fn forbids(mut self, others: &[&str]) -> Self {
		self.forbids = others.iter().map(ToString::to_string).collect();
		self
	}

	/// Make the token take a value instead of being a flag.
	#[must_use]
	pub fn takes_value(mut self, takes_value: bool) -> Self {
		self.takes_value = takes_value;
		self
	}

	/// Value used when the user did not provide one.
	#[must_use]
	pub fn default_value(mut self, value: &str) -> Self {
		self.default_value = Some(value.to_string());
		self
	}

	fn value(&self) -> Option<TokenValue> {
		self.user_value
			.clone()
			.or_else(|| self.default_value.clone().map(TokenValue::Single))
	}

	fn usage(&self) -> String {
		if self.takes_value {
			format!("--{} <{}>", self.name, self.name)
		} else {
			format!("--{}", self.name)
		}
	}
}

/// Simple parser for CLIs. Register the expected [`Token`]s, then
/// [`Parser::parse`] the raw arguments.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct Parser {
	tokens: HashMap<String, Token>,
}

impl Parser {
	/// Create a new instance of [`Self`].
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Add an expected token.
	#[must_use]
	pub fn token(mut self, token: Token) -> Self {
		self.tokens.insert(token.name.clone(), token);
		self
	}

	/// Parse `inputs`, which must not include the binary name.
	///
	/// If `--help` is present everything else is ignored. Otherwise, if
	/// `--version` is present everything else is ignored.
	pub fn parse(&mut self, inputs: &[String]) -> Result<(), ParserError> {
		for special in [HELP_INPUT, VERSION_INPUT] {
			if inputs.iter().any(|i| i == special) {
				let name = &special[INPUT_PREFIX.len()..];
				let mut token = Token::new(name, "");
				token.user_value = Some(TokenValue::Flag);
				self.tokens.insert(name.to_string(), token);
				return Ok(());
			}
		}

		let mut iter = inputs.iter();
		while let Some(input) = iter.next() {
			let name = input
				.strip_prefix(INPUT_PREFIX)
				.ok_or_else(|| ParserError::UnexpectedInput(input.clone()))?;
			let token = self
				.tokens
				.get_mut(name)
				.ok_or_else(|| ParserError::UnexpectedInput(input.clone()))?;
			if token.user_value.is_some() {
				return Err(ParserError::DuplicateInput(input.clone()));
			}

			let value = if token.takes_value {
				let value = iter
					.next()
					.filter(|v| !v.starts_with(INPUT_PREFIX))
					.ok_or_else(|| ParserError::MissingValue(name.into()))?;
				TokenValue::Single(value.clone())
			} else {
				TokenValue::Flag
			};
			token.user_value = Some(value);
		}

		self.check_constraints()
	}

	fn check_constraints(&self) -> Result<(), ParserError> {
		for token in self.tokens.values() {
			if token.user_value.is_none() {
				if token.required {
					return Err(ParserError::MissingInput(token.name.clone()));
				}
				continue;
			}

			for other in &token.requires {
				if !self.is_present(other) {
					return Err(ParserError::MissingInput(other.clone()));
				}
			}

			for other in &token.forbids {
				if self.is_present(other) {
					return Err(ParserError::MutuallyExclusiveInput(
						token.name.clone(),
						other.clone(),
					));
				}
			}
		}

		Ok(())
	}

	fn is_present(&self, name: &str) -> bool {
		self.tokens.get(name).is_some_and(|t| t.user_value.is_some())
	}

	/// Value of a token that takes a value, falling back to its default.
	#[must_use]
	pub fn single(&self, name: &str) -> Option<String> {
		match self.tokens.get(name)?.value()? {
			TokenValue::Single(s) => Some(s),
			TokenValue::Flag => None,
		}
	}

	/// True if the flag `name` was given.
	#[must_use]
	pub fn flag(&self, name: &str) -> bool {
		self.tokens
			.get(name)
			.and_then(Token::value)
			.is_some_and(|v| v == TokenValue::Flag)
	}

	/// `--help` was given.
	#[must_use]
	pub fn help(&self) -> bool {
		self.flag("help")
	}

	/// `--version` was given.
	#[must_use]
	pub fn version(&self) -> bool {
		self.flag("version")
	}

	/// Usage message listing the registered tokens.
	#[must_use]
	pub fn info(&self) -> String {
		let mut tokens: Vec<_> =
			self.tokens.values().filter(|t| !t.help.is_empty()).collect();
		// Required tokens first, then by name.
		tokens.sort_by_key(|t| (!t.required, t.name.clone()));

		let width = tokens.iter().map(|t| t.usage().len()).max().unwrap_or(0);

		tokens
			.into_iter()
			.map(|t| {
				let mut line = format!("\t{:<width$}\t{}", t.usage(), t.help);
				if t.required {
					line.push_str(" [required]");
				}
				if let Some(d) = &t.default_value {
					line.push_str(&format!(" [default: {d}]"));
				}
				line
			})
			.collect::<Vec<_>>()
			.join("\n")
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn args(inputs: &[&str]) -> Vec<String> {
		inputs.iter().map(ToString::to_string).collect()
	}

	fn parser() -> Parser {
		Parser::new()
			.token(Token::new("port", "port to use").takes_value(true))
			.token(
				Token::new("host", "host to connect to")
					.takes_value(true)
					.requires(&["port"])
					.forbids(&["listen"]),
			)
			.token(Token::new("listen", "listen instead of connecting"))
			.token(
				Token::new("message", "what to send")
					.takes_value(true)
					.default_value("ping"),
			)
	}

	#[test]
	fn parses_values_and_flags() {
		let mut p = parser();
		p.parse(&args(&["--port", "80", "--listen"])).unwrap();

		assert_eq!(p.single("port"), Some("80".to_string()));
		assert!(p.flag("listen"));
		assert!(!p.help());
	}

	#[test]
	fn default_value_is_used_when_missing() {
		let mut p = parser();
		p.parse(&args(&["--port", "80"])).unwrap();

		assert_eq!(p.single("message"), Some("ping".to_string()));
		assert_eq!(p.single("host"), None);
	}

	#[test]
	fn help_short_circuits() {
		let mut p = parser();
		p.parse(&args(&["--bogus", "--help"])).unwrap();

		assert!(p.help());
		assert!(p.info().contains("--host <host>"));
	}

	#[test]
	fn version_short_circuits() {
		let mut p = parser();
		p.parse(&args(&["--version", "--port"])).unwrap();

		assert!(p.version());
	}

	#[test]
	fn unexpected_input_is_rejected() {
		let mut p = parser();

		assert_eq!(
			p.parse(&args(&["durp"])),
			Err(ParserError::UnexpectedInput("durp".to_string()))
		);
		assert_eq!(
			parser().parse(&args(&["--durp"])),
			Err(ParserError::UnexpectedInput("--durp".to_string()))
		);
	}

	#[test]
	fn missing_value_is_rejected() {
		assert_eq!(
			parser().parse(&args(&["--port", "--listen"])),
			Err(ParserError::MissingValue("port".to_string()))
		);
	}

	#[test]
	fn duplicate_input_is_rejected() {
		assert_eq!(
			parser().parse(&args(&["--port", "1", "--port", "2"])),
			Err(ParserError::DuplicateInput("--port".to_string()))
		);
	}

	#[test]
	fn constraints_are_checked() {
		assert_eq!(
			parser().parse(&args(&["--host", "localhost"])),
			Err(ParserError::MissingInput("port".to_string()))
		);
		let input = args(&["--host", "localhost", "--port", "1", "--listen"]);
		assert_eq!(
			parser().parse(&input),
			Err(ParserError::MutuallyExclusiveInput(
				"host".to_string(),
				"listen".to_string()
			))
		);
	}

	#[test]
	fn required_token_must_be_present() {
		let mut p = Parser::new()
			.token(Token::new("port", "port").takes_value(true).required(true));

		assert_eq!(
			p.parse(&[]),
			Err(ParserError::MissingInput("port".to_string()))
		);
	}
}
