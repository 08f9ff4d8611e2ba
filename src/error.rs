//! Error taxonomy for request handling.
//!
//! Protocol failures stay local to the session that produced them: the
//! session answers `error` and keeps the connection open. Nothing in here
//! is ever allowed to tear down the listener or a sibling session.

use std::fmt;

/// A request line that could not be decoded.
#[derive(Debug)]
pub enum ProtocolError {
    /// Payload was not valid JSON.
    InvalidJson(serde_json::Error),
    /// Payload parsed but did not carry the expected `args` shape.
    ArgsShape { verb: &'static str, expected: &'static str },
    /// A verb that takes a payload arrived without one.
    MissingPayload(&'static str),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::InvalidJson(e) => write!(f, "invalid JSON payload: {}", e),
            ProtocolError::ArgsShape { verb, expected } => {
                write!(f, "{} payload must be {}", verb, expected)
            }
            ProtocolError::MissingPayload(verb) => {
                write!(f, "{} requires a JSON payload", verb)
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        ProtocolError::InvalidJson(e)
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    Io(std::io::Error),
    /// Config file was not valid TOML.
    Parse(toml::de::Error),
    /// A rate transformer references a counter field that does not exist
    /// in partition samples.
    UnknownCounterField { metric: String, field: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "failed to parse config file: {}", e),
            ConfigError::UnknownCounterField { metric, field } => {
                write!(
                    f,
                    "rate transformer for '{}' references unknown counter field '{}'",
                    metric, field
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}
