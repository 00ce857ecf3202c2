use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every way a single invocation can fail. The CLI maps each variant to an
/// exit code; nothing is retried.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad or missing arguments, including a missing default address.
    #[error("{0}")]
    Usage(String),

    /// The config file exists but could not be read, parsed or written.
    #[error("config file {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    /// The request never produced an HTTP response (DNS, refused, TLS, ...).
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// The provider answered, but not with something usable.
    #[error("provider error{}: {message}", status_suffix(.status))]
    Provider { status: Option<u16>, message: String },

    #[error("{what} not found: {name}")]
    NotFound { what: &'static str, name: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl Error {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Provider { status: None, message: message.into() }
    }

    pub fn not_found(what: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound { what, name: name.into() }
    }

    pub(crate) fn config(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Config { path: path.into(), message: err.to_string() }
    }

    /// Process exit code for this error: 1 usage, 2 provider side, 3 config.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Usage(_) => 1,
            Error::Network(_) | Error::Timeout(_) | Error::Provider { .. } | Error::NotFound { .. } => 2,
            Error::Config { .. } => 3,
        }
    }

    /// Optional follow-up line for humans.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Error::NotFound { what: "city", .. } => {
                Some("Use `outage-checker list-cities` to see available cities.")
            }
            Error::NotFound { what: "street", .. } => {
                Some("Use `outage-checker list-streets <CITY>` to verify the street name.")
            }
            Error::NotFound { what: "house", .. } => {
                Some("Use `outage-checker list-houses <CITY> <STREET>` to verify the house number.")
            }
            Error::Network(_) | Error::Timeout(_) => Some("Check your internet connection and try again."),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_taxonomy() {
        assert_eq!(Error::usage("x").exit_code(), 1);
        assert_eq!(Error::Network("refused".into()).exit_code(), 2);
        assert_eq!(Error::Timeout(30).exit_code(), 2);
        assert_eq!(Error::malformed("bad json").exit_code(), 2);
        assert_eq!(Error::not_found("city", "Atlantis").exit_code(), 2);
        assert_eq!(Error::config("/tmp/c.toml", "boom").exit_code(), 3);
    }

    #[test]
    fn provider_error_message_includes_status_when_known() {
        let err = Error::Provider { status: Some(503), message: "unavailable".into() };
        assert_eq!(err.to_string(), "provider error (HTTP 503): unavailable");

        assert_eq!(Error::malformed("bad json").to_string(), "provider error: bad json");
    }

    #[test]
    fn not_found_has_hint() {
        let err = Error::not_found("city", "Atlantis");
        assert_eq!(err.to_string(), "city not found: Atlantis");
        assert!(err.hint().unwrap().contains("list-cities"));
    }
}
