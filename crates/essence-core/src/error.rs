use std::fmt;
use std::time::Duration;

use crate::model::RecipeStep;

/// Machine-readable error codes surfaced by the CLI and the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    ValidationFailed,
    InvalidStateTransition,
    UpstreamFailed,
    MalformedResponse,
    UpstreamTimeout,
    NetworkUnavailable,
    StorageFailed,
    LockContention,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1002",
            Self::ValidationFailed => "E1101",
            Self::InvalidStateTransition => "E2002",
            Self::UpstreamFailed => "E3001",
            Self::MalformedResponse => "E3002",
            Self::UpstreamTimeout => "E3003",
            Self::NetworkUnavailable => "E3004",
            Self::StorageFailed => "E5001",
            Self::LockContention => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::ValidationFailed => "Invalid wizard input",
            Self::InvalidStateTransition => "Step is not reachable yet",
            Self::UpstreamFailed => "Recipe service returned an error",
            Self::MalformedResponse => "Recipe service response was malformed",
            Self::UpstreamTimeout => "Recipe service timed out",
            Self::NetworkUnavailable => "Recipe service unreachable",
            Self::StorageFailed => "Draft storage failed",
            Self::LockContention => "Lock contention",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .essence/config.toml and retry."),
            Self::ValidationFailed => None,
            Self::InvalidStateTransition => {
                Some("Complete the earlier steps: concern -> demographics -> causes -> symptoms.")
            }
            Self::UpstreamFailed => Some("Retry later. The webhook may be overloaded."),
            Self::MalformedResponse => Some("Check that the webhook returns the recipe JSON contract."),
            Self::UpstreamTimeout => Some("Increase webhook.timeout_ms or retry later."),
            Self::NetworkUnavailable => Some("Check webhook.url and network connectivity."),
            Self::StorageFailed => Some("Check disk space and permissions of the storage directory."),
            Self::LockContention => Some("Retry after the other `ess` process releases its lock."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }

    /// HTTP status the proxy answers with for this code.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::ValidationFailed | Self::InvalidStateTransition => 400,
            Self::UpstreamFailed | Self::MalformedResponse | Self::NetworkUnavailable => 502,
            Self::UpstreamTimeout => 504,
            Self::LockContention => 503,
            Self::ConfigParseError | Self::StorageFailed | Self::InternalUnexpected => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// The single typed error crossing the service boundary.
#[derive(Debug, thiserror::Error)]
pub enum RecipeError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("cannot move from {from} to {to}: {reason}")]
    InvalidTransition {
        from: RecipeStep,
        to: RecipeStep,
        reason: &'static str,
    },

    #[error("recipe service returned HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("recipe service response was malformed: {0}")]
    MalformedResponse(String),

    #[error("recipe service did not answer within {0:?}")]
    Timeout(Duration),

    #[error("recipe service unreachable: {0}")]
    Network(String),

    #[error("storage: {0}")]
    Storage(String),

    #[error("storage lock timed out after {0:?}")]
    LockTimeout(Duration),

    #[error("config: {0}")]
    Config(String),
}

impl RecipeError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } => ErrorCode::ValidationFailed,
            Self::InvalidTransition { .. } => ErrorCode::InvalidStateTransition,
            Self::Upstream { .. } => ErrorCode::UpstreamFailed,
            Self::MalformedResponse(_) => ErrorCode::MalformedResponse,
            Self::Timeout(_) => ErrorCode::UpstreamTimeout,
            Self::Network(_) => ErrorCode::NetworkUnavailable,
            Self::Storage(_) => ErrorCode::StorageFailed,
            Self::LockTimeout(_) => ErrorCode::LockContention,
            Self::Config(_) => ErrorCode::ConfigParseError,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

impl From<std::io::Error> for RecipeError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorCode, RecipeError};
    use std::collections::HashSet;
    use std::time::Duration;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::ConfigParseError,
            ErrorCode::ValidationFailed,
            ErrorCode::InvalidStateTransition,
            ErrorCode::UpstreamFailed,
            ErrorCode::MalformedResponse,
            ErrorCode::UpstreamTimeout,
            ErrorCode::NetworkUnavailable,
            ErrorCode::StorageFailed,
            ErrorCode::LockContention,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::UpstreamTimeout.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn timeout_is_distinct_from_upstream() {
        let timeout = RecipeError::Timeout(Duration::from_secs(3));
        let upstream = RecipeError::Upstream {
            status: 503,
            message: "busy".into(),
        };
        assert_eq!(timeout.code().http_status(), 504);
        assert_eq!(upstream.code().http_status(), 502);
        assert_ne!(timeout.code(), upstream.code());
    }
}
