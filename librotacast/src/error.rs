//! Error types for Rotacast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RotacastError>;

/// Result type returned across the publish boundary
pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

#[derive(Error, Debug)]
pub enum RotacastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl RotacastError {
    /// Returns the appropriate exit code for this error
    ///
    /// Anything that stops the daemon from starting (bad config, unreadable
    /// ledger, rejected credentials) exits with 2.
    pub fn exit_code(&self) -> i32 {
        match self {
            RotacastError::InvalidInput(_) => 3,
            RotacastError::Config(_) => 2,
            RotacastError::Ledger(LedgerError::Read(_))
            | RotacastError::Ledger(LedgerError::Malformed { .. })
            | RotacastError::Ledger(LedgerError::UnsupportedVersion(_)) => 2,
            RotacastError::Platform(PlatformError::Authentication(_)) => 2,
            RotacastError::Ledger(_) => 1,
            RotacastError::Format(_) => 1,
            RotacastError::Platform(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Failed to read ledger file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Malformed ledger file {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("Ledger version {0} is newer than this build supports")]
    UnsupportedVersion(u32),

    #[error("Failed to persist ledger: {0}")]
    Persist(String),
}

/// Per-item failures while scanning the content directory
#[derive(Error, Debug)]
pub enum ContentError {
    #[error("Failed to read {0}: {1}")]
    Read(String, String),

    #[error("{0} is not valid UTF-8")]
    Utf8(String),

    #[error("{0} is empty")]
    Empty(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error(
        "Length budget too small: max_length {max_length} leaves {available} characters \
         for content, at least 3 are needed for the ellipsis"
    )]
    BudgetTooSmall { max_length: usize, available: i64 },
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Post rejected: {0}")]
    Rejected(String),
}

impl PlatformError {
    /// Short machine-friendly name of the failure kind, used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            PlatformError::Authentication(_) => "auth",
            PlatformError::RateLimit(_) => "rate_limited",
            PlatformError::Network(_) => "network",
            PlatformError::Rejected(_) => "rejected",
        }
    }

    /// Whether the same post could succeed on a later cycle without changes
    pub fn is_transient(&self) -> bool {
        matches!(self, PlatformError::Network(_) | PlatformError::RateLimit(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = RotacastError::InvalidInput("Empty content".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_startup_failures() {
        let config = RotacastError::Config(ConfigError::MissingField("ledger.path".to_string()));
        assert_eq!(config.exit_code(), 2);

        let malformed = RotacastError::Ledger(LedgerError::Malformed {
            path: "history.json".to_string(),
            reason: "expected value at line 1".to_string(),
        });
        assert_eq!(malformed.exit_code(), 2);

        let unreadable = RotacastError::Ledger(LedgerError::Read(std::io::Error::from(
            std::io::ErrorKind::PermissionDenied,
        )));
        assert_eq!(unreadable.exit_code(), 2);

        let auth = RotacastError::Platform(PlatformError::Authentication("bad token".to_string()));
        assert_eq!(auth.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_runtime_failures() {
        let persist = RotacastError::Ledger(LedgerError::Persist("disk full".to_string()));
        assert_eq!(persist.exit_code(), 1);

        let network = RotacastError::Platform(PlatformError::Network("timeout".to_string()));
        assert_eq!(network.exit_code(), 1);

        let format = RotacastError::Format(FormatError::BudgetTooSmall {
            max_length: 4,
            available: 0,
        });
        assert_eq!(format.exit_code(), 1);
    }

    #[test]
    fn test_error_message_formatting() {
        let error = RotacastError::Platform(PlatformError::Rejected("duplicate status".to_string()));
        assert_eq!(
            error.to_string(),
            "Platform error: Post rejected: duplicate status"
        );

        let error = RotacastError::Config(ConfigError::Invalid {
            field: "format.max_length".to_string(),
            reason: "must be greater than zero".to_string(),
        });
        assert_eq!(
            error.to_string(),
            "Configuration error: Invalid value for format.max_length: must be greater than zero"
        );
    }

    #[test]
    fn test_budget_error_mentions_numbers() {
        let error = FormatError::BudgetTooSmall {
            max_length: 10,
            available: -4,
        };
        let message = error.to_string();
        assert!(message.contains("max_length 10"));
        assert!(message.contains("-4"));
    }

    #[test]
    fn test_platform_error_kinds() {
        assert_eq!(PlatformError::Authentication("x".into()).kind(), "auth");
        assert_eq!(PlatformError::RateLimit("x".into()).kind(), "rate_limited");
        assert_eq!(PlatformError::Network("x".into()).kind(), "network");
        assert_eq!(PlatformError::Rejected("x".into()).kind(), "rejected");
    }

    #[test]
    fn test_transient_classification() {
        assert!(PlatformError::Network("x".into()).is_transient());
        assert!(PlatformError::RateLimit("x".into()).is_transient());
        assert!(!PlatformError::Authentication("x".into()).is_transient());
        assert!(!PlatformError::Rejected("x".into()).is_transient());
    }

    #[test]
    fn test_error_conversion_from_ledger_error() {
        let ledger_error = LedgerError::Persist("test".to_string());
        let error: RotacastError = ledger_error.into();

        match error {
            RotacastError::Ledger(_) => {}
            _ => panic!("Expected RotacastError::Ledger"),
        }
    }

    #[test]
    fn test_platform_error_clone() {
        let original = PlatformError::Network("Connection failed".to_string());
        let cloned = original.clone();

        assert_eq!(format!("{}", original), format!("{}", cloned));
    }
}
