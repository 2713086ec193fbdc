//! Error types for the dedup core.
//!
//! Errors are classified by recoverability:
//! - Recoverable: bad phone input, bad credentials, name conflicts
//! - Fatal to the request: authorization failures, corrupted ciphertext
//! - Infrastructure: storage and configuration failures

use thiserror::Error;

use crate::db::DbError;

/// Raw phone input that cannot be canonicalized. The caller re-prompts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidPhoneError {
    #[error("Phone number is empty")]
    Empty,

    #[error("Phone number must contain 4 to 11 digits, found {0}")]
    DigitCount(usize),

    #[error("Phone number contains non-ASCII digits")]
    NonAsciiDigits,
}

/// The acting or submitting user is not allowed to do what was asked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("User not found: {0}")]
    UnknownUser(String),

    #[error("User is inactive: {0}")]
    Inactive(String),

    #[error("User {0} is not an operator")]
    NotOperator(String),

    #[error("Operator {0} has no owning admin")]
    MissingAdmin(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

/// Login rejected. Deliberately carries no detail so usernames can't be probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid username or password")]
pub struct AuthenticationFailure;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("Phone encryption failed")]
    Encryption,

    /// Tampered, truncated, or foreign-key ciphertext.
    #[error("Ciphertext could not be decrypted")]
    Decryption,

    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),
}

/// Errors surfaced by a [`crate::store::LeadStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Db(DbError::Sqlite(err))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to read config at {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unknown time zone: {0}")]
    TimeZone(String),
}

/// Umbrella error returned by every public operation of the core.
#[derive(Debug, Error)]
pub enum LeadError {
    #[error(transparent)]
    InvalidPhone(#[from] InvalidPhoneError),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error(transparent)]
    Authentication(#[from] AuthenticationFailure),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<DbError> for LeadError {
    fn from(err: DbError) -> Self {
        LeadError::Store(StoreError::Db(err))
    }
}

impl LeadError {
    /// True when the caller can fix the request and try again.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LeadError::InvalidPhone(_)
                | LeadError::Authentication(_)
                | LeadError::InvalidInput(_)
                | LeadError::Store(StoreError::Conflict(_))
        )
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            LeadError::InvalidPhone(_) | LeadError::InvalidInput(_) => ErrorType::InvalidInput,
            LeadError::Authentication(_) => ErrorType::Unauthenticated,
            LeadError::Authorization(_) => ErrorType::Forbidden,
            LeadError::Store(StoreError::Conflict(_)) => ErrorType::Conflict,
            LeadError::Store(StoreError::NotFound(_)) => ErrorType::NotFound,
            LeadError::Crypto(_) | LeadError::Store(_) | LeadError::Config(_) => {
                ErrorType::Internal
            }
        }
    }

    /// Get a user-facing recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            LeadError::InvalidPhone(_) => "Enter a phone number with 4 to 11 digits.",
            LeadError::Authentication(_) => "Check your username and password and try again.",
            LeadError::Authorization(_) => "Ask an administrator for access.",
            LeadError::InvalidInput(_) => "Correct the highlighted fields and try again.",
            LeadError::Store(StoreError::Conflict(_)) => "Choose a different name.",
            LeadError::Store(StoreError::NotFound(_)) => "Refresh the list and try again.",
            LeadError::Crypto(_) => "Stored data could not be read. Check the encryption key.",
            LeadError::Store(_) => "Check database permissions and disk space.",
            LeadError::Config(_) => "Check your configuration in ~/.leadguard/config.json",
        }
    }
}

/// Serializable error representation for the presentation layer.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub message: String,
    pub error_type: ErrorType,
    pub can_retry: bool,
    pub recovery_suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorType {
    InvalidInput,
    Unauthenticated,
    Forbidden,
    Conflict,
    NotFound,
    Internal,
}

impl From<&LeadError> for ErrorPayload {
    fn from(err: &LeadError) -> Self {
        // Internal details stay in the log, not in the payload.
        let message = match err.error_type() {
            ErrorType::Internal => "Internal error".to_string(),
            _ => err.to_string(),
        };
        ErrorPayload {
            message,
            error_type: err.error_type(),
            can_retry: err.is_recoverable(),
            recovery_suggestion: err.recovery_suggestion().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_failure_message_is_generic() {
        let err = LeadError::from(AuthenticationFailure);
        assert_eq!(err.to_string(), "Invalid username or password");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_payload_hides_internal_detail() {
        let err = LeadError::from(CryptoError::Decryption);
        let payload = ErrorPayload::from(&err);
        assert_eq!(payload.error_type, ErrorType::Internal);
        assert_eq!(payload.message, "Internal error");
        assert!(!payload.can_retry);
    }

    #[test]
    fn test_payload_serializes_camel_case() {
        let err = LeadError::from(InvalidPhoneError::DigitCount(2));
        let json = serde_json::to_value(ErrorPayload::from(&err)).unwrap();
        assert_eq!(json["errorType"], "invalidInput");
        assert_eq!(json["canRetry"], true);
        assert!(json["message"].as_str().unwrap().contains("found 2"));
    }

    #[test]
    fn test_authorization_is_not_recoverable() {
        let err = LeadError::from(AuthorizationError::NotOperator("u1".into()));
        assert!(!err.is_recoverable());
        assert_eq!(err.error_type(), ErrorType::Forbidden);
    }
}
