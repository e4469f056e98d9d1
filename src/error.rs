//! Error types for mb.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for mb operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MbError {
    /// A mutex was built without a recognized resource kind.
    #[error("Must pass a valid lock type ({0})")]
    InvalidLockType(String),

    /// The resource is locked by another client.
    #[error("{0}")]
    ResourceLocked(String),

    /// The validator key needed for a full bootstrap is missing.
    #[error(
        "validator key not found at '{0}'\n\
         Fix: set `chef.validator_path` in your config to the organization's validator pem."
    )]
    ValidatorNotFound(String),

    /// Placing a file on a remote host failed.
    #[error("{0}")]
    RemoteFileCopy(String),

    /// A command run on a remote host failed.
    #[error("{0}")]
    RemoteCommand(String),

    /// The remote lock store could not be read or written.
    #[error("Lock store error: {0}")]
    Store(String),

    /// The job was asked to stop before its work finished.
    #[error("incomplete: {0}")]
    JobTerminated(String),

    /// A coordination actor is no longer running.
    #[error("{0} is not running")]
    ActorStopped(&'static str),

    /// Configuration could not be loaded or is invalid.
    #[error("{0}")]
    Config(String),

    /// User provided invalid arguments or the system is in an invalid state.
    #[error("{0}")]
    UserError(String),
}

impl MbError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            MbError::InvalidLockType(_) => exit_codes::USER_ERROR,
            MbError::ResourceLocked(_) => exit_codes::LOCK_FAILURE,
            MbError::ValidatorNotFound(_) => exit_codes::USER_ERROR,
            MbError::RemoteFileCopy(_) => exit_codes::REMOTE_FAILURE,
            MbError::RemoteCommand(_) => exit_codes::REMOTE_FAILURE,
            MbError::Store(_) => exit_codes::STORE_FAILURE,
            MbError::JobTerminated(_) => exit_codes::REMOTE_FAILURE,
            MbError::ActorStopped(_) => exit_codes::USER_ERROR,
            MbError::Config(_) => exit_codes::USER_ERROR,
            MbError::UserError(_) => exit_codes::USER_ERROR,
        }
    }
}

/// Result type alias for mb operations.
pub type Result<T> = std::result::Result<T, MbError>;
