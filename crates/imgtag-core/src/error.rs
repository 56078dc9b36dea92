//! Error types for imgtag
//!
//! Every failure a resolution call can produce maps onto one [`ErrorKind`].
//! Each variant names the image or input it concerns and carries the wrapped
//! cause rendered with its full context chain, so callers can log a single
//! line without walking `source()`.

use thiserror::Error;

/// Result type alias using imgtag-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Externally distinguishable failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidPlatform,
    InvalidReference,
    InvalidConstraint,
    CredentialsNotFound,
    TagFetchFailed,
    NoSuitableVersion,
    Cancelled,
    DeadlineExceeded,
    Config,
}

/// Resolution errors
#[derive(Error, Debug)]
pub enum Error {
    /// Platform string is not `os/arch[/variant]` or uses unknown tokens
    #[error("error parsing platform {platform:?}: {reason}")]
    InvalidPlatform { platform: String, reason: String },

    /// Repository reference could not be parsed
    #[error("error parsing image reference {reference:?}: {reason}")]
    InvalidReference { reference: String, reason: String },

    /// Version constraint, allow pattern or ignore pattern is malformed
    #[error("invalid update constraint for image {image:?}: {reason}")]
    InvalidConstraint { image: String, reason: String },

    /// Named or implicit credential lookup failed
    #[error("error getting credentials for image {image:?}: {reason}")]
    CredentialsNotFound { image: String, reason: String },

    /// Registry call failed (network, auth, missing repository)
    #[error("error fetching tags for image {image:?}: {reason}")]
    TagFetchFailed { image: String, reason: String },

    /// Tags were listed but none satisfied the strategy
    #[error("found no suitable version of image {image:?} (constraint {constraint:?}): {reason}")]
    NoSuitableVersion {
        image: String,
        constraint: String,
        reason: String,
    },

    /// Caller cancelled the operation
    #[error("resolution of image {image:?} cancelled during {stage}")]
    Cancelled { image: String, stage: String },

    /// Caller deadline elapsed
    #[error("resolution of image {image:?} exceeded its deadline during {stage}")]
    DeadlineExceeded { image: String, stage: String },

    /// Configuration could not be loaded
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl Error {
    /// The kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPlatform { .. } => ErrorKind::InvalidPlatform,
            Self::InvalidReference { .. } => ErrorKind::InvalidReference,
            Self::InvalidConstraint { .. } => ErrorKind::InvalidConstraint,
            Self::CredentialsNotFound { .. } => ErrorKind::CredentialsNotFound,
            Self::TagFetchFailed { .. } => ErrorKind::TagFetchFailed,
            Self::NoSuitableVersion { .. } => ErrorKind::NoSuitableVersion,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
            Self::Config { .. } => ErrorKind::Config,
        }
    }

    /// Whether the same call may succeed later without the caller changing its input
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::CredentialsNotFound
                | ErrorKind::TagFetchFailed
                | ErrorKind::NoSuitableVersion
                | ErrorKind::DeadlineExceeded
        )
    }

    /// Create an invalid platform error
    pub fn invalid_platform(platform: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPlatform {
            platform: platform.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid reference error
    pub fn invalid_reference(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidReference {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid constraint error
    pub fn invalid_constraint(image: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConstraint {
            image: image.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a credential lookup failure
    pub fn credentials_not_found(image: impl Into<String>, cause: &anyhow::Error) -> Self {
        Self::CredentialsNotFound {
            image: image.into(),
            reason: format!("{cause:#}"),
        }
    }

    /// Wrap a registry failure
    pub fn tag_fetch_failed(image: impl Into<String>, cause: &anyhow::Error) -> Self {
        Self::TagFetchFailed {
            image: image.into(),
            reason: format!("{cause:#}"),
        }
    }

    /// Create a no-suitable-version error
    pub fn no_suitable_version(
        image: impl Into<String>,
        constraint: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::NoSuitableVersion {
            image: image.into(),
            constraint: constraint.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
