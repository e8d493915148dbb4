//! Error types for the Formwork stack manager.
//!
//! This module provides the error taxonomy for all operations in the stack
//! lifecycle: configuration, template handling, parameter resolution, the
//! provisioning API boundary, and stack operations themselves.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for Formwork operations.
#[derive(Debug, Error)]
pub enum FormworkError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Template-related errors.
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Parameter resolution errors.
    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),

    /// Stack operation errors.
    #[error("{0}")]
    Stack(#[from] StackError),

    /// Provisioning API errors.
    #[error("Provisioning API error: {0}")]
    Remote(#[from] RemoteError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The region configuration file was not found.
    #[error("Region configuration not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration {path}: {message}")]
    ParseError {
        /// Path of the file that failed to parse.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// A stack was looked up that the region does not declare.
    #[error("Stack '{name}' is not declared in the region configuration")]
    StackUndeclared {
        /// The requested stack name (post-prefix).
        name: String,
    },

    /// Two declared stacks collide after prefixing.
    #[error("Duplicate stack name after prefixing: {name}")]
    DuplicateStack {
        /// The duplicated name.
        name: String,
    },
}

/// Template-related errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// No template file exists for the stack.
    #[error("No template found for '{name}' under {searched}")]
    DoesNotExist {
        /// Template name (filename stem).
        name: String,
        /// Directory that was searched.
        searched: PathBuf,
    },

    /// The template file failed to parse.
    #[error("Syntax error(s) in template.\n{path}:\n{detail}")]
    Syntax {
        /// Path of the unparsable template.
        path: PathBuf,
        /// Parser detail, including position information.
        detail: String,
    },
}

/// Parameter resolution errors.
#[derive(Debug, Error)]
pub enum ParameterError {
    /// A reference value could not be resolved.
    #[error("Failed to resolve reference {reference}: {cause}")]
    Resolution {
        /// Rendering of the original reference value.
        reference: String,
        /// The underlying failure.
        cause: String,
    },

    /// A reference names a resolver kind that is not registered.
    #[error("Unsupported reference kind: {kind}")]
    UnsupportedReferenceKind {
        /// The unrecognized top-level key.
        kind: String,
    },

    /// A reference mapping has an invalid shape.
    #[error("Malformed reference value: {detail}")]
    MalformedReference {
        /// What is wrong with the shape.
        detail: String,
    },

    /// The target stack does not expose the requested output.
    #[error("Stack '{stack}' has no output named '{output}'")]
    MissingOutput {
        /// The target stack name.
        stack: String,
        /// The missing output key.
        output: String,
    },
}

/// Stack operation errors.
#[derive(Debug, Error)]
pub enum StackError {
    /// The remote stack does not exist.
    #[error("{message}")]
    DoesNotExist {
        /// Message from the provisioning API.
        message: String,
    },

    /// Required parameters are unresolved.
    #[error("Required parameters missing: {}", names.join(", "))]
    MissingParameters {
        /// The unresolved parameter names.
        names: Vec<String>,
    },

    /// An update would apply no changes.
    #[error("{message}")]
    UpToDate {
        /// Message from the provisioning API.
        message: String,
    },

    /// A destructive change was blocked, or a rollback was caused by a
    /// stack policy violation.
    #[error("Stack policy violation: {reason}")]
    PolicyViolation {
        /// The blocked change or rollback reason.
        reason: String,
    },

    /// The change set never became describable within the retry budget.
    #[error("Change set was still empty after {attempts} attempts")]
    ChangeSetUnavailable {
        /// Number of attempts made.
        attempts: u32,
    },

    /// Unclassified remote validation failure.
    #[error("{message}")]
    Remote {
        /// Message from the provisioning API.
        message: String,
    },
}

/// Provisioning API errors.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The API rejected the request with a validation error.
    #[error("{message}")]
    Validation {
        /// The service error message, preserved verbatim for
        /// substring-based classification upstream.
        message: String,
    },

    /// Any other API failure (network, throttling, server-side).
    #[error("{message}")]
    Api {
        /// Description of the failure.
        message: String,
    },
}

/// Result type alias for Formwork operations.
pub type Result<T> = std::result::Result<T, FormworkError>;

impl FormworkError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is a per-stack operational failure.
    ///
    /// Operational failures are logged at the per-stack boundary and the
    /// invocation continues to the next declared stack. Everything else
    /// (configuration errors, template errors, resolution crashes) is fatal
    /// to the whole invocation.
    #[must_use]
    pub const fn is_operational(&self) -> bool {
        matches!(
            self,
            Self::Stack(_) | Self::Remote(RemoteError::Validation { .. })
        )
    }
}

impl StackError {
    /// Classifies a remote validation-error message.
    ///
    /// The provisioning API distinguishes "stack absent" and "nothing to
    /// update" only by message text, so the ordered substring rules live
    /// here, in one place.
    #[must_use]
    pub fn classify_validation(message: &str) -> Self {
        if message.contains("does not exist") {
            Self::DoesNotExist {
                message: message.to_string(),
            }
        } else if message.contains("No updates") {
            Self::UpToDate {
                message: message.to_string(),
            }
        } else {
            Self::Remote {
                message: message.to_string(),
            }
        }
    }
}

impl RemoteError {
    /// Creates a generic API error.
    #[must_use]
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }
}
