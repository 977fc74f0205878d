//! Error types for dashboard deployment.
//!
//! Errors are categorized so callers can tell authoring mistakes in the
//! definition files apart from remote service failures, and so the state
//! store can recognize the "not found" condition that signals a fresh install.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for dashkit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error code the remote service uses for missing objects.
pub const RESOURCE_DOES_NOT_EXIST: &str = "RESOURCE_DOES_NOT_EXIST";

/// Categories of dashkit errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Mistake in a definition file (fatal, fix the file).
    Definition,
    /// Remote object does not exist.
    NotFound,
    /// Remote service rejected the request.
    Remote,
    /// Transport-level failure.
    Network,
    /// Response or payload could not be decoded.
    Format,
    /// Local filesystem failure.
    Io,
    /// Missing or inconsistent configuration.
    Config,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Definition => "Invalid dashboard definition",
            Self::NotFound => "Remote object not found",
            Self::Remote => "Remote service error",
            Self::Network => "Network connectivity issue",
            Self::Format => "Invalid data format",
            Self::Io => "Filesystem error",
            Self::Config => "Configuration error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Definition => "Fix the magic comments in the reported query file",
            Self::NotFound => "The object may have been deleted outside of sqldash",
            Self::Remote => "Check permissions on the remote folder and warehouse",
            Self::Network => "Check your connection and the configured host",
            Self::Format => "The remote response or state file may be corrupted",
            Self::Io => "Check that the local folder exists and is readable",
            Self::Config => "Check config.toml and command-line overrides",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while loading, validating or deploying dashboards.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Visualization type is not one of the supported kinds.
    #[error("unknown viz type: {0}")]
    UnknownVizType(String),

    /// A builder was called without one of its required arguments.
    #[error("{builder}: missing required argument `{argument}`")]
    MissingArgument {
        /// Builder name (viz kind).
        builder: &'static str,
        /// Argument name.
        argument: &'static str,
    },

    /// A builder was called with an argument it does not accept.
    #[error("{builder}: got an unexpected argument `{argument}`")]
    UnexpectedArgument {
        /// Builder name (viz kind).
        builder: &'static str,
        /// Argument name.
        argument: String,
    },

    /// An argument value could not be converted to the expected type.
    #[error("invalid value `{value}` for `{argument}`: expected {expected}")]
    InvalidArgument {
        /// Argument name.
        argument: String,
        /// Raw value from the definition file.
        value: String,
        /// Expected type.
        expected: &'static str,
    },

    /// A definition file lacks one of the magic comment lines.
    #[error("{}: cannot find \"{marker}\" magic comment", .path.display())]
    MissingMagicComment {
        /// Definition file.
        path: PathBuf,
        /// Missing line prefix.
        marker: &'static str,
    },

    /// A magic comment attribute is not a `key=value` pair.
    #[error("{}: malformed attribute `{attribute}`", .path.display())]
    MalformedAttribute {
        /// Definition file.
        path: PathBuf,
        /// Offending attribute text.
        attribute: String,
    },

    /// State key does not follow the `ref:kind` grammar.
    #[error("invalid state key: {0}")]
    InvalidStateKey(String),

    /// Definition error annotated with the offending query.
    #[error("Error in {group}/{query}: {source}")]
    Definition {
        /// Artifact group reference.
        group: String,
        /// Query (file) name.
        query: String,
        /// Underlying error.
        #[source]
        source: Box<Error>,
    },

    /// Every definition error found by a validation pass.
    #[error("{} invalid query definition(s)", .0.len())]
    Validation(Vec<Error>),

    /// The remote service returned an error payload.
    #[error("{error_code}: {message}")]
    Api {
        /// Service error code (e.g. `RESOURCE_DOES_NOT_EXIST`).
        error_code: String,
        /// Service error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// HTTP request failed before a response was decoded.
    #[error("HTTP request failed: {message}")]
    Http {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// No warehouse configured and none available remotely.
    #[error("need either configured warehouse_id or an existing SQL warehouse")]
    NoWarehouse,

    /// The chosen warehouse has no data source.
    #[error("no data source for warehouse {0}")]
    UnknownDataSource(String),

    /// IO error during file operations.
    #[error("IO error at {}: {source}", .path.display())]
    Io {
        /// Path involved in the error.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// JSON encoding or decoding failed.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an API error.
    pub fn api(
        error_code: impl Into<String>,
        message: impl Into<String>,
        status: Option<u16>,
    ) -> Self {
        Self::Api {
            error_code: error_code.into(),
            message: message.into(),
            status,
        }
    }

    /// Create the error the service returns for a missing object.
    pub fn not_found(what: impl fmt::Display) -> Self {
        Self::api(RESOURCE_DOES_NOT_EXIST, format!("{what} does not exist"), Some(404))
    }

    /// Annotate a definition error with the query it belongs to.
    pub fn in_query(self, group: impl Into<String>, query: impl Into<String>) -> Self {
        Self::Definition {
            group: group.into(),
            query: query.into(),
            source: Box::new(self),
        }
    }

    /// Error code reported by the remote service, if any.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Error::Api { error_code, .. } => Some(error_code),
            _ => None,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::UnknownVizType(_)
            | Error::MissingArgument { .. }
            | Error::UnexpectedArgument { .. }
            | Error::InvalidArgument { .. }
            | Error::MissingMagicComment { .. }
            | Error::MalformedAttribute { .. }
            | Error::Definition { .. }
            | Error::Validation(_) => ErrorCategory::Definition,
            Error::Api {
                error_code, status, ..
            } => {
                if error_code == RESOURCE_DOES_NOT_EXIST || *status == Some(404) {
                    ErrorCategory::NotFound
                } else {
                    ErrorCategory::Remote
                }
            }
            Error::Http { status, .. } => {
                if *status == Some(404) {
                    ErrorCategory::NotFound
                } else {
                    ErrorCategory::Network
                }
            }
            Error::InvalidStateKey(_) | Error::Json(_) => ErrorCategory::Format,
            Error::Io { .. } => ErrorCategory::Io,
            Error::NoWarehouse | Error::UnknownDataSource(_) => ErrorCategory::Config,
        }
    }

    /// Whether the remote object is missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }

    /// Whether this is an authoring mistake in a definition file.
    #[must_use]
    pub fn is_definition(&self) -> bool {
        self.category() == ErrorCategory::Definition
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                message: format!("HTTP {}", code),
                status: Some(code),
            },
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}
