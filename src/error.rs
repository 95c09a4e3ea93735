//! Error types for fmdata-sql.
//!
//! Every failure surfaced to callers is one of the variants below. Faults that
//! originate on the remote platform carry its own message and numeric code so
//! they can be correlated with the server's diagnostics.

use thiserror::Error;

/// Failure while obtaining a session token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthFault {
    /// The login endpoint could not be reached at all.
    #[error("connect: {0}")]
    Connect(String),

    /// The login endpoint answered 404 (wrong host or database name).
    #[error("not found: {reason} ({status})")]
    NotFound { reason: String, status: u16 },

    /// The platform refused the login (bad credentials, locked account, ...).
    #[error("{message} ({code})")]
    Rejected { message: String, code: i64 },

    /// Any other transport-level failure.
    #[error("Unknown error (-1)")]
    Unknown,
}

impl AuthFault {
    /// Returns the platform or HTTP code attached to this fault.
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Connect(_) => None,
            Self::NotFound { status, .. } => Some(i64::from(*status)),
            Self::Rejected { code, .. } => Some(*code),
            Self::Unknown => Some(-1),
        }
    }
}

/// Failure while executing a data request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestFault {
    /// No HTTP response was received.
    #[error("connect: {0}")]
    Connect(String),

    /// A response arrived but could not be read.
    #[error("transport: {0}")]
    Transport(String),

    /// The session was still rejected after the single token refresh.
    #[error("authentication expired: {0}")]
    AuthExpired(String),

    /// The response body was not a decodable Data API envelope.
    #[error("{reason} ({status})")]
    Opaque { status: u16, reason: String },

    /// The platform reported an application error.
    #[error("{message} ({code})")]
    Application { message: String, code: i64 },
}

impl RequestFault {
    /// Returns the platform or HTTP code attached to this fault.
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Connect(_) | Self::Transport(_) | Self::AuthExpired(_) => None,
            Self::Opaque { status, .. } => Some(i64::from(*status)),
            Self::Application { code, .. } => Some(*code),
        }
    }
}

/// Main error type for fmdata-sql operations.
#[derive(Error, Debug)]
pub enum FmError {
    /// Obtaining a token failed.
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthFault),

    /// A data request failed.
    #[error("Request error: {0}")]
    Request(#[from] RequestFault),

    /// The SQL text could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The parsed query has no Data API equivalent.
    #[error("Translation error: {0}")]
    Translation(String),

    /// The operation cannot be expressed against the Data API.
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The token cache could not be read or written.
    #[error("Token store error: {0}")]
    TokenStore(String),

    /// A statement was used out of order (fetch before execute, ...).
    #[error("Statement error: {0}")]
    Statement(String),

    /// The primary key of a freshly created record could not be looked up.
    #[error("Unable to locate record primary key with error {0}")]
    GeneratedKey(Box<FmError>),
}

impl FmError {
    /// Creates a parse error with the given message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Creates a translation error with the given message.
    pub fn translation(msg: impl Into<String>) -> Self {
        Self::Translation(msg.into())
    }

    /// Creates a not-supported error with the given message.
    pub fn not_supported(msg: impl Into<String>) -> Self {
        Self::NotSupported(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a token store error with the given message.
    pub fn token_store(msg: impl Into<String>) -> Self {
        Self::TokenStore(msg.into())
    }

    /// Creates a statement lifecycle error with the given message.
    pub fn statement(msg: impl Into<String>) -> Self {
        Self::Statement(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Auth(_) => "Authentication Error",
            Self::Request(_) => "Request Error",
            Self::Parse(_) => "Parse Error",
            Self::Translation(_) => "Translation Error",
            Self::NotSupported(_) => "Not Supported",
            Self::Config(_) => "Configuration Error",
            Self::TokenStore(_) => "Token Store Error",
            Self::Statement(_) => "Statement Error",
            Self::GeneratedKey(_) => "Generated Key Error",
        }
    }

    /// Returns the remote platform's numeric code, if the fault carries one.
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Auth(fault) => fault.code(),
            Self::Request(fault) => fault.code(),
            Self::GeneratedKey(inner) => inner.code(),
            _ => None,
        }
    }
}

/// Result type alias using FmError.
pub type Result<T> = std::result::Result<T, FmError>;
