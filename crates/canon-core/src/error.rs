//! Error types for canon operations.
//!
//! Provider failures (classifier, extractor, embedder, LLM) are surfaced with
//! these variants but are swallowed by the pipeline. Only configuration errors
//! and caller-requested cancellation reach the caller of a run.

use thiserror::Error;

/// Result type alias for canon operations.
pub type CanonResult<T> = Result<T, CanonError>;

/// Main error type for all canon operations.
#[derive(Error, Debug)]
pub enum CanonError {
    /// Input validation failed.
    #[error("Validation error: {message}")]
    Validation { message: String, code: ErrorCode },

    /// Domain classification failed.
    #[error("Classification error: {message}")]
    Classification {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Entity/relation extraction failed.
    #[error("Extraction error: {message}")]
    Extraction {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// LLM operation failed.
    #[error("LLM error: {message}")]
    Llm {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Embedding generation failed.
    #[error("Embedding error: {message}")]
    Embedding {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network error.
    #[error("Network error: {message}")]
    Network {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Parse error.
    #[error("Parse error: {message}")]
    Parse { message: String, code: ErrorCode },

    /// The run was cancelled by the caller.
    #[error("Run cancelled")]
    Cancelled,

    /// The run exceeded its deadline.
    #[error("Run timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Validation (VAL_xxx)
    ValInvalidInput,
    ValInvalidThreshold,

    // Configuration (CFG_xxx)
    CfgInvalid,

    // Provider failures
    ClsInvalidResponse,
    ExtInvalidResponse,
    LlmGenerationFailed,
    EmbGenerationFailed,

    // Network (NET_xxx)
    NetTimeout,
    NetConnectionFailed,

    // Parse (PARSE_xxx)
    ParseInvalidJson,

    // Run (RUN_xxx)
    RunCancelled,
    RunTimeout,

    // IO (IO_xxx)
    IoFailed,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValInvalidThreshold => "VAL_002",
            ErrorCode::CfgInvalid => "CFG_001",
            ErrorCode::ClsInvalidResponse => "CLS_001",
            ErrorCode::ExtInvalidResponse => "EXT_001",
            ErrorCode::LlmGenerationFailed => "LLM_001",
            ErrorCode::EmbGenerationFailed => "EMB_001",
            ErrorCode::NetTimeout => "NET_001",
            ErrorCode::NetConnectionFailed => "NET_002",
            ErrorCode::ParseInvalidJson => "PARSE_001",
            ErrorCode::RunCancelled => "RUN_001",
            ErrorCode::RunTimeout => "RUN_002",
            ErrorCode::IoFailed => "IO_001",
        }
    }
}

impl CanonError {
    /// Create a validation error for an out-of-range or misordered threshold.
    pub fn invalid_threshold(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            message: format!("{}: {}", field, message.into()),
            code: ErrorCode::ValInvalidThreshold,
        }
    }

    /// Create a classification error.
    pub fn classification(message: impl Into<String>) -> Self {
        Self::Classification {
            message: message.into(),
            code: ErrorCode::ClsInvalidResponse,
            source: None,
        }
    }

    /// Create an extraction error.
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction {
            message: message.into(),
            code: ErrorCode::ExtInvalidResponse,
            source: None,
        }
    }

    /// Create an LLM error.
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
            code: ErrorCode::LlmGenerationFailed,
            source: None,
        }
    }

    /// Create an embedding error.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
            code: ErrorCode::EmbGenerationFailed,
            source: None,
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            code: ErrorCode::ParseInvalidJson,
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            code: ErrorCode::NetConnectionFailed,
            source: None,
        }
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { code, .. }
            | Self::Classification { code, .. }
            | Self::Extraction { code, .. }
            | Self::Llm { code, .. }
            | Self::Embedding { code, .. }
            | Self::Network { code, .. }
            | Self::Parse { code, .. } => *code,
            Self::Configuration(_) => ErrorCode::CfgInvalid,
            Self::Cancelled => ErrorCode::RunCancelled,
            Self::Timeout { .. } => ErrorCode::RunTimeout,
            Self::Io(_) => ErrorCode::IoFailed,
            Self::Serialization(_) => ErrorCode::ParseInvalidJson,
        }
    }

    /// Convert from HTTP status code returned by a provider.
    pub fn from_http_status(status: u16, body: &str) -> Self {
        match status {
            400 | 422 => Self::Validation {
                message: body.to_string(),
                code: ErrorCode::ValInvalidInput,
            },
            408 | 504 => Self::Network {
                message: body.to_string(),
                code: ErrorCode::NetTimeout,
                source: None,
            },
            _ => Self::Network {
                message: format!("HTTP {}: {}", status, body),
                code: ErrorCode::NetConnectionFailed,
                source: None,
            },
        }
    }
}
