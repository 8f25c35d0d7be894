use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryFnError {
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    /// No statement text after all fallbacks, or no connection in scope.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The query function or its caller broke the calling protocol.
    #[error("Usage error: {0}")]
    UsageError(String),

    #[error("Invalid value: {0}")]
    ValueError(String),

    /// A parameter value has no driver representation.
    #[error("Cannot bind parameter {param}: {reason}")]
    EncodeError { param: String, reason: String },

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    /// Raised by a query function to skip execution. Never reaches the caller of a result mode.
    #[error("Query execution cancelled")]
    Cancelled,
}

impl QueryFnError {
    /// Short, stable name of the variant, used as the failure key in call statistics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            QueryFnError::SqliteError(_) => "SqliteError",
            QueryFnError::ConfigError(_) => "ConfigError",
            QueryFnError::UsageError(_) => "UsageError",
            QueryFnError::ValueError(_) => "ValueError",
            QueryFnError::EncodeError { .. } => "EncodeError",
            QueryFnError::ParameterError(_) => "ParameterError",
            QueryFnError::DecodeError(_) => "DecodeError",
            QueryFnError::ExecutionError(_) => "ExecutionError",
            QueryFnError::Cancelled => "Cancelled",
        }
    }
}
