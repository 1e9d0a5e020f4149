/// Errors raised by [`crate::filters::FilterEngine`] and schema construction.
#[derive(thiserror::Error, Debug)]
pub enum FilterError {
    #[error("invalid schema: {0}")]
    Schema(String),

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("preset store error: {0}")]
    Store(#[from] StoreError),
}

/// Failures of a [`crate::presets::PresetStore`] backend.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The backend refused the write (quota, read-only store, ...).
    #[error("write rejected: {0}")]
    Rejected(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("{field} must be HH:MM (24-hour clock), got {value:?}")]
    MalformedTime { field: &'static str, value: String },

    #[error("date must be YYYY-MM-DD, got {0:?}")]
    MalformedDate(String),
}

impl FilterError {
    pub fn schema(msg: impl Into<String>) -> Self {
        FilterError::Schema(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        FilterError::Validation(msg.into())
    }

    /// Stable machine-readable code used in IPC error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            FilterError::Schema(_) => "schema_invalid",
            FilterError::UnknownField(_) => "unknown_field",
            FilterError::Validation(_) => "validation_failed",
            FilterError::Store(_) => "store_failed",
        }
    }
}

impl NormalizeError {
    pub fn code(&self) -> &'static str {
        match self {
            NormalizeError::MalformedTime { .. } => "malformed_time",
            NormalizeError::MalformedDate(_) => "malformed_date",
        }
    }
}
