use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Maximum number of concurrently running file workers cannot be zero.
    #[error("`max_concurrency` cannot be zero")]
    MaxConcurrencyZero,
    /// A field holds a value outside of its accepted range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
}
