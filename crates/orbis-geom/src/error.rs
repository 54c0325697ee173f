//! Geometry error types.

/// Errors raised eagerly by geometric constructors and operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeomError {
    /// A required argument was missing or outside its legal range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A computation hit a singular or non-finite configuration (e.g. inverting a singular matrix).
    #[error("numerically degenerate: {0}")]
    NumericDegenerate(String),
}
