use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// `$inc` on a non-numeric leaf or with a non-numeric delta, or `$rpush`
    /// onto a non-array leaf.
    #[error("Type mismatch at '{path}': {reason}")]
    TypeMismatch { path: String, reason: String },

    #[error("Bad argument for '{operator}': {reason}")]
    BadArgument { operator: String, reason: String },

    #[error("Unknown update operator: {0}")]
    UnknownOperator(String),

    #[error("Document decode error: {0}")]
    Decode(String),

    #[error("Document encode error: {0}")]
    Encode(String),
}
