//! Error types for kernel operations.

/// Errors arising from codec extraction or malformed content.
///
/// Content variants are scoped to one string: callers drop the affected
/// translation unit and keep going. A bad decoder pattern is a setup error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    /// A mangled placeholder reference has no entry in the placeholder map.
    #[error("unknown placeholder reference: {0}")]
    UnknownPlaceholder(String),

    /// A sampled marker was opened but never closed.
    #[error("unterminated placeholder marker: {0}")]
    UnterminatedMarker(String),

    /// A resource could not be parsed or rendered by its filter.
    #[error("resource error: {0}")]
    Resource(String),

    #[error("decoder `{decoder}` pattern does not compile: {message}")]
    InvalidPattern { decoder: String, message: String },
}

/// Construction errors for translation units.
///
/// These are programming/config errors: they fail fast and are never
/// coerced into a partially valid unit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TuError {
    #[error("translation unit is not a JSON object")]
    NotAnObject,

    #[error("translation unit is missing mandatory field `{0}`")]
    MissingField(&'static str),

    #[error("translation unit field is malformed: {0}")]
    Malformed(String),
}
