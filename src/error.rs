//! modelcache error types.

/// modelcache error types, grouped by the stage that raises them.
///
/// Each variant maps to one of the stage-carved error code ranges in the
/// external interface contract via [`CacheError::error_code`].
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum CacheError {
    // Validation errors (101-103): request envelope malformed or incomplete
    #[error("malformed request: {0}")]
    Validation(String),

    #[error("unknown request type: {0}")]
    UnknownRequestType(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("request arrived before engine initialization completed")]
    NotInit,

    // Model blacklist (105)
    #[error("model '{0}' is blacklisted")]
    ModelBlacklisted(String),

    // Query-path failures (201-202)
    #[error("vector store error: {0}")]
    VectorStoreTransient(String),

    #[error("vector store error: {0}")]
    VectorStoreFatal(String),

    #[error("no such vector index for model '{0}'")]
    NoSuchIndex(String),

    #[error("embedding dispatcher stopped")]
    DispatcherStopped,

    #[error("embedding worker failed: {0}")]
    EmbedWorker(String),

    #[error("empty text passed to embedder")]
    EmptyInput,

    // Insert-path failures (301-304)
    #[error("scalar store error: {0}")]
    ScalarStoreTransient(String),

    #[error("scalar store error: {0}")]
    ScalarStoreFatal(String),

    #[error("object store error: {0}")]
    ObjectStore(String),

    #[error("similarity threshold out of range [0,1]: {0}")]
    ThresholdOutOfRange(f32),

    #[error("embedding dimension must be positive, got {0}")]
    NonPositiveDimension(i64),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("unequal list lengths for import: prompts={prompts}, answers={answers}, embeddings={embeddings}")]
    UnequalBatchLengths {
        prompts: usize,
        answers: usize,
        embeddings: usize,
    },

    // Remove-path failures (401-402)
    #[error("unknown remove_type: {0}")]
    UnknownRemoveType(String),

    // Register failure (502)
    #[error("unknown storage backend: {0}")]
    UnknownBackend(String),

    #[error("unsupported embedding model: {0}")]
    UnsupportedEmbeddingModel(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CacheError {
    /// Whether this error is transient and the operation may succeed on retry.
    ///
    /// Store backends pre-classify their own errors as transient or fatal at
    /// the point they're raised; everything else here is permanent.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::VectorStoreTransient(_) | Self::ScalarStoreTransient(_)
        )
    }

    /// The response envelope error code for this error (§6 of the spec).
    pub fn error_code(&self) -> u32 {
        match self {
            Self::Validation(_) | Self::MissingField(_) => 101,
            Self::UnknownRequestType(_) => 102,
            Self::NotInit => 103,
            Self::ModelBlacklisted(_) => 105,
            Self::VectorStoreTransient(_)
            | Self::VectorStoreFatal(_)
            | Self::NoSuchIndex(_)
            | Self::DispatcherStopped
            | Self::EmbedWorker(_)
            | Self::EmptyInput => 201,
            Self::ScalarStoreTransient(_) | Self::ScalarStoreFatal(_) => 301,
            Self::ObjectStore(_) => 302,
            Self::ThresholdOutOfRange(_)
            | Self::NonPositiveDimension(_)
            | Self::DimensionMismatch { .. } => 303,
            Self::UnequalBatchLengths { .. } => 304,
            Self::UnknownRemoveType(_) => 401,
            Self::UnknownBackend(_) | Self::UnsupportedEmbeddingModel(_) | Self::Configuration(_) => 502,
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Validation(err.to_string())
    }
}

/// Result type alias for modelcache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(CacheError::VectorStoreTransient("timeout".into()).is_transient());
        assert!(CacheError::ScalarStoreTransient("timeout".into()).is_transient());
        assert!(!CacheError::VectorStoreFatal("corrupt".into()).is_transient());
        assert!(!CacheError::NotInit.is_transient());
    }

    #[test]
    fn error_codes_match_ranges() {
        assert_eq!(CacheError::UnknownRequestType("x".into()).error_code(), 102);
        assert_eq!(CacheError::ModelBlacklisted("m".into()).error_code(), 105);
        assert_eq!(CacheError::NoSuchIndex("m".into()).error_code(), 201);
        assert_eq!(CacheError::ScalarStoreFatal("x".into()).error_code(), 301);
        assert_eq!(CacheError::UnknownRemoveType("x".into()).error_code(), 401);
        assert_eq!(CacheError::UnknownBackend("x".into()).error_code(), 502);
    }
}
