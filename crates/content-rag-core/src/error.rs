//! Error type shared by the content store and retrieval pipeline.
//!
//! Capability traits ([`VectorStore`](crate::store::VectorStore),
//! [`Embedder`](crate::embedding::Embedder),
//! [`LanguageModel`](crate::pipeline::LanguageModel)) report failures as
//! `anyhow::Error`; the orchestration layer wraps them into the variant
//! that names which capability failed and hands them to the caller
//! unchanged otherwise.

/// Convenience alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// Caller-supplied arguments violate a precondition (empty text,
    /// empty owner, malformed prompt template, bad chunking config).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The vector store capability failed (connectivity, malformed
    /// filter, corrupt records).
    #[error("vector store failure: {0:#}")]
    Store(anyhow::Error),

    /// The language model capability failed or returned an unusable
    /// response.
    #[error("generation failure: {0:#}")]
    Generation(anyhow::Error),

    /// A message envelope could not be parsed or serialized.
    #[error("message envelope error: {0:#}")]
    Envelope(anyhow::Error),
}

impl RagError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        RagError::InvalidInput(message.into())
    }

    /// Machine-readable code, used by the HTTP error contract.
    pub fn code(&self) -> &'static str {
        match self {
            RagError::InvalidInput(_) => "bad_request",
            RagError::Store(_) => "store_error",
            RagError::Generation(_) => "generation_error",
            RagError::Envelope(_) => "bad_envelope",
        }
    }
}
