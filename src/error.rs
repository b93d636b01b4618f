//! Error handling for the RAG backend

use thiserror::Error;

/// Result type alias for the RAG backend
pub type Result<T> = std::result::Result<T, RagError>;

/// Main error type for the RAG backend
#[derive(Error, Debug)]
pub enum RagError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors related to chat model invocation
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Model invocation failed: {0}")]
    InvocationFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("No completion returned by model {0}")]
    EmptyCompletion(String),

    #[error("All models exhausted their retries")]
    AllModelsExhausted,
}

/// Errors related to embedding generation
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Embedding invocation failed: {0}")]
    InvocationFailed(String),

    #[error("Unrecognized embedding response shape: {0}")]
    UnrecognizedShape(String),

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    WrongDimension { expected: usize, actual: usize },
}

/// Errors related to PDF text extraction
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("PDF parsing failed: {0}")]
    PdfParse(String),

    #[error("OCR job could not be started: {0}")]
    OcrStartFailed(String),

    #[error("OCR job failed: {0}")]
    OcrJobFailed(String),

    #[error("OCR job did not finish within the polling budget")]
    OcrTimedOut,
}

/// Errors related to the vector store and object store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid tenant id: {0:?}")]
    InvalidTenantId(String),

    #[error("Agent {agent} not found for tenant {tenant}")]
    AgentNotFound { tenant: String, agent: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Object fetch failed: {0}")]
    ObjectFetch(String),
}

/// Errors related to prompt template substitution
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template references unsupported placeholder {{{0}}}")]
    UnknownPlaceholder(String),

    #[error("Template contains an unmatched brace at offset {0}")]
    UnmatchedBrace(usize),
}

impl RagError {
    /// Get error category for logging/metrics
    pub fn category(&self) -> &'static str {
        match self {
            RagError::Llm(_) => "llm",
            RagError::Embedding(_) => "embedding",
            RagError::Extract(_) => "extract",
            RagError::Store(_) => "store",
            RagError::Template(_) => "template",
            RagError::BadRequest(_) => "bad_request",
            RagError::Config(_) => "config",
            RagError::Io(_) => "io",
            RagError::Serialization(_) => "serialization",
        }
    }

    /// HTTP-ish status code surfaced to the caller
    pub fn status_code(&self) -> u16 {
        match self {
            RagError::BadRequest(_) => 400,
            RagError::Store(StoreError::AgentNotFound { .. }) => 404,
            _ => 500,
        }
    }
}
