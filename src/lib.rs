//! Multi-tenant RAG backend
//!
//! PDFs deposited into an object store are segmented into semantically
//! coherent chunks, embedded, and persisted into per-tenant vector-indexed
//! tables. Natural-language queries retrieve the nearest chunks, assemble a
//! per-agent prompt, and invoke a chat model with primary/fallback failover.
//!
//! # Example
//!
//! ```rust,no_run
//! use ragforge::{handler, App, AppConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let app = App::new(AppConfig::from_env()).await?;
//!
//!     let event = serde_json::json!({
//!         "tenant_id": "asap",
//!         "agent_id": "d8c38f93-f4cd-4a85-9c31-297d14ce7009",
//!         "query": "¿Qué cubre la garantía?",
//!     });
//!     let response = handler::handle_query(&app.query, event).await;
//!     println!("{}", response.body);
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod handler;
pub mod ingest;
pub mod llm;
pub mod ocr;
pub mod query;
pub mod store;
pub mod template;

// Re-export main types
pub use app::App;
pub use chunk::{ChunkConfig, MIN_CHUNK_CHARS};
pub use config::{AppConfig, DatabaseConfig, EmbeddingConfig, LlmConfig, OcrConfig};
pub use embedding::{BedrockEmbedder, Embedder, EMBEDDING_DIM, MAX_EMBED_CHARS};
pub use error::{
    EmbeddingError, ExtractError, LlmError, RagError, Result, StoreError, TemplateError,
};
pub use extract::{Extractor, ObjectRef, OcrEngine, OCR_PAGE_THRESHOLD};
pub use handler::{HandlerResponse, INGESTION_OK_BODY};
pub use ingest::{
    IngestionPipeline, IngestionReport, IngestionRoute, ObjectCreatedEvent, ObjectStore,
    S3ObjectStore,
};
pub use llm::{BedrockChat, ChatModel, FailoverChat};
pub use ocr::TextractOcr;
pub use query::{QueryPipeline, QueryRequest, MISSING_QUERY_FIELDS};
pub use store::{
    AgentRecord, NewChunk, PgVectorStore, ScoredChunk, SearchQuery, TenantId, VectorStore,
    DEFAULT_TOP_K,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.starts_with(char::is_numeric));
    }
}
