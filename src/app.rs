//! Process-level wiring
//!
//! Service clients are constructed once at startup and threaded through the
//! pipelines as explicit dependencies.

use crate::config::AppConfig;
use crate::embedding::{BedrockEmbedder, Embedder};
use crate::error::{RagError, Result};
use crate::extract::{Extractor, OcrEngine};
use crate::ingest::{IngestionPipeline, ObjectStore, S3ObjectStore};
use crate::llm::{BedrockChat, ChatModel, FailoverChat};
use crate::ocr::TextractOcr;
use crate::query::QueryPipeline;
use crate::store::{PgVectorStore, VectorStore};
use aws_config::{BehaviorVersion, Region};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// The assembled backend: one ingestion pipeline, one query pipeline
pub struct App {
    pub ingestion: IngestionPipeline,
    pub query: QueryPipeline,
}

impl App {
    /// Build clients and pipelines from the configuration.
    pub async fn new(config: AppConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| RagError::Config(e.to_string()))?;
        info!(region = %config.aws.region, "initializing backend");

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.aws.region.clone()))
            .load()
            .await;
        let s3 = aws_sdk_s3::Client::new(&sdk_config);
        let textract = aws_sdk_textract::Client::new(&sdk_config);
        let bedrock = aws_sdk_bedrockruntime::Client::new(&sdk_config);

        let store: Arc<dyn VectorStore> =
            Arc::new(PgVectorStore::connect(&config.database).await?);
        let embedder: Arc<dyn Embedder> = Arc::new(BedrockEmbedder::new(
            bedrock.clone(),
            config.embedding.clone(),
        ));

        let ocr: Arc<dyn OcrEngine> = Arc::new(TextractOcr::new(textract, config.ocr.clone()));
        let extractor = Extractor::new(ocr);
        let objects: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::new(s3));

        let primary: Arc<dyn ChatModel> = Arc::new(BedrockChat::new(
            bedrock.clone(),
            config.llm.main_model.clone(),
            config.llm.clone(),
        ));
        let fallback: Arc<dyn ChatModel> = Arc::new(BedrockChat::new(
            bedrock,
            config.llm.fallback_model.clone(),
            config.llm.clone(),
        ));
        let chat: Arc<dyn ChatModel> = Arc::new(
            FailoverChat::new(primary, fallback).with_retry_policy(
                config.llm.max_retries,
                Duration::from_millis(config.llm.retry_delay_ms),
            ),
        );

        Ok(Self {
            ingestion: IngestionPipeline::new(objects, extractor, embedder.clone(), store.clone()),
            query: QueryPipeline::new(embedder, store, chat),
        })
    }
}
