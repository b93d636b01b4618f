//! Embedding generation via Bedrock
//!
//! Texts are embedded with a fixed model into unit-norm 1536-dimensional
//! vectors. The embedding API answers with one of several response shapes;
//! decoding probes them in a fixed order into a typed payload.

use crate::config::EmbeddingConfig;
use crate::error::{EmbeddingError, Result};
use async_trait::async_trait;
use aws_sdk_bedrockruntime::primitives::Blob;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Fixed embedding dimension
pub const EMBEDDING_DIM: usize = 1536;

/// Input longer than this is truncated before embedding
pub const MAX_EMBED_CHARS: usize = 20_000;

/// Trait for embedding model clients
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a text into a unit-norm vector of [`EMBEDDING_DIM`] floats
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Request body for the embedding model
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    texts: Vec<&'a str>,
    input_type: &'static str,
}

/// The embedding response, decoded by probing keys in a fixed order:
/// first a single-key object holding a float matrix, then the nested
/// `embeddings.float` form.
#[derive(Debug, PartialEq)]
enum EmbeddingPayload {
    /// `{"<any key>": [[f32, ...]]}`
    Matrix(Vec<Vec<f32>>),
    /// `{"embeddings": {"float": [[f32, ...]]}}`
    ByType(Vec<Vec<f32>>),
}

impl EmbeddingPayload {
    fn decode(value: &Value) -> std::result::Result<Self, EmbeddingError> {
        let object = value
            .as_object()
            .ok_or_else(|| EmbeddingError::UnrecognizedShape(value.to_string()))?;

        if let [(key, raw)] = object.iter().collect::<Vec<_>>().as_slice() {
            if let Some(matrix) = as_float_matrix(raw) {
                return Ok(EmbeddingPayload::Matrix(matrix));
            }
            return Err(EmbeddingError::UnrecognizedShape(format!(
                "unexpected value under key {key:?}"
            )));
        }

        if let Some(embeddings) = object.get("embeddings") {
            if let Some(matrix) = embeddings.get("float").and_then(as_float_matrix) {
                return Ok(EmbeddingPayload::ByType(matrix));
            }
        }

        Err(EmbeddingError::UnrecognizedShape(value.to_string()))
    }

    fn into_first_row(self) -> std::result::Result<Vec<f32>, EmbeddingError> {
        let (EmbeddingPayload::Matrix(rows) | EmbeddingPayload::ByType(rows)) = self;
        rows.into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::UnrecognizedShape("empty embedding matrix".into()))
    }
}

fn as_float_matrix(value: &Value) -> Option<Vec<Vec<f32>>> {
    let rows = value.as_array()?;
    if rows.is_empty() || !rows[0].is_array() {
        return None;
    }
    rows.iter()
        .map(|row| {
            row.as_array()?
                .iter()
                .map(|v| v.as_f64().map(|f| f as f32))
                .collect()
        })
        .collect()
}

/// Scale a vector to unit L2 norm; the zero vector passes through unchanged.
pub fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in v.iter_mut() {
            *value /= norm;
        }
    }
    v
}

/// Truncate to [`MAX_EMBED_CHARS`] on a char boundary.
fn truncate(text: &str) -> &str {
    match text.char_indices().nth(MAX_EMBED_CHARS) {
        Some((offset, _)) => &text[..offset],
        None => text,
    }
}

/// Bedrock embedding client
pub struct BedrockEmbedder {
    client: aws_sdk_bedrockruntime::Client,
    config: EmbeddingConfig,
}

impl BedrockEmbedder {
    pub fn new(client: aws_sdk_bedrockruntime::Client, config: EmbeddingConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Embedder for BedrockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let truncated = truncate(text);
        debug!(chars = truncated.chars().count(), "embedding text");

        let request = EmbedRequest {
            texts: vec![truncated],
            // Documents and queries share one embedding space.
            input_type: "search_document",
        };

        let response = self
            .client
            .invoke_model()
            .model_id(&self.config.model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(serde_json::to_vec(&request)?))
            .send()
            .await
            .map_err(|e| EmbeddingError::InvocationFailed(e.to_string()))?;

        let value: Value = serde_json::from_slice(response.body().as_ref())?;
        let vector = EmbeddingPayload::decode(&value)?.into_first_row()?;

        if vector.len() != EMBEDDING_DIM {
            return Err(EmbeddingError::WrongDimension {
                expected: EMBEDDING_DIM,
                actual: vector.len(),
            }
            .into());
        }

        Ok(normalize(vector))
    }
}
