//! Ingestion pipeline
//!
//! An object-created notification names a freshly uploaded PDF at
//! `<tenant>/<agent>/<...>/<file>`. The pipeline fetches the object,
//! extracts and chunks its text, provisions the tenant on first contact,
//! embeds every chunk, and inserts the batch in a single transaction.

use crate::chunk;
use crate::embedding::Embedder;
use crate::error::{RagError, Result, StoreError};
use crate::extract::{Extractor, ObjectRef};
use crate::store::{NewChunk, TenantId, VectorStore};
use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Object-created notification
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectCreatedEvent {
    #[serde(rename = "Records")]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketRef,
    pub object: ObjectKeyRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectKeyRef {
    pub key: String,
}

/// Routing identifiers parsed from a decoded object key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionRoute {
    pub tenant: TenantId,
    pub agent_id: Uuid,
    /// Decoded object key
    pub key: String,
    pub file_name: String,
}

/// Outcome of one ingestion task
#[derive(Debug, Clone)]
pub struct IngestionReport {
    pub document_id: Uuid,
    pub pages: usize,
    pub chunks_inserted: u64,
}

/// Decode an event object key: `+` is a space, percent sequences are
/// decoded, and a leading slash is dropped.
pub fn decode_key(raw: &str) -> String {
    let plus_decoded = raw.replace('+', " ");
    let decoded = percent_decode_str(&plus_decoded).decode_utf8_lossy();
    decoded.trim_start_matches('/').to_string()
}

/// Parse the routing identifiers out of a raw object key.
pub fn parse_route(raw_key: &str) -> Result<IngestionRoute> {
    let key = decode_key(raw_key);
    let parts: Vec<&str> = key.split('/').collect();

    if parts.len() < 3 {
        return Err(RagError::BadRequest(format!(
            "object key {key:?} must look like <tenant>/<agent>/<...>/<file>"
        )));
    }

    let tenant = TenantId::new(parts[0])
        .map_err(|e| RagError::BadRequest(e.to_string()))?;
    let agent_id = Uuid::parse_str(parts[1]).map_err(|_| {
        RagError::BadRequest(format!("agent segment {:?} is not a UUID", parts[1]))
    })?;
    let file_name = parts[parts.len() - 1].to_string();

    Ok(IngestionRoute {
        tenant,
        agent_id,
        key,
        file_name,
    })
}

/// Trait for object storage backends
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object's bytes
    async fn fetch(&self, object: &ObjectRef) -> Result<Vec<u8>>;
}

/// S3-backed object store
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn fetch(&self, object: &ObjectRef) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .send()
            .await
            .map_err(|e| StoreError::ObjectFetch(e.to_string()))?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StoreError::ObjectFetch(e.to_string()))?
            .into_bytes();

        Ok(bytes.to_vec())
    }
}

/// Orchestrates event → extract → chunk → embed → insert
pub struct IngestionPipeline {
    objects: Arc<dyn ObjectStore>,
    extractor: Extractor,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl IngestionPipeline {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        extractor: Extractor,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            objects,
            extractor,
            embedder,
            store,
        }
    }

    /// Process one object-created event.
    pub async fn handle(&self, event: &ObjectCreatedEvent) -> Result<IngestionReport> {
        let record = event
            .records
            .first()
            .ok_or_else(|| RagError::BadRequest("event carries no records".to_string()))?;

        let route = parse_route(&record.s3.object.key)?;
        let object = ObjectRef {
            bucket: record.s3.bucket.name.clone(),
            key: route.key.clone(),
        };
        let document_id = Uuid::new_v4();
        info!(
            tenant = %route.tenant,
            agent = %route.agent_id,
            key = %object.key,
            document = %document_id,
            "ingesting object"
        );

        let bytes = self.objects.fetch(&object).await?;
        let (text, pages) = self.extractor.extract(&object, &bytes).await?;
        let chunks = chunk::chunk(&text, pages);
        info!(pages, chunks = chunks.len(), "document segmented");

        self.store.ensure_tenant(&route.tenant, route.agent_id).await?;

        let mut rows = Vec::with_capacity(chunks.len());
        for chunk_text in chunks {
            let embedding = self.embedder.embed(&chunk_text).await?;
            rows.push(NewChunk {
                agent_id: route.agent_id,
                document_id,
                document_name: route.file_name.clone(),
                chunk_text,
                embedding,
            });
        }

        let chunks_inserted = if rows.is_empty() {
            0
        } else {
            self.store.insert_chunks(&route.tenant, &rows).await?
        };

        info!(chunks = chunks_inserted, document = %document_id, "ingestion finished");
        Ok(IngestionReport {
            document_id,
            pages,
            chunks_inserted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AGENT: &str = "d8c38f93-f4cd-4a85-9c31-297d14ce7009";

    #[test]
    fn test_decode_key() {
        assert_eq!(decode_key("asap/a/b.pdf"), "asap/a/b.pdf");
        assert_eq!(decode_key("/asap/a/b.pdf"), "asap/a/b.pdf");
        assert_eq!(decode_key("asap/a/mi+archivo.pdf"), "asap/a/mi archivo.pdf");
        assert_eq!(
            decode_key("asap/a/informe%20anual.pdf"),
            "asap/a/informe anual.pdf"
        );
        assert_eq!(
            decode_key("asap/a/espa%C3%B1ol.pdf"),
            "asap/a/español.pdf"
        );
    }

    #[test]
    fn test_parse_route_happy_path() {
        let route = parse_route(&format!("asap/{AGENT}/docs/intro.pdf")).unwrap();
        assert_eq!(route.tenant.as_str(), "asap");
        assert_eq!(route.agent_id, Uuid::parse_str(AGENT).unwrap());
        assert_eq!(route.file_name, "intro.pdf");
        assert_eq!(route.key, format!("asap/{AGENT}/docs/intro.pdf"));
    }

    #[test]
    fn test_parse_route_minimal_depth() {
        let route = parse_route(&format!("asap/{AGENT}/intro.pdf")).unwrap();
        assert_eq!(route.file_name, "intro.pdf");
    }

    #[test]
    fn test_parse_route_rejects_short_keys() {
        let two_segments = format!("asap/{AGENT}");
        for key in ["intro.pdf", two_segments.as_str(), ""] {
            assert!(matches!(
                parse_route(key),
                Err(RagError::BadRequest(_))
            ));
        }
    }

    #[test]
    fn test_parse_route_rejects_bad_identifiers() {
        let err = parse_route(&format!("bad tenant/{AGENT}/a.pdf")).unwrap_err();
        assert!(matches!(err, RagError::BadRequest(_)));

        let err = parse_route("asap/not-a-uuid/a.pdf").unwrap_err();
        assert!(matches!(err, RagError::BadRequest(_)));
    }

    #[test]
    fn test_event_deserialization() {
        let raw = format!(
            r#"{{"Records":[{{"s3":{{"bucket":{{"name":"uploads"}},"object":{{"key":"asap/{AGENT}/intro.pdf"}}}}}}]}}"#
        );
        let event: ObjectCreatedEvent = serde_json::from_str(&raw).unwrap();
        assert_eq!(event.records.len(), 1);
        assert_eq!(event.records[0].s3.bucket.name, "uploads");
    }
}
