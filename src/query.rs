//! Query pipeline
//!
//! Embeds a natural-language query, retrieves the nearest chunks for the
//! agent, assembles them into the agent's prompt template, and invokes the
//! chat model chain.

use crate::embedding::Embedder;
use crate::error::{RagError, Result, StoreError};
use crate::llm::ChatModel;
use crate::store::{SearchQuery, TenantId, VectorStore};
use crate::template;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Message returned when a required query field is missing
pub const MISSING_QUERY_FIELDS: &str = "Faltan tenant_id, agent_id o query";

/// Raw query request as received from the caller
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub document_id: Option<String>,
}

/// A request with all identifiers validated
#[derive(Debug, Clone)]
struct ValidatedQuery {
    tenant: TenantId,
    agent_id: Uuid,
    query: String,
    document_id: Option<Uuid>,
}

impl QueryRequest {
    fn validate(self) -> Result<ValidatedQuery> {
        let non_empty = |field: Option<String>| field.filter(|value| !value.is_empty());

        let (Some(tenant_id), Some(agent_id), Some(query)) = (
            non_empty(self.tenant_id),
            non_empty(self.agent_id),
            non_empty(self.query),
        ) else {
            return Err(RagError::BadRequest(MISSING_QUERY_FIELDS.to_string()));
        };

        let tenant =
            TenantId::new(&tenant_id).map_err(|e| RagError::BadRequest(e.to_string()))?;
        let agent_id = Uuid::parse_str(&agent_id)
            .map_err(|_| RagError::BadRequest(format!("agent_id {agent_id:?} is not a UUID")))?;
        let document_id = match non_empty(self.document_id) {
            Some(raw) => Some(Uuid::parse_str(&raw).map_err(|_| {
                RagError::BadRequest(format!("document_id {raw:?} is not a UUID"))
            })?),
            None => None,
        };

        Ok(ValidatedQuery {
            tenant,
            agent_id,
            query,
            document_id,
        })
    }
}

/// Orchestrates query → embed → retrieve → template → generate
pub struct QueryPipeline {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    chat: Arc<dyn ChatModel>,
}

impl QueryPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        chat: Arc<dyn ChatModel>,
    ) -> Self {
        Self {
            embedder,
            store,
            chat,
        }
    }

    /// Answer a query with context retrieved for the agent.
    pub async fn answer(&self, request: QueryRequest) -> Result<String> {
        let request = request.validate()?;
        info!(
            tenant = %request.tenant,
            agent = %request.agent_id,
            filtered = request.document_id.is_some(),
            "answering query"
        );

        let embedding = self.embedder.embed(&request.query).await?;
        let results = self
            .store
            .search(
                &request.tenant,
                &SearchQuery {
                    agent_id: request.agent_id,
                    document_id: request.document_id,
                    embedding,
                },
            )
            .await?;

        let context = results
            .iter()
            .map(|chunk| chunk.chunk_text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        info!(chunks = results.len(), "context assembled");

        let agent = self
            .store
            .fetch_agent(&request.tenant, request.agent_id)
            .await?
            .ok_or_else(|| StoreError::AgentNotFound {
                tenant: request.tenant.to_string(),
                agent: request.agent_id.to_string(),
            })?;

        let prompt = template::substitute(&agent.prompt_template, &context, &request.query)?;
        self.chat.generate(&prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_request() -> QueryRequest {
        QueryRequest {
            tenant_id: Some("asap".into()),
            agent_id: Some("d8c38f93-f4cd-4a85-9c31-297d14ce7009".into()),
            query: Some("¿qué es?".into()),
            document_id: None,
        }
    }

    #[test]
    fn test_validate_accepts_full_request() {
        let validated = full_request().validate().unwrap();
        assert_eq!(validated.tenant.as_str(), "asap");
        assert_eq!(validated.query, "¿qué es?");
        assert!(validated.document_id.is_none());
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        for broken in [
            QueryRequest { tenant_id: None, ..full_request() },
            QueryRequest { agent_id: None, ..full_request() },
            QueryRequest { query: None, ..full_request() },
            QueryRequest { query: Some(String::new()), ..full_request() },
        ] {
            let err = broken.validate().unwrap_err();
            assert!(
                matches!(&err, RagError::BadRequest(reason) if reason == MISSING_QUERY_FIELDS),
                "unexpected error: {err}"
            );
        }
    }

    #[test]
    fn test_validate_rejects_bad_identifiers() {
        let err = QueryRequest {
            tenant_id: Some("no válido".into()),
            ..full_request()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, RagError::BadRequest(_)));

        let err = QueryRequest {
            document_id: Some("not-a-uuid".into()),
            ..full_request()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, RagError::BadRequest(_)));
    }

    #[test]
    fn test_request_deserialization_tolerates_missing_optionals() {
        let request: QueryRequest =
            serde_json::from_str(r#"{"tenant_id":"asap","agent_id":"a","query":"q"}"#).unwrap();
        assert!(request.document_id.is_none());
    }
}
