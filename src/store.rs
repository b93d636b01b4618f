//! Per-tenant vector store over Postgres with pgvector
//!
//! Each tenant owns one schema holding an `agents` table and a vector-indexed
//! `documents` table of chunks. Tenant ids flow into SQL identifier position,
//! so they are validated against a strict allow-list at construction and
//! composed only as quoted identifiers; every value travels as a bind
//! parameter.

use crate::embedding::EMBEDDING_DIM;
use crate::error::{EmbeddingError, Result, StoreError};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use pgvector::Vector;
use regex::Regex;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Fixed number of nearest chunks retrieved per query
pub const DEFAULT_TOP_K: i64 = 50;

static TENANT_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("invalid tenant pattern"));

/// Validated tenant identifier, usable as a schema name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantId(String);

impl TenantId {
    /// Validate a raw tenant id against the identifier allow-list
    pub fn new(raw: &str) -> std::result::Result<Self, StoreError> {
        if TENANT_ID_PATTERN.is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(StoreError::InvalidTenantId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Schema identifier, quoted. The allow-list excludes quotes, so simple
    /// wrapping is safe.
    fn schema(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A chunk row ready for insertion
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub agent_id: Uuid,
    pub document_id: Uuid,
    pub document_name: String,
    pub chunk_text: String,
    pub embedding: Vec<f32>,
}

/// A retrieved chunk with its cosine distance to the query
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk_text: String,
    pub distance: f64,
}

/// One agent row
#[derive(Debug, Clone)]
pub struct AgentRecord {
    pub agent_id: Uuid,
    pub agent_name: String,
    pub description: Option<String>,
    pub prompt_template: String,
    pub created_at: NaiveDateTime,
}

/// Similarity search parameters
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub agent_id: Uuid,
    pub document_id: Option<Uuid>,
    pub embedding: Vec<f32>,
}

/// Trait for the per-tenant chunk/agent store
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Idempotently provision the tenant schema and its default agent
    async fn ensure_tenant(&self, tenant: &TenantId, agent_id: Uuid) -> Result<()>;

    /// Insert chunks in order within one transaction
    async fn insert_chunks(&self, tenant: &TenantId, chunks: &[NewChunk]) -> Result<u64>;

    /// Retrieve the nearest chunks under cosine distance
    async fn search(&self, tenant: &TenantId, query: &SearchQuery) -> Result<Vec<ScoredChunk>>;

    /// Fetch an agent row, if present
    async fn fetch_agent(&self, tenant: &TenantId, agent_id: Uuid) -> Result<Option<AgentRecord>>;
}

/// Built-in prompt template for agents created on first ingestion
pub fn default_prompt_template(tenant: &TenantId) -> String {
    format!(
        "Eres un asistente especializado para el tenant {tenant}.\n\
         Responde basándote únicamente en el contexto proporcionado. Si no encuentras \
         información relevante, indica que no tienes datos suficientes.\n\n\
         --- CONTEXTO ---\n\
         {{context}}\n\n\
         --- PREGUNTA ---\n\
         {{query}}\n\n\
         Responde con precisión y sin inventar información que no esté en el contexto."
    )
}

/// DDL batch creating a tenant schema, its tables and its indexes. Every
/// statement is guarded by IF NOT EXISTS so concurrent first ingestions
/// collapse to one winner.
fn provision_statements(tenant: &TenantId) -> Vec<String> {
    let schema = tenant.schema();
    let raw = tenant.as_str();
    vec![
        "CREATE EXTENSION IF NOT EXISTS vector".to_string(),
        format!("CREATE SCHEMA IF NOT EXISTS {schema}"),
        format!(
            "CREATE TABLE IF NOT EXISTS {schema}.agents (\n\
             \tagent_id        UUID PRIMARY KEY,\n\
             \tagent_name      TEXT NOT NULL,\n\
             \tdescription     TEXT,\n\
             \tprompt_template TEXT NOT NULL,\n\
             \tcreated_at      TIMESTAMP DEFAULT NOW()\n\
             )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {schema}.documents (\n\
             \tid            SERIAL PRIMARY KEY,\n\
             \tagent_id      UUID NOT NULL,\n\
             \tdocument_id   UUID NOT NULL,\n\
             \tdocument_name TEXT NOT NULL,\n\
             \tchunk_text    TEXT NOT NULL,\n\
             \tembedding     VECTOR({EMBEDDING_DIM}),\n\
             \tcreated_at    TIMESTAMP DEFAULT NOW()\n\
             )"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS \"idx_{raw}_documents_embedding\" \
             ON {schema}.documents USING ivfflat (embedding vector_cosine_ops) \
             WITH (lists = 100)"
        ),
        format!("CREATE INDEX IF NOT EXISTS \"idx_{raw}_agents\" ON {schema}.agents(agent_id)"),
        format!(
            "CREATE INDEX IF NOT EXISTS \"idx_{raw}_documents_agent\" \
             ON {schema}.documents(agent_id)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS \"idx_{raw}_documents_doc_id\" \
             ON {schema}.documents(document_id)"
        ),
    ]
}

fn insert_agent_sql(tenant: &TenantId) -> String {
    format!(
        "INSERT INTO {}.agents (agent_id, agent_name, description, prompt_template) \
         VALUES ($1, $2, $3, $4) ON CONFLICT (agent_id) DO NOTHING",
        tenant.schema()
    )
}

fn insert_chunk_sql(tenant: &TenantId) -> String {
    format!(
        "INSERT INTO {}.documents (agent_id, document_id, document_name, chunk_text, embedding) \
         VALUES ($1, $2, $3, $4, $5)",
        tenant.schema()
    )
}

fn search_sql(tenant: &TenantId, with_document_filter: bool) -> String {
    let mut sql = format!(
        "SELECT chunk_text, embedding <=> $1 AS distance FROM {}.documents \
         WHERE agent_id = $2",
        tenant.schema()
    );
    if with_document_filter {
        sql.push_str(" AND document_id = $3");
    }
    sql.push_str(&format!(
        " ORDER BY embedding <=> $1, id LIMIT {DEFAULT_TOP_K}"
    ));
    sql
}

fn fetch_agent_sql(tenant: &TenantId) -> String {
    format!(
        "SELECT agent_id, agent_name, description, prompt_template, created_at \
         FROM {}.agents WHERE agent_id = $1",
        tenant.schema()
    )
}

/// Postgres-backed store
pub struct PgVectorStore {
    pool: PgPool,
}

impl PgVectorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool from the database configuration
    pub async fn connect(config: &crate::config::DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url())
            .await
            .map_err(StoreError::Database)?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn ensure_tenant(&self, tenant: &TenantId, agent_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(StoreError::Database)?;

        let schema_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM information_schema.schemata WHERE schema_name = $1)",
        )
        .bind(tenant.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(StoreError::Database)?;

        if !schema_exists {
            info!(tenant = %tenant, "provisioning tenant schema");
            for statement in provision_statements(tenant) {
                sqlx::query(&statement)
                    .execute(&mut *tx)
                    .await
                    .map_err(StoreError::Database)?;
            }
        }

        sqlx::query(&insert_agent_sql(tenant))
            .bind(agent_id)
            .bind(format!("Agente Principal - {tenant}"))
            .bind(format!("Agente por defecto para el tenant {tenant}"))
            .bind(default_prompt_template(tenant))
            .execute(&mut *tx)
            .await
            .map_err(StoreError::Database)?;

        tx.commit().await.map_err(StoreError::Database)?;
        Ok(())
    }

    async fn insert_chunks(&self, tenant: &TenantId, chunks: &[NewChunk]) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(StoreError::Database)?;
        let sql = insert_chunk_sql(tenant);

        for chunk in chunks {
            if chunk.embedding.len() != EMBEDDING_DIM {
                return Err(EmbeddingError::WrongDimension {
                    expected: EMBEDDING_DIM,
                    actual: chunk.embedding.len(),
                }
                .into());
            }
            sqlx::query(&sql)
                .bind(chunk.agent_id)
                .bind(chunk.document_id)
                .bind(&chunk.document_name)
                .bind(&chunk.chunk_text)
                .bind(Vector::from(chunk.embedding.clone()))
                .execute(&mut *tx)
                .await
                .map_err(StoreError::Database)?;
        }

        tx.commit().await.map_err(StoreError::Database)?;
        debug!(tenant = %tenant, chunks = chunks.len(), "inserted chunk batch");
        Ok(chunks.len() as u64)
    }

    async fn search(&self, tenant: &TenantId, query: &SearchQuery) -> Result<Vec<ScoredChunk>> {
        let sql = search_sql(tenant, query.document_id.is_some());

        let mut db_query = sqlx::query(&sql)
            .bind(Vector::from(query.embedding.clone()))
            .bind(query.agent_id);
        if let Some(document_id) = query.document_id {
            db_query = db_query.bind(document_id);
        }

        let rows = db_query
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Database)?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            results.push(ScoredChunk {
                chunk_text: row.try_get("chunk_text").map_err(StoreError::Database)?,
                distance: row.try_get("distance").map_err(StoreError::Database)?,
            });
        }

        debug!(tenant = %tenant, results = results.len(), "similarity search finished");
        Ok(results)
    }

    async fn fetch_agent(&self, tenant: &TenantId, agent_id: Uuid) -> Result<Option<AgentRecord>> {
        let row = sqlx::query(&fetch_agent_sql(tenant))
            .bind(agent_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Database)?;

        match row {
            Some(row) => Ok(Some(AgentRecord {
                agent_id: row.try_get("agent_id").map_err(StoreError::Database)?,
                agent_name: row.try_get("agent_name").map_err(StoreError::Database)?,
                description: row.try_get("description").map_err(StoreError::Database)?,
                prompt_template: row
                    .try_get("prompt_template")
                    .map_err(StoreError::Database)?,
                created_at: row.try_get("created_at").map_err(StoreError::Database)?,
            })),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template;

    fn tenant() -> TenantId {
        TenantId::new("asap").unwrap()
    }

    #[test]
    fn test_tenant_id_allow_list() {
        assert!(TenantId::new("asap").is_ok());
        assert!(TenantId::new("tenant_2-dev").is_ok());
        assert!(TenantId::new("ABC123").is_ok());

        for bad in ["", "a b", "a;b", "a.b", "x\"y", "ñandu", "a/b", "a--;drop"] {
            let bad_has_disallowed = TenantId::new(bad).is_err();
            assert!(bad_has_disallowed, "accepted {bad:?}");
        }
    }

    #[test]
    fn test_search_sql_filters() {
        let without = search_sql(&tenant(), false);
        assert!(without.contains("FROM \"asap\".documents"));
        assert!(without.contains("agent_id = $2"));
        assert!(!without.contains("document_id"));
        assert!(without.contains("ORDER BY embedding <=> $1, id LIMIT 50"));

        let with = search_sql(&tenant(), true);
        assert!(with.contains("agent_id = $2"));
        assert!(with.contains("AND document_id = $3"));
    }

    #[test]
    fn test_provision_statements_are_idempotent_ddl() {
        let statements = provision_statements(&tenant());
        assert_eq!(statements.len(), 8);
        assert_eq!(statements[0], "CREATE EXTENSION IF NOT EXISTS vector");
        assert!(statements[1].contains("CREATE SCHEMA IF NOT EXISTS \"asap\""));
        // Every DDL statement tolerates a concurrent winner.
        for statement in &statements {
            assert!(statement.contains("IF NOT EXISTS"), "not guarded: {statement}");
        }
        assert!(statements[3].contains(&format!("VECTOR({EMBEDDING_DIM})")));
        assert!(statements[4].contains("ivfflat (embedding vector_cosine_ops)"));
        assert!(statements[4].contains("lists = 100"));
    }

    #[test]
    fn test_insert_agent_sql_is_conflict_free() {
        let sql = insert_agent_sql(&tenant());
        assert!(sql.contains("ON CONFLICT (agent_id) DO NOTHING"));
        assert!(sql.contains("INTO \"asap\".agents"));
    }

    #[test]
    fn test_insert_chunk_sql_columns() {
        let sql = insert_chunk_sql(&tenant());
        assert!(sql.contains(
            "(agent_id, document_id, document_name, chunk_text, embedding)"
        ));
        assert!(sql.contains("VALUES ($1, $2, $3, $4, $5)"));
    }

    #[test]
    fn test_default_template_substitutes_cleanly() {
        let rendered =
            template::substitute(&default_prompt_template(&tenant()), "el contexto", "la duda")
                .unwrap();
        assert!(rendered.contains("el contexto"));
        assert!(rendered.contains("la duda"));
        assert!(!rendered.contains("{context}"));
        assert!(!rendered.contains("{query}"));
    }
}
