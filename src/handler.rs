//! Invocation-shaped entry points
//!
//! The ingestion and query pipelines are exposed behind the event contract
//! of the hosting runtime: a JSON event in, a `{statusCode, body}` envelope
//! out. Bad requests surface as 400, everything else as 500.

use crate::error::RagError;
use crate::ingest::{IngestionPipeline, ObjectCreatedEvent};
use crate::query::{QueryPipeline, QueryRequest};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

/// Success body for a processed PDF
pub const INGESTION_OK_BODY: &str = "PDF procesado correctamente";

/// Response envelope returned to the hosting runtime
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HandlerResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl HandlerResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            body: body.into(),
        }
    }

    pub fn bad_request(body: impl Into<String>) -> Self {
        Self {
            status_code: 400,
            body: body.into(),
        }
    }

    fn from_error(error: &RagError) -> Self {
        Self {
            status_code: error.status_code(),
            body: error.to_string(),
        }
    }
}

/// Handle an object-created event.
pub async fn handle_ingestion(pipeline: &IngestionPipeline, event: Value) -> HandlerResponse {
    let event: ObjectCreatedEvent = match serde_json::from_value(event) {
        Ok(event) => event,
        Err(e) => return HandlerResponse::bad_request(format!("malformed event: {e}")),
    };

    match pipeline.handle(&event).await {
        Ok(report) => {
            info!(
                document = %report.document_id,
                chunks = report.chunks_inserted,
                "ingestion handled"
            );
            HandlerResponse::ok(INGESTION_OK_BODY)
        }
        Err(e) => {
            error!(category = e.category(), error = %e, "ingestion failed");
            HandlerResponse::from_error(&e)
        }
    }
}

/// Handle a query request.
pub async fn handle_query(pipeline: &QueryPipeline, request: Value) -> HandlerResponse {
    let request: QueryRequest = match serde_json::from_value(request) {
        Ok(request) => request,
        Err(e) => return HandlerResponse::bad_request(format!("malformed request: {e}")),
    };

    match pipeline.answer(request).await {
        Ok(answer) => HandlerResponse::ok(answer),
        Err(e) => {
            error!(category = e.category(), error = %e, "query failed");
            HandlerResponse::from_error(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_serialization_shape() {
        let value = serde_json::to_value(HandlerResponse::ok(INGESTION_OK_BODY)).unwrap();
        assert_eq!(value["statusCode"], 200);
        assert_eq!(value["body"], "PDF procesado correctamente");
    }

    #[test]
    fn test_error_mapping() {
        let bad = HandlerResponse::from_error(&RagError::BadRequest("x".into()));
        assert_eq!(bad.status_code, 400);

        let fatal = HandlerResponse::from_error(&RagError::Config("x".into()));
        assert_eq!(fatal.status_code, 500);
    }
}
