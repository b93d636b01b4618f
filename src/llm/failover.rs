//! Primary/fallback chat model failover
//!
//! Each model gets the same bounded-retry policy; the fallback runs
//! whenever the primary exhausts its attempts, regardless of the failure
//! kind.

use super::ChatModel;
use crate::error::{LlmError, RagError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Chat client that tries a sequence of models in order, each with retries
pub struct FailoverChat {
    models: Vec<Arc<dyn ChatModel>>,
    max_retries: usize,
    retry_delay: Duration,
}

impl FailoverChat {
    /// Create a failover chain from a primary and a fallback client
    pub fn new(primary: Arc<dyn ChatModel>, fallback: Arc<dyn ChatModel>) -> Self {
        Self {
            models: vec![primary, fallback],
            max_retries: 2,
            retry_delay: Duration::from_millis(500),
        }
    }

    /// Override the per-model retry policy
    pub fn with_retry_policy(mut self, max_retries: usize, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    async fn try_with_retries(
        &self,
        model: &Arc<dyn ChatModel>,
        index: usize,
        prompt: &str,
    ) -> Result<String> {
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            match model.generate(prompt).await {
                Ok(text) => {
                    if attempt > 1 {
                        debug!(model = index, attempt, "generation succeeded after retry");
                    }
                    return Ok(text);
                }
                Err(e) => {
                    warn!(model = index, attempt, error = %e, "generation attempt failed");
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| RagError::Llm(LlmError::AllModelsExhausted)))
    }
}

#[async_trait]
impl ChatModel for FailoverChat {
    async fn generate(&self, prompt: &str) -> Result<String> {
        for (index, model) in self.models.iter().enumerate() {
            match self.try_with_retries(model, index, prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(model = index, error = %e, "model exhausted its retries");
                }
            }
        }

        Err(LlmError::AllModelsExhausted.into())
    }
}
