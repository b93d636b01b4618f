//! Textract-backed OCR engine
//!
//! Text detection runs as an asynchronous job: start it, poll until it
//! reaches a terminal state, then page through the results. Polling is
//! bounded by an attempt budget with exponential backoff and a wall-clock
//! deadline.

use crate::config::OcrConfig;
use crate::error::{ExtractError, Result};
use crate::extract::{ObjectRef, OcrEngine};
use async_trait::async_trait;
use aws_sdk_textract::types::{BlockType, DocumentLocation, JobStatus, S3Object};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// One recognized line of text with its page number
#[derive(Debug, Clone, PartialEq, Eq)]
struct OcrLine {
    page: i32,
    text: String,
}

/// Group lines by page and emit pages in ascending order, lines joined by
/// newlines.
fn assemble_pages(lines: Vec<OcrLine>) -> Vec<String> {
    let mut pages: BTreeMap<i32, Vec<String>> = BTreeMap::new();
    for line in lines {
        pages.entry(line.page).or_default().push(line.text);
    }
    pages.into_values().map(|lines| lines.join("\n")).collect()
}

/// Textract client with bounded polling
pub struct TextractOcr {
    client: aws_sdk_textract::Client,
    config: OcrConfig,
}

impl TextractOcr {
    pub fn new(client: aws_sdk_textract::Client, config: OcrConfig) -> Self {
        Self { client, config }
    }

    async fn wait_for_job(&self, job_id: &str) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(self.config.deadline_secs);
        let mut interval = Duration::from_millis(self.config.base_interval_ms);

        for attempt in 1..=self.config.max_attempts {
            let response = self
                .client
                .get_document_text_detection()
                .job_id(job_id)
                .send()
                .await
                .map_err(|e| ExtractError::OcrJobFailed(e.to_string()))?;

            match response.job_status() {
                Some(JobStatus::Succeeded) => {
                    debug!(job_id, attempt, "OCR job succeeded");
                    return Ok(());
                }
                Some(JobStatus::Failed) => {
                    let reason = response
                        .status_message()
                        .unwrap_or("job reported FAILED")
                        .to_string();
                    return Err(ExtractError::OcrJobFailed(reason).into());
                }
                _ => debug!(job_id, attempt, "OCR job still running"),
            }

            if Instant::now() + interval > deadline {
                break;
            }
            tokio::time::sleep(interval).await;
            interval = (interval * 2).min(Duration::from_millis(self.config.max_interval_ms));
        }

        Err(ExtractError::OcrTimedOut.into())
    }

    async fn collect_lines(&self, job_id: &str) -> Result<Vec<OcrLine>> {
        let mut lines = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .client
                .get_document_text_detection()
                .job_id(job_id)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| ExtractError::OcrJobFailed(e.to_string()))?;

            for block in response.blocks() {
                if block.block_type() == Some(&BlockType::Line) {
                    if let (Some(page), Some(text)) = (block.page(), block.text()) {
                        lines.push(OcrLine {
                            page,
                            text: text.to_string(),
                        });
                    }
                }
            }

            next_token = response.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }

        Ok(lines)
    }
}

#[async_trait]
impl OcrEngine for TextractOcr {
    async fn document_text(&self, object: &ObjectRef) -> Result<Vec<String>> {
        let location = DocumentLocation::builder()
            .s3_object(
                S3Object::builder()
                    .bucket(&object.bucket)
                    .name(&object.key)
                    .build(),
            )
            .build();

        let started = self
            .client
            .start_document_text_detection()
            .document_location(location)
            .send()
            .await
            .map_err(|e| ExtractError::OcrStartFailed(e.to_string()))?;

        let job_id = started
            .job_id()
            .ok_or_else(|| ExtractError::OcrStartFailed("no job id returned".to_string()))?
            .to_string();
        info!(job_id = %job_id, key = %object.key, "started OCR job");

        self.wait_for_job(&job_id).await?;
        let lines = self.collect_lines(&job_id).await?;
        Ok(assemble_pages(lines))
    }
}
