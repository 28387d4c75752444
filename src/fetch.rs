use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use crate::config::{RetryConfig, SourceLocation};
use crate::error::{CompileError, Result};
use crate::types::SourceId;

const USER_AGENT: &str = concat!(
    "mortality_compiler/",
    env!("CARGO_PKG_VERSION"),
    " (public health research)"
);

/// A retrieved payload plus the provenance recorded in the run summary.
#[derive(Debug, Clone)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub sha256: String,
    pub attempts: u32,
}

/// Shared retrieval helper used by every source adapter. Local files go
/// through the same path as HTTP so fixtures and the bundled 2019 file
/// behave like any other source.
pub struct Fetcher {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl Fetcher {
    pub fn new(retry: RetryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(retry.timeout_secs))
            .build()?;
        Ok(Fetcher { client, retry })
    }

    /// Retrieves a source payload with bounded retries and exponential
    /// backoff. Exhausting every attempt yields `SourceUnavailable`, which
    /// the pipeline records without aborting the run.
    #[instrument(skip(self, location), fields(source = %source))]
    pub async fn fetch(&self, source: SourceId, location: &SourceLocation) -> Result<Payload> {
        let mut last_error = String::new();
        for attempt in 1..=self.retry.max_attempts {
            if attempt > 1 {
                let backoff = self
                    .retry
                    .base_delay_ms
                    .saturating_mul(1u64 << (attempt - 2).min(16));
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
            match self.attempt(source, location).await {
                Ok(bytes) => {
                    let sha256 = hex::encode(Sha256::digest(&bytes));
                    info!(
                        bytes = bytes.len(),
                        checksum = %sha256,
                        attempts = attempt,
                        "payload retrieved"
                    );
                    return Ok(Payload {
                        bytes,
                        sha256,
                        attempts: attempt,
                    });
                }
                Err(e) => {
                    warn!(attempt, error = %e, "fetch attempt failed");
                    last_error = e.to_string();
                }
            }
        }
        Err(CompileError::SourceUnavailable {
            source,
            reason: format!(
                "{} attempts failed, last error: {}",
                self.retry.max_attempts, last_error
            ),
        })
    }

    async fn attempt(&self, source: SourceId, location: &SourceLocation) -> Result<Vec<u8>> {
        match location {
            SourceLocation::Http(url) => {
                // Public data hosts; pause before every request.
                if self.retry.politeness_delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(self.retry.politeness_delay_ms)).await;
                }
                let response = self.client.get(url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(CompileError::SourceUnavailable {
                        source,
                        reason: format!("HTTP status {} from {}", status, url),
                    });
                }
                let body = response.bytes().await?;
                if body.is_empty() {
                    return Err(CompileError::SourceUnavailable {
                        source,
                        reason: format!("empty response body from {}", url),
                    });
                }
                Ok(body.to_vec())
            }
            SourceLocation::File(path) => {
                let bytes = tokio::fs::read(path).await?;
                Ok(bytes)
            }
        }
    }
}
