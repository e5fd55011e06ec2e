// Ollama collaborator: text generation for the translation pipeline and
// model discovery for the frontend model picker.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::core::config::Config;
use crate::utils::metrics::Metrics;

/// Models advertised when the Ollama instance cannot be reached, so the
/// frontend picker always has something to show.
pub const FALLBACK_MODELS: &[(&str, &str)] = &[
    ("gemma3-legal-samanantar-pro:latest", "gemma"),
    ("llama3.1:8b", "llama"),
    ("gemma3:4b", "gemma"),
    ("gaganyatri/sarvam-2b-v0.5:latest", "sarvam"),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub family: String,
}

/// Contract for LLM backends used by the translation stages.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run a single non-streaming completion and return the raw text.
    async fn generate(&self, model: &str, prompt: &str) -> Result<String>;

    /// List models available on the backend.
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
    #[serde(default)]
    details: Option<TagDetails>,
}

#[derive(Debug, Deserialize)]
struct TagDetails {
    #[serde(default)]
    family: Option<String>,
}

pub struct OllamaClient {
    endpoint: String,
    http_client: reqwest::Client,
    max_retries: u32,
    metrics: Option<Arc<Metrics>>,
}

impl OllamaClient {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.llm.request_timeout_secs))
            .pool_max_idle_per_host(8)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create Ollama HTTP client")?;

        Ok(Self {
            endpoint: config.llm.endpoint.trim_end_matches('/').to_string(),
            http_client,
            max_retries: config.llm.max_retries,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    async fn send_with_retries(&self, model: &str, prompt: &str) -> Result<String> {
        let result = self.attempt_with_retries(model, prompt).await;
        if result.is_err() {
            if let Some(metrics) = &self.metrics {
                metrics.record_llm_failure();
            }
        }
        result
    }

    async fn attempt_with_retries(&self, model: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.endpoint);
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
        };

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff with jitter to avoid retry bursts
                let base_delay = 500u64 * 2u64.pow(attempt - 1);
                let jitter = rand::thread_rng().gen_range(0..250);
                let delay = Duration::from_millis(base_delay + jitter);
                debug!("Retrying Ollama request in {:?} (attempt {})", delay, attempt + 1);
                tokio::time::sleep(delay).await;
            }

            let started = Instant::now();
            let result = self.http_client.post(&url).json(&request).send().await;

            match result {
                Ok(response) if response.status().is_success() => {
                    let parsed: GenerateResponse = response
                        .json()
                        .await
                        .context("Failed to parse Ollama generate response")?;
                    if let Some(metrics) = &self.metrics {
                        metrics.record_llm_call(started.elapsed().as_millis() as u64);
                    }
                    return Ok(parsed.response);
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    // Client errors won't improve on retry
                    if status.is_client_error() {
                        anyhow::bail!("Ollama returned {}: {}", status, body);
                    }
                    warn!("Ollama returned {} (attempt {}): {}", status, attempt + 1, body);
                    last_error = Some(anyhow::anyhow!("Ollama returned {}: {}", status, body));
                }
                Err(e) => {
                    warn!("Ollama request failed (attempt {}): {}", attempt + 1, e);
                    last_error = Some(e.into());
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("Ollama request failed with no attempts made")))
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        self.send_with_retries(model, prompt).await
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/api/tags", self.endpoint);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .context("Ollama tags request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Ollama tags returned {}", status);
        }

        let parsed: TagsResponse = response
            .json()
            .await
            .context("Failed to parse Ollama tags response")?;

        Ok(parsed
            .models
            .into_iter()
            .map(|m| {
                let family = m
                    .details
                    .and_then(|d| d.family)
                    .unwrap_or_else(|| "unknown".to_string());
                ModelInfo {
                    name: m.name,
                    family,
                }
            })
            .collect())
    }
}

/// Fallback model list used when the live backend is unreachable.
pub fn fallback_models() -> Vec<ModelInfo> {
    FALLBACK_MODELS
        .iter()
        .map(|(name, family)| ModelInfo {
            name: name.to_string(),
            family: family.to_string(),
        })
        .collect()
}
