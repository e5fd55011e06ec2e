// OCR collaborator: trait boundary plus an HTTP client for the OCR sidecar.
//
// The recognition model itself runs out of process; this service only
// shuttles image bytes and language hints over HTTP and maps the reply
// into domain types. The sidecar must tolerate being invoked repeatedly
// with different hint sets against the same image.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::core::config::Config;
use crate::core::types::Quad;

/// Raw detection from the OCR engine. Confidence is optional: some result
/// tuples omit it and the extractor fills in a default.
#[derive(Debug, Clone)]
pub struct DetectedText {
    pub quad: Quad,
    pub text: String,
    pub confidence: Option<f32>,
}

/// Contract for OCR backends.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Detect text regions in the image.
    ///
    /// `paragraph_mode` asks the engine to merge adjacent lines into
    /// paragraph boxes; with it off the engine returns word-level boxes.
    async fn detect(
        &self,
        image: &[u8],
        language_hints: &[String],
        paragraph_mode: bool,
    ) -> Result<Vec<DetectedText>>;
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    results: Vec<DetectResult>,
}

#[derive(Debug, Deserialize)]
struct DetectResult {
    /// Four [x, y] corner points
    quad: [[f32; 2]; 4],
    text: String,
    #[serde(default)]
    confidence: Option<f32>,
}

/// HTTP client for the OCR sidecar.
pub struct HttpOcrEngine {
    endpoint: String,
    http_client: reqwest::Client,
}

impl HttpOcrEngine {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.ocr.request_timeout_secs))
            .pool_max_idle_per_host(4)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create OCR HTTP client")?;

        Ok(Self {
            endpoint: config.ocr.endpoint.trim_end_matches('/').to_string(),
            http_client,
        })
    }
}

#[async_trait]
impl OcrEngine for HttpOcrEngine {
    async fn detect(
        &self,
        image: &[u8],
        language_hints: &[String],
        paragraph_mode: bool,
    ) -> Result<Vec<DetectedText>> {
        let url = format!("{}/detect", self.endpoint);
        let body = serde_json::json!({
            "image": general_purpose::STANDARD.encode(image),
            "languages": language_hints,
            "paragraph": paragraph_mode,
        });

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("OCR sidecar request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("OCR sidecar returned {}: {}", status, error_text);
        }

        let parsed: DetectResponse = response
            .json()
            .await
            .context("Failed to parse OCR sidecar response")?;

        debug!(
            "OCR sidecar returned {} regions (hints: {:?}, paragraph: {})",
            parsed.results.len(),
            language_hints,
            paragraph_mode
        );

        Ok(parsed
            .results
            .into_iter()
            .map(|r| DetectedText {
                quad: Quad::new([
                    (r.quad[0][0], r.quad[0][1]),
                    (r.quad[1][0], r.quad[1][1]),
                    (r.quad[2][0], r.quad[2][1]),
                    (r.quad[3][0], r.quad[3][1]),
                ]),
                text: r.text,
                confidence: r.confidence,
            })
            .collect())
    }
}
