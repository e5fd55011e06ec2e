// End-to-end upload processing: decode image, extract regions, translate,
// park the result in a review session. Finalize turns a reviewed session
// into the overlay document.

use base64::{engine::general_purpose, Engine};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::core::config::Config;
use crate::core::errors::{ProcessError, SessionError};
use crate::core::language;
use crate::core::types::{Action, OverlayDocument, RegionSummary};
use crate::extraction::RegionExtractor;
use crate::layout;
use crate::pipeline::PipelineRun;
use crate::services::llm::{fallback_models, ModelInfo, TextGenerator};
use crate::session::SessionStore;
use crate::translation::{TranslationMode, TranslationOrchestrator};
use crate::utils::metrics::Metrics;

#[derive(Debug, Clone, Deserialize)]
pub struct UploadOptions {
    pub model: Option<String>,
    pub agent_mode: bool,
    pub target_language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub session_id: String,
    /// Original scan, base64-encoded for inline display.
    pub image: String,
    pub width: u32,
    pub height: u32,
    pub regions: Vec<RegionSummary>,
    pub mode: TranslationMode,
    pub target_language: String,
    pub font_family: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<PipelineRun>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
    pub fallback: bool,
}

pub struct DocumentProcessor {
    config: Arc<Config>,
    extractor: RegionExtractor,
    orchestrator: TranslationOrchestrator,
    generator: Arc<dyn TextGenerator>,
    sessions: Arc<SessionStore>,
    metrics: Arc<Metrics>,
}

impl DocumentProcessor {
    pub fn new(
        config: Arc<Config>,
        extractor: RegionExtractor,
        orchestrator: TranslationOrchestrator,
        generator: Arc<dyn TextGenerator>,
        sessions: Arc<SessionStore>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config,
            extractor,
            orchestrator,
            generator,
            sessions,
            metrics,
        }
    }

    /// Full upload flow. On success the parked session id is embedded in
    /// the response for the later finalize call.
    pub async fn process_upload(
        &self,
        image_bytes: Vec<u8>,
        options: UploadOptions,
    ) -> Result<UploadResponse, ProcessError> {
        let started = Instant::now();

        let decoded = image::load_from_memory(&image_bytes).inspect_err(|_| {
            self.metrics.record_upload_failure();
        })?;
        let (width, height) = (decoded.width(), decoded.height());

        let regions = match self.extractor.extract(&image_bytes).await {
            Ok(regions) => regions,
            Err(e) => {
                self.metrics.record_upload_failure();
                return Err(e.into());
            }
        };

        let mode = if options.agent_mode {
            TranslationMode::Agentic
        } else {
            TranslationMode::Direct
        };
        let model = options
            .model
            .unwrap_or_else(|| self.config.default_model().to_string());
        let target_language = options
            .target_language
            .unwrap_or_else(|| language::DEFAULT_LANGUAGE.to_string());

        let translation = match self
            .orchestrator
            .translate(mode, &model, &regions, &target_language)
            .await
        {
            Ok(translation) => translation,
            Err(e) => {
                self.metrics.record_upload_failure();
                return Err(e.into());
            }
        };

        let region_summaries: Vec<RegionSummary> = regions
            .iter()
            .map(|r| RegionSummary {
                id: r.id,
                text: r.text.clone(),
                translated: translation
                    .per_region
                    .get(r.id)
                    .cloned()
                    .unwrap_or_default(),
                bbox: r.quad.bounding_rect().into(),
                confidence: r.confidence,
            })
            .collect();

        let pipeline = translation.pipeline.clone();
        let image_b64 = general_purpose::STANDARD.encode(&image_bytes);

        let session_id = self.sessions.insert(
            Arc::new(image_bytes),
            width,
            height,
            Arc::new(regions),
            Arc::new(translation),
            target_language.clone(),
        );
        self.metrics.record_session_created();
        self.metrics
            .record_upload(started.elapsed().as_millis() as u64);

        info!(
            "Processed upload into session {} ({} regions, mode {:?}, {}ms)",
            session_id,
            region_summaries.len(),
            mode,
            started.elapsed().as_millis()
        );

        Ok(UploadResponse {
            success: true,
            session_id,
            image: image_b64,
            width,
            height,
            regions: region_summaries,
            mode,
            font_family: language::font_family(&target_language).to_string(),
            target_language,
            pipeline,
        })
    }

    /// Turn a reviewed session into overlay descriptors. The session stays
    /// live until its TTL so the review can be re-run with different
    /// actions.
    pub fn finalize(
        &self,
        session_id: &str,
        actions: &HashMap<usize, Action>,
    ) -> Result<OverlayDocument, SessionError> {
        let session = self.sessions.get(session_id)?;

        let document = layout::reconstruct(
            session.width,
            session.height,
            &session.regions,
            &session.translation.per_region,
            actions,
            &session.target_language,
        );

        self.metrics.record_session_finalized();
        info!(
            "Finalized session {} ({} overlays from {} regions)",
            session_id,
            document.overlays.len(),
            session.regions.len()
        );
        Ok(document)
    }

    /// Model list for the frontend picker. Degrades to the static list
    /// when the backend is unreachable.
    pub async fn list_models(&self) -> ModelsResponse {
        match self.generator.list_models().await {
            Ok(models) if !models.is_empty() => ModelsResponse {
                models,
                fallback: false,
            },
            Ok(_) | Err(_) => ModelsResponse {
                models: fallback_models(),
                fallback: true,
            },
        }
    }

    pub fn default_model(&self) -> &str {
        self.config.default_model()
    }

    /// Single-text direct translation, exposed for debugging the prompt
    /// and the glossary fallback path. Never fails; degraded output
    /// carries the untranslated marker.
    pub async fn debug_translate(&self, model: &str, text: &str, target_language: &str) -> String {
        self.orchestrator
            .translate_single(model, text, target_language)
            .await
    }
}
