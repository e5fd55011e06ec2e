// Translation orchestration over extracted regions.
//
// Direct mode translates each region with an independent LLM call, bounded
// by a concurrency cap and a per-call deadline; calls are issued in region
// order and a failed call degrades to the offline glossary rather than
// failing the document. Agentic mode joins the regions into one document,
// runs the multi-stage pipeline, and redistributes the result back across
// the regions.

pub mod glossary;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::core::config::Config;
use crate::core::errors::PipelineError;
use crate::core::language;
use crate::core::types::Region;
use crate::pipeline::{AgentPipeline, PipelineRun};
use crate::services::llm::TextGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationMode {
    Direct,
    Agentic,
}

/// Result of translating one upload.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentTranslation {
    /// Translated text per region, indexed like the input regions.
    pub per_region: Vec<String>,
    /// Whole-document translation, agentic mode only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    /// Pipeline trace, agentic mode only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<PipelineRun>,
}

pub struct TranslationOrchestrator {
    generator: Arc<dyn TextGenerator>,
    pipeline: AgentPipeline,
    concurrency: usize,
    deadline: Duration,
}

impl TranslationOrchestrator {
    pub fn new(generator: Arc<dyn TextGenerator>, config: &Config) -> Self {
        let pipeline = AgentPipeline::new(generator.clone(), config.stage_timeouts().clone());
        Self {
            generator,
            pipeline,
            concurrency: config.direct_concurrency(),
            deadline: config.direct_deadline(),
        }
    }

    pub async fn translate(
        &self,
        mode: TranslationMode,
        model: &str,
        regions: &[Region],
        target_language: &str,
    ) -> Result<DocumentTranslation, PipelineError> {
        match mode {
            TranslationMode::Direct => Ok(self.translate_direct(model, regions, target_language).await),
            TranslationMode::Agentic => self.translate_agentic(model, regions, target_language).await,
        }
    }

    /// Translate one text with the direct-mode prompt, degrading to the
    /// offline glossary on failure or deadline.
    pub async fn translate_single(
        &self,
        model: &str,
        text: &str,
        target_language: &str,
    ) -> String {
        let prompt = direct_prompt(text, target_language);
        let result =
            tokio::time::timeout(self.deadline, self.generator.generate(model, &prompt)).await;
        match result {
            Ok(Ok(translated)) => translated.trim().to_string(),
            Ok(Err(e)) => {
                warn!("Direct translation failed: {}", e);
                glossary::translate_offline(text, target_language)
            }
            Err(_) => {
                warn!(
                    "Direct translation exceeded {}s deadline",
                    self.deadline.as_secs()
                );
                glossary::translate_offline(text, target_language)
            }
        }
    }

    /// One call per region, issued in ascending region order with at most
    /// `concurrency` in flight. Failures degrade per region.
    async fn translate_direct(
        &self,
        model: &str,
        regions: &[Region],
        target_language: &str,
    ) -> DocumentTranslation {
        // Owned texts keep the stream closure free of higher-ranked
        // borrows, which otherwise fail the Send check on the handler
        // future (rust-lang/rust#102211).
        let texts: Vec<String> = regions.iter().map(|r| r.text.clone()).collect();
        let per_region = stream::iter(texts)
            .map(|text| {
                async move { self.translate_single(model, &text, target_language).await }
            })
            .buffered(self.concurrency.max(1))
            .collect::<Vec<String>>()
            .await;

        DocumentTranslation {
            per_region,
            document: None,
            pipeline: None,
        }
    }

    /// Whole-document pipeline run, then line-proportional redistribution
    /// back onto the regions.
    async fn translate_agentic(
        &self,
        model: &str,
        regions: &[Region],
        target_language: &str,
    ) -> Result<DocumentTranslation, PipelineError> {
        let document_text = regions
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let run = self.pipeline.run(model, &document_text, target_language).await?;
        info!(
            "Agentic translation finished (improved: {}, score: {})",
            run.improvement_applied, run.validation.score
        );

        let per_region = redistribute(&run.final_text, regions.len());

        Ok(DocumentTranslation {
            document: Some(run.final_text.clone()),
            pipeline: Some(run),
            per_region,
        })
    }
}

// An English target is already in the source language, so the prompt asks
// for a clarity pass instead of a translation.
fn direct_prompt(text: &str, target_language: &str) -> String {
    if target_language == "en" {
        return format!(
            "Improve this government document text for better clarity and formal tone while maintaining all legal meaning:\n\n\
             {text}\n\n\
             Provide improved English version:"
        );
    }
    let lang = language::lookup(target_language);
    format!(
        "You are a professional legal translator. Translate this government document to {} ({}) maintaining:\n\
         - Legal accuracy and formal terminology\n\
         - Document structure and formatting\n\
         - Official government language style\n\
         - Precise legal meaning\n\n\
         Document text:\n{}\n\n\
         Provide only the translation without explanations:",
        lang.name, lang.native, text
    )
}

/// Split one translated document across `count` regions, proportional to
/// line position. With matching line counts the mapping is one line per
/// region; otherwise each region gets a contiguous slice, and a region
/// whose slice would be empty takes the nearest line so no region ends up
/// blank.
pub fn redistribute(text: &str, count: usize) -> Vec<String> {
    if count == 0 {
        return Vec::new();
    }
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return vec![String::new(); count];
    }
    if lines.len() == count {
        return lines.iter().map(|l| l.trim().to_string()).collect();
    }

    (0..count)
        .map(|i| {
            let start = i * lines.len() / count;
            let end = (i + 1) * lines.len() / count;
            if start == end {
                lines[start.min(lines.len() - 1)].trim().to_string()
            } else {
                lines[start..end].join(" ").trim().to_string()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::StageTimeouts;
    use crate::core::types::Quad;
    use crate::services::llm::ModelInfo;
    use anyhow::Result;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn region(id: usize, text: &str) -> Region {
        Region {
            id,
            quad: Quad::new([(0.0, 0.0), (10.0, 0.0), (10.0, 5.0), (0.0, 5.0)]),
            text: text.to_string(),
            confidence: 0.9,
        }
    }

    fn orchestrator(generator: Arc<dyn TextGenerator>, concurrency: usize) -> TranslationOrchestrator {
        let timeouts = StageTimeouts {
            analysis: Duration::from_secs(5),
            translation: Duration::from_secs(5),
            validation: Duration::from_secs(5),
            consistency: Duration::from_secs(5),
            quality: Duration::from_secs(5),
        };
        TranslationOrchestrator {
            pipeline: AgentPipeline::new(generator.clone(), timeouts),
            generator,
            concurrency,
            deadline: Duration::from_secs(5),
        }
    }

    /// Echo generator that tracks call order and peak concurrency.
    struct EchoGenerator {
        order: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl EchoGenerator {
        fn new() -> Self {
            Self {
                order: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate(&self, _model: &str, prompt: &str) -> Result<String> {
            self.order.lock().push(prompt.to_string());
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            let text = prompt
                .rsplit("Document text:\n")
                .next()
                .and_then(|t| t.lines().next())
                .unwrap_or("");
            Ok(format!("xlat:{text}"))
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn direct_mode_translates_each_region_in_order() {
        let generator = Arc::new(EchoGenerator::new());
        let orchestrator = orchestrator(generator.clone(), 2);
        let regions = vec![region(0, "alpha"), region(1, "beta"), region(2, "gamma")];

        let result = orchestrator
            .translate(TranslationMode::Direct, "gemma3:4b", &regions, "te")
            .await
            .unwrap();

        assert_eq!(
            result.per_region,
            vec!["xlat:alpha", "xlat:beta", "xlat:gamma"]
        );
        assert!(result.document.is_none());
        assert!(result.pipeline.is_none());

        let order = generator.order.lock();
        assert!(order[0].contains("alpha"));
        assert!(order[1].contains("beta"));
        assert!(order[2].contains("gamma"));
        assert!(generator.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn direct_mode_degrades_failed_region_to_glossary() {
        struct PartialGenerator;

        #[async_trait]
        impl TextGenerator for PartialGenerator {
            async fn generate(&self, _model: &str, prompt: &str) -> Result<String> {
                if prompt.contains("Government of India") {
                    anyhow::bail!("model unloaded");
                }
                Ok("తెలుగు".to_string())
            }

            async fn list_models(&self) -> Result<Vec<ModelInfo>> {
                Ok(Vec::new())
            }
        }

        let orchestrator = orchestrator(Arc::new(PartialGenerator), 4);
        let regions = vec![region(0, "Government of India"), region(1, "hello")];

        let result = orchestrator
            .translate(TranslationMode::Direct, "gemma3:4b", &regions, "te")
            .await
            .unwrap();

        assert_eq!(result.per_region[0], "భారత ప్రభుత్వం");
        assert_eq!(result.per_region[1], "తెలుగు");
    }

    #[tokio::test]
    async fn agentic_mode_joins_regions_and_redistributes() {
        struct PipelineGenerator;

        const VALID: &str = r#"{"status":"valid","score":90,"issues":[],"recommendations":[]}"#;
        const CONSISTENT: &str = r#"{"isConsistent":true,"consistencyScore":90}"#;

        #[async_trait]
        impl TextGenerator for PipelineGenerator {
            async fn generate(&self, _model: &str, prompt: &str) -> Result<String> {
                if prompt.contains("Legal Context Specialist") {
                    assert!(prompt.contains("line one\nline two"));
                    Ok("ctx".to_string())
                } else if prompt.contains("Precision Engine") {
                    Ok("మొదటి\nరెండవ".to_string())
                } else if prompt.contains("Validation Specialist") {
                    Ok(VALID.to_string())
                } else {
                    Ok(CONSISTENT.to_string())
                }
            }

            async fn list_models(&self) -> Result<Vec<ModelInfo>> {
                Ok(Vec::new())
            }
        }

        let orchestrator = orchestrator(Arc::new(PipelineGenerator), 4);
        let regions = vec![region(0, "line one"), region(1, "line two")];

        let result = orchestrator
            .translate(TranslationMode::Agentic, "gemma3:4b", &regions, "te")
            .await
            .unwrap();

        assert_eq!(result.per_region, vec!["మొదటి", "రెండవ"]);
        assert_eq!(result.document.as_deref(), Some("మొదటి\nరెండవ"));
        assert!(result.pipeline.is_some());
    }

    #[test]
    fn english_target_gets_improve_prompt() {
        let prompt = direct_prompt("doc body", "en");
        assert!(prompt.starts_with("Improve this government document text"));
        assert!(!prompt.contains("professional legal translator"));

        let prompt = direct_prompt("doc body", "te");
        assert!(prompt.contains("Translate this government document to Telugu"));
        assert!(!prompt.contains("Improve this government document text"));
    }

    #[tokio::test]
    async fn single_text_translation_degrades_offline() {
        struct FailingGenerator;

        #[async_trait]
        impl TextGenerator for FailingGenerator {
            async fn generate(&self, _model: &str, _prompt: &str) -> Result<String> {
                anyhow::bail!("connection refused")
            }

            async fn list_models(&self) -> Result<Vec<ModelInfo>> {
                Ok(Vec::new())
            }
        }

        let orchestrator = orchestrator(Arc::new(FailingGenerator), 1);
        let translated = orchestrator
            .translate_single("gemma3:4b", "Government of India", "te")
            .await;
        assert_eq!(translated, "భారత ప్రభుత్వం");

        let marked = orchestrator
            .translate_single("gemma3:4b", "Lorem ipsum", "te")
            .await;
        assert!(marked.starts_with("[TE] Lorem ipsum"));
    }

    #[test]
    fn redistribute_one_to_one_when_counts_match() {
        let out = redistribute("a\nb\nc", 3);
        assert_eq!(out, vec!["a", "b", "c"]);
    }

    #[test]
    fn redistribute_groups_extra_lines() {
        let out = redistribute("a\nb\nc\nd\ne\nf", 3);
        assert_eq!(out, vec!["a b", "c d", "e f"]);
    }

    #[test]
    fn redistribute_fills_every_region_when_lines_are_scarce() {
        let out = redistribute("only line", 3);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|s| s == "only line"));
    }

    #[test]
    fn redistribute_handles_empty_text() {
        let out = redistribute("", 2);
        assert_eq!(out, vec![String::new(), String::new()]);
        assert!(redistribute("whatever", 0).is_empty());
    }
}
