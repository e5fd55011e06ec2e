// Multi-stage translation pipeline.
//
// Stage order: ContextAnalysis -> Translation -> Validation ->
// ConsistencyCheck, then conditionally QualityImprovement and
// FinalValidation when the verdicts call for a revision. Every stage
// runs under its configured timeout; a timed-out or failed stage aborts
// the run and surfaces as a pipeline error.

pub mod verdict;

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::core::config::StageTimeouts;
use crate::core::errors::{PipelineError, PipelineResult};
use crate::core::language;
use crate::services::llm::TextGenerator;
use crate::utils::metrics::Metrics;

pub use verdict::{ConsistencyVerdict, StructuredVerdict, ValidationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    ContextAnalysis,
    Translation,
    Validation,
    ConsistencyCheck,
    QualityImprovement,
    FinalValidation,
}

impl StageKind {
    pub const ALL: [StageKind; 6] = [
        StageKind::ContextAnalysis,
        StageKind::Translation,
        StageKind::Validation,
        StageKind::ConsistencyCheck,
        StageKind::QualityImprovement,
        StageKind::FinalValidation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::ContextAnalysis => "context_analysis",
            StageKind::Translation => "translation",
            StageKind::Validation => "validation",
            StageKind::ConsistencyCheck => "consistency_check",
            StageKind::QualityImprovement => "quality_improvement",
            StageKind::FinalValidation => "final_validation",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub stage: StageKind,
    pub status: StageStatus,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Complete record of one pipeline execution.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub stages: Vec<StageRecord>,
    pub context: String,
    pub translated_text: String,
    pub validation: StructuredVerdict,
    pub consistency: ConsistencyVerdict,
    pub final_text: String,
    pub improvement_applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_validation: Option<StructuredVerdict>,
}

pub struct AgentPipeline {
    generator: Arc<dyn TextGenerator>,
    timeouts: StageTimeouts,
    metrics: Option<Arc<Metrics>>,
}

impl AgentPipeline {
    pub fn new(generator: Arc<dyn TextGenerator>, timeouts: StageTimeouts) -> Self {
        Self {
            generator,
            timeouts,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run the full pipeline over a document. `model` is the Ollama model
    /// name; `target_language` is an ISO 639-1 code.
    pub async fn run(
        &self,
        model: &str,
        text: &str,
        target_language: &str,
    ) -> PipelineResult<PipelineRun> {
        let lang = language::lookup(target_language);
        let mut stages = Vec::with_capacity(StageKind::ALL.len());
        let started = Instant::now();

        let context = self
            .run_stage(
                &mut stages,
                StageKind::ContextAnalysis,
                self.timeouts.analysis,
                self.generator
                    .generate(model, &prompts::context_analysis(text, lang.name)),
            )
            .await?;

        let translated_text = self
            .run_stage(
                &mut stages,
                StageKind::Translation,
                self.timeouts.translation,
                self.generator.generate(
                    model,
                    &prompts::translation(text, &context, lang.name, lang.native),
                ),
            )
            .await?;

        let validation_raw = self
            .run_stage(
                &mut stages,
                StageKind::Validation,
                self.timeouts.validation,
                self.generator
                    .generate(model, &prompts::validation(text, &translated_text)),
            )
            .await?;
        let validation = StructuredVerdict::parse_or_fallback(&validation_raw);

        let consistency_raw = self
            .run_stage(
                &mut stages,
                StageKind::ConsistencyCheck,
                self.timeouts.consistency,
                self.generator
                    .generate(model, &prompts::consistency(text, &translated_text, lang.name)),
            )
            .await?;
        let consistency = ConsistencyVerdict::parse_or_fallback(&consistency_raw);

        let needs_improvement = validation.requires_revision() || !consistency.is_consistent;

        let mut final_text = translated_text.clone();
        let mut improvement_applied = false;
        let mut final_validation = None;

        if needs_improvement {
            info!(
                "Revision requested (validation: {:?}, consistent: {})",
                validation.status, consistency.is_consistent
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_quality_improvement();
            }

            let improved = self
                .run_stage(
                    &mut stages,
                    StageKind::QualityImprovement,
                    self.timeouts.quality,
                    self.generator.generate(
                        model,
                        &prompts::quality_improvement(
                            text,
                            &translated_text,
                            &context,
                            &validation,
                            &consistency,
                            lang.name,
                        ),
                    ),
                )
                .await?;

            // Re-validate only when the improvement actually changed the
            // text; the verdict is recorded for observability and never
            // triggers another improvement cycle.
            if improved.trim() != translated_text.trim() {
                final_text = improved.trim().to_string();
                improvement_applied = true;

                let recheck_raw = self
                    .run_stage(
                        &mut stages,
                        StageKind::FinalValidation,
                        self.timeouts.validation,
                        self.generator
                            .generate(model, &prompts::validation(text, &final_text)),
                    )
                    .await?;
                let recheck = StructuredVerdict::parse_or_fallback(&recheck_raw);
                if recheck.requires_revision() {
                    warn!(
                        "Improved translation still flagged ({:?}, score {})",
                        recheck.status, recheck.score
                    );
                }
                final_validation = Some(recheck);
            } else {
                debug!("Quality improvement produced identical text, skipping re-validation");
            }
        }

        for kind in StageKind::ALL {
            if !stages.iter().any(|s| s.stage == kind) {
                stages.push(StageRecord {
                    stage: kind,
                    status: StageStatus::Pending,
                    duration_ms: 0,
                    error: None,
                });
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_pipeline_run(started.elapsed().as_millis() as u64);
        }

        Ok(PipelineRun {
            stages,
            context,
            translated_text,
            validation,
            consistency,
            final_text,
            improvement_applied,
            final_validation,
        })
    }

    async fn run_stage<F>(
        &self,
        stages: &mut Vec<StageRecord>,
        stage: StageKind,
        timeout: Duration,
        fut: F,
    ) -> PipelineResult<String>
    where
        F: Future<Output = anyhow::Result<String>>,
    {
        let started = Instant::now();
        debug!("Running pipeline stage {}", stage);

        let result = tokio::time::timeout(timeout, fut).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(output)) => {
                stages.push(StageRecord {
                    stage,
                    status: StageStatus::Completed,
                    duration_ms,
                    error: None,
                });
                Ok(output.trim().to_string())
            }
            Ok(Err(source)) => {
                stages.push(StageRecord {
                    stage,
                    status: StageStatus::Failed,
                    duration_ms,
                    error: Some(source.to_string()),
                });
                Err(PipelineError::StageFailed { stage, source })
            }
            Err(_) => {
                stages.push(StageRecord {
                    stage,
                    status: StageStatus::Failed,
                    duration_ms,
                    error: Some(format!("timed out after {}s", timeout.as_secs())),
                });
                Err(PipelineError::StageTimedOut {
                    stage,
                    seconds: timeout.as_secs(),
                })
            }
        }
    }
}

mod prompts {
    use super::{ConsistencyVerdict, StructuredVerdict};

    pub fn context_analysis(text: &str, target_language: &str) -> String {
        format!(
            "You are a Legal Context Specialist. Analyze this document and identify:\n\n\
             1. DOCUMENT TYPE: What specific legal document is this? (Contract, NDA, SLA, Court Filing, Patent, etc.)\n\
             2. LEGAL JURISDICTION: Which legal system? (US, EU, India, UK, etc.)\n\
             3. LEGAL DOMAIN: What area of law? (Corporate, IP, Employment, Real Estate, etc.)\n\
             4. FORMALITY LEVEL: How formal/technical is the language?\n\
             5. CRITICAL ELEMENTS: What legal concepts are central?\n\n\
             Document to analyze:\n{text}\n\n\
             Respond with structured analysis for {target_language} translation:"
        )
    }

    pub fn translation(text: &str, context: &str, name: &str, native: &str) -> String {
        format!(
            "You are a Legal Translation Precision Engine. Translate this document to {name} ({native}) with STRICT LEGAL PRECISION:\n\n\
             CONTEXT ANALYSIS:\n{context}\n\n\
             TRANSLATION RULES:\n\
             1. Preserve EXACT sentence structure and dependent clauses\n\
             2. Maintain ALL conditional logic (\"if-then\" statements)\n\
             3. Keep ALL deadlines and time references intact\n\
             4. Preserve ALL legal obligations and rights\n\
             5. NO stylistic changes that could alter legal meaning\n\n\
             Document to translate:\n{text}\n\n\
             Provide precise legal translation:"
        )
    }

    pub fn validation(original: &str, translated: &str) -> String {
        format!(
            "You are a Legal Validation Specialist. Perform legal review:\n\n\
             ORIGINAL TEXT:\n{original}\n\n\
             TRANSLATED TEXT:\n{translated}\n\n\
             FINAL VALIDATION CHECKLIST:\n\
             1. LEGAL ENFORCEABILITY: Does translated document have same legal effect?\n\
             2. PRECISION: Are all legal obligations preserved?\n\
             3. CONSISTENCY: Are all terms used consistently?\n\
             4. COMPLETENESS: Is no legal content lost or altered?\n\
             5. FORMALITY: Is appropriate legal tone maintained?\n\n\
             Respond with JSON:\n\
             {{\n    \"status\": \"valid/invalid/needs_revision\",\n    \"score\": 0-100,\n    \"issues\": [\"issue1\", \"issue2\"],\n    \"recommendations\": [\"rec1\", \"rec2\"]\n}}"
        )
    }

    pub fn consistency(original: &str, translated: &str, target_language: &str) -> String {
        format!(
            "You are a language consistency expert. Analyze the following text for language mixing.\n\n\
             Original text:\n{original}\n\n\
             Translated text (should be in {target_language}):\n{translated}\n\n\
             CRITICAL ANALYSIS REQUIRED:\n\
             1. Check if the translation uses ONLY {target_language} language\n\
             2. Identify any words from other languages (English, Telugu, Tamil, Hindi, etc.)\n\
             3. Look for mixed language patterns\n\
             4. Verify consistency in terminology\n\n\
             Respond with a JSON object:\n\
             {{\n    \"isConsistent\": true/false,\n    \"mixedWords\": [\"word1\", \"word2\"],\n    \"mixedLanguages\": [\"language1\", \"language2\"],\n    \"consistencyScore\": 0-100,\n    \"recommendations\": [\"recommendation1\", \"recommendation2\"]\n}}"
        )
    }

    pub fn quality_improvement(
        original: &str,
        translated: &str,
        context: &str,
        validation: &StructuredVerdict,
        consistency: &ConsistencyVerdict,
        target_language: &str,
    ) -> String {
        format!(
            "You are a Legal Quality Assurance Specialist. Improve this {target_language} translation:\n\n\
             ORIGINAL TEXT:\n{original}\n\n\
             CURRENT TRANSLATION:\n{translated}\n\n\
             CONTEXT:\n{context}\n\n\
             VALIDATION FINDINGS (score {score}):\n{issues}\n\n\
             CONSISTENCY FINDINGS (score {cscore}):\nMixed words: {mixed}\n\n\
             Provide improved translation maintaining legal precision:",
            score = validation.score,
            issues = if validation.issues.is_empty() {
                "none".to_string()
            } else {
                validation.issues.join("\n")
            },
            cscore = consistency.consistency_score,
            mixed = if consistency.mixed_words.is_empty() {
                "none".to_string()
            } else {
                consistency.mixed_words.join(", ")
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::llm::ModelInfo;
    use anyhow::Result;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    fn timeouts() -> StageTimeouts {
        StageTimeouts {
            analysis: Duration::from_secs(5),
            translation: Duration::from_secs(5),
            validation: Duration::from_secs(5),
            consistency: Duration::from_secs(5),
            quality: Duration::from_secs(5),
        }
    }

    /// Generator that answers each call from a queue and records prompts.
    struct ScriptedGenerator {
        replies: Mutex<Vec<Result<String, &'static str>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn new(replies: Vec<Result<String, &'static str>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, _model: &str, prompt: &str) -> Result<String> {
            self.prompts.lock().push(prompt.to_string());
            let mut replies = self.replies.lock();
            if replies.is_empty() {
                anyhow::bail!("out of scripted replies");
            }
            replies.remove(0).map_err(|msg| anyhow::anyhow!(msg))
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>> {
            Ok(Vec::new())
        }
    }

    const VALID_JSON: &str = r#"{"status":"valid","score":95,"issues":[],"recommendations":[]}"#;
    const CONSISTENT_JSON: &str =
        r#"{"isConsistent":true,"mixedWords":[],"mixedLanguages":[],"consistencyScore":90,"recommendations":[]}"#;

    #[tokio::test]
    async fn happy_path_runs_four_stages() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok("contract analysis".to_string()),
            Ok("అనువాదం".to_string()),
            Ok(VALID_JSON.to_string()),
            Ok(CONSISTENT_JSON.to_string()),
        ]));
        let pipeline = AgentPipeline::new(generator.clone(), timeouts());

        let run = pipeline.run("gemma3:4b", "Original text", "te").await.unwrap();

        assert_eq!(run.final_text, "అనువాదం");
        assert!(!run.improvement_applied);
        assert!(run.final_validation.is_none());
        assert_eq!(generator.prompts.lock().len(), 4);

        let completed: Vec<StageKind> = run
            .stages
            .iter()
            .filter(|s| s.status == StageStatus::Completed)
            .map(|s| s.stage)
            .collect();
        assert_eq!(
            completed,
            vec![
                StageKind::ContextAnalysis,
                StageKind::Translation,
                StageKind::Validation,
                StageKind::ConsistencyCheck,
            ]
        );
        let pending = run
            .stages
            .iter()
            .filter(|s| s.status == StageStatus::Pending)
            .count();
        assert_eq!(pending, 2);
    }

    #[tokio::test]
    async fn needs_revision_triggers_improvement_and_recheck() {
        let needs_revision =
            r#"{"status":"needs_revision","score":55,"issues":["drift"],"recommendations":[]}"#;
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok("context".to_string()),
            Ok("first draft".to_string()),
            Ok(needs_revision.to_string()),
            Ok(CONSISTENT_JSON.to_string()),
            Ok("improved draft".to_string()),
            Ok(VALID_JSON.to_string()),
        ]));
        let pipeline = AgentPipeline::new(generator.clone(), timeouts());

        let run = pipeline.run("gemma3:4b", "Original", "te").await.unwrap();

        assert!(run.improvement_applied);
        assert_eq!(run.final_text, "improved draft");
        assert_eq!(run.translated_text, "first draft");
        let recheck = run.final_validation.unwrap();
        assert_eq!(recheck.status, ValidationStatus::Valid);
        assert_eq!(generator.prompts.lock().len(), 6);
    }

    #[tokio::test]
    async fn inconsistency_alone_triggers_improvement() {
        let inconsistent = r#"{"isConsistent":false,"mixedWords":["court"],"mixedLanguages":["en"],"consistencyScore":40,"recommendations":[]}"#;
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok("context".to_string()),
            Ok("mixed draft".to_string()),
            Ok(VALID_JSON.to_string()),
            Ok(inconsistent.to_string()),
            Ok("clean draft".to_string()),
            Ok(VALID_JSON.to_string()),
        ]));
        let pipeline = AgentPipeline::new(generator, timeouts());

        let run = pipeline.run("gemma3:4b", "Original", "te").await.unwrap();
        assert!(run.improvement_applied);
        assert_eq!(run.final_text, "clean draft");
    }

    #[tokio::test]
    async fn identical_improvement_skips_final_validation() {
        let needs_revision =
            r#"{"status":"needs_revision","score":55,"issues":[],"recommendations":[]}"#;
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok("context".to_string()),
            Ok("same draft".to_string()),
            Ok(needs_revision.to_string()),
            Ok(CONSISTENT_JSON.to_string()),
            Ok("  same draft  ".to_string()),
        ]));
        let pipeline = AgentPipeline::new(generator.clone(), timeouts());

        let run = pipeline.run("gemma3:4b", "Original", "te").await.unwrap();
        assert!(!run.improvement_applied);
        assert_eq!(run.final_text, "same draft");
        assert!(run.final_validation.is_none());
        // Improvement ran but no re-validation call followed
        assert_eq!(generator.prompts.lock().len(), 5);
    }

    #[tokio::test]
    async fn failed_stage_aborts_run() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok("context".to_string()),
            Err("model unloaded"),
        ]));
        let pipeline = AgentPipeline::new(generator.clone(), timeouts());

        let err = pipeline.run("gemma3:4b", "Original", "te").await.unwrap_err();
        match err {
            PipelineError::StageFailed { stage, .. } => {
                assert_eq!(stage, StageKind::Translation);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(generator.prompts.lock().len(), 2);
    }

    #[tokio::test]
    async fn slow_stage_times_out() {
        struct SlowGenerator;

        #[async_trait]
        impl TextGenerator for SlowGenerator {
            async fn generate(&self, _model: &str, _prompt: &str) -> Result<String> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(String::new())
            }

            async fn list_models(&self) -> Result<Vec<ModelInfo>> {
                Ok(Vec::new())
            }
        }

        let mut short = timeouts();
        short.analysis = Duration::from_secs(1);
        let pipeline = AgentPipeline::new(Arc::new(SlowGenerator), short);

        tokio::time::pause();
        let err = pipeline.run("gemma3:4b", "text", "te").await.unwrap_err();
        match err {
            PipelineError::StageTimedOut { stage, seconds } => {
                assert_eq!(stage, StageKind::ContextAnalysis);
                assert_eq!(seconds, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn translation_prompt_carries_context_and_language() {
        let prompt = prompts::translation("doc", "ctx", "Telugu", "తెలుగు");
        assert!(prompt.contains("Telugu (తెలుగు)"));
        assert!(prompt.contains("CONTEXT ANALYSIS:\nctx"));
        assert!(prompt.contains("Document to translate:\ndoc"));
    }
}
