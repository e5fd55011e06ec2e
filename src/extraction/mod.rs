// Region extraction with a language-hint fallback ladder.
//
// EasyOCR-style engines perform best with a narrow hint set, but scanned
// legal documents mix scripts unpredictably. The ladder starts narrow and
// widens until an attempt yields text; a final pass retries the narrowest
// hint set with paragraph grouping disabled to catch sparse word-level hits.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::errors::{ExtractionError, ExtractionResult};
use crate::core::types::Region;
use crate::services::ocr::OcrEngine;
use crate::utils::metrics::Metrics;

/// Confidence assigned when the engine omits one from a detection.
pub const DEFAULT_CONFIDENCE: f32 = 0.9;

/// Hint sets tried in order, narrowest first.
pub fn default_ladder() -> Vec<Vec<String>> {
    let sets: &[&[&str]] = &[
        &["en"],
        &["en", "hi"],
        &["en", "te"],
        &["en", "hi", "te"],
        &["en", "hi", "te", "ta", "kn", "ml", "gu", "pa", "bn", "or"],
    ];
    sets.iter()
        .map(|s| s.iter().map(|l| l.to_string()).collect())
        .collect()
}

pub struct RegionExtractor {
    engine: Arc<dyn OcrEngine>,
    ladder: Vec<Vec<String>>,
    metrics: Option<Arc<Metrics>>,
}

impl RegionExtractor {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self {
            engine,
            ladder: default_ladder(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[cfg(test)]
    pub fn with_ladder(mut self, ladder: Vec<Vec<String>>) -> Self {
        self.ladder = ladder;
        self
    }

    /// Run the fallback ladder against the image. The first attempt that
    /// returns any text wins; attempts that error are recorded and skipped.
    pub async fn extract(&self, image: &[u8]) -> ExtractionResult<Vec<Region>> {
        let mut attempt_errors = Vec::new();

        for (index, hints) in self.ladder.iter().enumerate() {
            if let Some(metrics) = &self.metrics {
                metrics.record_ocr_attempt();
            }
            match self.engine.detect(image, hints, true).await {
                Ok(detections) if !detections.is_empty() => {
                    info!(
                        "OCR succeeded on attempt {} with hints {:?} ({} regions)",
                        index + 1,
                        hints,
                        detections.len()
                    );
                    return Ok(Self::to_regions(detections));
                }
                Ok(_) => {
                    debug!("OCR attempt {} with hints {:?} found no text", index + 1, hints);
                }
                Err(e) => {
                    warn!("OCR attempt {} with hints {:?} failed: {}", index + 1, hints, e);
                    attempt_errors.push(format!("{:?}: {}", hints, e));
                }
            }
        }

        // Last resort: narrowest hints without paragraph grouping, which
        // can surface isolated words the merged pass discards.
        if let Some(narrowest) = self.ladder.first() {
            if let Some(metrics) = &self.metrics {
                metrics.record_ocr_attempt();
            }
            match self.engine.detect(image, narrowest, false).await {
                Ok(detections) if !detections.is_empty() => {
                    info!(
                        "OCR succeeded on word-level retry with hints {:?} ({} regions)",
                        narrowest,
                        detections.len()
                    );
                    return Ok(Self::to_regions(detections));
                }
                Ok(_) => {
                    debug!("Word-level retry with hints {:?} found no text", narrowest);
                }
                Err(e) => {
                    warn!("Word-level retry with hints {:?} failed: {}", narrowest, e);
                    attempt_errors.push(format!("{:?} (word-level): {}", narrowest, e));
                }
            }
        }

        Err(ExtractionError::NoTextDetected {
            attempts: self.ladder.len() + 1,
            attempt_errors,
        })
    }

    fn to_regions(detections: Vec<crate::services::ocr::DetectedText>) -> Vec<Region> {
        detections
            .into_iter()
            .enumerate()
            .map(|(id, d)| Region {
                id,
                quad: d.quad,
                text: d.text,
                confidence: d.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Quad;
    use crate::services::ocr::DetectedText;
    use anyhow::Result;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Scripted engine: one canned outcome per detect() call, in order.
    struct ScriptedEngine {
        script: Mutex<Vec<ScriptStep>>,
        calls: Mutex<Vec<(Vec<String>, bool)>>,
    }

    enum ScriptStep {
        Hits(Vec<DetectedText>),
        Empty,
        Fail(&'static str),
    }

    impl ScriptedEngine {
        fn new(script: Vec<ScriptStep>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl OcrEngine for ScriptedEngine {
        async fn detect(
            &self,
            _image: &[u8],
            hints: &[String],
            paragraph_mode: bool,
        ) -> Result<Vec<DetectedText>> {
            self.calls.lock().push((hints.to_vec(), paragraph_mode));
            let mut script = self.script.lock();
            if script.is_empty() {
                return Ok(Vec::new());
            }
            match script.remove(0) {
                ScriptStep::Hits(hits) => Ok(hits),
                ScriptStep::Empty => Ok(Vec::new()),
                ScriptStep::Fail(msg) => Err(anyhow::anyhow!(msg)),
            }
        }
    }

    fn detection(text: &str) -> DetectedText {
        DetectedText {
            quad: Quad::new([(0.0, 0.0), (10.0, 0.0), (10.0, 5.0), (0.0, 5.0)]),
            text: text.to_string(),
            confidence: None,
        }
    }

    #[tokio::test]
    async fn first_nonempty_attempt_wins() {
        let engine = Arc::new(ScriptedEngine::new(vec![
            ScriptStep::Empty,
            ScriptStep::Hits(vec![detection("found")]),
        ]));
        let extractor = RegionExtractor::new(engine.clone());

        let regions = extractor.extract(b"img").await.unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].text, "found");
        assert_eq!(regions[0].confidence, DEFAULT_CONFIDENCE);
        // No further ladder rungs after the hit
        assert_eq!(engine.calls.lock().len(), 2);
    }

    #[tokio::test]
    async fn word_level_retry_uses_narrowest_hints() {
        let engine = Arc::new(ScriptedEngine::new(vec![
            ScriptStep::Empty,
            ScriptStep::Empty,
            ScriptStep::Hits(vec![detection("word")]),
        ]));
        let extractor = RegionExtractor::new(engine.clone()).with_ladder(vec![
            vec!["en".to_string()],
            vec!["en".to_string(), "te".to_string()],
        ]);

        let regions = extractor.extract(b"img").await.unwrap();
        assert_eq!(regions[0].text, "word");

        let calls = engine.calls.lock();
        assert_eq!(calls.len(), 3);
        // Retry goes back to the narrowest hint set with paragraph mode off
        assert_eq!(calls[2].0, vec!["en".to_string()]);
        assert!(!calls[2].1);
        assert!(calls[0].1 && calls[1].1);
    }

    #[tokio::test]
    async fn exhausted_ladder_reports_attempts_and_errors() {
        let engine = Arc::new(ScriptedEngine::new(vec![
            ScriptStep::Fail("connection refused"),
            ScriptStep::Empty,
            ScriptStep::Empty,
        ]));
        let extractor = RegionExtractor::new(engine).with_ladder(vec![
            vec!["en".to_string()],
            vec!["en".to_string(), "hi".to_string()],
        ]);

        let err = extractor.extract(b"img").await.unwrap_err();
        match err {
            ExtractionError::NoTextDetected {
                attempts,
                attempt_errors,
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(attempt_errors.len(), 1);
                assert!(attempt_errors[0].contains("connection refused"));
            }
        }
    }

    #[tokio::test]
    async fn region_ids_are_dense_and_ordered() {
        let engine = Arc::new(ScriptedEngine::new(vec![ScriptStep::Hits(vec![
            detection("a"),
            detection("b"),
            detection("c"),
        ])]));
        let extractor = RegionExtractor::new(engine);

        let regions = extractor.extract(b"img").await.unwrap();
        let ids: Vec<usize> = regions.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn ladder_widens_monotonically() {
        let ladder = default_ladder();
        assert_eq!(ladder.len(), 5);
        for window in ladder.windows(2) {
            assert!(window[0].len() <= window[1].len());
        }
        assert_eq!(ladder[0], vec!["en".to_string()]);
    }
}
