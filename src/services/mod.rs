pub mod llm;
pub mod ocr;

pub use llm::{fallback_models, ModelInfo, OllamaClient, TextGenerator};
pub use ocr::{DetectedText, HttpOcrEngine, OcrEngine};
