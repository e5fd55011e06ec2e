use crate::core::errors::ConfigError;
use std::env;
use std::time::Duration;
use tracing::Level;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
}

/// OCR sidecar configuration
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Base URL of the OCR sidecar (detect endpoint lives under it)
    pub endpoint: String,
    pub request_timeout_secs: u64,
}

/// LLM backend configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL of the Ollama-compatible backend
    pub endpoint: String,
    pub default_model: String,
    pub max_retries: u32,
    pub request_timeout_secs: u64,
}

/// Per-stage deadlines for the agent pipeline.
///
/// Analysis, validation, and consistency checks are short prompts; the
/// translation and quality stages carry the document body and get longer.
#[derive(Debug, Clone)]
pub struct StageTimeouts {
    pub analysis: Duration,
    pub translation: Duration,
    pub validation: Duration,
    pub consistency: Duration,
    pub quality: Duration,
}

/// Translation orchestration configuration
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    /// Maximum concurrent direct-mode generator calls
    pub direct_concurrency: usize,
    /// Per-call deadline in direct mode
    pub direct_deadline_secs: u64,
    pub stage_timeouts: StageTimeouts,
}

/// Session store configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub ocr: OcrConfig,
    pub llm: LlmConfig,
    pub translation: TranslationConfig,
    pub session: SessionConfig,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env();
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn load_from_env() -> Self {
        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        Self {
            server: ServerConfig {
                port: env_parse("SERVER_PORT", 5000),
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                log_level,
            },
            ocr: OcrConfig {
                endpoint: env::var("OCR_ENDPOINT")
                    .unwrap_or_else(|_| "http://localhost:8868".to_string()),
                request_timeout_secs: env_parse("OCR_TIMEOUT_SECONDS", 120),
            },
            llm: LlmConfig {
                endpoint: env::var("LLM_ENDPOINT")
                    .unwrap_or_else(|_| "http://localhost:11434".to_string()),
                default_model: env::var("LLM_DEFAULT_MODEL")
                    .unwrap_or_else(|_| "gemma3-legal-samanantar-pro:latest".to_string()),
                max_retries: env_parse("LLM_MAX_RETRIES", 3),
                request_timeout_secs: env_parse("LLM_TIMEOUT_SECONDS", 120),
            },
            translation: TranslationConfig {
                direct_concurrency: env_parse("DIRECT_CONCURRENCY", 4),
                direct_deadline_secs: env_parse("DIRECT_DEADLINE_SECONDS", 45),
                stage_timeouts: StageTimeouts {
                    analysis: Duration::from_secs(env_parse("STAGE_ANALYSIS_TIMEOUT_SECONDS", 30)),
                    translation: Duration::from_secs(env_parse(
                        "STAGE_TRANSLATION_TIMEOUT_SECONDS",
                        45,
                    )),
                    validation: Duration::from_secs(env_parse(
                        "STAGE_VALIDATION_TIMEOUT_SECONDS",
                        30,
                    )),
                    consistency: Duration::from_secs(env_parse(
                        "STAGE_CONSISTENCY_TIMEOUT_SECONDS",
                        20,
                    )),
                    quality: Duration::from_secs(env_parse("STAGE_QUALITY_TIMEOUT_SECONDS", 45)),
                },
            },
            session: SessionConfig {
                ttl_secs: env_parse("SESSION_TTL_SECONDS", 900),
                sweep_interval_secs: env_parse("SESSION_SWEEP_INTERVAL_SECONDS", 60),
            },
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.ocr.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingOcrEndpoint);
        }
        if self.llm.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingLlmEndpoint);
        }
        if self.translation.direct_concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency(
                self.translation.direct_concurrency,
            ));
        }
        if self.session.ttl_secs == 0 {
            return Err(ConfigError::InvalidSessionTtl(self.session.ttl_secs));
        }

        let t = &self.translation.stage_timeouts;
        for (name, d) in [
            ("analysis", t.analysis),
            ("translation", t.translation),
            ("validation", t.validation),
            ("consistency", t.consistency),
            ("quality", t.quality),
        ] {
            if d.is_zero() {
                return Err(ConfigError::InvalidStageTimeout(name.to_string()));
            }
        }

        Ok(())
    }

    pub fn server_host(&self) -> &str {
        &self.server.host
    }

    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }

    pub fn default_model(&self) -> &str {
        &self.llm.default_model
    }

    pub fn direct_concurrency(&self) -> usize {
        self.translation.direct_concurrency
    }

    pub fn direct_deadline(&self) -> Duration {
        Duration::from_secs(self.translation.direct_deadline_secs)
    }

    pub fn stage_timeouts(&self) -> &StageTimeouts {
        &self.translation.stage_timeouts
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session.ttl_secs)
    }

    pub fn session_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session.sweep_interval_secs)
    }
}

// Note: No Default implementation because Config::new() can fail
// Users should explicitly call Config::new()? and handle errors
