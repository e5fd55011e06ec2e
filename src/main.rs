// Main entry point for the document translation service

use document_translator::{
    core::{
        errors::ProcessError,
        types::Action,
        Config,
    },
    orchestration::processor::{DocumentProcessor, UploadOptions},
    services::llm::OllamaClient,
    services::ocr::HttpOcrEngine,
    session::SessionStore,
    translation::TranslationOrchestrator,
    utils::Metrics,
    extraction::RegionExtractor,
};

use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    processor: Arc<DocumentProcessor>,
    metrics: Arc<Metrics>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::new().expect("Failed to load configuration"));

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new(format!(
        "document_translator={}",
        match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== DOCUMENT TRANSLATION SERVICE ===");
    info!(
        "Config: model={} concurrency={} session_ttl={}s",
        config.default_model(),
        config.direct_concurrency(),
        config.session_ttl().as_secs()
    );

    // Initialize metrics
    let metrics = Arc::new(Metrics::new());

    // Wire up collaborators
    let ocr_engine = Arc::new(HttpOcrEngine::new(config.clone())?);
    let generator = Arc::new(OllamaClient::new(config.clone())?.with_metrics(metrics.clone()));
    let extractor = RegionExtractor::new(ocr_engine).with_metrics(metrics.clone());
    let orchestrator = TranslationOrchestrator::new(generator.clone(), &config);
    let sessions = Arc::new(SessionStore::new(config.session_ttl()));

    // Background session sweeper
    {
        let sessions = sessions.clone();
        let metrics = metrics.clone();
        let interval = config.session_sweep_interval();
        tokio::spawn(async move {
            let store = sessions.clone();
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let evicted = store.sweep();
                if evicted > 0 {
                    metrics.record_sessions_evicted(evicted as u64);
                }
            }
        });
    }

    let processor = Arc::new(DocumentProcessor::new(
        config.clone(),
        extractor,
        orchestrator,
        generator,
        sessions,
        metrics.clone(),
    ));

    let state = AppState { processor, metrics };

    // Setup CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/stats", get(stats_endpoint))
        .route("/upload", post(upload))
        .route("/sessions/:id/finalize", post(finalize))
        .route("/models", get(models))
        .route("/translate/debug", post(translate_debug))
        .with_state(state)
        .layer(DefaultBodyLimit::max(50 * 1024 * 1024)) // 50MB scans
        .layer(cors);

    let addr = format!("{}:{}", config.server_host(), config.server_port());
    info!("{}", "=".repeat(70));
    info!("Server starting on http://{}", addr);
    info!("{}", "-".repeat(70));
    info!("Endpoints:");
    info!("  GET  /                       - Root endpoint");
    info!("  GET  /health                 - Health check");
    info!("  GET  /metrics                - Prometheus metrics");
    info!("  GET  /stats                  - Detailed statistics");
    info!("  POST /upload                 - Process a scanned document (multipart/form-data)");
    info!("  POST /sessions/:id/finalize  - Build overlay layout for a reviewed session");
    info!("  GET  /models                 - Available translation models");
    info!("  POST /translate/debug        - Raw prompt passthrough");
    info!("{}", "=".repeat(70));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn root() -> &'static str {
    "Document Translation Service - OCR, agent pipeline, layout reconstruction"
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Prometheus metrics endpoint
async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

/// Detailed statistics endpoint (JSON)
async fn stats_endpoint(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let snapshot = state.metrics.snapshot();
    serde_json::to_value(snapshot).map(Json).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to serialize metrics: {}", e),
        )
    })
}

/// Process a scanned document
///
/// # Request Format:
/// - multipart/form-data
/// - Field "image": the scan (PNG/JPEG)
/// - Field "model" (optional): Ollama model name
/// - Field "agent_mode" (optional): "true" for the multi-agent pipeline
/// - Field "target_language" (optional): ISO 639-1 code, defaults to Telugu
async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    state.metrics.record_endpoint_request("/upload");

    let mut image_bytes: Option<Vec<u8>> = None;
    let mut options = UploadOptions {
        model: None,
        agent_mode: false,
        target_language: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "image" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("Read error: {}", e)))?;
                image_bytes = Some(data.to_vec());
            }
            "model" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("Field error: {}", e)))?;
                if !value.trim().is_empty() {
                    options.model = Some(value.trim().to_string());
                }
            }
            "agent_mode" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("Field error: {}", e)))?;
                options.agent_mode = matches!(value.trim(), "true" | "1" | "on");
            }
            "target_language" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("Field error: {}", e)))?;
                if !value.trim().is_empty() {
                    options.target_language = Some(value.trim().to_lowercase());
                }
            }
            _ => {}
        }
    }

    let image_bytes =
        image_bytes.ok_or_else(|| bad_request("No image provided".to_string()))?;

    match state.processor.process_upload(image_bytes, options).await {
        Ok(response) => Ok(Json(response)),
        Err(ProcessError::Extraction(e)) => {
            let suggestions = e.suggestions();
            Err((
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "success": false,
                    "error": e.to_string(),
                    "suggestions": suggestions,
                })),
            ))
        }
        Err(ProcessError::InvalidImage(e)) => Err(bad_request(format!("Invalid image: {}", e))),
        Err(ProcessError::Pipeline(e)) => {
            error!("Pipeline failed during upload: {}", e);
            Err((
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({
                    "success": false,
                    "error": e.to_string(),
                })),
            ))
        }
    }
}

fn bad_request(message: String) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({
            "success": false,
            "error": message,
        })),
    )
}

#[derive(Debug, Deserialize)]
struct FinalizeRequest {
    /// Region id -> action; unreviewed regions keep their text as-is
    #[serde(default)]
    actions: HashMap<usize, Action>,
}

/// Build the overlay layout for a reviewed session
async fn finalize(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<FinalizeRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    state.metrics.record_endpoint_request("/sessions/finalize");

    match state.processor.finalize(&session_id, &request.actions) {
        Ok(document) => Ok(Json(document)),
        Err(e) => Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "success": false,
                "error": e.to_string(),
            })),
        )),
    }
}

/// Available translation models, with a static fallback when the LLM
/// backend is unreachable
async fn models(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics.record_endpoint_request("/models");
    Json(state.processor.list_models().await)
}

#[derive(Debug, Deserialize)]
struct DebugRequest {
    text: String,
    target_language: Option<String>,
    model: Option<String>,
}

/// Direct-mode translation of one text, for debugging the prompt and the
/// glossary fallback path
async fn translate_debug(
    State(state): State<AppState>,
    Json(request): Json<DebugRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    state.metrics.record_endpoint_request("/translate/debug");

    if request.text.trim().is_empty() {
        return Err(bad_request("No text provided".to_string()));
    }

    let target_language = request
        .target_language
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| document_translator::core::language::DEFAULT_LANGUAGE.to_string());
    let model = request
        .model
        .unwrap_or_else(|| state.processor.default_model().to_string());

    let translated = state
        .processor
        .debug_translate(&model, &request.text, &target_language)
        .await;

    Ok(Json(serde_json::json!({
        "success": true,
        "original": request.text,
        "translated": translated,
        "target_language": target_language,
        "model": model,
    })))
}
