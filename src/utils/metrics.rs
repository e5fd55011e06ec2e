use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Global metrics collector for the application.
///
/// Tracks upload throughput, OCR ladder activity, LLM usage, pipeline
/// durations, and session churn. Thread-safe and cheap to clone.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    // Upload metrics
    uploads_total: AtomicUsize,
    uploads_failed: AtomicUsize,
    upload_duration_ms: RwLock<Vec<u64>>,

    // OCR metrics
    ocr_attempts: AtomicUsize,

    // LLM metrics
    llm_calls_total: AtomicUsize,
    llm_calls_failed: AtomicUsize,
    llm_latency_ms: RwLock<Vec<u64>>,

    // Pipeline metrics
    pipeline_runs: AtomicUsize,
    pipeline_duration_ms: RwLock<Vec<u64>>,
    quality_improvements: AtomicUsize,

    // Session metrics
    sessions_created: AtomicUsize,
    sessions_finalized: AtomicUsize,
    sessions_evicted: AtomicU64,

    // Per-endpoint request counters
    endpoint_counters: DashMap<String, AtomicUsize>,

    // Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                uploads_total: AtomicUsize::new(0),
                uploads_failed: AtomicUsize::new(0),
                upload_duration_ms: RwLock::new(Vec::new()),
                ocr_attempts: AtomicUsize::new(0),
                llm_calls_total: AtomicUsize::new(0),
                llm_calls_failed: AtomicUsize::new(0),
                llm_latency_ms: RwLock::new(Vec::new()),
                pipeline_runs: AtomicUsize::new(0),
                pipeline_duration_ms: RwLock::new(Vec::new()),
                quality_improvements: AtomicUsize::new(0),
                sessions_created: AtomicUsize::new(0),
                sessions_finalized: AtomicUsize::new(0),
                sessions_evicted: AtomicU64::new(0),
                endpoint_counters: DashMap::new(),
                start_time: Instant::now(),
            }),
        }
    }

    pub fn record_upload(&self, duration_ms: u64) {
        self.inner.uploads_total.fetch_add(1, Ordering::Relaxed);
        self.inner.upload_duration_ms.write().push(duration_ms);
    }

    pub fn record_upload_failure(&self) {
        self.inner.uploads_total.fetch_add(1, Ordering::Relaxed);
        self.inner.uploads_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ocr_attempt(&self) {
        self.inner.ocr_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_llm_call(&self, latency_ms: u64) {
        self.inner.llm_calls_total.fetch_add(1, Ordering::Relaxed);
        self.inner.llm_latency_ms.write().push(latency_ms);
    }

    pub fn record_llm_failure(&self) {
        self.inner.llm_calls_total.fetch_add(1, Ordering::Relaxed);
        self.inner.llm_calls_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pipeline_run(&self, duration_ms: u64) {
        self.inner.pipeline_runs.fetch_add(1, Ordering::Relaxed);
        self.inner.pipeline_duration_ms.write().push(duration_ms);
    }

    pub fn record_quality_improvement(&self) {
        self.inner.quality_improvements.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_created(&self) {
        self.inner.sessions_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_finalized(&self) {
        self.inner.sessions_finalized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sessions_evicted(&self, count: u64) {
        self.inner.sessions_evicted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_endpoint_request(&self, endpoint: &str) {
        self.inner
            .endpoint_counters
            .entry(endpoint.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    // Get snapshot for reporting
    pub fn snapshot(&self) -> MetricsSnapshot {
        let llm_latency = self.inner.llm_latency_ms.read();
        let upload_duration = self.inner.upload_duration_ms.read();
        let pipeline_duration = self.inner.pipeline_duration_ms.read();

        MetricsSnapshot {
            uploads_total: self.inner.uploads_total.load(Ordering::Relaxed),
            uploads_failed: self.inner.uploads_failed.load(Ordering::Relaxed),
            upload_avg_ms: average(&upload_duration),
            ocr_attempts: self.inner.ocr_attempts.load(Ordering::Relaxed),
            llm_calls_total: self.inner.llm_calls_total.load(Ordering::Relaxed),
            llm_calls_failed: self.inner.llm_calls_failed.load(Ordering::Relaxed),
            llm_latency_avg_ms: average(&llm_latency),
            llm_latency_p50_ms: percentile(&llm_latency, 0.5),
            llm_latency_p95_ms: percentile(&llm_latency, 0.95),
            llm_latency_p99_ms: percentile(&llm_latency, 0.99),
            pipeline_runs: self.inner.pipeline_runs.load(Ordering::Relaxed),
            pipeline_avg_ms: average(&pipeline_duration),
            quality_improvements: self.inner.quality_improvements.load(Ordering::Relaxed),
            sessions_created: self.inner.sessions_created.load(Ordering::Relaxed),
            sessions_finalized: self.inner.sessions_finalized.load(Ordering::Relaxed),
            sessions_evicted: self.inner.sessions_evicted.load(Ordering::Relaxed),
            endpoint_requests: self
                .inner
                .endpoint_counters
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
                .collect(),
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Generate Prometheus-format metrics
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP uploads_total Total number of document uploads
# TYPE uploads_total counter
uploads_total {{}} {}

# HELP uploads_failed Number of failed document uploads
# TYPE uploads_failed counter
uploads_failed {{}} {}

# HELP upload_avg_ms Average end-to-end upload processing time
# TYPE upload_avg_ms gauge
upload_avg_ms {{}} {}

# HELP ocr_attempts_total Total OCR engine invocations across all ladders
# TYPE ocr_attempts_total counter
ocr_attempts_total {{}} {}

# HELP llm_calls_total Total LLM generation calls
# TYPE llm_calls_total counter
llm_calls_total {{}} {}

# HELP llm_calls_failed Number of failed LLM generation calls
# TYPE llm_calls_failed counter
llm_calls_failed {{}} {}

# HELP llm_latency_avg_ms Average LLM latency in milliseconds
# TYPE llm_latency_avg_ms gauge
llm_latency_avg_ms {{}} {}

# HELP pipeline_runs_total Total agent pipeline executions
# TYPE pipeline_runs_total counter
pipeline_runs_total {{}} {}

# HELP pipeline_avg_ms Average pipeline duration in milliseconds
# TYPE pipeline_avg_ms gauge
pipeline_avg_ms {{}} {}

# HELP quality_improvements_total Pipeline runs that entered the improvement stage
# TYPE quality_improvements_total counter
quality_improvements_total {{}} {}

# HELP sessions_created_total Total review sessions created
# TYPE sessions_created_total counter
sessions_created_total {{}} {}

# HELP sessions_finalized_total Total review sessions finalized
# TYPE sessions_finalized_total counter
sessions_finalized_total {{}} {}

# HELP sessions_evicted_total Total sessions evicted by TTL
# TYPE sessions_evicted_total counter
sessions_evicted_total {{}} {}

# HELP uptime_seconds Application uptime in seconds
# TYPE uptime_seconds counter
uptime_seconds {{}} {}
"#,
            snapshot.uploads_total,
            snapshot.uploads_failed,
            snapshot.upload_avg_ms,
            snapshot.ocr_attempts,
            snapshot.llm_calls_total,
            snapshot.llm_calls_failed,
            snapshot.llm_latency_avg_ms,
            snapshot.pipeline_runs,
            snapshot.pipeline_avg_ms,
            snapshot.quality_improvements,
            snapshot.sessions_created,
            snapshot.sessions_finalized,
            snapshot.sessions_evicted,
            snapshot.uptime_seconds,
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uploads_total: usize,
    pub uploads_failed: usize,
    pub upload_avg_ms: u64,
    pub ocr_attempts: usize,
    pub llm_calls_total: usize,
    pub llm_calls_failed: usize,
    pub llm_latency_avg_ms: u64,
    pub llm_latency_p50_ms: u64,
    pub llm_latency_p95_ms: u64,
    pub llm_latency_p99_ms: u64,
    pub pipeline_runs: usize,
    pub pipeline_avg_ms: u64,
    pub quality_improvements: usize,
    pub sessions_created: usize,
    pub sessions_finalized: usize,
    pub sessions_evicted: u64,
    pub endpoint_requests: std::collections::HashMap<String, usize>,
    pub uptime_seconds: u64,
}

fn average(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<u64>() / values.len() as u64
}

fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = ((values.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_activity() {
        let metrics = Metrics::new();
        metrics.record_upload(120);
        metrics.record_upload(80);
        metrics.record_upload_failure();
        metrics.record_ocr_attempt();
        metrics.record_llm_call(40);
        metrics.record_llm_failure();
        metrics.record_pipeline_run(500);
        metrics.record_quality_improvement();
        metrics.record_session_created();
        metrics.record_sessions_evicted(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.uploads_total, 3);
        assert_eq!(snapshot.uploads_failed, 1);
        assert_eq!(snapshot.upload_avg_ms, 100);
        assert_eq!(snapshot.ocr_attempts, 1);
        assert_eq!(snapshot.llm_calls_total, 2);
        assert_eq!(snapshot.llm_calls_failed, 1);
        assert_eq!(snapshot.pipeline_runs, 1);
        assert_eq!(snapshot.quality_improvements, 1);
        assert_eq!(snapshot.sessions_created, 1);
        assert_eq!(snapshot.sessions_evicted, 3);
    }

    #[test]
    fn endpoint_counters_accumulate() {
        let metrics = Metrics::new();
        metrics.record_endpoint_request("/upload");
        metrics.record_endpoint_request("/upload");
        metrics.record_endpoint_request("/models");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.endpoint_requests["/upload"], 2);
        assert_eq!(snapshot.endpoint_requests["/models"], 1);
    }

    #[test]
    fn percentile_handles_empty_and_single() {
        assert_eq!(percentile(&[], 0.95), 0);
        assert_eq!(percentile(&[42], 0.5), 42);
        assert_eq!(percentile(&[10, 20, 30, 40], 0.5), 20);
    }

    #[test]
    fn prometheus_output_includes_counters() {
        let metrics = Metrics::new();
        metrics.record_upload(50);
        let output = metrics.to_prometheus();
        assert!(output.contains("uploads_total {} 1"));
        assert!(output.contains("# TYPE llm_calls_total counter"));
    }
}
