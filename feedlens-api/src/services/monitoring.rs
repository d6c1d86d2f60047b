use anyhow::Result;
use feedlens_core::{ReportStore, RunSummary};
use prometheus::{
    Counter, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

// Service metrics structure
#[derive(Clone)]
pub struct ServiceMetrics {
    // API metrics
    pub api_requests_total: Counter,
    pub api_request_duration: Histogram,
    pub api_errors_total: Counter,
    pub active_streams: Gauge,

    // Analysis metrics
    pub analyses_total: Counter,
    pub failed_analyses: Counter,
    pub analysis_duration: Histogram,
    pub units_total: Counter,
    pub labeled_units_total: Counter,
    pub failed_batches_total: Counter,

    // Report metrics
    pub reports_saved_total: Counter,

    registry: Registry,
}

impl ServiceMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let api_requests_total = Counter::with_opts(
            Opts::new("feedlens_api_requests_total", "Total number of API requests")
                .const_labels(
                    vec![("service".to_string(), "feedlens-api".to_string())]
                        .into_iter()
                        .collect(),
                ),
        )?;
        registry.register(Box::new(api_requests_total.clone()))?;

        let api_request_duration = Histogram::with_opts(
            HistogramOpts::new(
                "feedlens_api_request_duration_seconds",
                "Duration of API requests in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;
        registry.register(Box::new(api_request_duration.clone()))?;

        let api_errors_total = Counter::with_opts(Opts::new(
            "feedlens_api_errors_total",
            "Total number of API errors",
        ))?;
        registry.register(Box::new(api_errors_total.clone()))?;

        let active_streams = Gauge::with_opts(Opts::new(
            "feedlens_active_streams",
            "Number of analysis progress streams currently open",
        ))?;
        registry.register(Box::new(active_streams.clone()))?;

        let analyses_total = Counter::with_opts(Opts::new(
            "feedlens_analyses_total",
            "Total number of completed analysis runs",
        ))?;
        registry.register(Box::new(analyses_total.clone()))?;

        let failed_analyses = Counter::with_opts(Opts::new(
            "feedlens_failed_analyses_total",
            "Analysis runs that aborted before producing a report",
        ))?;
        registry.register(Box::new(failed_analyses.clone()))?;

        let analysis_duration = Histogram::with_opts(
            HistogramOpts::new(
                "feedlens_analysis_duration_seconds",
                "Duration of analysis runs in seconds",
            )
            .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0]),
        )?;
        registry.register(Box::new(analysis_duration.clone()))?;

        let units_total = Counter::with_opts(Opts::new(
            "feedlens_feedback_units_total",
            "Feedback rows submitted for analysis",
        ))?;
        registry.register(Box::new(units_total.clone()))?;

        let labeled_units_total = Counter::with_opts(Opts::new(
            "feedlens_labeled_units_total",
            "Feedback rows that received a sentiment label",
        ))?;
        registry.register(Box::new(labeled_units_total.clone()))?;

        let failed_batches_total = Counter::with_opts(Opts::new(
            "feedlens_failed_batches_total",
            "Classification batches whose call failed",
        ))?;
        registry.register(Box::new(failed_batches_total.clone()))?;

        let reports_saved_total = Counter::with_opts(Opts::new(
            "feedlens_reports_saved_total",
            "Reports persisted to the store",
        ))?;
        registry.register(Box::new(reports_saved_total.clone()))?;

        Ok(Self {
            api_requests_total,
            api_request_duration,
            api_errors_total,
            active_streams,
            analyses_total,
            failed_analyses,
            analysis_duration,
            units_total,
            labeled_units_total,
            failed_batches_total,
            reports_saved_total,
            registry,
        })
    }

    pub fn render_metrics(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn record_api_request(&self, endpoint: &str, method: &str, duration_seconds: f64, status_code: u16) {
        self.api_requests_total.inc();
        self.api_request_duration.observe(duration_seconds);

        if status_code >= 400 {
            self.api_errors_total.inc();
        }

        info!(
            endpoint = endpoint,
            method = method,
            duration_ms = duration_seconds * 1000.0,
            status_code = status_code,
            "API request completed"
        );
    }

    pub fn record_analysis_complete(&self, summary: &RunSummary, duration_seconds: f64) {
        self.analyses_total.inc();
        self.analysis_duration.observe(duration_seconds);
        self.units_total.inc_by(summary.total_units as f64);
        self.labeled_units_total.inc_by(summary.labeled_units as f64);
        self.failed_batches_total
            .inc_by(summary.failed_batches.len() as f64);

        info!(
            run_id = %summary.run_id,
            total = summary.total_units,
            labeled = summary.labeled_units,
            duration_seconds = duration_seconds,
            "Analysis completed"
        );
    }

    pub fn record_analysis_failed(&self, reason: &str) {
        self.failed_analyses.inc();
        warn!(reason = reason, "Analysis failed");
    }
}

// Health check endpoints
#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub checks: HashMap<String, ComponentHealth>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub message: Option<String>,
    pub response_time_ms: Option<u64>,
}

pub struct HealthService {
    start_time: chrono::DateTime<chrono::Utc>,
    version: String,
    store: Arc<dyn ReportStore>,
}

impl HealthService {
    pub fn new(version: String, store: Arc<dyn ReportStore>) -> Self {
        Self {
            start_time: chrono::Utc::now(),
            version,
            store,
        }
    }

    pub async fn check_health(&self) -> HealthCheckResponse {
        let uptime = chrono::Utc::now().signed_duration_since(self.start_time);
        let mut checks = HashMap::new();
        checks.insert("store".to_string(), self.check_store().await);

        let overall_status = if checks.values().all(|h| h.status == "healthy") {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        };

        HealthCheckResponse {
            status: overall_status,
            version: self.version.clone(),
            uptime_seconds: uptime.num_seconds().max(0) as u64,
            checks,
        }
    }

    async fn check_store(&self) -> ComponentHealth {
        let started = Instant::now();
        // A listing for an id no client can hold exercises the read path end to end.
        match self.store.list_by_user("__health__").await {
            Ok(_) => ComponentHealth {
                status: "healthy".to_string(),
                message: Some("Report store responding".to_string()),
                response_time_ms: Some(started.elapsed().as_millis() as u64),
            },
            Err(e) => ComponentHealth {
                status: "unhealthy".to_string(),
                message: Some(e.to_string()),
                response_time_ms: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedlens_core::InMemoryReportStore;

    #[test]
    fn test_metrics_render() {
        let metrics = ServiceMetrics::new().unwrap();
        metrics.record_api_request("/api/v1/reports", "POST", 0.02, 400);
        metrics.record_analysis_complete(
            &RunSummary {
                total_units: 32,
                labeled_units: 17,
                failed_batches: vec![2],
                ..Default::default()
            },
            1.5,
        );

        let text = metrics.render_metrics().unwrap();
        assert!(text.contains("feedlens_api_errors_total 1"));
        assert!(text.contains("feedlens_labeled_units_total 17"));
        assert!(text.contains("feedlens_failed_batches_total 1"));
    }

    #[test]
    fn test_counter_and_gauge_opts_register() {
        let metrics = ServiceMetrics::new().unwrap();
        metrics.active_streams.inc();
        metrics.reports_saved_total.inc();

        let text = metrics.render_metrics().unwrap();
        assert!(text.contains("feedlens_active_streams 1"));
        assert!(text.contains("feedlens_reports_saved_total 1"));
        assert!(text.contains("service=\"feedlens-api\""));
    }

    #[tokio::test]
    async fn test_health_reports_store() {
        let health = HealthService::new("0.1.0".into(), Arc::new(InMemoryReportStore::new()));
        let status = health.check_health().await;
        assert_eq!(status.status, "healthy");
        assert!(status.checks.contains_key("store"));
    }
}
