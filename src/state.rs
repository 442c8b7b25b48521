//! # Application State Management
//!
//! Shared state handed to every request handler through `web::Data<AppState>`.
//!
//! ## Contents:
//! - **config**: immutable after startup, so a plain `Arc` is enough
//! - **metrics**: request counters updated by the middleware on every request
//! - **analyzer**: the recording pipeline, with its collaborators already wired in
//! - **reports / prompts / blobs / prompt_generator**: the services the thinner
//!   handlers talk to directly
//!
//! ## Locking:
//! Metrics use a `std::sync::RwLock`. Critical sections are a few integer
//! updates and never await, so the blocking lock is fine inside async code.
//! A poisoned lock only means another request panicked mid-update; the counters
//! are still usable, so the guard is recovered instead of propagating the panic.

use crate::analysis::Analyzer;
use crate::config::AppConfig;
use crate::services::{BlobStore, PromptGenerator};
use crate::store::{PromptStore, ReportStore};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub metrics: Arc<RwLock<AppMetrics>>,
    pub start_time: Instant,
    pub analyzer: Arc<Analyzer>,
    pub reports: Arc<dyn ReportStore>,
    pub prompts: Arc<dyn PromptStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub prompt_generator: Arc<dyn PromptGenerator>,
}

/// Services the state is assembled from.
pub struct StateServices {
    pub analyzer: Arc<Analyzer>,
    pub reports: Arc<dyn ReportStore>,
    pub prompts: Arc<dyn PromptStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub prompt_generator: Arc<dyn PromptGenerator>,
}

/// Request metrics collected since server start.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    pub request_count: u64,
    pub error_count: u64,
    /// Recordings currently going through the analysis pipeline
    pub active_analyses: u32,
    pub completed_analyses: u64,
    pub failed_analyses: u64,
    /// Keyed by "METHOD /route/pattern"
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    pub fn new(config: AppConfig, services: StateServices) -> Self {
        Self {
            config: Arc::new(config),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
            analyzer: services.analyzer,
            reports: services.reports,
            prompts: services.prompts,
            blobs: services.blobs,
            prompt_generator: services.prompt_generator,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn read_metrics(&self) -> RwLockReadGuard<'_, AppMetrics> {
        self.metrics.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_metrics(&self) -> RwLockWriteGuard<'_, AppMetrics> {
        self.metrics.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn increment_request_count(&self) {
        self.write_metrics().request_count += 1;
    }

    pub fn increment_error_count(&self) {
        self.write_metrics().error_count += 1;
    }

    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.write_metrics();
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;
        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Mark an analysis as started. The returned guard marks it finished when dropped.
    pub fn begin_analysis(&self) -> AnalysisGuard {
        self.write_metrics().active_analyses += 1;
        AnalysisGuard {
            metrics: self.metrics.clone(),
            succeeded: false,
        }
    }

    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.read_metrics().clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Tracks one in-flight analysis; counts it as failed unless [`AnalysisGuard::succeed`] is called.
pub struct AnalysisGuard {
    metrics: Arc<RwLock<AppMetrics>>,
    succeeded: bool,
}

impl AnalysisGuard {
    pub fn succeed(mut self) {
        self.succeeded = true;
    }
}

impl Drop for AnalysisGuard {
    fn drop(&mut self) {
        let mut metrics = self.metrics.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        metrics.active_analyses = metrics.active_analyses.saturating_sub(1);
        if self.succeeded {
            metrics.completed_analyses += 1;
        } else {
            metrics.failed_analyses += 1;
        }
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Fraction of requests that failed, 0.0 to 1.0.
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
