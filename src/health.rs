use crate::state::{AppMetrics, AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = state.config();
    let uptime_seconds = state.get_uptime_seconds();

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "service": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "metrics": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": overall_error_rate(&metrics),
            "active_analyses": metrics.active_analyses
        },
        "memory": get_memory_info(),
        "models": {
            "transcription": config.openai.transcription_model,
            "chat": config.openai.chat_model,
            "api_key_configured": !config.openai.api_key.trim().is_empty()
        },
        "analysis": analysis_status(&metrics)
    }))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();

    let mut endpoint_stats = Vec::new();
    for (endpoint, metric) in metrics.endpoint_metrics.iter() {
        endpoint_stats.push(json!({
            "endpoint": endpoint,
            "request_count": metric.request_count,
            "error_count": metric.error_count,
            "error_rate": metric.error_rate(),
            "average_duration_ms": metric.average_duration_ms(),
            "total_duration_ms": metric.total_duration_ms
        }));
    }

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": overall_error_rate(&metrics),
            "requests_per_second": if uptime_seconds > 0 {
                metrics.request_count as f64 / uptime_seconds as f64
            } else {
                0.0
            }
        },
        "analysis": analysis_status(&metrics),
        "endpoints": endpoint_stats,
        "memory": get_memory_info()
    }))
}

fn overall_error_rate(metrics: &AppMetrics) -> f64 {
    if metrics.request_count > 0 {
        metrics.error_count as f64 / metrics.request_count as f64
    } else {
        0.0
    }
}

fn analysis_status(metrics: &AppMetrics) -> serde_json::Value {
    let finished = metrics.completed_analyses + metrics.failed_analyses;
    json!({
        "active": metrics.active_analyses,
        "completed": metrics.completed_analyses,
        "failed": metrics.failed_analyses,
        "failure_rate": if finished > 0 {
            metrics.failed_analyses as f64 / finished as f64
        } else {
            0.0
        }
    })
}

fn get_memory_info() -> serde_json::Value {
    #[cfg(target_os = "linux")]
    {
        let pid = std::process::id();
        if let Ok(status) = std::fs::read_to_string(format!("/proc/{}/status", pid)) {
            let read_kb = |prefix: &str| {
                status
                    .lines()
                    .find(|line| line.starts_with(prefix))
                    .and_then(|line| line.split_whitespace().nth(1))
                    .and_then(|kb| kb.parse::<u64>().ok())
                    .unwrap_or(0)
                    * 1024
            };

            return json!({
                "resident_memory_bytes": read_kb("VmRSS:"),
                "virtual_memory_bytes": read_kb("VmSize:"),
                "available": true
            });
        }
    }

    json!({
        "resident_memory_bytes": 0,
        "virtual_memory_bytes": 0,
        "available": false,
        "note": "Memory info not available on this platform"
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::orchestrator::tests::{harness, perfect_transcription, FakeBlobs, FakeModel};
    use crate::state::tests::test_state;
    use actix_web::{test as actix_test, App};
    use std::sync::Arc;

    #[actix_web::test]
    async fn test_health_and_metrics_need_no_auth() {
        let h = harness(perfect_transcription("hi"), FakeModel::new(), false, false);
        let state = test_state(&h, Arc::new(FakeBlobs { fail: false }));
        state.record_endpoint_request("GET /api/v1/reports", 12, false);

        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/health", web::get().to(health_check))
                .route("/metrics", web::get().to(detailed_metrics)),
        )
        .await;

        let resp = actix_test::call_service(&app, actix_test::TestRequest::get().uri("/health").to_request()).await;
        assert!(resp.status().is_success());
        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["models"]["api_key_configured"], false);

        let resp = actix_test::call_service(&app, actix_test::TestRequest::get().uri("/metrics").to_request()).await;
        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["endpoints"][0]["endpoint"], "GET /api/v1/reports");
        assert_eq!(body["analysis"]["active"], 0);
    }
}
