use crate::state::AppState;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::StatusCode,
    web, Error,
};
use futures_util::future::LocalBoxFuture;
use std::{
    future::{ready, Ready},
    time::Instant,
};

/// Feeds per-endpoint request, error and latency counters into [`AppState`].
pub struct RequestMetrics;

/// `METHOD /route/{pattern}`, so report and prompt ids share one entry.
/// Unmatched paths (404s from the router) fall back to the raw path.
pub fn endpoint_label(req: &ServiceRequest) -> String {
    let route = req
        .match_pattern()
        .unwrap_or_else(|| req.path().to_string());
    format!("{} {}", req.method(), route)
}

fn is_failure(status: StatusCode) -> bool {
    status.is_client_error() || status.is_server_error()
}

impl<S, B> Transform<S, ServiceRequest> for RequestMetrics
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestMetricsService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestMetricsService { service }))
    }
}

pub struct RequestMetricsService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestMetricsService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Apps without state (unit tests of other middleware) are passed through
        let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
            return Box::pin(self.service.call(req));
        };

        let started = Instant::now();
        let endpoint = endpoint_label(&req);
        state.increment_request_count();

        let fut = self.service.call(req);
        Box::pin(async move {
            let result = fut.await;

            let failed = match &result {
                Ok(response) => is_failure(response.status()),
                Err(err) => is_failure(err.as_response_error().status_code()),
            };
            state.record_endpoint_request(&endpoint, started.elapsed().as_millis() as u64, failed);
            if failed {
                state.increment_error_count();
            }

            result
        })
    }
}
