use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use placement_billing::billing::{billing_router, BillingService, BillingStore};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_billing_routes<S>(service: Arc<BillingService<S>>) -> axum::Router
where
    S: BillingStore + 'static,
{
    billing_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{seed_ledger, SEED_VN_DEPLOYMENT};
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use placement_billing::billing::InMemoryBillingStore;
    use placement_billing::config::BillingConfig;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn app(ready: bool) -> axum::Router {
        let store = Arc::new(InMemoryBillingStore::with_ledger(seed_ledger().expect("seed data")));
        let service = Arc::new(BillingService::new(store, BillingConfig::default()));
        let recorder = PrometheusBuilder::new().build_recorder();
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(recorder.handle()),
        };
        with_billing_routes(service).layer(Extension(state))
    }

    async fn status_of(router: axum::Router, request: Request<Body>) -> StatusCode {
        router
            .oneshot(request)
            .await
            .expect("route executes")
            .status()
    }

    #[tokio::test]
    async fn probes_report_readiness() {
        let get = |uri: &str| Request::get(uri).body(Body::empty()).expect("request");

        assert_eq!(status_of(app(false), get("/health")).await, StatusCode::OK);
        assert_eq!(
            status_of(app(false), get("/ready")).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status_of(app(true), get("/ready")).await, StatusCode::OK);
        assert_eq!(status_of(app(true), get("/metrics")).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn billing_routes_are_mounted_next_to_probes() {
        let request = Request::post(format!("/deployments/{SEED_VN_DEPLOYMENT}/billing-plans"))
            .body(Body::empty())
            .expect("request");
        assert_eq!(status_of(app(true), request).await, StatusCode::CREATED);
    }
}
