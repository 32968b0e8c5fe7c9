use crate::cli::ServeArgs;
use crate::infra::{seed_ledger, AppState};
use crate::routes::with_billing_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use placement_billing::billing::{BillingService, InMemoryBillingStore};
use placement_billing::config::AppConfig;
use placement_billing::error::AppError;
use placement_billing::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryBillingStore::with_ledger(seed_ledger()?));
    let billing_service = Arc::new(BillingService::new(store, config.billing.clone()));

    let app = with_billing_routes(billing_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        arc_fee_per_year = %config.billing.arc_fee_per_year,
        "placement billing service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
