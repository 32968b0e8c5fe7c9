use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use super::domain::{BillId, DeploymentId, PlanId};
use super::error::BillingError;
use super::fixed_fee::{FixedFeeOutcome, FixedFeeRequest};
use super::plan::ConfirmItem;
use super::service::BillingService;
use super::store::BillingStore;

#[derive(Debug, Deserialize)]
pub(crate) struct ConfirmPayload {
    #[serde(default)]
    items: Vec<ConfirmItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewPayload {
    reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PeriodPayload {
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    month: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PaymentPayload {
    bill_id: BillId,
    amount: Decimal,
    payment_date: NaiveDate,
}

/// Router builder exposing the plan and accounting endpoints.
pub fn billing_router<S>(service: Arc<BillingService<S>>) -> Router
where
    S: BillingStore + 'static,
{
    Router::new()
        .route("/billing-plans/:plan_id", get(plan_handler::<S>))
        .route("/billing-plans/:plan_id/simulate", post(simulate_handler::<S>))
        .route("/billing-plans/:plan_id/confirm", post(confirm_handler::<S>))
        .route(
            "/billing-plans/:plan_id/materialize",
            post(materialize_handler::<S>),
        )
        .route(
            "/deployments/:deployment_id/billing-plans",
            post(generate_plan_handler::<S>),
        )
        .route(
            "/deployments/:deployment_id/review-flags",
            post(review_flag_handler::<S>),
        )
        .route(
            "/accounting/generate-monthly-fees",
            post(monthly_fees_handler::<S>),
        )
        .route("/accounting/bills/pay", post(pay_handler::<S>))
        .route("/accounting/bills/create-fixed", post(fixed_fee_handler::<S>))
        .route("/accounting/bills/:bill_id", get(bill_handler::<S>))
        .with_state(service)
}

fn error_response(error: BillingError) -> Response {
    let status = error.status_code();
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(%error, "billing request failed");
    }
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}

pub(crate) async fn plan_handler<S>(
    State(service): State<Arc<BillingService<S>>>,
    Path(plan_id): Path<String>,
) -> Response
where
    S: BillingStore + 'static,
{
    match service.plan(&PlanId(plan_id)) {
        Ok(detail) => (StatusCode::OK, axum::Json(detail)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn simulate_handler<S>(
    State(service): State<Arc<BillingService<S>>>,
    Path(plan_id): Path<String>,
) -> Response
where
    S: BillingStore + 'static,
{
    match service.simulate(&PlanId(plan_id)) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn confirm_handler<S>(
    State(service): State<Arc<BillingService<S>>>,
    Path(plan_id): Path<String>,
    axum::Json(payload): axum::Json<ConfirmPayload>,
) -> Response
where
    S: BillingStore + 'static,
{
    match service.confirm_plan(&PlanId(plan_id), &payload.items) {
        Ok(detail) => (StatusCode::OK, axum::Json(detail)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn materialize_handler<S>(
    State(service): State<Arc<BillingService<S>>>,
    Path(plan_id): Path<String>,
) -> Response
where
    S: BillingStore + 'static,
{
    match service.materialize_schedules(&PlanId(plan_id)) {
        Ok(schedules) => {
            let payload = json!({
                "created": schedules.len(),
                "schedules": schedules,
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn generate_plan_handler<S>(
    State(service): State<Arc<BillingService<S>>>,
    Path(deployment_id): Path<String>,
) -> Response
where
    S: BillingStore + 'static,
{
    match service.generate_plan(&DeploymentId(deployment_id)) {
        Ok(detail) => (StatusCode::CREATED, axum::Json(detail)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn review_flag_handler<S>(
    State(service): State<Arc<BillingService<S>>>,
    Path(deployment_id): Path<String>,
    axum::Json(payload): axum::Json<ReviewPayload>,
) -> Response
where
    S: BillingStore + 'static,
{
    match service.flag_for_review(&DeploymentId(deployment_id), &payload.reason) {
        Ok(flagged) => (StatusCode::OK, axum::Json(json!({ "flagged": flagged }))).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn monthly_fees_handler<S>(
    State(service): State<Arc<BillingService<S>>>,
    axum::Json(payload): axum::Json<PeriodPayload>,
) -> Response
where
    S: BillingStore + 'static,
{
    match service.generate_monthly_bills(payload.year, payload.month) {
        Ok(summary) => {
            let payload = json!({
                "message": summary.message(),
                "generated": summary.generated,
                "skipped": summary.skipped,
                "billIds": summary.bill_ids,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn pay_handler<S>(
    State(service): State<Arc<BillingService<S>>>,
    axum::Json(payload): axum::Json<PaymentPayload>,
) -> Response
where
    S: BillingStore + 'static,
{
    match service.pay_bill(&payload.bill_id, payload.amount, payload.payment_date) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        // Payment form contract: an unknown bill is a bad request, not a missing resource.
        Err(error @ BillingError::NotFound { .. }) => {
            let payload = json!({
                "error": error.to_string(),
            });
            (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn fixed_fee_handler<S>(
    State(service): State<Arc<BillingService<S>>>,
    axum::Json(request): axum::Json<FixedFeeRequest>,
) -> Response
where
    S: BillingStore + 'static,
{
    match service.create_fixed_fee(&request) {
        Ok(FixedFeeOutcome::RequiresConfirmation {
            warning_message,
            block_level,
            regulation,
        }) => {
            let payload = json!({
                "requiresConfirmation": true,
                "warningMessage": warning_message,
                "blockLevel": block_level,
                "regulation": regulation,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Ok(FixedFeeOutcome::Created {
            bill,
            compliance_warning,
            override_recorded,
        }) => {
            let payload = json!({
                "requiresConfirmation": false,
                "bill": bill,
                "complianceWarning": compliance_warning,
                "overrideRecorded": override_recorded,
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn bill_handler<S>(
    State(service): State<Arc<BillingService<S>>>,
    Path(bill_id): Path<String>,
) -> Response
where
    S: BillingStore + 'static,
{
    match service.bill(&BillId(bill_id)) {
        Ok(detail) => (StatusCode::OK, axum::Json(detail)).into_response(),
        Err(error) => error_response(error),
    }
}
