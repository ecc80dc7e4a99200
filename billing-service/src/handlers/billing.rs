//! Billing handlers.
//!
//! `GET /billing` returns a user's billings, optionally synced with the
//! provider first. `POST /billing` opens a subscription or hands back the
//! user's pending one.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{BillingListResponse, BillingQuery, CreateBillingRequest, CreateBillingResponse},
    models::{non_empty, BillingCycle},
    services::{BillingOutcome, CreateBilling},
    startup::AppState,
};

pub async fn get_billing(
    State(state): State<AppState>,
    query: Result<Query<BillingQuery>, QueryRejection>,
) -> Result<Json<BillingListResponse>, AppError> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(anyhow::anyhow!(e.body_text())))?;

    let user_id = non_empty(query.user_id.as_deref())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("userId is required")))?;
    let sync = query.sync_requested();

    tracing::info!(user_id = %user_id, sync, "Fetching billings");

    let overview = state.reconciler.overview(user_id, sync).await?;

    Ok(Json(BillingListResponse {
        billing: overview.latest,
        billings: overview.records,
    }))
}

pub async fn create_billing(
    State(state): State<AppState>,
    payload: Result<Json<CreateBillingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateBillingResponse>), AppError> {
    let Json(payload) =
        payload.map_err(|e| AppError::BadRequest(anyhow::anyhow!(e.body_text())))?;

    let (Some(user_id), Some(plan_id), Some(billing_cycle)) = (
        non_empty(payload.user_id.as_deref()),
        non_empty(payload.plan_id.as_deref()),
        non_empty(payload.billing_cycle.as_deref()),
    ) else {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "userId, planId and billingCycle are required"
        )));
    };

    let amount_cents = payload
        .amount_cents()
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e)))?;

    tracing::info!(
        user_id = %user_id,
        plan_id = %plan_id,
        billing_cycle = %billing_cycle,
        amount_cents = ?amount_cents,
        "Creating billing"
    );

    let outcome = state
        .reconciler
        .create_or_reuse(CreateBilling {
            user_id: user_id.to_string(),
            plan_id: plan_id.to_string(),
            cycle: BillingCycle::from_request(billing_cycle),
            amount_cents,
        })
        .await?;

    let response = match outcome {
        BillingOutcome::Reused(record) => (
            StatusCode::OK,
            Json(CreateBillingResponse {
                payment_link: record.provider_payment_link.clone(),
                billing: record,
                subscription: None,
            }),
        ),
        BillingOutcome::Created {
            record,
            subscription,
            payment_link,
        } => (
            StatusCode::CREATED,
            Json(CreateBillingResponse {
                billing: record,
                subscription: Some(subscription),
                payment_link,
            }),
        ),
    };

    Ok(response)
}
