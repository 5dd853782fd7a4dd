use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Redirect;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::services::deposit;
use crate::services::payments::stripe::verify_webhook_signature;
use crate::state::AppState;

// POST /api/checkout
#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub booking_id: String,
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    url: String,
}

pub async fn checkout(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let url = deposit::begin_configured_deposit(&state, &body.booking_id).await?;
    Ok(Json(CheckoutResponse { url }))
}

// GET /payment/return
#[derive(Deserialize)]
pub struct ReturnQuery {
    pub success: Option<bool>,
    pub canceled: Option<bool>,
    pub booking_id: Option<String>,
}

/// Consumes the processor's browser redirect, then sends the customer to the
/// bare landing page so a reload cannot replay it.
///
/// The query string is not signed, so anyone holding a booking id can mark
/// its deposit paid here. Deployments that take real money should set
/// `STRIPE_WEBHOOK_SECRET` and treat the signed webhook as the payment record.
pub async fn payment_return(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReturnQuery>,
) -> Redirect {
    let succeeded = query.success.unwrap_or(false) && !query.canceled.unwrap_or(false);

    if let Some(booking_id) = query.booking_id.as_deref().filter(|id| !id.is_empty()) {
        if let Err(e) = deposit::on_return(&state, booking_id, succeeded) {
            tracing::warn!(booking_id, error = %e, "failed to apply payment return");
        }
    } else {
        tracing::warn!("payment return without booking_id");
    }

    Redirect::to(&format!("{}/", state.config.public_url))
}

// POST /webhook/stripe
#[derive(Deserialize)]
struct StripeEvent {
    #[serde(rename = "type")]
    kind: String,
    data: StripeEventData,
}

#[derive(Deserialize)]
struct StripeEventData {
    object: CheckoutSessionObject,
}

#[derive(Deserialize)]
struct CheckoutSessionObject {
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    client_reference_id: Option<String>,
    #[serde(default)]
    metadata: std::collections::HashMap<String, String>,
}

impl CheckoutSessionObject {
    fn booking_id(&self) -> Option<&str> {
        self.metadata
            .get("booking_id")
            .map(String::as_str)
            .or(self.client_reference_id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

fn confirms_payment(event: &StripeEvent) -> bool {
    match event.kind.as_str() {
        "checkout.session.completed" => {
            event.data.object.payment_status.as_deref() == Some("paid")
        }
        "checkout.session.async_payment_succeeded" => true,
        _ => false,
    }
}

pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    // Skip verification when no signing secret is configured (dev mode)
    let secret = &state.config.stripe_webhook_secret;
    if !secret.is_empty() {
        let signature = headers
            .get("stripe-signature")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !verify_webhook_signature(secret, signature, &body) {
            tracing::warn!("rejected Stripe webhook with invalid signature");
            return Err(AppError::Unauthorized);
        }
    }

    // Events we cannot parse are acknowledged so Stripe stops retrying them
    let event: StripeEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring unrecognised Stripe event");
            return Ok(StatusCode::OK);
        }
    };

    if !confirms_payment(&event) {
        tracing::debug!(kind = %event.kind, "ignoring Stripe event");
        return Ok(StatusCode::OK);
    }

    let Some(booking_id) = event.data.object.booking_id() else {
        tracing::warn!(kind = %event.kind, "Stripe event without booking id");
        return Ok(StatusCode::OK);
    };

    tracing::info!(booking_id, kind = %event.kind, "payment confirmed by webhook");
    match deposit::on_return(&state, booking_id, true) {
        Ok(_) => Ok(StatusCode::OK),
        Err(AppError::NotFound(what)) => {
            tracing::warn!(booking_id, "webhook for unknown {what}");
            Ok(StatusCode::OK)
        }
        Err(e) => Err(e),
    }
}
