use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::{DepositRequest, PaymentProcessor, PaymentSession};

/// Signatures older than this are rejected to limit webhook replay.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

pub struct StripeCheckoutProvider {
    secret_key: String,
    api_base: String,
    client: reqwest::Client,
}

impl StripeCheckoutProvider {
    pub fn new(secret_key: String, api_base: String) -> Self {
        Self {
            secret_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

fn checkout_form(request: &DepositRequest) -> Vec<(&'static str, String)> {
    let mut form = vec![
        ("mode", "payment".to_string()),
        ("payment_method_types[0]", "card".to_string()),
        (
            "line_items[0][price_data][currency]",
            request.currency.clone(),
        ),
        (
            "line_items[0][price_data][product_data][name]",
            format!("Deposit for {}", request.service_name),
        ),
        (
            "line_items[0][price_data][product_data][description]",
            format!("Booking confirmation deposit for {}", request.customer_name),
        ),
        (
            "line_items[0][price_data][unit_amount]",
            request.amount_minor.to_string(),
        ),
        ("line_items[0][quantity]", "1".to_string()),
        ("metadata[booking_id]", request.booking_id.clone()),
        ("client_reference_id", request.booking_id.clone()),
        ("success_url", request.success_url.clone()),
        ("cancel_url", request.cancel_url.clone()),
    ];
    // FPX online banking only settles in ringgit
    if request.currency == "myr" {
        form.push(("payment_method_types[1]", "fpx".to_string()));
    }
    form
}

#[async_trait]
impl PaymentProcessor for StripeCheckoutProvider {
    async fn create_session(&self, request: &DepositRequest) -> anyhow::Result<PaymentSession> {
        let resp = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&checkout_form(request))
            .send()
            .await
            .context("failed to call Stripe API")?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse Stripe response")?;

        if !status.is_success() {
            let message = data["error"]["message"]
                .as_str()
                .unwrap_or("unknown Stripe error");
            anyhow::bail!("Stripe API error ({status}): {message}");
        }

        let id = data["id"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("missing id in Stripe response"))?;
        let url = data["url"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("missing url in Stripe response"))?;

        Ok(PaymentSession {
            id: id.to_string(),
            redirect_url: url.to_string(),
        })
    }
}

/// Verifies a `Stripe-Signature` header (`t=<unix>,v1=<hex hmac>`) against
/// the raw request body.
pub fn verify_webhook_signature(secret: &str, header: &str, payload: &[u8]) -> bool {
    verify_webhook_signature_at(secret, header, payload, Utc::now().timestamp())
}

fn verify_webhook_signature_at(secret: &str, header: &str, payload: &[u8], now: i64) -> bool {
    let mut timestamp: Option<&str> = None;
    let mut signatures = vec![];
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let Some(timestamp) = timestamp else {
        return false;
    };
    let Ok(issued_at) = timestamp.parse::<i64>() else {
        return false;
    };
    if (now - issued_at).abs() > SIGNATURE_TOLERANCE_SECS {
        return false;
    }

    signatures.into_iter().any(|signature| {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    })
}

#[cfg(test)]
pub(crate) fn sign_webhook_payload(secret: &str, payload: &[u8], timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}
