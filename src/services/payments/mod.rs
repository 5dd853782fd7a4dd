pub mod stripe;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A request to collect a deposit for one booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRequest {
    pub booking_id: String,
    pub service_name: String,
    pub customer_name: String,
    /// Amount in the processor's minor currency unit (cents, sen).
    pub amount_minor: i64,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSession {
    pub id: String,
    pub redirect_url: String,
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_session(&self, request: &DepositRequest) -> anyhow::Result<PaymentSession>;
}
